// pushgate-common: shared types and input parsing for the pushgate workspace

pub mod types;
pub mod update;
