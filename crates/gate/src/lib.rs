// pushgate-gate: lease coordination, integrity policy and the push gate.

pub mod config;
pub mod error;
pub mod gate;
pub mod git;
pub mod lease;
pub mod policy;
pub mod session;
