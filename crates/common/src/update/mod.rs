// Update-set input: one `<local-ref> <local-sha> <remote-ref> <remote-sha>`
// line per reference, as git feeds the pre-push hook on stdin.

pub mod parse;

pub use parse::{parse_update_line, read_updates, ParseError, ParsedUpdates, SkippedLine};
