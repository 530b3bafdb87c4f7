use std::io::Cursor;

use pushgate_common::types::{is_tag_reference, CommitId};
use pushgate_common::update::read_updates;

// Shape of the stdin git hands a pre-push hook: branch update, new tag,
// branch deletion.
const PRE_PUSH_INPUT: &str = "\
refs/heads/main 3f786850e387550fdab836ed7e6dc881de23001b refs/heads/main 89e6c98d92887913cadf06b2adb97f26cde4849b
refs/tags/v1.2.0 a94a8fe5ccb19ba61c4c0873d391e987982fbbd3 refs/tags/v1.2.0 0000000000000000000000000000000000000000
(delete) 0000000000000000000000000000000000000000 refs/heads/old-feature 2fd4e1c67a2d28fced849ee1bb76e7391b93eb12
";

#[test]
fn pre_push_stdin_is_parsed_in_order() {
    let parsed = read_updates(Cursor::new(PRE_PUSH_INPUT)).expect("input should be readable");

    assert!(parsed.skipped.is_empty());
    let refs: Vec<&str> = parsed.updates.iter().map(|u| u.remote_ref.as_str()).collect();
    assert_eq!(refs, vec!["refs/heads/main", "refs/tags/v1.2.0", "refs/heads/old-feature"]);
}

#[test]
fn pre_push_stdin_marks_creations_and_deletions() {
    let parsed = read_updates(Cursor::new(PRE_PUSH_INPUT)).expect("input should be readable");

    let main = &parsed.updates[0];
    assert!(!main.creates_reference());
    assert!(!main.deletes_reference());

    let tag = &parsed.updates[1];
    assert!(is_tag_reference(&tag.remote_ref));
    assert!(tag.creates_reference());

    let deletion = &parsed.updates[2];
    assert_eq!(deletion.local_ref, "(delete)");
    assert!(deletion.deletes_reference());
    assert_eq!(deletion.local_commit, CommitId::zero(40));
}

#[test]
fn sha256_repositories_use_wider_ids() {
    let zero = "0".repeat(64);
    let sha = "a".repeat(64);
    let line = format!("refs/heads/main {sha} refs/heads/main {zero}\n");

    let parsed = read_updates(Cursor::new(line)).expect("input should be readable");
    assert_eq!(parsed.updates.len(), 1);
    assert!(parsed.updates[0].creates_reference());
}
