use std::fs;

use tempfile::TempDir;
use timber::weave::{AllowedParentIndex, TrackedTypes};

#[test]
fn test_tracked_indexes_are_unioned() {
    let dir = TempDir::new().unwrap();
    let first = dir.path().join("first.index");
    let second = dir.path().join("second.index");
    fs::write(&first, "crate::tree::Group\n# comment\n\ncrate::tree::Leaf\n").unwrap();
    fs::write(&second, "crate.tree.Leaf\ncrate::shapes::Canvas\n").unwrap();

    let tracked = TrackedTypes::load(&[first, second]);
    let identities: Vec<_> = tracked.iter().collect();
    assert_eq!(
        identities,
        ["crate::shapes::Canvas", "crate::tree::Group", "crate::tree::Leaf"]
    );
}

#[test]
fn test_malformed_lines_are_skipped() {
    let tracked = TrackedTypes::parse("crate::tree::Group\nnot a type\n3d::Point\ncrate::tree::Leaf\n");
    assert_eq!(tracked.len(), 2);
    assert!(tracked.contains("crate::tree::Group"));
    assert!(!tracked.contains("3d::Point"));
}

#[test]
fn test_unreadable_index_contributes_nothing() {
    let dir = TempDir::new().unwrap();
    let present = dir.path().join("nodes.index");
    fs::write(&present, "crate::tree::Group\n").unwrap();
    let missing = dir.path().join("missing.index");

    let tracked = TrackedTypes::load(&[missing.clone(), present]);
    assert_eq!(tracked.len(), 1);
    assert!(TrackedTypes::read(&missing).is_err());
}

#[test]
fn test_allowed_parent_pairs() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("parents.index");
    fs::write(
        &path,
        "crate::tree::Leaf:crate::tree::Group\n\
         crate::tree::Leaf : crate::tree::Root\n\
         crate::tree::Leaf:crate::tree::Group\n\
         no-separator\n",
    )
    .unwrap();

    let index = AllowedParentIndex::load(&[path]);
    assert_eq!(
        index.allowed_for("crate::tree::Leaf"),
        ["crate::tree::Group", "crate::tree::Root"]
    );
    assert!(index.allowed_for("crate::tree::Group").is_empty());
}
