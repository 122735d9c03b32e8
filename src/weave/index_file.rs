//! Readers for the two index artifacts exported at build time.
//!
//! The tracked-type index lists one qualified type identity per line. The
//! allowed-parent index lists `child:parent` pairs. Several files of each kind
//! may be given; their contents are unioned. A file that cannot be read is
//! logged and contributes nothing.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Result;

/// Default file name of the tracked-type index.
pub const DEFAULT_INDEX_NAME: &str = "nodes.index";

static IDENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(::[A-Za-z_][A-Za-z0-9_]*)*$").expect("valid regex")
});

/// Normalize a written identity: surrounding whitespace and a leading `::`
/// are dropped, and dotted names are accepted as paths.
pub fn normalize_identity(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_start_matches("::");
    let identity = if trimmed.contains("::") {
        trimmed.to_string()
    } else {
        trimmed.replace('.', "::")
    };
    IDENTITY.is_match(&identity).then_some(identity)
}

/// Lines that carry content: trimmed, with blanks and `#` comments removed.
fn content_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(number, line)| (number + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}

fn read_logged(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(err) => {
            log::error!("failed to read index {}: {}", path.display(), err);
            None
        }
    }
}

// =================================================================================
// Tracked-type index
// =================================================================================

/// The set of type identities the engine weaves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackedTypes {
    identities: BTreeSet<String>,
}

impl TrackedTypes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Self {
        let mut tracked = TrackedTypes::new();
        for (number, line) in content_lines(text) {
            match normalize_identity(line) {
                Some(identity) => {
                    tracked.identities.insert(identity);
                }
                None => log::warn!("skipping malformed type identity on line {number}: {line:?}"),
            }
        }
        tracked
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::parse(&fs::read_to_string(path)?))
    }

    /// Union of every readable file in `paths`.
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Self {
        let mut tracked = TrackedTypes::new();
        for path in paths {
            if let Some(text) = read_logged(path.as_ref()) {
                tracked.extend(Self::parse(&text));
            }
        }
        log::debug!("loaded {} tracked types", tracked.len());
        tracked
    }

    pub fn insert(&mut self, identity: &str) -> bool {
        match normalize_identity(identity) {
            Some(identity) => self.identities.insert(identity),
            None => false,
        }
    }

    pub fn extend(&mut self, other: TrackedTypes) {
        self.identities.extend(other.identities);
    }

    pub fn contains(&self, identity: &str) -> bool {
        normalize_identity(identity).map_or(false, |identity| self.identities.contains(&identity))
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.identities.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> FromIterator<S> for TrackedTypes {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut tracked = TrackedTypes::new();
        for identity in iter {
            tracked.insert(identity.as_ref());
        }
        tracked
    }
}

// =================================================================================
// Allowed-parent index
// =================================================================================

/// Split `child:parent` on the single colon that is not part of a `::`.
fn split_pair(line: &str) -> Option<(&str, &str)> {
    let bytes = line.as_bytes();
    let mut separator = None;
    for (i, &byte) in bytes.iter().enumerate() {
        if byte != b':' {
            continue;
        }
        let prev = i > 0 && bytes[i - 1] == b':';
        let next = bytes.get(i + 1) == Some(&b':');
        if !prev && !next {
            if separator.is_some() {
                return None;
            }
            separator = Some(i);
        }
    }
    separator.map(|i| (&line[..i], &line[i + 1..]))
}

/// Allowed parent types per parent-aware type identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowedParentIndex {
    entries: BTreeMap<String, Vec<String>>,
}

impl AllowedParentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Self {
        let mut index = AllowedParentIndex::new();
        for (number, line) in content_lines(text) {
            let pair = split_pair(line)
                .and_then(|(child, parent)| Some((normalize_identity(child)?, normalize_identity(parent)?)));
            match pair {
                Some((child, parent)) => index.insert(child, parent),
                None => log::warn!("skipping unresolvable allowed-parent entry on line {number}: {line:?}"),
            }
        }
        index
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::parse(&fs::read_to_string(path)?))
    }

    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Self {
        let mut index = AllowedParentIndex::new();
        for path in paths {
            if let Some(text) = read_logged(path.as_ref()) {
                index.extend(Self::parse(&text));
            }
        }
        index
    }

    pub fn insert(&mut self, child: String, parent: String) {
        let parents = self.entries.entry(child).or_default();
        if !parents.contains(&parent) {
            parents.push(parent);
        }
    }

    pub fn extend(&mut self, other: AllowedParentIndex) {
        for (child, parents) in other.entries {
            for parent in parents {
                self.insert(child.clone(), parent);
            }
        }
    }

    /// Allowed parents of `identity`; empty means unconstrained.
    pub fn allowed_for(&self, identity: &str) -> &[String] {
        self.entries.get(identity).map_or(&[], Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_comments_and_malformed_lines() {
        let tracked = TrackedTypes::parse("# nodes\n\ncrate::tree::Group\nnot a type\ncrate::tree::Group\n");
        assert_eq!(tracked.len(), 1);
        assert!(tracked.contains("crate::tree::Group"));
    }

    #[test]
    fn test_dotted_identities_are_normalized() {
        let tracked = TrackedTypes::parse("crate.tree.Leaf");
        assert!(tracked.contains("crate::tree::Leaf"));
    }

    #[test]
    fn test_split_pair() {
        assert_eq!(split_pair("a::B:c::D"), Some(("a::B", "c::D")));
        assert_eq!(split_pair("a::B"), None);
        assert_eq!(split_pair("a:b:c"), None);
    }

    #[test]
    fn test_allowed_parent_entries_accumulate() {
        let index = AllowedParentIndex::parse("crate::Leaf:crate::Group\ncrate::Leaf:crate::Root\nbroken\n");
        assert_eq!(index.allowed_for("crate::Leaf"), ["crate::Group", "crate::Root"]);
        assert!(index.allowed_for("crate::Group").is_empty());
    }
}
