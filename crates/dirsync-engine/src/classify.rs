//! Change classification.

use serde::{Deserialize, Serialize};
use std::fmt;

use dirsync_connector::entry::DirectoryEntry;

/// Kind of change a poll cycle represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Entries were added to the source.
    Create,
    /// Entries were removed from the source.
    Delete,
    /// Entries kept their count but changed content.
    Update,
}

impl ChangeKind {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Create => "create",
            ChangeKind::Delete => "delete",
            ChangeKind::Update => "update",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ChangeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "create" => Ok(ChangeKind::Create),
            "delete" => Ok(ChangeKind::Delete),
            "update" => Ok(ChangeKind::Update),
            _ => Err(format!("Unknown change kind: {s}")),
        }
    }
}

/// How a changed snapshot is turned into dispatches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationMode {
    /// One dispatch per cycle, chosen by comparing entry counts.
    #[default]
    Cardinality,
    /// Compute every diff and dispatch each non-empty one (create, update, delete).
    FullDiff,
}

impl ClassificationMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationMode::Cardinality => "cardinality",
            ClassificationMode::FullDiff => "full_diff",
        }
    }
}

impl fmt::Display for ClassificationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ClassificationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "cardinality" => Ok(ClassificationMode::Cardinality),
            "full_diff" => Ok(ClassificationMode::FullDiff),
            _ => Err(format!("Unknown classification mode: {s}")),
        }
    }
}

/// Classify a cycle by entry counts.
///
/// More entries than before is a create, fewer is a delete, and an equal
/// count is always an update, even when entries were swapped.
pub fn classify(latest: &[DirectoryEntry], current: &[DirectoryEntry]) -> ChangeKind {
    match latest.len().cmp(&current.len()) {
        std::cmp::Ordering::Greater => ChangeKind::Create,
        std::cmp::Ordering::Less => ChangeKind::Delete,
        std::cmp::Ordering::Equal => ChangeKind::Update,
    }
}
