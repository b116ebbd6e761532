//! Entry set diffing.
//!
//! Create and delete sets are computed by `dn`. Updates use a structural
//! diff of each entry's JSON tree, narrowed to an allow-list of observable
//! attributes so operational noise never reaches the target.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

use dirsync_connector::entry::DirectoryEntry;

/// Attributes watched by default for updates.
pub const DEFAULT_OBSERVABLE_ATTRIBUTES: &[&str] = &[
    "cn",
    "sn",
    "givenName",
    "displayName",
    "userPassword",
    "telephoneNumber",
    "mobile",
    "title",
    "departmentNumber",
    "employeeNumber",
    "accountStatus",
];

/// Allow-list of attribute names whose changes are propagated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableAttributes {
    names: Vec<String>,
}

impl Default for ObservableAttributes {
    fn default() -> Self {
        Self::new(DEFAULT_OBSERVABLE_ATTRIBUTES.iter().copied())
    }
}

impl ObservableAttributes {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let names = names
            .into_iter()
            .map(Into::into)
            .filter(|name: &String| seen.insert(name.clone()))
            .collect();
        Self { names }
    }

    /// Parse a comma-separated list; blank items are skipped.
    pub fn parse(csv: &str) -> Self {
        Self::new(csv.split(',').map(str::trim).filter(|s| !s.is_empty()))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}

/// One reported difference between two JSON trees.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffChange {
    /// Old value; `None` when the key was added.
    pub from: Option<Value>,
    /// New value; `None` when the key was removed.
    pub to: Option<Value>,
}

/// Structural diff of `from` → `to`, keyed by dotted path.
///
/// When both sides of a differing key are objects or arrays the walk
/// recurses and reports nested paths (`memberOf.1`); otherwise the key itself
/// is reported.
pub fn deep_diff(from: &Value, to: &Value) -> BTreeMap<String, DiffChange> {
    let mut changes = BTreeMap::new();
    walk(from, to, None, &mut changes);
    changes
}

fn walk(from: &Value, to: &Value, path: Option<&str>, changes: &mut BTreeMap<String, DiffChange>) {
    for (key, value) in children(from) {
        if child(to, &key).is_none() {
            changes.insert(
                join(path, &key),
                DiffChange {
                    from: Some(value.clone()),
                    to: None,
                },
            );
        }
    }

    for (key, to_value) in children(to) {
        let current_path = join(path, &key);
        match child(from, &key) {
            None => {
                changes.insert(
                    current_path,
                    DiffChange {
                        from: None,
                        to: Some(to_value.clone()),
                    },
                );
            }
            Some(from_value) if from_value != to_value => {
                if is_structured(from_value) && is_structured(to_value) {
                    walk(from_value, to_value, Some(&current_path), changes);
                } else {
                    changes.insert(
                        current_path,
                        DiffChange {
                            from: Some(from_value.clone()),
                            to: Some(to_value.clone()),
                        },
                    );
                }
            }
            Some(_) => {}
        }
    }
}

fn is_structured(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

fn children(value: &Value) -> Vec<(String, &Value)> {
    match value {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        _ => Vec::new(),
    }
}

fn child<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn join(path: Option<&str>, key: &str) -> String {
    match path {
        Some(prefix) => format!("{prefix}.{key}"),
        None => key.to_string(),
    }
}

/// An updated entry and the observable attributes that changed on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedEntry {
    /// The newer observation.
    pub entry: DirectoryEntry,
    /// Changed attribute names, in allow-list order.
    pub modified_attributes: Vec<String>,
}

/// Compares the latest observation against the previous one.
#[derive(Debug, Clone, Copy)]
pub struct DiffVerifier<'a> {
    latest: &'a [DirectoryEntry],
    current: &'a [DirectoryEntry],
}

impl<'a> DiffVerifier<'a> {
    pub fn new(latest: &'a [DirectoryEntry], current: &'a [DirectoryEntry]) -> Self {
        Self { latest, current }
    }

    /// Entries of the latest observation whose `dn` was not seen before.
    pub fn verify_create(&self) -> Vec<DirectoryEntry> {
        let known: HashSet<&str> = self.current.iter().map(DirectoryEntry::dn).collect();
        self.latest
            .iter()
            .filter(|e| !known.contains(e.dn()))
            .cloned()
            .collect()
    }

    /// Entries of the previous observation whose `dn` has disappeared.
    pub fn verify_delete(&self) -> Vec<DirectoryEntry> {
        let present: HashSet<&str> = self.latest.iter().map(DirectoryEntry::dn).collect();
        self.current
            .iter()
            .filter(|e| !present.contains(e.dn()))
            .cloned()
            .collect()
    }

    /// Retained entries whose observable, single-valued attributes changed.
    ///
    /// An attribute whose latest value is multi-valued is never reported.
    pub fn verify_update(&self, observable: &ObservableAttributes) -> Vec<ModifiedEntry> {
        let latest_by_dn: BTreeMap<&str, &DirectoryEntry> =
            self.latest.iter().map(|e| (e.dn(), e)).collect();

        let mut modified = Vec::new();

        for current in self.current {
            let Some(latest) = latest_by_dn.get(current.dn()) else {
                continue;
            };

            let diff = deep_diff(&current.to_json(), &latest.to_json());

            let modified_attributes: Vec<String> = observable
                .names()
                .iter()
                .filter(|name| diff.contains_key(name.as_str()))
                .filter(|name| !latest.get(name).is_some_and(|v| v.is_structured()))
                .cloned()
                .collect();

            if !modified_attributes.is_empty() {
                modified.push(ModifiedEntry {
                    entry: (*latest).clone(),
                    modified_attributes,
                });
            }
        }

        modified
    }
}
