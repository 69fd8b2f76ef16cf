//! User policy values: which apps are protected and how to unlock them.

use crate::pattern::SecretPattern;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use veil_context::AppId;

/// Set of protected application identifiers.
///
/// Ordered internally so listings are stable; membership is all that matters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtectedSet(BTreeSet<AppId>);

impl ProtectedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, app: &AppId) -> bool {
        self.0.contains(app)
    }

    pub fn insert(&mut self, app: AppId) -> bool {
        self.0.insert(app)
    }

    pub fn remove(&mut self, app: &AppId) -> bool {
        self.0.remove(app)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AppId> {
        self.0.iter()
    }

    pub fn to_vec(&self) -> Vec<AppId> {
        self.0.iter().cloned().collect()
    }
}

impl FromIterator<AppId> for ProtectedSet {
    fn from_iter<T: IntoIterator<Item = AppId>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<&'a str> for ProtectedSet {
    fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
        Self(iter.into_iter().map(AppId::from).collect())
    }
}

/// Everything a policy change carries to the lock engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySnapshot {
    pub protected: ProtectedSet,
    pub pattern: SecretPattern,
}

impl PolicySnapshot {
    pub fn new(protected: ProtectedSet, pattern: SecretPattern) -> Self {
        Self { protected, pattern }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicates_collapse() {
        let set: ProtectedSet = ["com.a", "com.b", "com.a"].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert!(set.contains(&AppId::from("com.a")));
    }

    #[test]
    fn test_serializes_as_array() {
        let set: ProtectedSet = ["com.b", "com.a"].into_iter().collect();
        assert_eq!(serde_json::to_string(&set).unwrap(), r#"["com.a","com.b"]"#);
    }
}
