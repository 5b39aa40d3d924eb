//! Key-set diffing between two inventory snapshots.

use std::collections::BTreeMap;

/// Keys added, removed and present in both of two maps, in key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDiff<K> {
    pub added: Vec<K>,
    pub removed: Vec<K>,
    pub unchanged: Vec<K>,
}

impl<K> Default for KeyDiff<K> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
            unchanged: Vec::new(),
        }
    }
}

impl<K> KeyDiff<K> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

pub fn diff_keys<K: Ord + Clone, A, B>(old: &BTreeMap<K, A>, new: &BTreeMap<K, B>) -> KeyDiff<K> {
    let mut diff = KeyDiff::default();

    for key in new.keys() {
        if old.contains_key(key) {
            diff.unchanged.push(key.clone());
        } else {
            diff.added.push(key.clone());
        }
    }
    diff.removed = old
        .keys()
        .filter(|key| !new.contains_key(*key))
        .cloned()
        .collect();

    diff
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(items: &[&str]) -> BTreeMap<String, ()> {
        items.iter().map(|k| (k.to_string(), ())).collect()
    }

    #[test]
    fn test_diff_keys() {
        let diff = diff_keys(&keys(&["A", "B", "C"]), &keys(&["B", "C", "D"]));
        assert_eq!(diff.added, vec!["D"]);
        assert_eq!(diff.removed, vec!["A"]);
        assert_eq!(diff.unchanged, vec!["B", "C"]);
        assert!(!diff.is_empty());
    }

    #[test]
    fn test_diff_identical_and_empty() {
        let same = diff_keys(&keys(&["A"]), &keys(&["A"]));
        assert!(same.is_empty());
        assert_eq!(same.unchanged, vec!["A"]);

        let gone = diff_keys(&keys(&["A", "B"]), &keys(&[]));
        assert_eq!(gone.removed, vec!["A", "B"]);
        assert!(gone.added.is_empty() && gone.unchanged.is_empty());
    }
}
