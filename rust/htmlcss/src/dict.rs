//! Ordered key/value dictionary for attributes and style declarations
//!
//! Pairs live in a single array kept sorted by ASCII case-insensitive key
//! order, so lookups are a binary search and positional enumeration walks
//! the keys in sorted order. Dictionaries hold tens of entries at most,
//! which keeps the linear shifts on insert and remove cheap.
//!
//! Keys and values are interned through the dictionary's [`StringPool`];
//! the dictionary only ever stores pool references.

use std::cmp::Ordering;
use std::fmt;
use std::slice;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{Error, Result};
use crate::string_pool::{StringId, StringPool, StringRef};

/// Number of pairs added to the backing array each time it fills up
pub const GROWTH_INCREMENT: usize = 4;

/// Compare two keys with ASCII case-insensitive ordinal ordering.
///
/// Both the binary search and the insertion point use this function, so
/// lookup order and storage order always agree.
pub fn compare_keys(a: &str, b: &str) -> Ordering {
    a.bytes()
        .map(|c| c.to_ascii_lowercase())
        .cmp(b.bytes().map(|c| c.to_ascii_lowercase()))
}

/// Key/value pair
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pair {
    key: StringRef,
    value: StringRef,
}

impl Pair {
    pub fn key(&self) -> &StringRef {
        &self.key
    }

    pub fn value(&self) -> &StringRef {
        &self.value
    }
}

/// Flat pair record for binary export
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct PairIds {
    pub key: StringId,
    pub value: StringId,
}

/// Dictionary bound to one string pool
#[derive(Clone)]
pub struct Dict<'p> {
    pool: &'p StringPool,
    pairs: Vec<Pair>,
}

impl<'p> Dict<'p> {
    /// Create an empty dictionary over `pool`
    pub fn new(pool: &'p StringPool) -> Self {
        Self {
            pool,
            pairs: Vec::new(),
        }
    }

    pub fn with_capacity(pool: &'p StringPool, capacity: usize) -> Self {
        Self {
            pool,
            pairs: Vec::with_capacity(capacity),
        }
    }

    pub fn pool(&self) -> &'p StringPool {
        self.pool
    }

    /// Number of key/value pairs
    pub fn count(&self) -> usize {
        self.pairs.len()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    fn find(&self, key: &str) -> std::result::Result<usize, usize> {
        self.pairs.binary_search_by(|pair| compare_keys(&pair.key, key))
    }

    /// Get the value for a key, ignoring ASCII case
    pub fn get(&self, key: &str) -> Option<&StringRef> {
        self.find(key).ok().map(|idx| &self.pairs[idx].value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.find(key).is_ok()
    }

    /// Key and value at a zero-based position in sorted order
    pub fn index_at(&self, idx: usize) -> Option<(&StringRef, &StringRef)> {
        self.pairs.get(idx).map(|pair| (&pair.key, &pair.value))
    }

    /// Set the value for a key.
    ///
    /// An existing key (compared ignoring ASCII case) keeps its stored key
    /// and position; only the value is replaced. On error the dictionary is
    /// left exactly as it was.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let key = self.pool.intern(key)?;
        let value = self.pool.intern(value)?;

        match self.find(&key) {
            Ok(idx) => {
                self.pairs[idx].value = value;
            }
            Err(idx) => {
                self.grow()?;
                self.pairs.insert(idx, Pair { key, value });
            }
        }
        Ok(())
    }

    /// Make room for one more pair, growing by a fixed increment.
    fn grow(&mut self) -> Result<()> {
        if self.pairs.len() < self.pairs.capacity() {
            return Ok(());
        }
        let requested = self.pairs.capacity() + GROWTH_INCREMENT;
        self.pairs
            .try_reserve_exact(GROWTH_INCREMENT)
            .map_err(|source| Error::DictAlloc { requested, source })?;
        log::debug!("dictionary grown to {} pairs", self.pairs.capacity());
        Ok(())
    }

    /// Remove a key, returning its value if it was present.
    pub fn remove(&mut self, key: &str) -> Option<StringRef> {
        let idx = self.find(key).ok()?;
        Some(self.pairs.remove(idx).value)
    }

    /// Iterate pairs in sorted key order
    pub fn iter(&self) -> slice::Iter<'_, Pair> {
        self.pairs.iter()
    }

    /// Export the sorted pairs as flat id records
    pub fn to_ids(&self) -> Vec<PairIds> {
        self.pairs
            .iter()
            .map(|pair| PairIds {
                key: pair.key.id(),
                value: pair.value.id(),
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a Dict<'_> {
    type Item = &'a Pair;
    type IntoIter = slice::Iter<'a, Pair>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.iter()
    }
}

impl fmt::Debug for Dict<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.pairs.iter().map(|pair| (&pair.key, &pair.value)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn keys(dict: &Dict<'_>) -> Vec<String> {
        dict.iter().map(|pair| pair.key().to_string()).collect()
    }

    #[test]
    fn test_compare_keys() {
        assert_eq!(compare_keys("color", "COLOR"), Ordering::Equal);
        assert_eq!(compare_keys("a", "B"), Ordering::Less);
        assert_eq!(compare_keys("Z", "a"), Ordering::Greater);
        assert_eq!(compare_keys("id", "ID2"), Ordering::Less);
        assert_eq!(compare_keys("", "a"), Ordering::Less);
    }

    #[test]
    fn test_compare_keys_orders_underscore_before_letters() {
        // Letters fold to lower case before the byte compare, so '_' (0x5f)
        // sorts before lower-case letters.
        assert_eq!(compare_keys("_x", "A"), Ordering::Less);
        assert_eq!(compare_keys("[", "a"), Ordering::Less);
    }

    #[test]
    fn test_empty() {
        let pool = StringPool::new();
        let dict = Dict::new(&pool);

        assert_eq!(dict.count(), 0);
        assert!(dict.is_empty());
        assert!(dict.get("anything").is_none());
        assert!(dict.index_at(0).is_none());
    }

    #[test]
    fn test_round_trip_ignores_case() {
        let pool = StringPool::new();
        let mut dict = Dict::new(&pool);

        dict.set("Color", "red").unwrap();

        assert_eq!(dict.get("COLOR").unwrap(), "red");
        assert_eq!(dict.get("color").unwrap(), "red");
        assert!(dict.contains_key("cOlOr"));
    }

    #[test]
    fn test_case_insensitive_collision() {
        let pool = StringPool::new();
        let mut dict = Dict::new(&pool);

        dict.set("Id", "a").unwrap();
        dict.set("ID", "b").unwrap();

        assert_eq!(dict.count(), 1);
        assert_eq!(dict.get("id").unwrap(), "b");
        // The first spelling of the key is kept.
        assert_eq!(dict.index_at(0).unwrap().0, "Id");
    }

    #[test]
    fn test_overwrite_keeps_key_reference() {
        let pool = StringPool::new();
        let mut dict = Dict::new(&pool);

        dict.set("href", "a.html").unwrap();
        let key_before = dict.index_at(0).unwrap().0.clone();
        dict.set("HREF", "b.html").unwrap();

        assert_eq!(dict.index_at(0).unwrap().0, &key_before);
        assert_eq!(dict.get("href").unwrap(), "b.html");
    }

    #[test]
    fn test_values_are_pooled() {
        let pool = StringPool::new();
        let mut dict = Dict::new(&pool);

        dict.set("class", "box").unwrap();
        let interned = pool.intern("box").unwrap();

        assert_eq!(dict.get("class").unwrap(), &interned);
    }

    #[test]
    fn test_upsert_idempotent() {
        let pool = StringPool::new();
        let mut dict = Dict::new(&pool);

        dict.set("b", "2").unwrap();
        dict.set("a", "1").unwrap();
        let snapshot = dict.to_ids();

        dict.set("a", "1").unwrap();

        assert_eq!(dict.count(), 2);
        assert_eq!(dict.to_ids(), snapshot);
    }

    #[test]
    fn test_remove() {
        let pool = StringPool::new();
        let mut dict = Dict::new(&pool);

        dict.set("k1", "v1").unwrap();
        dict.set("k2", "v2").unwrap();

        assert_eq!(dict.remove("K1").unwrap(), "v1");
        assert_eq!(dict.count(), 1);
        assert!(dict.get("k1").is_none());
        assert_eq!(dict.get("k2").unwrap(), "v2");
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let pool = StringPool::new();
        let mut dict = Dict::new(&pool);

        assert!(dict.remove("nothing").is_none());

        dict.set("alt", "x").unwrap();
        assert!(dict.remove("title").is_none());
        assert_eq!(dict.count(), 1);
    }

    #[test]
    fn test_remove_middle_shifts_tail() {
        let pool = StringPool::new();
        let mut dict = Dict::new(&pool);

        for key in ["d", "b", "a", "c", "e"] {
            dict.set(key, key).unwrap();
        }
        dict.remove("c");

        assert_eq!(keys(&dict), ["a", "b", "d", "e"]);
    }

    #[test]
    fn test_single_entry_lookup_ignores_case() {
        let pool = StringPool::new();
        let mut dict = Dict::new(&pool);

        dict.set("lang", "en").unwrap();
        dict.set("LANG", "fr").unwrap();

        assert_eq!(dict.count(), 1);
        assert_eq!(dict.get("Lang").unwrap(), "fr");
    }

    #[test]
    fn test_scenario_class_and_id() {
        let pool = StringPool::new();
        let mut dict = Dict::new(&pool);

        dict.set("class", "box").unwrap();
        dict.set("id", "main").unwrap();
        dict.set("Class", "box2").unwrap();

        assert_eq!(dict.count(), 2);
        assert_eq!(dict.get("class").unwrap(), "box2");

        let (k0, v0) = dict.index_at(0).unwrap();
        let (k1, v1) = dict.index_at(1).unwrap();
        assert_eq!((k0.as_str(), v0.as_str()), ("class", "box2"));
        assert_eq!((k1.as_str(), v1.as_str()), ("id", "main"));
        assert!(dict.index_at(2).is_none());
    }

    #[test]
    fn test_growth_is_incremental() {
        let pool = StringPool::new();
        let mut dict = Dict::new(&pool);

        for n in 0..9 {
            dict.set(&format!("k{n}"), "v").unwrap();
        }

        assert_eq!(dict.count(), 9);
        assert!(dict.pairs.capacity() >= 9);
        assert!(dict.pairs.capacity() <= 12);
    }

    #[test]
    fn test_dictionaries_share_pool() {
        let pool = StringPool::new();
        let mut first = Dict::new(&pool);
        let mut second = Dict::new(&pool);

        first.set("color", "red").unwrap();
        second.set("color", "red").unwrap();

        assert_eq!(first.get("color"), second.get("color"));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_to_ids_bytes() {
        let pool = StringPool::new();
        let mut dict = Dict::new(&pool);

        dict.set("width", "10").unwrap();
        let ids = dict.to_ids();
        let bytes = ids.as_bytes();

        assert_eq!(bytes.len(), 8);
        let record = PairIds::read_from_bytes(bytes).unwrap();
        assert_eq!(pool.get(record.key).unwrap(), "width");
        assert_eq!(pool.get(record.value).unwrap(), "10");
    }

    #[test]
    fn test_debug_renders_map() {
        let pool = StringPool::new();
        let mut dict = Dict::new(&pool);

        dict.set("b", "2").unwrap();
        dict.set("a", "1").unwrap();

        assert_eq!(format!("{dict:?}"), r#"{"a": "1", "b": "2"}"#);
    }

    #[derive(Clone, Debug)]
    enum Op {
        Set(String, String),
        Remove(String),
    }

    fn arb_key() -> impl Strategy<Value = String> {
        "[a-dA-D_-]{1,3}"
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => (arb_key(), "[a-z]{0,4}").prop_map(|(k, v)| Op::Set(k, v)),
            1 => arb_key().prop_map(Op::Remove),
        ]
    }

    proptest! {
        /// Any sequence of writes leaves keys strictly increasing, which also
        /// rules out case-insensitive duplicates.
        #[test]
        fn prop_sorted_and_unique(ops in prop::collection::vec(arb_op(), 0..64)) {
            let pool = StringPool::new();
            let mut dict = Dict::new(&pool);

            for op in &ops {
                match op {
                    Op::Set(k, v) => dict.set(k, v).unwrap(),
                    Op::Remove(k) => {
                        dict.remove(k);
                    }
                }
            }

            for idx in 1..dict.count() {
                let (prev, _) = dict.index_at(idx - 1).unwrap();
                let (next, _) = dict.index_at(idx).unwrap();
                prop_assert_eq!(compare_keys(prev, next), Ordering::Less);
            }
            prop_assert!(dict.index_at(dict.count()).is_none());
        }

        /// The dictionary agrees with a model keyed by lower-cased names.
        #[test]
        fn prop_matches_model(ops in prop::collection::vec(arb_op(), 0..64)) {
            let pool = StringPool::new();
            let mut dict = Dict::new(&pool);
            let mut model = std::collections::BTreeMap::new();

            for op in &ops {
                match op {
                    Op::Set(k, v) => {
                        dict.set(k, v).unwrap();
                        model.insert(k.to_ascii_lowercase(), v.clone());
                    }
                    Op::Remove(k) => {
                        let removed = dict.remove(k).map(|v| v.to_string());
                        prop_assert_eq!(removed, model.remove(&k.to_ascii_lowercase()));
                    }
                }
            }

            prop_assert_eq!(dict.count(), model.len());
            for (k, v) in &model {
                let found = dict.get(&k.to_ascii_uppercase()).map(|s| s.as_str());
                prop_assert_eq!(found, Some(v.as_str()));
            }
        }
    }
}
