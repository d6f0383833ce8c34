//! Load cache - reuse parsed tables for repeated uploads
//!
//! Uploading the same file twice should not parse it twice. Entries are
//! keyed by role, resolved format and the SHA-256 digest of the uploaded
//! bytes. The file name only matters through the format it selects.
//!
//! [`LoadCache::load`] does lookup, parse and insert in one call. Callers
//! that share the cache behind a lock use [`cache_key`], [`LoadCache::get`]
//! and [`LoadCache::insert`] so the parse runs unlocked.

use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::error::LoadResult;
use crate::parser::{load_bytes, ParseResult, SourceFormat};

/// Default number of parsed uploads kept in memory
pub const DEFAULT_CAPACITY: usize = 16;

/// Identity of an uploaded input.
pub fn content_key(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Cache key of an upload: `{table}:{format}:{sha256}`.
///
/// Fails like `load_bytes` would on an unsupported file name.
pub fn cache_key(bytes: &[u8], file_name: Option<&str>, table_name: &str) -> LoadResult<String> {
    let format = SourceFormat::resolve(bytes, file_name)?;
    Ok(format!("{}:{:?}:{}", table_name, format, content_key(bytes)))
}

/// Bounded cache of parse results, oldest entry evicted first
#[derive(Debug)]
pub struct LoadCache {
    capacity: usize,
    entries: HashMap<String, Arc<ParseResult>>,
    /// Insertion order, oldest first
    order: VecDeque<String>,
    hits: u64,
    misses: u64,
}

impl LoadCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Return the cached result for `bytes`, parsing and storing it on a miss.
    ///
    /// Parse failures are returned and never cached.
    pub fn load(
        &mut self,
        bytes: &[u8],
        file_name: Option<&str>,
        table_name: &str,
    ) -> LoadResult<Arc<ParseResult>> {
        let key = cache_key(bytes, file_name, table_name)?;
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }

        let parsed = Arc::new(load_bytes(bytes, file_name, table_name)?);
        Ok(self.insert(key, parsed))
    }

    /// Look up `key`, counting a hit or a miss.
    pub fn get(&mut self, key: &str) -> Option<Arc<ParseResult>> {
        match self.entries.get(key) {
            Some(hit) => {
                self.hits += 1;
                Some(Arc::clone(hit))
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Store `value` under `key` and return the cached entry.
    ///
    /// If another caller stored the same key first, its entry is kept and
    /// returned.
    pub fn insert(&mut self, key: String, value: Arc<ParseResult>) -> Arc<ParseResult> {
        if let Some(existing) = self.entries.get(&key) {
            return Arc::clone(existing);
        }

        while self.entries.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, Arc::clone(&value));
        value
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

impl Default for LoadCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV_A: &[u8] = b"OBJECTID,SMI_CODE\n1,ORG1";
    const CSV_B: &[u8] = b"OBJECTID,SMI_CODE\n2,ORG2";

    #[test]
    fn test_identical_bytes_hit_cache() {
        let mut cache = LoadCache::new(4);

        let first = cache.load(CSV_A, Some("a.csv"), "POSDATA").unwrap();
        let second = cache.load(CSV_A, Some("renamed.csv"), "POSDATA").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn test_role_is_part_of_identity() {
        let mut cache = LoadCache::new(4);
        let posdata = cache.load(CSV_A, None, "POSDATA").unwrap();
        let pname = cache.load(CSV_A, None, "PNAME").unwrap();
        assert_eq!(posdata.table.name(), "POSDATA");
        assert_eq!(pname.table.name(), "PNAME");
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_format_is_part_of_identity() {
        let mut cache = LoadCache::new(4);
        cache.load(CSV_A, Some("x.csv"), "POSDATA").unwrap();

        // same bytes under a workbook name must be parsed as a workbook
        assert!(cache.load(CSV_A, Some("x.xlsx"), "POSDATA").is_err());
        assert_eq!(cache.hits(), 0);
        assert_ne!(
            cache_key(CSV_A, Some("x.csv"), "POSDATA").unwrap(),
            cache_key(CSV_A, Some("x.xlsx"), "POSDATA").unwrap()
        );
    }

    #[test]
    fn test_unsupported_name_has_no_key() {
        assert!(cache_key(CSV_A, Some("x.txt"), "POSDATA").is_err());
    }

    #[test]
    fn test_oldest_entry_evicted() {
        let mut cache = LoadCache::new(1);
        cache.load(CSV_A, None, "POSDATA").unwrap();
        cache.load(CSV_B, None, "POSDATA").unwrap();
        assert_eq!(cache.len(), 1);

        cache.load(CSV_A, None, "POSDATA").unwrap();
        assert_eq!(cache.misses(), 3);
    }

    #[test]
    fn test_first_insert_wins() {
        let mut cache = LoadCache::new(4);
        let key = cache_key(CSV_A, None, "POSDATA").unwrap();
        let first = Arc::new(load_bytes(CSV_A, None, "POSDATA").unwrap());
        let second = Arc::new(load_bytes(CSV_A, None, "POSDATA").unwrap());

        cache.insert(key.clone(), Arc::clone(&first));
        let kept = cache.insert(key, second);

        assert!(Arc::ptr_eq(&kept, &first));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failures_not_cached() {
        let mut cache = LoadCache::default();
        assert!(cache.load(b"", None, "POSDATA").is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_content_key_is_stable() {
        assert_eq!(content_key(CSV_A), content_key(CSV_A));
        assert_ne!(content_key(CSV_A), content_key(CSV_B));
        assert_eq!(content_key(b"").len(), 64);
    }
}
