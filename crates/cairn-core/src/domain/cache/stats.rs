//! Cache statistics

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::key::operation_of;

/// Hit/miss counts for one key prefix
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationStats {
    pub hits: u64,
    pub misses: u64,
}

/// Point-in-time statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// `hits / (hits + misses)`, zero before any lookup
    pub hit_rate: f64,
    pub entries: usize,
    /// Sum of entry sizes
    pub memory_bytes: usize,
    pub evictions: u64,
    pub expirations: u64,
    /// Breakdown by key prefix (`subgraph`, `metrics`, ...)
    pub operations: BTreeMap<String, OperationStats>,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub operations: BTreeMap<String, OperationStats>,
}

impl Counters {
    pub fn record_hit(&mut self, key: &str) {
        self.hits += 1;
        self.operations
            .entry(operation_of(key).to_string())
            .or_default()
            .hits += 1;
    }

    pub fn record_miss(&mut self, key: &str) {
        self.misses += 1;
        self.operations
            .entry(operation_of(key).to_string())
            .or_default()
            .misses += 1;
    }

    pub fn snapshot(&self, entries: usize, memory_bytes: usize) -> CacheStats {
        let lookups = self.hits + self.misses;
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            hit_rate: if lookups > 0 {
                self.hits as f64 / lookups as f64
            } else {
                0.0
            },
            entries,
            memory_bytes,
            evictions: self.evictions,
            expirations: self.expirations,
            operations: self.operations.clone(),
        }
    }
}
