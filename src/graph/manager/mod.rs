//! Address-keyed object graph
//!
//! Objects live in one arena (`Vec<MemObject>`) in load order; an
//! `FxHashMap` maps each address to its slot. The compute passes work on
//! slot numbers and only touch the map to resolve `ref_list` entries.

use super::interner::{StringInterner, TypeKey};
use super::object::{DisplayObject, MemObject};
use super::record::DumpRecord;
use super::summary::{TypeStats, TypeSummary};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::ops::Index;
use std::time::Instant;
use tracing::{debug, info};

/// Counters gathered while loading
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Records decoded (blank lines excluded)
    pub records: usize,
    /// Records whose address was already present and replaced the earlier one
    pub duplicates: usize,
}

/// Owns every object of one dump. Load, query, drop.
#[derive(Debug, Default)]
pub struct GraphManager {
    objs: Vec<MemObject>,
    index: FxHashMap<u64, usize>,
    types: StringInterner,
    stats: LoadStats,
}

impl GraphManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(objects: usize) -> Self {
        Self {
            objs: Vec::with_capacity(objects),
            index: FxHashMap::with_capacity_and_hasher(objects, Default::default()),
            types: StringInterner::with_capacity(1024),
            stats: LoadStats::default(),
        }
    }

    // ==================== Population ====================

    /// Insert an object. An object already at the same address is replaced
    /// (last write wins) and returned.
    pub fn insert(&mut self, obj: MemObject) -> Option<MemObject> {
        match self.index.get(&obj.address()) {
            Some(&slot) => Some(std::mem::replace(&mut self.objs[slot], obj)),
            None => {
                self.index.insert(obj.address(), self.objs.len());
                self.objs.push(obj);
                None
            }
        }
    }

    /// Build a `MemObject` from a decoded record and insert it.
    pub fn insert_record(&mut self, record: DumpRecord<'_>) {
        let type_key = self.types.intern(&record.type_str);
        let mut obj = MemObject::new(record.address, type_key, record.size, record.refs)
            .with_unknown_fields(record.extra);
        if let Some(length) = record.len {
            obj = obj.with_length(length);
        }
        if let Some(value) = record.value {
            obj = obj.with_value(value);
        }
        if let Some(name) = record.name {
            obj = obj.with_name(name);
        }

        self.stats.records += 1;
        if self.insert(obj).is_some() {
            self.stats.duplicates += 1;
            debug!("Duplicate address {} replaced", record.address);
        }
    }

    /// Intern a type name for objects built by hand
    pub fn intern_type(&self, type_str: &str) -> TypeKey {
        self.types.intern(type_str)
    }

    pub(crate) fn release_excess_capacity(&mut self) {
        self.objs.shrink_to_fit();
        self.index.shrink_to_fit();
    }

    // ==================== Lookup ====================

    pub fn get(&self, address: u64) -> Option<&MemObject> {
        self.index.get(&address).map(|&slot| &self.objs[slot])
    }

    pub fn contains(&self, address: u64) -> bool {
        self.index.contains_key(&address)
    }

    pub fn len(&self) -> usize {
        self.objs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objs.is_empty()
    }

    /// Objects in load order (first insertion of each address)
    pub fn iter(&self) -> impl Iterator<Item = &MemObject> {
        self.objs.iter()
    }

    /// Every address, ascending
    pub fn addresses(&self) -> Vec<u64> {
        let mut addrs: Vec<u64> = self.index.keys().copied().collect();
        addrs.sort_unstable();
        addrs
    }

    pub fn type_str(&self, obj: &MemObject) -> &str {
        self.types.resolve(obj.type_key())
    }

    pub fn types(&self) -> &StringInterner {
        &self.types
    }

    pub fn load_stats(&self) -> LoadStats {
        self.stats
    }

    /// One-line rendering, e.g. `tuple(1 20B 2refs 0par) 261B total`
    pub fn display<'a>(&'a self, obj: &'a MemObject) -> DisplayObject<'a> {
        DisplayObject {
            obj,
            type_str: self.type_str(obj),
        }
    }

    /// Re-encode an object as a dump record line (unknown keys included).
    pub fn to_record_json(&self, obj: &MemObject) -> serde_json::Result<String> {
        serde_json::to_string(&obj.record_view(self.type_str(obj)))
    }

    pub(crate) fn slot_of(&self, address: u64) -> Option<usize> {
        self.index.get(&address).copied()
    }

    pub(crate) fn objects(&self) -> &[MemObject] {
        &self.objs
    }

    pub(crate) fn objects_mut(&mut self) -> &mut [MemObject] {
        &mut self.objs
    }

    // ==================== Queries ====================

    /// Objects of one type, largest first (ties by address)
    pub fn objects_of_type(&self, type_str: &str) -> Vec<&MemObject> {
        let Some(key) = self.types.get(type_str) else {
            return Vec::new();
        };
        let mut found: Vec<&MemObject> = self.objs.iter().filter(|o| o.type_key() == key).collect();
        found.sort_by(|a, b| b.size().cmp(&a.size()).then(a.address().cmp(&b.address())));
        found
    }

    /// Count and shallow size per type
    pub fn summarize(&self) -> TypeSummary {
        let mut per_type: FxHashMap<TypeKey, (usize, u64)> = FxHashMap::default();
        for obj in &self.objs {
            let entry = per_type.entry(obj.type_key()).or_default();
            entry.0 += 1;
            entry.1 = entry.1.saturating_add(obj.size());
        }
        let rows = per_type
            .into_iter()
            .map(|(key, (count, total_size))| TypeStats {
                type_str: self.types.resolve(key).to_string(),
                count,
                total_size,
            })
            .collect();
        TypeSummary::from_rows(rows)
    }

    // ==================== Referrers ====================

    /// Fill every object's `referrers` with the ascending, duplicate-free
    /// set of addresses whose `ref_list` names it.
    ///
    /// References to addresses outside the graph are skipped. Recomputed from
    /// scratch on every call, so repeated calls give the same result.
    pub fn compute_referrers(&mut self) {
        let start = Instant::now();
        let mut pending: Vec<Vec<u64>> = vec![Vec::new(); self.objs.len()];
        let mut edges = 0usize;
        let mut dangling = 0usize;

        for obj in &self.objs {
            for &target in obj.ref_list() {
                match self.index.get(&target) {
                    Some(&slot) => {
                        pending[slot].push(obj.address());
                        edges += 1;
                    }
                    None => dangling += 1,
                }
            }
        }

        self.objs
            .par_iter_mut()
            .zip(pending.into_par_iter())
            .for_each(|(obj, mut referrers)| {
                referrers.sort_unstable();
                referrers.dedup();
                referrers.shrink_to_fit();
                obj.referrers = Some(referrers);
            });

        info!(
            "Computed referrers for {} objects ({} edges, {} dangling) in {:.2?}",
            self.objs.len(),
            edges,
            dangling,
            start.elapsed()
        );
    }
}

impl Index<u64> for GraphManager {
    type Output = MemObject;

    /// Panics when the address is not in the graph; use `get` otherwise.
    fn index(&self, address: u64) -> &MemObject {
        match self.get(address) {
            Some(obj) => obj,
            None => panic!("no object at address {}", address),
        }
    }
}
