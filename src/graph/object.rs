//! In-memory representation of one captured heap object

use super::interner::TypeKey;
use super::record::{RecordView, ScalarValue, UnknownFields};
use std::fmt;

/// One heap object snapshot.
///
/// `address` never changes once assigned. `referrers` and `total_size` stay
/// `None` until the matching `GraphManager::compute_*` pass runs, and are only
/// refreshed by running that pass again.
#[derive(Debug, Clone, PartialEq)]
pub struct MemObject {
    address: u64,
    type_key: TypeKey,
    size: u64,
    length: Option<u64>,
    value: Option<ScalarValue>,
    name: Option<String>,
    pub(crate) ref_list: Vec<u64>,
    unknown: Option<Box<UnknownFields>>,
    pub(crate) referrers: Option<Vec<u64>>,
    pub(crate) total_size: Option<u64>,
}

impl MemObject {
    pub fn new(address: u64, type_key: TypeKey, size: u64, ref_list: Vec<u64>) -> Self {
        Self {
            address,
            type_key,
            size,
            length: None,
            value: None,
            name: None,
            ref_list,
            unknown: None,
            referrers: None,
            total_size: None,
        }
    }

    pub fn with_length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_value(mut self, value: ScalarValue) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub(crate) fn with_unknown_fields(mut self, fields: UnknownFields) -> Self {
        self.unknown = (!fields.is_empty()).then(|| Box::new(fields));
        self
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    /// Interned type name; resolve with `GraphManager::type_str`
    pub fn type_key(&self) -> TypeKey {
        self.type_key
    }

    /// Shallow size in bytes at capture time
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Container or string length, when the producer captured one
    pub fn length(&self) -> Option<u64> {
        self.length
    }

    pub fn value(&self) -> Option<&ScalarValue> {
        self.value.as_ref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Outgoing references in dump order. May contain duplicates, the
    /// object's own address, and addresses missing from the graph.
    pub fn ref_list(&self) -> &[u64] {
        &self.ref_list
    }

    pub fn num_refs(&self) -> usize {
        self.ref_list.len()
    }

    /// Ascending, duplicate-free addresses of objects referencing this one.
    /// `None` until `compute_referrers` has run.
    pub fn referrers(&self) -> Option<&[u64]> {
        self.referrers.as_deref()
    }

    pub fn num_referrers(&self) -> Option<usize> {
        self.referrers.as_ref().map(Vec::len)
    }

    /// Sum of sizes over everything reachable from this object, itself
    /// included. `None` until `compute_total_size` has run.
    pub fn total_size(&self) -> Option<u64> {
        self.total_size
    }

    /// Record keys this version does not interpret
    pub fn unknown_fields(&self) -> Option<&UnknownFields> {
        self.unknown.as_deref()
    }

    pub(crate) fn record_view<'a>(&'a self, type_str: &'a str) -> RecordView<'a> {
        RecordView {
            address: self.address,
            type_str,
            size: self.size,
            len: self.length,
            value: self.value.as_ref(),
            name: self.name.as_deref(),
            refs: &self.ref_list,
            extra: self.unknown.as_deref(),
        }
    }
}

/// One-line rendering of an object, e.g. `dict(2 124B 4refs 1par)`
pub struct DisplayObject<'a> {
    pub(crate) obj: &'a MemObject,
    pub(crate) type_str: &'a str,
}

impl fmt::Display for DisplayObject<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let obj = self.obj;
        write!(f, "{}({} {}B", self.type_str, obj.address, obj.size)?;
        if let Some(length) = obj.length {
            write!(f, " len={}", length)?;
        }
        if !obj.ref_list.is_empty() {
            write!(f, " {}refs", obj.ref_list.len())?;
        }
        if let Some(referrers) = &obj.referrers {
            write!(f, " {}par", referrers.len())?;
        }
        if let Some(name) = &obj.name {
            write!(f, " {}", name)?;
        }
        if let Some(value) = &obj.value {
            write!(f, " {}", value)?;
        }
        write!(f, ")")?;
        if let Some(total) = obj.total_size {
            write!(f, " {}B total", total)?;
        }
        Ok(())
    }
}
