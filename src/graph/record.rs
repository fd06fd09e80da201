//! Dump record decoding and encoding
//!
//! A dump holds one JSON object per line:
//!
//! ```text
//! {"address": 6, "type": "str", "size": 29, "len": 5, "value": "a str", "refs": []}
//! ```
//!
//! `address`, `type` and `size` are required, `refs` defaults to empty, and
//! `len`, `value`, `name` are optional. Keys this version does not know are
//! kept verbatim so newer dumps load and re-encode without loss.

use crate::errors::MalformedRecordError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

/// Keys a record may carry beyond the known ones, in key order
pub type UnknownFields = BTreeMap<String, Value>;

/// Captured payload of a small/atomic object. Never interpreted by the
/// graph algorithms.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Bool(bool),
    Int(i64),
    /// Integers above `i64::MAX`
    UInt(u64),
    Float(f64),
    Str(String),
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Bool(b) => write!(f, "{}", b),
            ScalarValue::Int(i) => write!(f, "{}", i),
            ScalarValue::UInt(u) => write!(f, "{}", u),
            ScalarValue::Float(x) => write!(f, "{}", x),
            ScalarValue::Str(s) => write!(f, "{:?}", s),
        }
    }
}

/// One decoded record. `type_str` borrows from the input line unless the
/// JSON string contained escapes.
#[derive(Debug, Deserialize)]
pub struct DumpRecord<'a> {
    pub address: u64,
    #[serde(rename = "type", borrow)]
    pub type_str: Cow<'a, str>,
    pub size: u64,
    #[serde(default)]
    pub len: Option<u64>,
    #[serde(default)]
    pub value: Option<ScalarValue>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub refs: Vec<u64>,
    #[serde(flatten)]
    pub extra: UnknownFields,
}

/// Decode one textual record. Pure: no interning, no graph linking.
pub fn parse_record(line: &str) -> Result<DumpRecord<'_>, MalformedRecordError> {
    Ok(serde_json::from_str(line)?)
}

/// Decode one record from raw bytes. Invalid UTF-8 is a malformed record.
pub fn parse_record_bytes(line: &[u8]) -> Result<DumpRecord<'_>, MalformedRecordError> {
    Ok(serde_json::from_slice(line)?)
}

/// Borrowed view used to write an object back out in dump format
#[derive(Debug, Serialize)]
pub(crate) struct RecordView<'a> {
    pub address: u64,
    #[serde(rename = "type")]
    pub type_str: &'a str,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub len: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<&'a ScalarValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
    pub refs: &'a [u64],
    #[serde(flatten)]
    pub extra: Option<&'a UnknownFields>,
}
