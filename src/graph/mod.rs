//! Heap object graph
//!
//! Pure Rust, arena-backed. Objects are keyed by address; the heavy passes
//! (referrers, total size, pruning) are methods on `GraphManager`.

pub mod address_set;
pub mod interner;
pub mod manager;
pub mod object;
pub mod prune;
pub mod record;
pub mod summary;
pub mod total_size;

#[cfg(test)]
pub(crate) mod fixtures;

pub use address_set::AddressSet;
pub use interner::{StringInterner, TypeKey};
pub use manager::{GraphManager, LoadStats};
pub use object::{DisplayObject, MemObject};
pub use prune::{ExpensiveRefRule, NamespaceRule, SENTINEL_ADDRESS, SENTINEL_TYPE};
pub use record::{parse_record, parse_record_bytes, DumpRecord, ScalarValue, UnknownFields};
pub use summary::{human_bytes, TypeStats, TypeSummary};
