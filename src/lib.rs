//! heapscope - object-graph analysis for process memory dumps
//!
//! Loads a dump of one JSON record per heap object into an address-keyed
//! graph, then answers "who refers to this" and "how much memory does this
//! keep reachable" over millions of objects.
//!
//! ```no_run
//! use heapscope::{load_path, LoadOptions};
//!
//! let mut graph = load_path("dump.json.gz", &LoadOptions::default())?;
//! graph.remove_expensive_references();
//! graph.compute_referrers();
//! graph.compute_total_size();
//! # Ok::<(), heapscope::LoadError>(())
//! ```

pub mod config;
pub mod errors;
pub mod graph;
pub mod loader;

pub use errors::{LoadError, LoadResult, MalformedRecordError};
pub use graph::{AddressSet, GraphManager, MemObject};
pub use loader::{load, load_path, DumpSource, LoadOptions};
