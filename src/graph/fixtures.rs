//! Shared graphs for unit tests

use super::manager::GraphManager;
use super::object::MemObject;
use crate::loader::{load, DumpSource, LoadOptions};

// a@5 = 1, b@4 = 2, c@6 = 'a str', t@7 = (a, b), d@2 = {a: b, c: t},
// l@3 = [a, b] + itself, outer@1 = (d, l)
pub(crate) const EXAMPLE_DUMP: [&str; 7] = [
    r#"{"address": 1, "type": "tuple", "size": 20, "len": 2, "refs": [2, 3]}"#,
    r#"{"address": 3, "type": "list", "size": 44, "len": 3, "refs": [3, 4, 5]}"#,
    r#"{"address": 5, "type": "int", "size": 12, "value": 1, "refs": []}"#,
    r#"{"address": 4, "type": "int", "size": 12, "value": 2, "refs": []}"#,
    r#"{"address": 2, "type": "dict", "size": 124, "len": 2, "refs": [5, 4, 6, 7]}"#,
    r#"{"address": 7, "type": "tuple", "size": 20, "len": 2, "refs": [4, 5]}"#,
    r#"{"address": 6, "type": "str", "size": 29, "len": 5, "value": "a str", "refs": []}"#,
];

pub(crate) fn example_lines() -> Vec<String> {
    EXAMPLE_DUMP.iter().map(|l| l.to_string()).collect()
}

pub(crate) fn load_lines(lines: &[String]) -> GraphManager {
    load(DumpSource::records(lines.iter().map(String::as_str)), &LoadOptions::default())
        .expect("fixture dump loads")
}

pub(crate) fn example_graph() -> GraphManager {
    load_lines(&example_lines())
}

/// Graph of `(address, size, refs)` triples, all typed "object"
pub(crate) fn graph_from(nodes: &[(u64, u64, &[u64])]) -> GraphManager {
    let mut graph = GraphManager::new();
    let key = graph.intern_type("object");
    for &(address, size, refs) in nodes {
        graph.insert(MemObject::new(address, key, size, refs.to_vec()));
    }
    graph
}
