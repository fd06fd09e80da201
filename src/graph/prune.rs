//! Expensive-reference pruning
//!
//! Some edges are structurally global: a module's `__dict__` holding another
//! module pulls that module's whole namespace (and everything it imports)
//! into the reachable set, so almost every `total_size` converges on the size
//! of the heap. Pruning rewrites the holder's `ref_list`:
//!
//! ```text
//! before: [mod_b, "boo", mod_c, 42]
//! after:  ["boo", 42, 0, 0]          kept entries in order, one 0 per cut
//! ```
//!
//! Address 0 is a shared zero-size sentinel typed `<ex-reference>`. Cut
//! edges are counted, not dropped, so edge multiplicities stay consistent.
//!
//! Cached `total_size` values are not touched; run `compute_total_size`
//! again after pruning.

use super::manager::GraphManager;
use super::object::MemObject;
use std::iter;
use tracing::{debug, info};

/// Address of the ex-reference sentinel
pub const SENTINEL_ADDRESS: u64 = 0;

/// Type name of the ex-reference sentinel
pub const SENTINEL_TYPE: &str = "<ex-reference>";

/// Decides which edges get cut.
///
/// `holders` picks the objects whose `ref_list` is examined; `is_expensive`
/// judges one edge. Neither is ever asked about the sentinel.
pub trait ExpensiveRefRule {
    fn holders(&self, graph: &GraphManager) -> Vec<u64>;

    fn is_expensive(&self, graph: &GraphManager, holder: &MemObject, target: &MemObject) -> bool;
}

/// Cut attribute-table edges that point at another namespace owner.
///
/// Namespace owners are objects of one of `namespace_types` ("module" by
/// default). Their attribute tables are the objects they reference whose
/// type is one of `table_types` ("dict" by default).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceRule {
    namespace_types: Vec<String>,
    table_types: Vec<String>,
}

impl Default for NamespaceRule {
    fn default() -> Self {
        Self {
            namespace_types: vec!["module".to_string()],
            table_types: vec!["dict".to_string()],
        }
    }
}

impl NamespaceRule {
    pub fn new(namespace_types: Vec<String>, table_types: Vec<String>) -> Self {
        Self {
            namespace_types,
            table_types,
        }
    }

    pub fn namespace_types(&self) -> &[String] {
        &self.namespace_types
    }

    pub fn table_types(&self) -> &[String] {
        &self.table_types
    }

    fn is_namespace(&self, graph: &GraphManager, obj: &MemObject) -> bool {
        let type_str = graph.type_str(obj);
        self.namespace_types.iter().any(|t| t == type_str)
    }
}

impl ExpensiveRefRule for NamespaceRule {
    fn holders(&self, graph: &GraphManager) -> Vec<u64> {
        let keys = |names: &[String]| -> Vec<_> {
            names.iter().filter_map(|n| graph.types().get(n)).collect()
        };
        let namespace_keys = keys(&self.namespace_types);
        let table_keys = keys(&self.table_types);
        if namespace_keys.is_empty() || table_keys.is_empty() {
            return Vec::new();
        }

        let mut tables: Vec<u64> = graph
            .iter()
            .filter(|obj| namespace_keys.contains(&obj.type_key()))
            .flat_map(|owner| owner.ref_list().iter().copied())
            .filter(|&addr| {
                graph
                    .get(addr)
                    .is_some_and(|t| table_keys.contains(&t.type_key()))
            })
            .collect();
        tables.sort_unstable();
        tables.dedup();
        tables
    }

    fn is_expensive(&self, graph: &GraphManager, _holder: &MemObject, target: &MemObject) -> bool {
        self.is_namespace(graph, target)
    }
}

impl GraphManager {
    /// Make sure the sentinel exists. An object already at address 0 is kept.
    pub fn ensure_sentinel(&mut self) {
        if !self.contains(SENTINEL_ADDRESS) {
            let key = self.intern_type(SENTINEL_TYPE);
            self.insert(MemObject::new(SENTINEL_ADDRESS, key, 0, Vec::new()));
        }
    }

    /// Cut namespace-to-namespace edges with the default `NamespaceRule`.
    /// Returns the number of edges cut.
    pub fn remove_expensive_references(&mut self) -> usize {
        self.remove_expensive_references_with(&NamespaceRule::default())
    }

    /// Cut every edge `rule` judges expensive, replacing each with a
    /// reference to the sentinel at the end of the holder's `ref_list`.
    pub fn remove_expensive_references_with(&mut self, rule: &dyn ExpensiveRefRule) -> usize {
        self.ensure_sentinel();

        // decide against the unmodified graph, then apply
        let mut rewrites: Vec<(usize, Vec<u64>, usize)> = Vec::new();
        for holder_addr in rule.holders(self) {
            if holder_addr == SENTINEL_ADDRESS {
                continue;
            }
            let Some(slot) = self.slot_of(holder_addr) else {
                continue;
            };
            let holder = &self.objects()[slot];

            let mut kept = Vec::with_capacity(holder.ref_list().len());
            let mut cut = 0usize;
            for &target in holder.ref_list() {
                let expensive = target != SENTINEL_ADDRESS
                    && self
                        .get(target)
                        .is_some_and(|t| rule.is_expensive(self, holder, t));
                if expensive {
                    cut += 1;
                } else {
                    kept.push(target);
                }
            }
            if cut > 0 {
                debug!("Cut {} references from {}", cut, holder_addr);
                kept.extend(iter::repeat(SENTINEL_ADDRESS).take(cut));
                rewrites.push((slot, kept, cut));
            }
        }

        let holders = rewrites.len();
        let mut severed = 0usize;
        let objs = self.objects_mut();
        for (slot, refs, cut) in rewrites {
            objs[slot].ref_list = refs;
            severed += cut;
        }

        info!("Removed {} expensive references from {} objects", severed, holders);
        severed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::fixtures::{example_lines, load_lines};

    fn namespace_lines() -> Vec<String> {
        let mut lines = example_lines();
        lines.extend(
            [
                r#"{"address": 8, "type": "module", "size": 12, "name": "mymod", "refs": [9]}"#,
                r#"{"address": 9, "type": "dict", "size": 124, "refs": [10, 11]}"#,
                r#"{"address": 10, "type": "module", "size": 12, "name": "mod2", "refs": [12]}"#,
                r#"{"address": 11, "type": "str", "size": 27, "value": "boo", "refs": []}"#,
                r#"{"address": 12, "type": "dict", "size": 124, "refs": []}"#,
            ]
            .map(String::from),
        );
        lines
    }

    #[test]
    fn test_module_dict_edge_replaced_by_sentinel() {
        let mut graph = load_lines(&namespace_lines());
        assert_eq!(graph[9].ref_list(), &[10, 11]);

        let severed = graph.remove_expensive_references();
        assert_eq!(severed, 1);

        let sentinel = graph.get(0).expect("sentinel created");
        assert_eq!(sentinel.address(), 0);
        assert_eq!(graph.type_str(sentinel), SENTINEL_TYPE);
        assert_eq!(sentinel.size(), 0);
        assert!(sentinel.ref_list().is_empty());

        assert_eq!(graph[9].ref_list(), &[11, 0]);
        // the module itself and its own dict are untouched
        assert_eq!(graph[8].ref_list(), &[9]);
        assert_eq!(graph[10].ref_list(), &[12]);
        assert_eq!(graph[12].ref_list(), &[] as &[u64]);
    }

    #[test]
    fn test_sentinel_created_without_cuts() {
        let mut graph = load_lines(&example_lines());
        assert_eq!(graph.remove_expensive_references(), 0);
        assert!(graph.contains(0));
        assert_eq!(graph[2].ref_list(), &[5, 4, 6, 7]);
    }

    #[test]
    fn test_multiplicity_and_order_preserved() {
        let lines = [
            r#"{"address": 1, "type": "module", "size": 1, "refs": [2]}"#,
            r#"{"address": 2, "type": "dict", "size": 1, "refs": [3, 5, 4, 3, 6]}"#,
            r#"{"address": 3, "type": "module", "size": 1, "refs": []}"#,
            r#"{"address": 4, "type": "module", "size": 1, "refs": []}"#,
            r#"{"address": 5, "type": "str", "size": 1, "refs": []}"#,
            r#"{"address": 6, "type": "int", "size": 1, "refs": []}"#,
        ]
        .map(String::from);
        let mut graph = load_lines(&lines);
        assert_eq!(graph.remove_expensive_references(), 3);
        assert_eq!(graph[2].ref_list(), &[5, 6, 0, 0, 0]);
    }

    #[test]
    fn test_second_pass_changes_nothing() {
        let mut graph = load_lines(&namespace_lines());
        graph.remove_expensive_references();
        let after_first = graph[9].ref_list().to_vec();
        assert_eq!(graph.remove_expensive_references(), 0);
        assert_eq!(graph[9].ref_list(), after_first.as_slice());
    }

    #[test]
    fn test_pruning_shrinks_total_size() {
        let mut graph = load_lines(&namespace_lines());
        graph.compute_total_size();
        // 8 -> 9 -> 10 -> 12 plus 11
        assert_eq!(graph[8].total_size(), Some(12 + 124 + 12 + 27 + 124));

        graph.remove_expensive_references();
        // cached values are stale until recomputed
        assert_eq!(graph[8].total_size(), Some(299));
        graph.compute_total_size();
        assert_eq!(graph[8].total_size(), Some(12 + 124 + 27));
        assert_eq!(graph[0].total_size(), Some(0));
    }

    #[test]
    fn test_custom_namespace_types() {
        let lines = [
            r#"{"address": 1, "type": "package", "size": 1, "refs": [2]}"#,
            r#"{"address": 2, "type": "namespace", "size": 1, "refs": [3, 4]}"#,
            r#"{"address": 3, "type": "package", "size": 1, "refs": []}"#,
            r#"{"address": 4, "type": "module", "size": 1, "refs": []}"#,
        ]
        .map(String::from);
        let mut graph = load_lines(&lines);
        let rule = NamespaceRule::new(vec!["package".into()], vec!["namespace".into()]);
        assert_eq!(graph.remove_expensive_references_with(&rule), 1);
        assert_eq!(graph[2].ref_list(), &[4, 0]);
    }

    #[test]
    fn test_existing_object_at_zero_is_reused() {
        let lines = [
            r#"{"address": 0, "type": "NoneType", "size": 16, "refs": []}"#,
            r#"{"address": 1, "type": "module", "size": 1, "refs": [2]}"#,
            r#"{"address": 2, "type": "dict", "size": 1, "refs": [0, 3]}"#,
            r#"{"address": 3, "type": "module", "size": 1, "refs": []}"#,
        ]
        .map(String::from);
        let mut graph = load_lines(&lines);
        assert_eq!(graph.remove_expensive_references(), 1);
        assert_eq!(graph.type_str(&graph[0]), "NoneType");
        assert_eq!(graph[2].ref_list(), &[0, 0]);
    }
}
