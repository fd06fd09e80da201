//! Reachable-closure size ("total size") for every object
//!
//! `total_size(o)` is the summed `size` of the distinct objects reachable from
//! `o`, `o` included. It is neither a retained size nor a dominator metric:
//! two unrelated objects that share a leaf both count it.
//!
//! # Algorithm
//!
//! ```text
//! 1. Slot graph: one node per object, one edge per ref_list entry that
//!    resolves (dangling refs dropped, duplicates harmless).
//! 2. kosaraju_scc (iterative): members of one SCC reach the same set, so
//!    they share a total. petgraph emits SCCs sinks-first, so a successor
//!    component normally has a smaller index than its predecessors.
//! 3. Condensation: deduplicated successor lists per component.
//! 4. Components with 2+ successors: one walk over the condensation from
//!    the component, visited set = AddressSet. Independent, run on rayon.
//! 5. Sinks-first sweep:
//!      0 successors -> own size
//!      1 successor  -> own size + total(successor)   (disjoint: it's a DAG)
//!      2+           -> result of step 4
//! ```
//!
//! Chains and trees of single-successor components cost O(1) each, cycles
//! collapse to one node, and no walk ever recurses.

use super::address_set::AddressSet;
use super::manager::GraphManager;
use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, info};

/// Condensed DAG in compressed adjacency form
struct Condensation {
    /// Component id of each object slot
    comp_of: Vec<u32>,
    /// Summed shallow size of each component's members
    comp_size: Vec<u64>,
    /// `succ[succ_start[c]..succ_start[c + 1]]` are c's successor components
    succ_start: Vec<usize>,
    succ: Vec<u32>,
}

impl Condensation {
    fn build(graph: &GraphManager) -> Self {
        let objs = graph.objects();
        let edge_hint: usize = objs.iter().map(|o| o.num_refs()).sum();

        let mut slots: DiGraph<(), (), u32> = DiGraph::with_capacity(objs.len(), edge_hint);
        for _ in 0..objs.len() {
            slots.add_node(());
        }
        for (src, obj) in objs.iter().enumerate() {
            for &target in obj.ref_list() {
                if let Some(dst) = graph.slot_of(target) {
                    slots.add_edge(NodeIndex::new(src), NodeIndex::new(dst), ());
                }
            }
        }

        let sccs = kosaraju_scc(&slots);

        let mut comp_of = vec![0u32; objs.len()];
        let mut comp_size = Vec::with_capacity(sccs.len());
        for (comp, members) in sccs.iter().enumerate() {
            let mut size = 0u64;
            for node in members {
                comp_of[node.index()] = comp as u32;
                size = size.saturating_add(objs[node.index()].size());
            }
            comp_size.push(size);
        }

        // last_seen[d] == c marks d as already listed for component c
        let mut last_seen = vec![u32::MAX; sccs.len()];
        let mut succ_start = Vec::with_capacity(sccs.len() + 1);
        let mut succ = Vec::new();
        for (comp, members) in sccs.iter().enumerate() {
            let comp = comp as u32;
            succ_start.push(succ.len());
            for &node in members {
                for next in slots.neighbors(node) {
                    let target = comp_of[next.index()];
                    if target != comp && last_seen[target as usize] != comp {
                        last_seen[target as usize] = comp;
                        succ.push(target);
                    }
                }
            }
        }
        succ_start.push(succ.len());

        Self {
            comp_of,
            comp_size,
            succ_start,
            succ,
        }
    }

    fn len(&self) -> usize {
        self.comp_size.len()
    }

    fn successors(&self, comp: usize) -> &[u32] {
        &self.succ[self.succ_start[comp]..self.succ_start[comp + 1]]
    }

    /// Own size plus every distinct component reachable from `comp`.
    fn walk(&self, comp: usize) -> u64 {
        let mut visited = AddressSet::new();
        let mut stack: Vec<u32> = self.successors(comp).to_vec();
        let mut total = self.comp_size[comp];
        while let Some(next) = stack.pop() {
            if !visited.insert(u64::from(next)) {
                continue;
            }
            total = total.saturating_add(self.comp_size[next as usize]);
            stack.extend(
                self.successors(next as usize)
                    .iter()
                    .filter(|&&d| !visited.contains(u64::from(d))),
            );
        }
        total
    }

    /// Total per component, computed sinks-first.
    fn totals(&self) -> Vec<u64> {
        let walked: Vec<Option<u64>> = (0..self.len())
            .into_par_iter()
            .map(|comp| (self.successors(comp).len() >= 2).then(|| self.walk(comp)))
            .collect();

        let mut totals = Vec::with_capacity(self.len());
        for comp in 0..self.len() {
            let total = match (self.successors(comp), walked[comp]) {
                (_, Some(total)) => total,
                ([], None) => self.comp_size[comp],
                ([only], None) if (*only as usize) < comp => {
                    self.comp_size[comp].saturating_add(totals[*only as usize])
                }
                // successor not swept yet; only if the SCC order ever changes
                (_, None) => self.walk(comp),
            };
            totals.push(total);
        }
        totals
    }
}

impl GraphManager {
    /// Set every object's `total_size`.
    ///
    /// Terminates on any cycle shape, counts each reachable object once per
    /// starting object, and treats references to missing addresses as
    /// zero-size leaves. Recomputed from scratch on every call.
    pub fn compute_total_size(&mut self) {
        let start = Instant::now();
        let condensed = Condensation::build(self);
        let multi = (0..condensed.len())
            .filter(|&c| condensed.successors(c).len() >= 2)
            .count();
        debug!(
            "Condensed {} objects into {} components ({} need a walk) in {:.2?}",
            self.len(),
            condensed.len(),
            multi,
            start.elapsed()
        );

        let totals = condensed.totals();
        let comp_of = &condensed.comp_of;
        self.objects_mut()
            .par_iter_mut()
            .enumerate()
            .for_each(|(slot, obj)| {
                obj.total_size = Some(totals[comp_of[slot] as usize]);
            });

        info!(
            "Computed total sizes for {} objects in {:.2?}",
            self.len(),
            start.elapsed()
        );
    }
}
