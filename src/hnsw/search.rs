use super::graph::{HnswGraph, SlotId, VectorSource};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};

/// Traversal budget multiplier: a layer search visits at most `ef * 10`
/// frontier nodes before giving up (pathological graphs only).
const MAX_TRAVERSAL_MULT: usize = 10;

/// One k-NN result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchMatch {
    /// External key of the matching vector.
    pub key: i64,
    /// Distance from the query under the index metric.
    pub distance: f32,
}

/// A traversal candidate: distance to the query plus identity.
///
/// Ordering is by distance (`total_cmp`), ties broken by smaller external
/// key, so heap trimming evicts the worst match deterministically.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Candidate {
    pub distance: f32,
    pub slot: SlotId,
    pub key: i64,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot && self.distance == other.distance
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.key.cmp(&other.key))
    }
}

/// Reusable scratch state for traversals.
///
/// One context serves any number of searches and insertions; reusing it
/// keeps the visited set and heap allocations warm across calls.
pub struct SearchContext {
    /// Slots already expanded or queued this traversal.
    visited: HashSet<SlotId>,
    /// Min-heap frontier (nearest first).
    frontier: BinaryHeap<Reverse<Candidate>>,
    /// Max-heap of best-so-far (worst on top, trimmed to the beam width).
    results: BinaryHeap<Candidate>,
    /// Sorted output of the last layer search, ascending by distance.
    pub(crate) scratch: Vec<Candidate>,
    /// Neighbor selection output (insertion).
    pub(crate) selected: Vec<SlotId>,
}

impl SearchContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            visited: HashSet::new(),
            frontier: BinaryHeap::new(),
            results: BinaryHeap::new(),
            scratch: Vec::new(),
            selected: Vec::new(),
        }
    }

    fn reset(&mut self) {
        self.visited.clear();
        self.frontier.clear();
        self.results.clear();
        self.scratch.clear();
    }
}

impl Default for SearchContext {
    fn default() -> Self {
        Self::new()
    }
}

impl HnswGraph {
    /// Beam search within one layer.
    ///
    /// Starts from `entry`, expands greedily with beam width `ef`, and
    /// leaves the survivors in `ctx.scratch` sorted ascending by distance.
    ///
    /// Tombstoned slots stay on the routing path (removing them would
    /// shatter connectivity) but are never admitted to the result heap.
    /// When `allowed` is set, the result heap additionally admits only
    /// slots whose external key is in the set; traversal is unrestricted.
    pub(crate) fn search_layer<S: VectorSource>(
        &self,
        ctx: &mut SearchContext,
        source: &S,
        entry: SlotId,
        query: &[f32],
        ef: usize,
        layer: u8,
        allowed: Option<&HashSet<i64>>,
    ) -> Result<()> {
        ctx.reset();
        let kernel = self.kernel();

        let admit = |slot: SlotId, key: i64| -> bool {
            if source.is_deleted(slot) {
                return false;
            }
            allowed.map_or(true, |set| set.contains(&key))
        };

        // Seed the frontier.
        {
            let vector = source.vector(entry);
            let key = source.key_at(entry);
            let candidate = Candidate {
                distance: kernel.distance(query, &vector),
                slot: entry,
                key,
            };
            ctx.frontier.push(Reverse(candidate));
            if admit(entry, key) {
                ctx.results.push(candidate);
            }
            ctx.visited.insert(entry);
        }

        let traversal_limit = ef.saturating_mul(MAX_TRAVERSAL_MULT);
        let mut traversed = 0usize;

        while let Some(Reverse(candidate)) = ctx.frontier.pop() {
            traversed += 1;
            if traversed > traversal_limit {
                log::warn!(
                    "layer search traversal budget exceeded (ef={ef}, limit={traversal_limit}); stopping early"
                );
                break;
            }

            if ctx.results.len() >= ef {
                if let Some(furthest) = ctx.results.peek() {
                    if candidate.distance > furthest.distance {
                        break;
                    }
                }
            }

            let Some(node) = self.node(candidate.slot) else {
                continue;
            };

            for &neighbor in node.neighbors(layer) {
                if !ctx.visited.insert(neighbor) {
                    continue;
                }
                let vector = source.vector(neighbor);
                let key = source.key_at(neighbor);
                let distance = kernel.distance(query, &vector);

                let worth_keeping = ctx.results.len() < ef
                    || ctx
                        .results
                        .peek()
                        .is_some_and(|furthest| distance < furthest.distance);
                if !worth_keeping {
                    continue;
                }

                let next = Candidate {
                    distance,
                    slot: neighbor,
                    key,
                };
                // Tombstones and filtered-out keys still route.
                ctx.frontier.push(Reverse(next));
                if admit(neighbor, key) {
                    ctx.results.push(next);
                    if ctx.results.len() > ef {
                        ctx.results.pop();
                    }
                }
            }
        }

        // Drain the max-heap into ascending order.
        ctx.scratch.clear();
        while let Some(c) = ctx.results.pop() {
            ctx.scratch.push(c);
        }
        ctx.scratch.reverse();
        Ok(())
    }

    /// k nearest neighbors of `query`.
    ///
    /// Greedy-descends from the entry point to layer 1, then runs a beam
    /// search on layer 0 with width `max(ef_search, k)`. Results come back
    /// ascending by distance, ties broken by smaller key; at most
    /// `min(k, live_count)` entries. An empty graph returns an empty list.
    ///
    /// `allowed` restricts the *result set* to the given keys; the
    /// traversal still uses the full graph for connectivity.
    ///
    /// # Errors
    ///
    /// Currently infallible in practice; the `Result` mirrors the other
    /// traversal entry points so callers gate uniformly.
    pub fn knn_search<S: VectorSource>(
        &self,
        source: &S,
        query: &[f32],
        k: usize,
        allowed: Option<&HashSet<i64>>,
        ctx: &mut SearchContext,
    ) -> Result<Vec<SearchMatch>> {
        let Some(entry) = self.entry() else {
            return Ok(Vec::new());
        };
        if k == 0 {
            return Ok(Vec::new());
        }

        // Zoom down to layer 1 with a width-1 beam.
        let mut current = entry.slot;
        for layer in (1..=entry.layer).rev() {
            self.search_layer(ctx, source, current, query, 1, layer, None)?;
            if let Some(best) = ctx.scratch.first() {
                current = best.slot;
            }
        }

        // Layer 0 beam, filtered if requested.
        let ef = (self.params().ef_search as usize).max(k);
        self.search_layer(ctx, source, current, query, ef, 0, allowed)?;

        let results = ctx
            .scratch
            .iter()
            .take(k)
            .map(|c| SearchMatch {
                key: c.key,
                distance: c.distance,
            })
            .collect();
        Ok(results)
    }
}
