use super::graph::{EntryPoint, HnswGraph, SlotId, VectorSource};
use super::search::{Candidate, SearchContext};
use crate::error::{IndexError, Result};

impl HnswGraph {
    /// Wires a freshly stored slot into the graph.
    ///
    /// The vector must already live in `source` at `slot`. The full
    /// insertion algorithm runs:
    ///
    /// 1. Draw the node's top layer from the geometric distribution.
    /// 2. If the graph is empty, the new node becomes the entry point.
    /// 3. Greedy-descend from the entry point down to layer `L + 1`.
    /// 4. For each layer `min(L, top)..=0`: beam-search candidates with
    ///    `ef_construction`, pick diverse neighbors with the heuristic
    ///    rule, and wire bidirectional edges, re-pruning any neighbor list
    ///    that overflows its layer bound.
    /// 5. Raise the entry point if the new node's layer is higher.
    ///
    /// # Errors
    ///
    /// [`IndexError::Internal`] if the slot is out of sequence with the
    /// storage slot table (graph/storage drift).
    pub fn insert_slot<S: VectorSource>(
        &mut self,
        source: &S,
        slot: SlotId,
        ctx: &mut SearchContext,
    ) -> Result<()> {
        let level = self.random_level();
        self.push_node(slot, level)?;

        let Some(entry) = self.entry() else {
            self.set_entry(Some(EntryPoint { slot, layer: level }));
            return Ok(());
        };

        let query = source.vector(slot).into_owned();

        // Phase 1: width-1 descent through the layers above the new node.
        let mut current = entry.slot;
        if entry.layer > level {
            for layer in ((level + 1)..=entry.layer).rev() {
                self.search_layer(ctx, source, current, &query, 1, layer, None)?;
                if let Some(best) = ctx.scratch.first() {
                    current = best.slot;
                }
            }
        }

        // Phase 2: connect on every layer the new node participates in.
        let start_layer = level.min(entry.layer);
        let ef = self.params().ef_construction as usize;
        for layer in (0..=start_layer).rev() {
            self.search_layer(ctx, source, current, &query, ef, layer, None)?;
            let next = ctx.scratch.first().map(|c| c.slot);

            let m_max = self.params().max_connections(layer);
            self.select_neighbors(source, m_max, ctx);

            let selected = std::mem::take(&mut ctx.selected);
            for &neighbor in &selected {
                self.connect(source, slot, neighbor, layer)?;
                self.connect(source, neighbor, slot, layer)?;
            }
            ctx.selected = selected;

            if let Some(best) = next {
                current = best;
            }
        }

        if level > entry.layer {
            self.set_entry(Some(EntryPoint { slot, layer: level }));
        }
        Ok(())
    }

    /// Diversity heuristic over `ctx.scratch` (ascending candidates).
    ///
    /// A candidate is accepted iff it is closer to the query than to every
    /// already-accepted neighbor; this keeps long-range edges instead of
    /// clustering all links on one tight neighborhood. Output lands in
    /// `ctx.selected`, at most `m` slots.
    fn select_neighbors<S: VectorSource>(&self, source: &S, m: usize, ctx: &mut SearchContext) {
        ctx.selected.clear();
        let kernel = self.kernel();

        for c in &ctx.scratch {
            if ctx.selected.len() >= m {
                break;
            }
            let c_vec = source.vector(c.slot);
            let mut dominated = false;
            for &accepted in &ctx.selected {
                let r_vec = source.vector(accepted);
                if kernel.distance(&c_vec, &r_vec) < c.distance {
                    dominated = true;
                    break;
                }
            }
            if !dominated {
                ctx.selected.push(c.slot);
            }
        }
    }

    /// Adds the directed edge `from -> to` on `layer`.
    ///
    /// Touching the list also purges tombstoned neighbors. If the list
    /// overflows the layer bound afterwards, the heuristic is re-applied
    /// from `from`'s perspective to decide which edges survive.
    fn connect<S: VectorSource>(
        &mut self,
        source: &S,
        from: SlotId,
        to: SlotId,
        layer: u8,
    ) -> Result<()> {
        let kernel = self.kernel();
        let m_max = self.params().max_connections(layer);

        let node = self
            .node_mut(from)
            .ok_or_else(|| IndexError::Internal(format!("connect: unknown slot {from}")))?;
        if layer > node.top_layer() {
            return Ok(());
        }

        let mut list = node.take_layer(layer);
        list.retain(|&s| !source.is_deleted(s));
        if !list.contains(&to) {
            list.push(to);
        }

        if list.len() > m_max {
            let from_vec = source.vector(from);
            let mut candidates: Vec<Candidate> = list
                .iter()
                .map(|&s| Candidate {
                    distance: kernel.distance(&from_vec, &source.vector(s)),
                    slot: s,
                    key: source.key_at(s),
                })
                .collect();
            candidates.sort_unstable();

            let mut kept: Vec<SlotId> = Vec::with_capacity(m_max);
            for c in &candidates {
                if kept.len() >= m_max {
                    break;
                }
                let c_vec = source.vector(c.slot);
                let mut dominated = false;
                for &r in &kept {
                    if kernel.distance(&c_vec, &source.vector(r)) < c.distance {
                        dominated = true;
                        break;
                    }
                }
                if !dominated {
                    kept.push(c.slot);
                }
            }
            list = kept;
        }

        self.node_mut(from)
            .ok_or_else(|| IndexError::Internal(format!("connect: unknown slot {from}")))?
            .put_layer(layer, list);
        Ok(())
    }
}
