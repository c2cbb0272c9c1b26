#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

use super::config::HnswParams;
use crate::error::{IndexError, Result};
use crate::metric::Kernel;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::borrow::Cow;

/// Internal slot identifier, parallel to the storage slot table.
pub type SlotId = u32;

/// Safety cap on layer assignment to bound per-node memory.
pub const MAX_LEVEL: u8 = 16;

/// Default RNG seed for deterministic graph construction.
pub const DEFAULT_SEED: u64 = 42;

/// Supplies vector data and liveness by slot.
///
/// The seam between the graph and the storage arena: search and insertion
/// pull bytes through this trait so tests can substitute synthetic
/// providers.
pub trait VectorSource {
    /// Read-only f32 view of a slot's vector.
    fn vector(&self, slot: SlotId) -> Cow<'_, [f32]>;

    /// True if the slot is tombstoned.
    fn is_deleted(&self, slot: SlotId) -> bool;

    /// External key stored at the slot.
    fn key_at(&self, slot: SlotId) -> i64;
}

/// A graph node: one bounded neighbor list per layer `0..=top_layer`.
#[derive(Debug, Clone)]
pub struct GraphNode {
    layers: Vec<Vec<SlotId>>,
}

impl GraphNode {
    /// Creates a node reaching up to `top_layer`.
    #[must_use]
    pub fn new(top_layer: u8) -> Self {
        Self {
            layers: vec![Vec::new(); top_layer as usize + 1],
        }
    }

    /// Creates a node from prebuilt neighbor lists (codec rebuild path).
    #[must_use]
    pub fn from_layers(layers: Vec<Vec<SlotId>>) -> Self {
        debug_assert!(!layers.is_empty());
        Self { layers }
    }

    /// Highest layer this node participates in.
    #[must_use]
    pub fn top_layer(&self) -> u8 {
        (self.layers.len() - 1) as u8
    }

    /// Neighbor list for a layer; empty above the node's top layer.
    #[must_use]
    pub fn neighbors(&self, layer: u8) -> &[SlotId] {
        self.layers
            .get(layer as usize)
            .map_or(&[][..], Vec::as_slice)
    }

    pub(crate) fn take_layer(&mut self, layer: u8) -> Vec<SlotId> {
        self.layers
            .get_mut(layer as usize)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    pub(crate) fn put_layer(&mut self, layer: u8, list: Vec<SlotId>) {
        if let Some(slot) = self.layers.get_mut(layer as usize) {
            *slot = list;
        }
    }
}

/// The graph entry point: the slot every traversal starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPoint {
    /// Slot of the entry node.
    pub slot: SlotId,
    /// Its top layer.
    pub layer: u8,
}

/// Multi-layer navigable small-world graph over storage slots.
///
/// Nodes are appended in slot order so `nodes[slot]` is always the node for
/// storage slot `slot`; tombstoned slots keep their node for routing until
/// a save-time compaction rebuilds the graph.
pub struct HnswGraph {
    params: HnswParams,
    kernel: Kernel,
    nodes: Vec<GraphNode>,
    entry: Option<EntryPoint>,
    /// Level probability multiplier, `1 / ln(m)`.
    level_mult: f64,
    rng: ChaCha8Rng,
}

impl HnswGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new(params: HnswParams, kernel: Kernel, seed: u64) -> Self {
        let level_mult = 1.0 / f64::from(params.m).ln();
        Self {
            params,
            kernel,
            nodes: Vec::new(),
            entry: None,
            level_mult,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Rebuilds a graph from deserialized parts (load path).
    #[must_use]
    pub fn from_parts(
        params: HnswParams,
        kernel: Kernel,
        nodes: Vec<GraphNode>,
        entry: Option<EntryPoint>,
        seed: u64,
    ) -> Self {
        let level_mult = 1.0 / f64::from(params.m).ln();
        Self {
            params,
            kernel,
            nodes,
            entry,
            level_mult,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Draws a layer for a new node: `floor(-ln(U(0,1)) * mL)`, capped.
    #[must_use]
    pub fn random_level(&mut self) -> u8 {
        let u: f64 = self.rng.gen_range(f64::EPSILON..=1.0);
        let level = (-u.ln() * self.level_mult).floor();
        if level >= f64::from(MAX_LEVEL) {
            MAX_LEVEL
        } else {
            level as u8
        }
    }

    /// Appends the node for a freshly allocated storage slot.
    ///
    /// # Errors
    ///
    /// [`IndexError::Internal`] if `slot` is not the next slot in sequence;
    /// graph and storage slot tables must stay parallel.
    pub fn push_node(&mut self, slot: SlotId, top_layer: u8) -> Result<()> {
        if slot as usize != self.nodes.len() {
            return Err(IndexError::Internal(format!(
                "graph slot {slot} out of sequence (expected {})",
                self.nodes.len()
            )));
        }
        self.nodes.push(GraphNode::new(top_layer));
        Ok(())
    }

    /// Node for a slot.
    #[must_use]
    pub fn node(&self, slot: SlotId) -> Option<&GraphNode> {
        self.nodes.get(slot as usize)
    }

    pub(crate) fn node_mut(&mut self, slot: SlotId) -> Option<&mut GraphNode> {
        self.nodes.get_mut(slot as usize)
    }

    /// Number of nodes, live and tombstoned.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Current entry point.
    #[must_use]
    pub fn entry(&self) -> Option<EntryPoint> {
        self.entry
    }

    pub(crate) fn set_entry(&mut self, entry: Option<EntryPoint>) {
        self.entry = entry;
    }

    /// The distance kernel in use.
    #[must_use]
    pub fn kernel(&self) -> Kernel {
        self.kernel
    }

    /// The algorithm parameters.
    #[must_use]
    pub fn params(&self) -> HnswParams {
        self.params
    }

    /// Reacts to a slot being tombstoned.
    ///
    /// The node stays in place for routing, but if it was the entry point a
    /// replacement is elected: the live slot with the highest top layer,
    /// ties broken by smallest external key. An empty graph clears the
    /// entry.
    pub fn note_removed<S: VectorSource>(&mut self, source: &S, slot: SlotId) {
        let Some(entry) = self.entry else {
            return;
        };
        if entry.slot != slot {
            return;
        }

        let mut best: Option<(u8, i64, SlotId)> = None;
        for (idx, node) in self.nodes.iter().enumerate() {
            let candidate = idx as SlotId;
            if source.is_deleted(candidate) {
                continue;
            }
            let layer = node.top_layer();
            let key = source.key_at(candidate);
            let better = match best {
                None => true,
                Some((best_layer, best_key, _)) => {
                    layer > best_layer || (layer == best_layer && key < best_key)
                }
            };
            if better {
                best = Some((layer, key, candidate));
            }
        }

        self.entry = best.map(|(layer, _, slot)| EntryPoint { slot, layer });
    }
}
