//! Vector storage.
//!
//! Owns the contiguous per-slot scalar arena plus the bookkeeping that maps
//! external keys to internal slots.
//!
//! # Memory layout
//!
//! - `data_f32` / `data_i8`: flat arena, slot-major (`[s0_d0, .., s0_dN, s1_d0, ..]`).
//!   Exactly one of the two is populated, chosen at construction.
//! - `keys`: `Vec<i64>` mapping slot index to external key.
//! - `deleted`: `BitVec` tombstones, one bit per slot.
//! - `key_map`: `HashMap<i64, u32>` answering existence queries in O(1).
//!
//! Slots are never reused before a save-time compaction; `drop_key` only
//! tombstones. Capacity grows by doubling through `try_reserve` so a denied
//! allocation surfaces as [`IndexError::Allocation`] instead of aborting.

use crate::error::{IndexError, Result};
use crate::hnsw::graph::VectorSource;
use crate::quantization::{QuantizerConfig, ScalarQuantizer};
use bitvec::prelude::*;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;

/// Initial slot capacity for a fresh store.
const INITIAL_CAPACITY: usize = 16;

/// Element representation chosen at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarKind {
    /// Four bytes per element, IEEE-754 single precision.
    F32,
    /// One byte per element, symmetric linear quantization.
    I8,
}

impl ScalarKind {
    /// Bytes per stored element.
    #[must_use]
    pub fn element_size(self) -> usize {
        match self {
            Self::F32 => 4,
            Self::I8 => 1,
        }
    }

    /// Wire code used by the on-disk header.
    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            Self::F32 => 0,
            Self::I8 => 1,
        }
    }

    /// Inverse of [`ScalarKind::code`].
    #[must_use]
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::F32),
            1 => Some(Self::I8),
            _ => None,
        }
    }

    /// Parses a factory quantization name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "f32" => Some(Self::F32),
            "i8" => Some(Self::I8),
            _ => None,
        }
    }

    /// Canonical name as accepted by the factory.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::F32 => "f32",
            Self::I8 => "i8",
        }
    }
}

/// Contiguous slot-arena vector storage.
pub struct VectorStore {
    dimensions: u32,
    kind: ScalarKind,
    data_f32: Vec<f32>,
    data_i8: Vec<i8>,
    /// Lazily fitted for I8 stores without an explicit scale.
    quantizer: Option<ScalarQuantizer>,
    keys: Vec<i64>,
    deleted: BitVec,
    key_map: HashMap<i64, u32>,
    live: usize,
    capacity_slots: usize,
    encode_scratch: Vec<i8>,
}

impl VectorStore {
    /// Creates an empty store.
    ///
    /// `explicit_scale` pins the i8 quantization scale; `None` defers the
    /// fit to the first vector written. Ignored for F32 stores.
    #[must_use]
    pub fn new(dimensions: u32, kind: ScalarKind, explicit_scale: Option<f32>) -> Self {
        let quantizer = match (kind, explicit_scale) {
            (ScalarKind::I8, Some(scale)) => {
                Some(ScalarQuantizer::new(QuantizerConfig { scale }))
            }
            _ => None,
        };
        Self {
            dimensions,
            kind,
            data_f32: Vec::new(),
            data_i8: Vec::new(),
            quantizer,
            keys: Vec::new(),
            deleted: BitVec::new(),
            key_map: HashMap::new(),
            live: 0,
            capacity_slots: 0,
            encode_scratch: Vec::new(),
        }
    }

    /// Grows the arena and slot table to hold at least `slots` entries.
    ///
    /// Growth doubles from the current capacity and never shrinks.
    ///
    /// # Errors
    ///
    /// [`IndexError::Allocation`] if the host denies the memory request;
    /// the store is unchanged in that case.
    pub fn reserve(&mut self, slots: usize) -> Result<()> {
        if slots <= self.capacity_slots {
            return Ok(());
        }
        let mut target = self.capacity_slots.max(INITIAL_CAPACITY);
        while target < slots {
            target = target.saturating_mul(2);
        }

        let dim = self.dimensions as usize;
        let map_err =
            |e: std::collections::TryReserveError| IndexError::Allocation(e.to_string());

        match self.kind {
            ScalarKind::F32 => {
                let want = target * dim;
                self.data_f32
                    .try_reserve(want.saturating_sub(self.data_f32.len()))
                    .map_err(map_err)?;
            }
            ScalarKind::I8 => {
                let want = target * dim;
                self.data_i8
                    .try_reserve(want.saturating_sub(self.data_i8.len()))
                    .map_err(map_err)?;
            }
        }
        self.keys
            .try_reserve(target.saturating_sub(self.keys.len()))
            .map_err(map_err)?;
        // The tombstone bitvec costs one bit per slot; its growth is noise
        // next to the arena.
        self.deleted.reserve(target.saturating_sub(self.deleted.len()));

        self.capacity_slots = target;
        Ok(())
    }

    /// Writes a vector into a fresh slot.
    ///
    /// # Errors
    ///
    /// - [`IndexError::Duplicate`] if `key` already holds a live vector
    ///   (use the facade's `update` to replace).
    /// - [`IndexError::Dimension`] on element-count mismatch.
    /// - [`IndexError::Allocation`] if capacity growth is denied.
    pub fn put(&mut self, key: i64, vector: &[f32]) -> Result<u32> {
        if vector.len() != self.dimensions as usize {
            return Err(IndexError::Dimension {
                expected: self.dimensions as usize,
                actual: vector.len(),
            });
        }
        if self.key_map.contains_key(&key) {
            return Err(IndexError::Duplicate { key });
        }

        let slot_count = self.keys.len();
        if slot_count >= u32::MAX as usize {
            return Err(IndexError::Allocation("slot table exhausted".into()));
        }
        self.reserve(slot_count + 1)?;

        match self.kind {
            ScalarKind::F32 => {
                self.data_f32.extend_from_slice(vector);
            }
            ScalarKind::I8 => {
                let quantizer = *self
                    .quantizer
                    .get_or_insert_with(|| ScalarQuantizer::fit(vector));
                let mut scratch = std::mem::take(&mut self.encode_scratch);
                quantizer.quantize_into(vector, &mut scratch);
                self.data_i8.extend_from_slice(&scratch);
                self.encode_scratch = scratch;
            }
        }

        #[allow(clippy::cast_possible_truncation)]
        let slot = slot_count as u32;
        self.keys.push(key);
        self.deleted.push(false);
        self.key_map.insert(key, slot);
        self.live += 1;
        Ok(slot)
    }

    /// Pins the i8 quantization scale (load path).
    ///
    /// Must be called before any codes are pushed; a zero or negative
    /// scale is ignored (f32 files carry 0.0 in the scale field).
    pub(crate) fn set_scale(&mut self, scale: f32) {
        if self.kind == ScalarKind::I8 && scale > 0.0 {
            self.quantizer = Some(ScalarQuantizer::new(QuantizerConfig { scale }));
        }
    }

    /// Writes pre-quantized codes into a fresh slot (load path).
    ///
    /// Bypasses the quantizer so a reloaded index decodes bit-identically.
    ///
    /// # Errors
    ///
    /// Same contract as [`VectorStore::put`].
    pub(crate) fn put_codes(&mut self, key: i64, codes: &[i8]) -> Result<u32> {
        debug_assert_eq!(self.kind, ScalarKind::I8);
        if codes.len() != self.dimensions as usize {
            return Err(IndexError::Dimension {
                expected: self.dimensions as usize,
                actual: codes.len(),
            });
        }
        if self.key_map.contains_key(&key) {
            return Err(IndexError::Duplicate { key });
        }

        let slot_count = self.keys.len();
        if slot_count >= u32::MAX as usize {
            return Err(IndexError::Allocation("slot table exhausted".into()));
        }
        self.reserve(slot_count + 1)?;

        self.data_i8.extend_from_slice(codes);
        #[allow(clippy::cast_possible_truncation)]
        let slot = slot_count as u32;
        self.keys.push(key);
        self.deleted.push(false);
        self.key_map.insert(key, slot);
        self.live += 1;
        Ok(slot)
    }

    /// Returns the live slot for a key, if any.
    #[must_use]
    pub fn slot_of(&self, key: i64) -> Option<u32> {
        self.key_map.get(&key).copied()
    }

    /// Returns true if a key holds a live vector.
    #[must_use]
    pub fn contains(&self, key: i64) -> bool {
        self.key_map.contains_key(&key)
    }

    /// Read-only f32 view of a slot.
    ///
    /// F32 stores return a borrowed slice into the arena; I8 stores return
    /// a per-call dequantized copy.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is out of bounds (internal misuse).
    #[must_use]
    pub fn vector(&self, slot: u32) -> Cow<'_, [f32]> {
        let dim = self.dimensions as usize;
        let start = slot as usize * dim;
        let end = start + dim;
        match self.kind {
            ScalarKind::F32 => Cow::Borrowed(&self.data_f32[start..end]),
            ScalarKind::I8 => {
                let quantizer = self
                    .quantizer
                    .as_ref()
                    .expect("i8 store with data must have a quantizer");
                Cow::Owned(quantizer.dequantize(&self.data_i8[start..end]))
            }
        }
    }

    /// Raw i8 codes of a slot (I8 stores only).
    ///
    /// # Panics
    ///
    /// Panics if the store is not I8 or `slot` is out of bounds.
    #[must_use]
    pub fn codes(&self, slot: u32) -> &[i8] {
        assert_eq!(self.kind, ScalarKind::I8, "codes() on a non-i8 store");
        let dim = self.dimensions as usize;
        let start = slot as usize * dim;
        &self.data_i8[start..start + dim]
    }

    /// Raw f32 elements of a slot (F32 stores only).
    ///
    /// # Panics
    ///
    /// Panics if the store is not F32 or `slot` is out of bounds.
    #[must_use]
    pub fn raw_f32(&self, slot: u32) -> &[f32] {
        assert_eq!(self.kind, ScalarKind::F32, "raw_f32() on a non-f32 store");
        let dim = self.dimensions as usize;
        let start = slot as usize * dim;
        &self.data_f32[start..start + dim]
    }

    /// Tombstones a key's slot.
    ///
    /// The slot is not reclaimed until a save-time compaction.
    ///
    /// # Errors
    ///
    /// [`IndexError::KeyMissing`] if the key has no live vector.
    pub fn drop_key(&mut self, key: i64) -> Result<u32> {
        let slot = self
            .key_map
            .remove(&key)
            .ok_or(IndexError::KeyMissing { key })?;
        self.deleted.set(slot as usize, true);
        self.live -= 1;
        Ok(slot)
    }

    /// External key stored at a slot (live or tombstoned).
    #[must_use]
    pub fn key_at(&self, slot: u32) -> i64 {
        self.keys[slot as usize]
    }

    /// Total slots, live and tombstoned.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.keys.len()
    }

    /// Live (non-tombstoned) vectors.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// True if the store holds no live vectors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Vector dimensionality.
    #[must_use]
    pub fn dimensions(&self) -> u32 {
        self.dimensions
    }

    /// Stored element representation.
    #[must_use]
    pub fn kind(&self) -> ScalarKind {
        self.kind
    }

    /// The i8 quantization scale, once known. 0.0 for F32 stores and for
    /// I8 stores that have not seen a vector yet.
    #[must_use]
    pub fn scale(&self) -> f32 {
        self.quantizer.map_or(0.0, |q| q.scale())
    }

    /// Slot capacity currently reserved.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity_slots
    }

    /// Iterates live slots in slot order.
    pub fn live_slots(&self) -> impl Iterator<Item = u32> + '_ {
        #[allow(clippy::cast_possible_truncation)]
        (0..self.keys.len() as u32).filter(move |&s| !self.deleted[s as usize])
    }
}

impl VectorSource for VectorStore {
    fn vector(&self, slot: u32) -> Cow<'_, [f32]> {
        self.vector(slot)
    }

    fn is_deleted(&self, slot: u32) -> bool {
        self.deleted[slot as usize]
    }

    fn key_at(&self, slot: u32) -> i64 {
        self.key_at(slot)
    }
}
