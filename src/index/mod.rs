//! The index facade.
//!
//! [`VectorIndex`] is the host-facing handle: construction, validation
//! gates, synchronous operations, background bulk operations, and the
//! read-only properties. Every operation runs its gates in a fixed order —
//! deleted-state, busy, path, buffer, dimension, key — and aborts on the
//! first failure, leaving the index untouched.

mod background;

use crate::error::{IndexError, Result};
use crate::hnsw::graph::DEFAULT_SEED;
use crate::hnsw::{HnswGraph, HnswParams, SearchContext, SearchMatch};
use crate::metric::{Kernel, MetricKind};
use crate::persistence::codec::{self, ExpectedConfig};
use crate::persistence::{path as path_check, raw};
use crate::simd::Isa;
use crate::storage::{ScalarKind, VectorStore};
use background::{Core, Shared};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub use background::DebugCallback;

/// Estimated fixed bytes per graph node (headers, list spines).
const NODE_HEADER_BYTES: usize = 32;

/// Estimated fixed overhead of an index regardless of contents.
const BASE_OVERHEAD_BYTES: usize = 4096;

/// Construction options for [`VectorIndex::create`].
#[derive(Clone)]
pub struct IndexOptions {
    /// Stored element representation. Default: f32.
    pub quantization: ScalarKind,
    /// Distance metric. Default: cosine.
    pub metric: MetricKind,
    /// Max connections per layer above 0. Default 16.
    pub m: u32,
    /// Construction beam width. Default 64.
    pub ef_construction: u32,
    /// Search beam width. Default 64.
    pub ef_search: u32,
    /// Explicit i8 quantization scale. `None` fits it from the first
    /// vector written. Ignored for f32 indices.
    pub i8_scale: Option<f32>,
    /// RNG seed for layer assignment; equal seeds and equal insertion
    /// order build identical graphs.
    pub seed: u64,
    /// Optional diagnostic callback (construction, background completion,
    /// internal errors).
    pub debug: Option<DebugCallback>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            quantization: ScalarKind::F32,
            metric: MetricKind::Cos,
            m: HnswParams::DEFAULT_M,
            ef_construction: HnswParams::DEFAULT_EF_CONSTRUCTION,
            ef_search: HnswParams::DEFAULT_EF_SEARCH,
            i8_scale: None,
            seed: DEFAULT_SEED,
            debug: None,
        }
    }
}

impl std::fmt::Debug for IndexOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexOptions")
            .field("quantization", &self.quantization)
            .field("metric", &self.metric)
            .field("m", &self.m)
            .field("ef_construction", &self.ef_construction)
            .field("ef_search", &self.ef_search)
            .field("i8_scale", &self.i8_scale)
            .field("seed", &self.seed)
            .field("debug", &self.debug.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl IndexOptions {
    /// Sets the quantization from its factory name (`"f32"`, `"i8"`).
    ///
    /// # Errors
    ///
    /// [`IndexError::Config`] on an unknown name.
    pub fn with_quantization_name(mut self, name: &str) -> Result<Self> {
        self.quantization = ScalarKind::from_name(name)
            .ok_or_else(|| IndexError::Config(format!("unknown quantization: {name:?}")))?;
        Ok(self)
    }

    /// Sets the metric from its factory name (`"cos"`, `"l2sq"`, `"ip"`,
    /// `"hamming"`, `"jaccard"`).
    ///
    /// # Errors
    ///
    /// [`IndexError::Config`] on an unknown name.
    pub fn with_metric_name(mut self, name: &str) -> Result<Self> {
        self.metric = MetricKind::from_name(name)
            .ok_or_else(|| IndexError::Config(format!("unknown metric: {name:?}")))?;
        Ok(self)
    }
}

/// Per-search options.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// When set, only these keys may appear in results. Traversal still
    /// uses the whole graph for connectivity.
    pub allowed_keys: Option<Vec<i64>>,
}

/// Timing report for a synchronous `add`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AddReport {
    /// Wall-clock milliseconds spent inside the call.
    pub duration_ms: f64,
}

/// Completion report of a background operation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Wall-clock milliseconds the background task ran.
    pub duration_ms: f64,
    /// Vectors actually inserted.
    pub count: usize,
}

/// Progress of the in-flight background operation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexingProgress {
    /// Items processed so far.
    pub current: usize,
    /// Total items in the batch.
    pub total: usize,
    /// `current / total` as a percentage; 0 when idle.
    pub percentage: f32,
}

/// An embeddable approximate-nearest-neighbor vector index.
///
/// Handles are cheap to clone and share one underlying index; all methods
/// take `&self`. One dedicated worker thread at most is alive per index,
/// running a bulk operation; everything else is synchronous under a single
/// mutex.
#[derive(Clone)]
pub struct VectorIndex {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex").finish_non_exhaustive()
    }
}

impl VectorIndex {
    /// Creates an index.
    ///
    /// # Errors
    ///
    /// [`IndexError::Config`] on `dimensions == 0`, a degenerate
    /// parameter set, or a non-positive explicit i8 scale.
    pub fn create(dimensions: u32, options: IndexOptions) -> Result<Self> {
        if dimensions == 0 {
            return Err(IndexError::Config("dimensions must be > 0".into()));
        }
        let params = HnswParams::new(options.m, options.ef_construction, options.ef_search);
        params.validate()?;
        if let Some(scale) = options.i8_scale {
            if !scale.is_finite() || scale <= 0.0 {
                return Err(IndexError::Config(format!(
                    "i8 scale must be positive and finite, got {scale}"
                )));
            }
        }

        let kernel = Kernel::select(options.metric);
        let store = VectorStore::new(dimensions, options.quantization, options.i8_scale);
        let graph = HnswGraph::new(params, kernel, options.seed);

        let shared = Arc::new(Shared {
            core: Mutex::new(Some(Core {
                store,
                graph,
                ctx: SearchContext::new(),
            })),
            destroyed: AtomicBool::new(false),
            indexing: AtomicBool::new(false),
            progress_current: AtomicUsize::new(0),
            progress_total: AtomicUsize::new(0),
            generation: AtomicU64::new(0),
            last: Mutex::new(None),
            debug: options.debug,
            dimensions,
            scalar: options.quantization,
            metric: options.metric,
            params,
            isa: kernel.isa(),
            seed: options.seed,
        });
        shared.debug_log(&format!(
            "index created: dims={dimensions} metric={} quantization={} isa={}",
            options.metric.name(),
            options.quantization.name(),
            kernel.isa().name()
        ));
        Ok(Self { shared })
    }

    // ------------------------------------------------------------------
    // Gates
    // ------------------------------------------------------------------

    fn guard_alive(&self) -> Result<()> {
        if self.shared.destroyed.load(Ordering::SeqCst) {
            return Err(IndexError::DeletedState);
        }
        Ok(())
    }

    fn guard_not_busy(&self, op: &'static str) -> Result<()> {
        if self.shared.indexing.load(Ordering::SeqCst) {
            return Err(IndexError::Busy(op));
        }
        Ok(())
    }

    fn check_vector(&self, vector: &[f32]) -> Result<()> {
        if vector.is_empty() {
            return Err(IndexError::Buffer("empty vector buffer".into()));
        }
        if let Some(i) = vector.iter().position(|v| !v.is_finite()) {
            return Err(IndexError::Buffer(format!(
                "non-finite value at index {i}"
            )));
        }
        let expected = self.shared.dimensions as usize;
        if vector.len() != expected {
            return Err(IndexError::Dimension {
                expected,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Alignment- and size-checked view of a caller byte buffer as f32.
    fn cast_f32(bytes: &[u8]) -> Result<&[f32]> {
        if bytes.is_empty() {
            return Err(IndexError::Buffer("empty byte buffer".into()));
        }
        if bytes.len() % 4 != 0 {
            return Err(IndexError::Buffer(format!(
                "byte length {} is not a multiple of 4",
                bytes.len()
            )));
        }
        bytemuck::try_cast_slice(bytes)
            .map_err(|e| IndexError::Buffer(format!("misaligned f32 buffer: {e}")))
    }

    /// Routes invariant violations to the diagnostic sinks before they
    /// surface to the caller.
    fn note_internal(&self, error: IndexError) -> IndexError {
        if matches!(error, IndexError::Internal(_)) {
            self.shared.debug_log(&format!("internal error: {error}"));
            log::error!("internal error: {error}");
        }
        error
    }

    fn claim_background(&self, op: &'static str) -> Result<()> {
        if self
            .shared
            .indexing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(IndexError::Busy(op));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Synchronous mutators
    // ------------------------------------------------------------------

    /// Adds a vector under a fresh key.
    ///
    /// # Errors
    ///
    /// `Buffer`, `Dimension`, `Duplicate`, `DeletedState`; `Allocation`
    /// when capacity growth is denied.
    pub fn add(&self, key: i64, vector: &[f32]) -> Result<AddReport> {
        self.guard_alive()?;
        self.check_vector(vector)?;

        let started = Instant::now();
        let mut guard = self.shared.core.lock();
        let core = guard.as_mut().ok_or(IndexError::DeletedState)?;
        core.insert(key, vector).map_err(|e| self.note_internal(e))?;
        Ok(AddReport {
            duration_ms: started.elapsed().as_secs_f64() * 1e3,
        })
    }

    /// Zero-copy twin of [`VectorIndex::add`]: takes the vector as a raw
    /// byte range. The buffer must be 4-byte aligned and exactly
    /// `dimensions * 4` bytes; it is copied into storage before the call
    /// returns.
    ///
    /// # Errors
    ///
    /// As [`VectorIndex::add`], plus `Buffer` for misaligned or oddly
    /// sized byte ranges.
    pub fn add_from_raw(&self, key: i64, bytes: &[u8]) -> Result<AddReport> {
        self.guard_alive()?;
        let vector = Self::cast_f32(bytes)?;
        self.add(key, vector)
    }

    /// Removes a key's vector (tombstone; storage is reclaimed on save).
    ///
    /// # Errors
    ///
    /// `KeyMissing`, `Busy`, `DeletedState`.
    pub fn remove(&self, key: i64) -> Result<()> {
        self.guard_alive()?;
        self.guard_not_busy("remove")?;

        let mut guard = self.shared.core.lock();
        let core = guard.as_mut().ok_or(IndexError::DeletedState)?;
        let slot = core.store.drop_key(key)?;
        core.graph.note_removed(&core.store, slot);
        Ok(())
    }

    /// Replaces a key's vector; an unknown key is treated as an add.
    ///
    /// # Errors
    ///
    /// `Buffer`, `Dimension`, `Busy`, `DeletedState`.
    pub fn update(&self, key: i64, vector: &[f32]) -> Result<()> {
        self.guard_alive()?;
        self.guard_not_busy("update")?;
        self.check_vector(vector)?;

        let mut guard = self.shared.core.lock();
        let core = guard.as_mut().ok_or(IndexError::DeletedState)?;
        if core.store.contains(key) {
            let slot = core.store.drop_key(key)?;
            core.graph.note_removed(&core.store, slot);
        }
        core.insert(key, vector).map_err(|e| self.note_internal(e))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// k nearest neighbors of `query`, ascending by distance.
    ///
    /// Returns at most `min(k, count)` matches; ties break toward the
    /// smaller key. An empty index returns an empty list.
    ///
    /// # Errors
    ///
    /// `Buffer`, `Dimension`, `DeletedState`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchMatch>> {
        self.search_with(query, k, &SearchOptions::default())
    }

    /// [`VectorIndex::search`] with options (key filtering).
    ///
    /// # Errors
    ///
    /// `Buffer`, `Dimension`, `DeletedState`.
    pub fn search_with(
        &self,
        query: &[f32],
        k: usize,
        options: &SearchOptions,
    ) -> Result<Vec<SearchMatch>> {
        self.guard_alive()?;
        self.check_vector(query)?;

        let allowed: Option<HashSet<i64>> = options
            .allowed_keys
            .as_ref()
            .map(|keys| keys.iter().copied().collect());

        let mut guard = self.shared.core.lock();
        let core = guard.as_mut().ok_or(IndexError::DeletedState)?;
        let Core { store, graph, ctx } = core;
        graph.knn_search(store, query, k, allowed.as_ref(), ctx)
    }

    /// A freshly allocated copy of a key's vector, dequantized for i8
    /// indices; `None` if the key is absent.
    ///
    /// # Errors
    ///
    /// `DeletedState`.
    pub fn get_item_vector(&self, key: i64) -> Result<Option<Vec<f32>>> {
        self.guard_alive()?;
        let mut guard = self.shared.core.lock();
        let core = guard.as_mut().ok_or(IndexError::DeletedState)?;
        Ok(core
            .store
            .slot_of(key)
            .map(|slot| core.store.vector(slot).into_owned()))
    }

    /// True if `key` holds a live vector.
    #[must_use]
    pub fn contains(&self, key: i64) -> bool {
        let guard = self.shared.core.lock();
        guard.as_ref().is_some_and(|core| core.store.contains(key))
    }

    /// Snapshot of all live keys, in slot order.
    #[must_use]
    pub fn keys(&self) -> Vec<i64> {
        let guard = self.shared.core.lock();
        guard.as_ref().map_or_else(Vec::new, |core| {
            core.store
                .live_slots()
                .map(|slot| core.store.key_at(slot))
                .collect()
        })
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Serializes the index to `path` (write-then-rename).
    ///
    /// # Errors
    ///
    /// `Path`, `Busy`, `Io`, `DeletedState`.
    pub fn save(&self, path: &str) -> Result<()> {
        self.guard_alive()?;
        self.guard_not_busy("save")?;
        let path = path_check::sanitize(path)?;

        let mut guard = self.shared.core.lock();
        let core = guard.as_mut().ok_or(IndexError::DeletedState)?;
        codec::save_index(&core.store, &core.graph, path)
    }

    /// Replaces this index's contents from a file produced by
    /// [`VectorIndex::save`]. The file must match the index's dimensions,
    /// quantization, and metric.
    ///
    /// The image is parsed completely before anything is swapped in, so a
    /// failed load leaves the previous contents intact.
    ///
    /// # Errors
    ///
    /// `Path`, `Busy`, `Format`, `Dimension`, `Corrupted`, `Io`,
    /// `DeletedState`.
    pub fn load(&self, path: &str) -> Result<()> {
        self.guard_alive()?;
        self.guard_not_busy("load")?;
        let path = path_check::sanitize(path)?;

        let expect = ExpectedConfig {
            dimensions: self.shared.dimensions,
            scalar: self.shared.scalar,
            metric: self.shared.metric,
            kernel: Kernel::select(self.shared.metric),
            seed: self.shared.seed,
        };
        let (store, graph) = codec::load_index(path, &expect)?;

        let mut guard = self.shared.core.lock();
        if guard.is_none() {
            return Err(IndexError::DeletedState);
        }
        *guard = Some(Core {
            store,
            graph,
            ctx: SearchContext::new(),
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Background operations
    // ------------------------------------------------------------------

    /// Inserts a batch on the background worker.
    ///
    /// `vectors` is the concatenation of `keys.len()` vectors of
    /// `dimensions` elements. Input is copied before this call returns;
    /// the host polls [`VectorIndex::is_indexing`] and then collects
    /// [`VectorIndex::last_result`]. Items are inserted in order, one
    /// mutex acquisition each, so concurrent searches see a growing
    /// prefix.
    ///
    /// # Errors
    ///
    /// `Buffer`, `Dimension`, `Busy`, `DeletedState` — all synchronous;
    /// per-item failures land in the last result instead.
    pub fn add_batch(&self, keys: &[i64], vectors: &[f32]) -> Result<()> {
        self.guard_alive()?;
        self.guard_not_busy("add_batch")?;

        if keys.is_empty() {
            return Err(IndexError::Buffer("empty batch".into()));
        }
        let dims = self.shared.dimensions as usize;
        if keys.len().saturating_mul(dims) != vectors.len() {
            return Err(IndexError::Buffer(format!(
                "batch shape mismatch: {} keys x {dims} dims != {} elements",
                keys.len(),
                vectors.len()
            )));
        }
        for (i, chunk) in vectors.chunks_exact(dims).enumerate() {
            if chunk.iter().any(|v| !v.is_finite()) {
                return Err(IndexError::Buffer(format!(
                    "non-finite value in batch vector {i}"
                )));
            }
        }

        let items: Vec<(i64, Vec<f32>)> = keys
            .iter()
            .copied()
            .zip(vectors.chunks_exact(dims).map(<[f32]>::to_vec))
            .collect();

        self.claim_background("add_batch")?;
        background::spawn_ingest(Arc::clone(&self.shared), items, "add_batch");
        Ok(())
    }

    /// Zero-copy twin of [`VectorIndex::add_batch`]: vectors arrive as one
    /// contiguous 4-byte-aligned byte range.
    ///
    /// # Errors
    ///
    /// As [`VectorIndex::add_batch`], plus `Buffer` for misaligned input.
    pub fn add_batch_from_raw(&self, keys: &[i64], bytes: &[u8]) -> Result<()> {
        self.guard_alive()?;
        let vectors = Self::cast_f32(bytes)?;
        self.add_batch(keys, vectors)
    }

    /// Bulk-loads a headerless little-endian f32 file (`N x dims x 4`
    /// bytes), assigning keys `0..N-1`, on the background worker. For i8
    /// indices the vectors are quantized as they are inserted.
    ///
    /// # Errors
    ///
    /// `Path`, `Format`, `Io`, `Busy`, `DeletedState` — all synchronous;
    /// per-item failures land in the last result instead.
    pub fn load_vectors_from_file(&self, path: &str) -> Result<()> {
        self.guard_alive()?;
        self.guard_not_busy("load_vectors_from_file")?;
        let path = path_check::sanitize(path)?;

        let parsed = raw::read_raw_vectors(path, self.shared.dimensions)?;
        #[allow(clippy::cast_possible_wrap)]
        let items: Vec<(i64, Vec<f32>)> = (0..parsed.count)
            .map(|i| (i as i64, parsed.vector(i).to_vec()))
            .collect();

        self.claim_background("load_vectors_from_file")?;
        background::spawn_ingest(Arc::clone(&self.shared), items, "load_vectors_from_file");
        Ok(())
    }

    /// Report of the last finished background operation, clearing it.
    ///
    /// Returns `Ok(None)` when no background operation has completed since
    /// the last call.
    ///
    /// # Errors
    ///
    /// Re-raises the error the background operation recorded, if any;
    /// `DeletedState` on a destroyed index.
    pub fn last_result(&self) -> Result<Option<BatchReport>> {
        self.guard_alive()?;
        let outcome = self.shared.last.lock().take();
        match outcome {
            None => Ok(None),
            Some(outcome) => match outcome.error {
                Some(error) => Err(error),
                None => Ok(Some(BatchReport {
                    duration_ms: outcome.duration.as_secs_f64() * 1e3,
                    count: outcome.count,
                })),
            },
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Destroys the index. Idempotent; every subsequent operation fails
    /// with `DeletedState`. A running background task notices at its next
    /// loop boundary and aborts without touching released state.
    pub fn destroy(&self) {
        if self.shared.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        *self.shared.core.lock() = None;
        self.shared.debug_log("index destroyed");
    }

    // ------------------------------------------------------------------
    // Read-only properties
    // ------------------------------------------------------------------

    /// Configured dimensionality.
    #[must_use]
    pub fn dimensions(&self) -> u32 {
        self.shared.dimensions
    }

    /// Live vector count (0 after destroy).
    #[must_use]
    pub fn count(&self) -> usize {
        let guard = self.shared.core.lock();
        guard.as_ref().map_or(0, |core| core.store.live_count())
    }

    /// Estimated resident bytes.
    ///
    /// Computed from the live count and the configured connectivity, not
    /// from graph internals, so it is safe to read while a background
    /// task runs.
    #[must_use]
    pub fn memory_usage(&self) -> usize {
        let count = self.count();
        let dims = self.shared.dimensions as usize;
        let element = self.shared.scalar.element_size();
        let connectivity = self.shared.params.m0 as usize;
        count * dims * element
            + count * (NODE_HEADER_BYTES + connectivity * 8)
            + BASE_OVERHEAD_BYTES
    }

    /// Name of the SIMD variant selected at construction (`"neon"`,
    /// `"avx2"`, `"sve"`, or `"serial"`).
    #[must_use]
    pub fn isa(&self) -> &'static str {
        self.shared.isa.name()
    }

    /// The selected instruction set, typed.
    #[must_use]
    pub fn isa_kind(&self) -> Isa {
        self.shared.isa
    }

    /// Configured metric.
    #[must_use]
    pub fn metric(&self) -> MetricKind {
        self.shared.metric
    }

    /// Configured quantization.
    #[must_use]
    pub fn quantization(&self) -> ScalarKind {
        self.shared.scalar
    }

    /// True while a background operation is in flight.
    #[must_use]
    pub fn is_indexing(&self) -> bool {
        self.shared.indexing.load(Ordering::SeqCst)
    }

    /// Progress of the in-flight background operation (zeros when idle).
    #[must_use]
    pub fn indexing_progress(&self) -> IndexingProgress {
        let current = self.shared.progress_current.load(Ordering::SeqCst);
        let total = self.shared.progress_total.load(Ordering::SeqCst);
        #[allow(clippy::cast_precision_loss)]
        let percentage = if total == 0 {
            0.0
        } else {
            current as f32 / total as f32 * 100.0
        };
        IndexingProgress {
            current,
            total,
            percentage,
        }
    }
}
