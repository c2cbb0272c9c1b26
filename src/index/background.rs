//! Background-indexing worker and the state it shares with the facade.
//!
//! Bulk operations (`add_batch`, `load_vectors_from_file`) copy their input
//! up front and run on a dedicated worker thread. The worker takes the core
//! mutex once per item, so synchronous searches interleave between items
//! and always observe a consistent prefix of the batch.
//!
//! Cancellation uses a generation counter instead of shared ownership of
//! the core: the worker remembers the generation it started under and
//! re-checks it under the lock at every loop boundary. `destroy()` bumps
//! the counter, so a cancelled task ends with a deleted-state error in the
//! last-result cell and never touches released state.

use crate::error::IndexError;
use crate::hnsw::{HnswGraph, HnswParams, SearchContext};
use crate::metric::MetricKind;
use crate::simd::Isa;
use crate::storage::{ScalarKind, VectorStore};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Host-injected diagnostic sink.
pub type DebugCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// The mutex-protected mutable half of an index.
pub(crate) struct Core {
    pub store: VectorStore,
    pub graph: HnswGraph,
    /// Traversal scratch reused by every operation under the lock.
    pub ctx: SearchContext,
}

impl Core {
    /// Stores a vector and wires it into the graph.
    ///
    /// If graph insertion fails the storage slot is tombstoned again so
    /// the two slot tables stay parallel.
    pub fn insert(&mut self, key: i64, vector: &[f32]) -> Result<(), IndexError> {
        let slot = self.store.put(key, vector)?;
        if let Err(e) = self.graph.insert_slot(&self.store, slot, &mut self.ctx) {
            let _ = self.store.drop_key(key);
            return Err(e);
        }
        Ok(())
    }
}

/// Result of the most recent background task.
pub(crate) struct TaskOutcome {
    pub duration: Duration,
    pub count: usize,
    pub error: Option<IndexError>,
}

/// State shared between facade handles and the worker thread.
pub(crate) struct Shared {
    pub core: Mutex<Option<Core>>,
    pub destroyed: AtomicBool,
    /// True while a background task is in flight; doubles as the busy gate.
    pub indexing: AtomicBool,
    pub progress_current: AtomicUsize,
    pub progress_total: AtomicUsize,
    /// Bumped by `destroy()`; workers abort on mismatch.
    pub generation: AtomicU64,
    pub last: Mutex<Option<TaskOutcome>>,
    pub debug: Option<DebugCallback>,

    // Immutable configuration, readable without the lock.
    pub dimensions: u32,
    pub scalar: ScalarKind,
    pub metric: MetricKind,
    pub params: HnswParams,
    pub isa: Isa,
    pub seed: u64,
}

impl Shared {
    pub fn debug_log(&self, message: &str) {
        if let Some(callback) = &self.debug {
            callback(message);
        }
    }
}

/// Launches the ingest worker for a copied batch.
///
/// The caller must already hold the busy claim (`indexing` flipped to
/// true); this function publishes the progress counters and spawns.
pub(crate) fn spawn_ingest(shared: Arc<Shared>, items: Vec<(i64, Vec<f32>)>, label: &'static str) {
    let generation = shared.generation.load(Ordering::SeqCst);
    shared.progress_current.store(0, Ordering::SeqCst);
    shared.progress_total.store(items.len(), Ordering::SeqCst);

    std::thread::spawn(move || run_ingest(&shared, generation, items, label));
}

fn run_ingest(shared: &Shared, generation: u64, items: Vec<(i64, Vec<f32>)>, label: &str) {
    let started = Instant::now();
    let mut inserted = 0usize;
    let mut error: Option<IndexError> = None;

    for (processed, (key, vector)) in items.into_iter().enumerate() {
        // One lock per item keeps searches responsive between items.
        let mut guard = shared.core.lock();
        if shared.generation.load(Ordering::SeqCst) != generation {
            error = Some(IndexError::DeletedState);
            break;
        }
        let Some(core) = guard.as_mut() else {
            error = Some(IndexError::DeletedState);
            break;
        };
        match core.insert(key, &vector) {
            Ok(()) => {
                inserted += 1;
                shared
                    .progress_current
                    .store(processed + 1, Ordering::SeqCst);
            }
            Err(e) => {
                error = Some(e);
                break;
            }
        }
    }

    match &error {
        None => shared.debug_log(&format!("{label}: inserted {inserted} vectors")),
        Some(e) => {
            shared.debug_log(&format!("{label}: aborted after {inserted} vectors: {e}"));
            if matches!(e, IndexError::Internal(_)) {
                log::error!("{label}: internal error in background task: {e}");
            }
        }
    }

    *shared.last.lock() = Some(TaskOutcome {
        duration: started.elapsed(),
        count: inserted,
        error,
    });
    // Clear the busy flag last so a host that observes `!is_indexing`
    // always finds the outcome in place.
    shared.indexing.store(false, Ordering::SeqCst);
}
