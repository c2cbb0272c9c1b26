//! Background-indexing protocol: progress, the busy gate, interleaved
//! searches, cancellation, and error reporting via the last result.

use std::time::{Duration, Instant};
use vectridx::{IndexError, IndexOptions, MetricKind, VectorIndex};

const DIM: usize = 16;

fn create() -> VectorIndex {
    let options = IndexOptions {
        metric: MetricKind::L2Sq,
        ..IndexOptions::default()
    };
    VectorIndex::create(DIM as u32, options).unwrap()
}

fn batch(n: usize) -> (Vec<i64>, Vec<f32>) {
    let keys: Vec<i64> = (0..n as i64).collect();
    let mut vectors = Vec::with_capacity(n * DIM);
    for i in 0..n {
        let x = i as f32;
        for d in 0..DIM {
            vectors.push((x * 0.1 + d as f32).sin());
        }
    }
    (keys, vectors)
}

fn wait_until_idle(index: &VectorIndex) {
    let deadline = Instant::now() + Duration::from_secs(30);
    while index.is_indexing() {
        assert!(Instant::now() < deadline, "background task never finished");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn batch_reports_progress_and_final_count() {
    let index = create();
    let (keys, vectors) = batch(1000);

    index.add_batch(&keys, &vectors).unwrap();

    // Immediately after the call the task is claimed and sized.
    assert!(index.is_indexing());
    let progress = index.indexing_progress();
    assert_eq!(progress.total, 1000);
    assert!(progress.current <= 1000);

    wait_until_idle(&index);

    let report = index.last_result().unwrap().unwrap();
    assert_eq!(report.count, 1000);
    assert!(report.duration_ms >= 0.0);
    assert_eq!(index.count(), 1000);

    let done = index.indexing_progress();
    assert_eq!(done.current, 1000);
    assert!((done.percentage - 100.0).abs() < f32::EPSILON);

    // The report is consumed on read.
    assert!(index.last_result().unwrap().is_none());
}

#[test]
fn conflicting_operations_fail_busy_while_batch_runs() {
    let index = create();
    index.add(5000, &vec![0.5; DIM]).unwrap();

    let (keys, vectors) = batch(3000);
    index.add_batch(&keys, &vectors).unwrap();

    // Checked right after spawn: the worker cannot have drained 3000
    // items yet.
    assert!(matches!(
        index.remove(5000),
        Err(IndexError::Busy(_))
    ));
    assert!(matches!(
        index.update(5000, &vec![0.1; DIM]),
        Err(IndexError::Busy(_))
    ));
    assert!(matches!(
        index.save("/tmp/busy.bin"),
        Err(IndexError::Busy(_))
    ));
    assert!(matches!(
        index.load("/tmp/busy.bin"),
        Err(IndexError::Busy(_))
    ));
    let (more_keys, more_vectors) = batch(10);
    assert!(matches!(
        index.add_batch(&more_keys, &more_vectors),
        Err(IndexError::Busy(_))
    ));

    wait_until_idle(&index);
    index.last_result().unwrap().unwrap();

    // After completion the gate opens again.
    index.remove(5000).unwrap();
}

#[test]
fn searches_interleave_and_observe_growing_prefix() {
    let index = create();
    let (keys, vectors) = batch(2000);
    index.add_batch(&keys, &vectors).unwrap();

    let query = vec![0.25; DIM];
    let mut last_len = 0usize;
    let mut observations = 0usize;
    while index.is_indexing() {
        let hits = index.search(&query, 50).unwrap();
        assert!(
            hits.len() >= last_len,
            "result set shrank during batch: {} -> {}",
            last_len,
            hits.len()
        );
        last_len = hits.len();
        observations += 1;
        std::thread::sleep(Duration::from_millis(2));
    }
    assert!(observations > 0, "batch finished before a single search");

    wait_until_idle(&index);
    index.last_result().unwrap().unwrap();
    assert_eq!(index.search(&query, 50).unwrap().len(), 50);
}

#[test]
fn synchronous_add_is_allowed_during_batch() {
    let index = create();
    let (keys, vectors) = batch(2000);
    index.add_batch(&keys, &vectors).unwrap();

    // Point adds are not busy-gated; a key outside the batch range lands.
    index.add(1_000_000, &vec![9.0; DIM]).unwrap();

    wait_until_idle(&index);
    index.last_result().unwrap().unwrap();
    assert_eq!(index.count(), 2001);
}

#[test]
fn batch_shape_mismatch_is_a_buffer_error() {
    let index = create();
    let (keys, mut vectors) = batch(10);
    vectors.pop();
    assert!(matches!(
        index.add_batch(&keys, &vectors),
        Err(IndexError::Buffer(_))
    ));
    assert!(!index.is_indexing());
    assert_eq!(index.count(), 0);
}

#[test]
fn empty_batch_is_a_buffer_error() {
    let index = create();
    assert!(matches!(
        index.add_batch(&[], &[]),
        Err(IndexError::Buffer(_))
    ));
}

#[test]
fn batch_with_nan_is_rejected_synchronously() {
    let index = create();
    let (keys, mut vectors) = batch(4);
    vectors[2 * DIM + 3] = f32::NAN;
    assert!(matches!(
        index.add_batch(&keys, &vectors),
        Err(IndexError::Buffer(_))
    ));
    assert_eq!(index.count(), 0);
}

#[test]
fn duplicate_key_aborts_batch_into_last_result() {
    let index = create();
    index.add(3, &vec![0.5; DIM]).unwrap();

    let (keys, vectors) = batch(10); // contains key 3
    index.add_batch(&keys, &vectors).unwrap();
    wait_until_idle(&index);

    match index.last_result() {
        Err(IndexError::Duplicate { key: 3 }) => {}
        other => panic!("expected Duplicate(3), got {other:?}"),
    }
    // Items before the collision landed: keys 0, 1, 2 plus the original.
    assert_eq!(index.count(), 4);
    // The error is consumed by the read.
    assert!(index.last_result().unwrap().is_none());
}

#[test]
fn destroy_cancels_a_running_batch() {
    let index = create();
    let (keys, vectors) = batch(5000);
    index.add_batch(&keys, &vectors).unwrap();
    assert!(index.is_indexing());

    index.destroy();

    // The worker observes the bumped generation at its next loop boundary
    // and winds down without touching released state.
    wait_until_idle(&index);
    assert_eq!(index.count(), 0);
    assert!(matches!(
        index.last_result(),
        Err(IndexError::DeletedState)
    ));
}

#[test]
fn add_batch_from_raw_roundtrips() {
    let index = create();
    let (keys, vectors) = batch(50);
    // Viewing the f32 buffer as bytes keeps the 4-byte alignment the raw
    // entry point requires.
    let bytes: &[u8] = bytemuck::cast_slice(&vectors);

    index.add_batch_from_raw(&keys, bytes).unwrap();
    wait_until_idle(&index);
    assert_eq!(index.last_result().unwrap().unwrap().count, 50);

    for key in &keys {
        assert!(index.get_item_vector(*key).unwrap().is_some());
    }
}
