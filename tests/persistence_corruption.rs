//! Corruption handling: bit rot, truncation, and foreign files must come
//! back as typed errors, never as a half-loaded index.

use proptest::prelude::*;
use tempfile::tempdir;
use vectridx::{IndexError, IndexOptions, MetricKind, VectorIndex};

const HEADER_LEN: usize = 64;

fn build_file(n: i64) -> (tempfile::TempDir, String) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("victim.bin");
    let path_str = path.to_str().unwrap().to_owned();

    let options = IndexOptions {
        metric: MetricKind::L2Sq,
        ..IndexOptions::default()
    };
    let index = VectorIndex::create(4, options).unwrap();
    for key in 0..n {
        let x = key as f32;
        index.add(key, &[x, x * 0.5, -x, 1.0]).unwrap();
    }
    index.save(&path_str).unwrap();
    (dir, path_str)
}

fn fresh_index() -> VectorIndex {
    let options = IndexOptions {
        metric: MetricKind::L2Sq,
        ..IndexOptions::default()
    };
    VectorIndex::create(4, options).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// A single flipped bit in the body must surface as `Corrupted`.
    #[test]
    fn body_bit_rot_is_detected(seed in 0usize..10_000) {
        let (_dir, path) = build_file(12);
        let mut bytes = std::fs::read(&path).unwrap();

        let body_len = bytes.len() - HEADER_LEN;
        let byte = HEADER_LEN + seed % body_len;
        let bit = (seed / body_len) % 8;
        bytes[byte] ^= 1 << bit;
        std::fs::write(&path, &bytes).unwrap();

        match fresh_index().load(&path) {
            Err(IndexError::Corrupted(_)) => {}
            // Flipping inside the trailing CRC itself also reads as a
            // mismatch; anything else is a bug.
            other => panic!("expected Corrupted, got {other:?}"),
        }
    }

    /// A single flipped bit in the header is `Corrupted` (CRC) or, if it
    /// hits the magic bytes, `Format`.
    #[test]
    fn header_bit_rot_is_detected(seed in 0usize..4_000) {
        let (_dir, path) = build_file(6);
        let mut bytes = std::fs::read(&path).unwrap();

        let byte = seed % HEADER_LEN;
        let bit = (seed / HEADER_LEN) % 8;
        bytes[byte] ^= 1 << bit;
        std::fs::write(&path, &bytes).unwrap();

        match fresh_index().load(&path) {
            Err(IndexError::Corrupted(_) | IndexError::Format(_)) => {}
            other => panic!("expected Corrupted or Format, got {other:?}"),
        }
    }

    /// Truncation anywhere must be a typed failure, and the receiving
    /// index must keep its previous contents.
    #[test]
    fn truncation_is_detected(cut in 1usize..2_000) {
        let (_dir, path) = build_file(12);
        let bytes = std::fs::read(&path).unwrap();
        let cut = cut.min(bytes.len() - 1);
        std::fs::write(&path, &bytes[..bytes.len() - cut]).unwrap();

        let index = fresh_index();
        index.add(777, &[9.0, 9.0, 9.0, 9.0]).unwrap();

        match index.load(&path) {
            Err(
                IndexError::Corrupted(_) | IndexError::Format(_),
            ) => {}
            other => panic!("expected Corrupted or Format, got {other:?}"),
        }
        // The failed load must not have swapped anything in.
        assert_eq!(index.count(), 1);
        assert!(index.get_item_vector(777).unwrap().is_some());
    }
}

#[test]
fn foreign_file_is_format_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("not-an-index.bin");
    std::fs::write(&path, b"definitely not a vector index file, sorry").unwrap();

    match fresh_index().load(path.to_str().unwrap()) {
        Err(IndexError::Format(_)) => {}
        other => panic!("expected Format, got {other:?}"),
    }
}

#[test]
fn empty_file_is_format_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.bin");
    std::fs::write(&path, b"").unwrap();

    assert!(matches!(
        fresh_index().load(path.to_str().unwrap()),
        Err(IndexError::Format(_))
    ));
}

#[test]
fn extra_trailing_bytes_are_rejected() {
    let (_dir, path) = build_file(6);
    let mut bytes = std::fs::read(&path).unwrap();
    bytes.extend_from_slice(&[0u8; 16]);
    std::fs::write(&path, &bytes).unwrap();

    match fresh_index().load(&path) {
        Err(IndexError::Format(_) | IndexError::Corrupted(_)) => {}
        other => panic!("expected Format or Corrupted, got {other:?}"),
    }
}
