//! End-to-end lifecycle coverage of the facade: metric contracts,
//! tie-breaking, update semantics, tombstones, and boundary behaviors.

use vectridx::{IndexError, IndexOptions, MetricKind, VectorIndex};

fn create(dimensions: u32, metric: MetricKind) -> VectorIndex {
    let options = IndexOptions {
        metric,
        ..IndexOptions::default()
    };
    VectorIndex::create(dimensions, options).unwrap()
}

#[test]
fn cosine_minimal_lifecycle() {
    let index = create(4, MetricKind::Cos);
    index.add(1, &[1.0, 0.0, 0.0, 0.0]).unwrap();
    index.add(2, &[0.0, 1.0, 0.0, 0.0]).unwrap();
    index.add(3, &[1.0, 1.0, 0.0, 0.0]).unwrap();

    let hits = index.search(&[1.0, 0.0, 0.0, 0.0], 2).unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].key, 1);
    assert!(hits[0].distance.abs() < 1e-5);
    assert_eq!(hits[1].key, 3);
    // 1 - 1/sqrt(2)
    assert!((hits[1].distance - 0.292_893).abs() < 1e-4);
}

#[test]
fn l2_squared_with_key_tiebreak() {
    let index = create(3, MetricKind::L2Sq);
    index.add(1, &[1.0, 0.0, 0.0]).unwrap();
    index.add(2, &[0.0, 1.0, 0.0]).unwrap();
    index.add(3, &[0.0, 0.0, 1.0]).unwrap();

    let hits = index.search(&[1.0, 0.0, 0.0], 3).unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].key, 1);
    assert!(hits[0].distance.abs() < 1e-6);
    // Keys 2 and 3 tie at distance 2.0; the smaller key wins.
    assert_eq!(hits[1].key, 2);
    assert!((hits[1].distance - 2.0).abs() < 1e-6);
    assert_eq!(hits[2].key, 3);
    assert!((hits[2].distance - 2.0).abs() < 1e-6);
}

#[test]
fn jaccard_over_f32() {
    let index = create(4, MetricKind::Jaccard);
    index.add(1, &[1.0, 1.0, 0.0, 0.0]).unwrap();
    index.add(2, &[1.0, 0.0, 1.0, 0.0]).unwrap();

    let hits = index.search(&[1.0, 1.0, 0.0, 0.0], 2).unwrap();
    assert_eq!(hits[0].key, 1);
    assert!(hits[0].distance.abs() < 1e-6);
    assert_eq!(hits[1].key, 2);
    assert!((hits[1].distance - 2.0 / 3.0).abs() < 1e-4);
}

#[test]
fn hamming_over_f32() {
    let index = create(4, MetricKind::Hamming);
    index.add(1, &[1.0, 0.0, 1.0, 0.0]).unwrap();
    index.add(2, &[1.0, 1.0, 1.0, 1.0]).unwrap();

    let hits = index.search(&[1.0, 0.0, 1.0, 0.0], 2).unwrap();
    assert_eq!(hits[0].key, 1);
    assert_eq!(hits[0].distance, 0.0);
    assert_eq!(hits[1].key, 2);
    assert_eq!(hits[1].distance, 2.0);
}

#[test]
fn update_moves_a_vector() {
    let index = create(4, MetricKind::Cos);
    index.add(1, &[1.0, 0.0, 0.0, 0.0]).unwrap();
    index.add(2, &[0.0, 1.0, 0.0, 0.0]).unwrap();
    index.add(3, &[1.0, 1.0, 0.0, 0.0]).unwrap();

    index.update(3, &[0.0, 0.0, 1.0, 0.0]).unwrap();

    let hits = index.search(&[1.0, 0.0, 0.0, 0.0], 3).unwrap();
    assert_eq!(hits[0].key, 1);
    // Keys 2 and 3 are now both orthogonal to the query (distance 1.0);
    // key 3 must not rank before key 2.
    assert_eq!(hits[1].key, 2);
    assert_eq!(hits[2].key, 3);

    let stored = index.get_item_vector(3).unwrap().unwrap();
    assert_eq!(stored, vec![0.0, 0.0, 1.0, 0.0]);
}

#[test]
fn update_of_unknown_key_is_an_add() {
    let index = create(2, MetricKind::L2Sq);
    index.update(9, &[1.0, 2.0]).unwrap();
    assert_eq!(index.count(), 1);
    assert_eq!(index.get_item_vector(9).unwrap().unwrap(), vec![1.0, 2.0]);
}

#[test]
fn empty_index_returns_no_results() {
    let index = create(4, MetricKind::Cos);
    let hits = index.search(&[1.0, 0.0, 0.0, 0.0], 5).unwrap();
    assert!(hits.is_empty());
}

#[test]
fn k_larger_than_count_returns_count() {
    let index = create(2, MetricKind::L2Sq);
    index.add(1, &[0.0, 0.0]).unwrap();
    index.add(2, &[1.0, 0.0]).unwrap();
    let hits = index.search(&[0.0, 0.0], 10).unwrap();
    assert_eq!(hits.len(), 2);
}

#[test]
fn self_query_returns_self() {
    let index = create(3, MetricKind::L2Sq);
    let vectors: Vec<(i64, [f32; 3])> = (0..50)
        .map(|i| {
            let x = i as f32;
            (i, [x, (x * 0.3).sin(), (x * 0.7).cos()])
        })
        .collect();
    for (key, v) in &vectors {
        index.add(*key, v).unwrap();
    }
    for (key, v) in &vectors {
        let hits = index.search(v, 1).unwrap();
        assert_eq!(hits[0].key, *key, "self-query missed for key {key}");
        assert!(hits[0].distance.abs() < 1e-5);
    }
}

#[test]
fn duplicate_add_fails_and_leaves_index_usable() {
    let index = create(2, MetricKind::L2Sq);
    index.add(1, &[1.0, 0.0]).unwrap();
    let err = index.add(1, &[0.0, 1.0]).unwrap_err();
    assert!(matches!(err, IndexError::Duplicate { key: 1 }));

    assert_eq!(index.count(), 1);
    assert_eq!(index.get_item_vector(1).unwrap().unwrap(), vec![1.0, 0.0]);
}

#[test]
fn remove_missing_key_fails() {
    let index = create(2, MetricKind::L2Sq);
    let err = index.remove(404).unwrap_err();
    assert!(matches!(err, IndexError::KeyMissing { key: 404 }));
}

#[test]
fn removed_keys_disappear_from_results() {
    let index = create(2, MetricKind::L2Sq);
    index.add(1, &[0.0, 0.0]).unwrap();
    index.add(2, &[0.1, 0.0]).unwrap();
    index.add(3, &[5.0, 5.0]).unwrap();

    index.remove(2).unwrap();
    assert_eq!(index.count(), 2);
    assert!(index.get_item_vector(2).unwrap().is_none());

    let hits = index.search(&[0.0, 0.0], 3).unwrap();
    let keys: Vec<i64> = hits.iter().map(|m| m.key).collect();
    assert_eq!(keys, vec![1, 3]);
}

#[test]
fn removing_every_key_then_reinserting_works() {
    let index = create(2, MetricKind::L2Sq);
    for key in 0..10 {
        index.add(key, &[key as f32, 0.0]).unwrap();
    }
    for key in 0..10 {
        index.remove(key).unwrap();
    }
    assert_eq!(index.count(), 0);
    assert!(index.search(&[0.0, 0.0], 3).unwrap().is_empty());

    // Keys are reusable after removal.
    index.add(3, &[9.0, 9.0]).unwrap();
    let hits = index.search(&[9.0, 9.0], 1).unwrap();
    assert_eq!(hits[0].key, 3);
}

#[test]
fn filtered_search_restricts_results_not_traversal() {
    let index = create(2, MetricKind::L2Sq);
    for key in 0..30 {
        let x = key as f32;
        index.add(key, &[x, x * 0.5]).unwrap();
    }

    let options = vectridx::SearchOptions {
        allowed_keys: Some(vec![7, 11, 23]),
    };
    let hits = index.search_with(&[7.0, 3.5], 5, &options).unwrap();
    assert!(!hits.is_empty());
    assert!(hits.len() <= 3);
    for hit in &hits {
        assert!([7, 11, 23].contains(&hit.key));
    }
    assert_eq!(hits[0].key, 7);
}

#[test]
fn filtered_search_with_empty_allowlist_returns_nothing() {
    let index = create(2, MetricKind::L2Sq);
    index.add(1, &[0.0, 0.0]).unwrap();
    let options = vectridx::SearchOptions {
        allowed_keys: Some(vec![]),
    };
    let hits = index.search_with(&[0.0, 0.0], 5, &options).unwrap();
    assert!(hits.is_empty());
}

#[test]
fn count_tracks_successful_mutations_only() {
    let index = create(2, MetricKind::L2Sq);
    index.add(1, &[1.0, 0.0]).unwrap();
    index.add(2, &[0.0, 1.0]).unwrap();
    let _ = index.add(1, &[9.0, 9.0]); // duplicate, fails
    let _ = index.remove(99); // missing, fails
    index.remove(1).unwrap();
    assert_eq!(index.count(), 1);
}

#[test]
fn search_results_are_keys_with_vectors() {
    let index = create(2, MetricKind::L2Sq);
    for key in 0..20 {
        index.add(key, &[key as f32, 1.0]).unwrap();
    }
    for hit in index.search(&[4.2, 1.0], 6).unwrap() {
        assert!(index.get_item_vector(hit.key).unwrap().is_some());
    }
}

#[test]
fn dimension_mismatch_is_rejected_everywhere() {
    let index = create(3, MetricKind::L2Sq);
    assert!(matches!(
        index.add(1, &[1.0, 2.0]),
        Err(IndexError::Dimension {
            expected: 3,
            actual: 2
        })
    ));
    assert!(matches!(
        index.search(&[1.0, 2.0, 3.0, 4.0], 1),
        Err(IndexError::Dimension { .. })
    ));
    assert!(matches!(
        index.update(1, &[1.0]),
        Err(IndexError::Dimension { .. })
    ));
}

#[test]
fn i8_index_keeps_ranking_within_tolerance() {
    let options = IndexOptions {
        metric: MetricKind::L2Sq,
        i8_scale: Some(1.0),
        ..IndexOptions::default()
    }
    .with_quantization_name("i8")
    .unwrap();
    let index = VectorIndex::create(4, options).unwrap();

    index.add(1, &[1.0, 0.0, 0.0, 0.0]).unwrap();
    index.add(2, &[0.0, 1.0, 0.0, 0.0]).unwrap();
    index.add(3, &[0.9, 0.1, 0.0, 0.0]).unwrap();

    let hits = index.search(&[1.0, 0.0, 0.0, 0.0], 3).unwrap();
    assert_eq!(hits[0].key, 1);
    assert_eq!(hits[1].key, 3);
    assert_eq!(hits[2].key, 2);
    assert!(hits[0].distance.abs() < 5e-3);

    // Stored vector round-trips within quantization tolerance.
    let stored = index.get_item_vector(3).unwrap().unwrap();
    for (a, b) in stored.iter().zip([0.9, 0.1, 0.0, 0.0]) {
        assert!((a - b).abs() < 5e-3);
    }
}
