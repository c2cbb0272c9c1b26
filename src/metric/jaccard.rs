//! Thresholded Jaccard distance over f32 inputs.

/// `1 - |A n B| / |A u B|` where `A = {i : a_i > 0.5}` and likewise for `B`.
///
/// Returns `0.0` when both sets are empty (two empty sets are identical).
///
/// # Panics
///
/// Panics if `a` and `b` have different lengths.
#[inline]
#[must_use]
pub fn distance(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(
        a.len(),
        b.len(),
        "dimension mismatch: {} != {}",
        a.len(),
        b.len()
    );

    let mut intersection = 0u32;
    let mut union = 0u32;
    for (x, y) in a.iter().zip(b.iter()) {
        let in_a = *x > 0.5;
        let in_b = *y > 0.5;
        intersection += u32::from(in_a && in_b);
        union += u32::from(in_a || in_b);
    }
    if union == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    {
        1.0 - intersection as f32 / union as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_sets() {
        // A = {0, 1}, B = {0, 2}: intersection 1, union 3.
        let a = [1.0f32, 1.0, 0.0, 0.0];
        let b = [1.0f32, 0.0, 1.0, 0.0];
        let expected = 1.0 - 1.0 / 3.0;
        assert!((distance(&a, &b) - expected).abs() < 1e-6);
    }

    #[test]
    fn identical_sets_score_zero() {
        let v = [1.0f32, 1.0, 0.0, 0.0];
        assert_eq!(distance(&v, &v), 0.0);
    }

    #[test]
    fn disjoint_sets_score_one() {
        let a = [1.0f32, 0.0];
        let b = [0.0f32, 1.0];
        assert_eq!(distance(&a, &b), 1.0);
    }

    #[test]
    fn both_empty_score_zero() {
        let a = [0.0f32; 4];
        assert_eq!(distance(&a, &a), 0.0);
    }
}
