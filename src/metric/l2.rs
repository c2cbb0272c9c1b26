//! Squared-L2 (Euclidean squared) distance.

/// Serial squared-L2 distance: `sum((a_i - b_i)^2)`.
///
/// The square root is deliberately omitted: squared distances preserve
/// ordering and skip a `sqrt` per comparison.
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

    let mut sum = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        let diff = x - y;
        sum += diff * diff;
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_distance() {
        let a = [1.0f32, 0.0, 0.0];
        let b = [0.0f32, 1.0, 0.0];
        assert!((distance(&a, &b) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn zero_for_identical() {
        let v = [3.5f32, -2.0, 0.25];
        assert_eq!(distance(&v, &v), 0.0);
    }
}
