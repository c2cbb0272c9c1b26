//! Inner-product distance.

/// Serial inner-product distance: `-sum(a_i * b_i)`.
///
/// The dot product is negated so that larger similarity maps to smaller
/// distance, matching the shared lower-is-closer contract.
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
        sum += x * y;
    }
    -sum
}
