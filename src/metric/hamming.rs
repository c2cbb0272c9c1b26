//! Thresholded Hamming distance over f32 inputs.

/// Number of positions whose bits differ after thresholding at 0.5.
///
/// Intended for binary embeddings shipped as f32 buffers: each element is
/// mapped to a bit (`x > 0.5`) and the distance is the count of differing
/// bits.
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

    let mut mismatches = 0u32;
    for (x, y) in a.iter().zip(b.iter()) {
        mismatches += u32::from((*x > 0.5) != (*y > 0.5));
    }
    // Counts up to the dimensionality fit f32's mantissa exactly.
    #[allow(clippy::cast_precision_loss)]
    {
        mismatches as f32
    }
}
