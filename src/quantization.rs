//! Symmetric scalar quantization (f32 -> i8).
//!
//! One scale per index. Encoding maps `[-s, s]` linearly onto `[-127, 127]`:
//!
//! ```text
//! i8  = round(clamp(x / s, -1, 1) * 127)
//! f32 = (i8 / 127) * s
//! ```
//!
//! Values outside `[-s, s]` clip. The scale is fixed for the life of the
//! index — either supplied by the caller or fitted once from the first
//! vector written — and is recorded in the on-disk header so a reloaded
//! index decodes bit-identically.

use serde::{Deserialize, Serialize};

/// Configuration for the symmetric i8 quantizer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuantizerConfig {
    /// Full-scale magnitude: the f32 value that maps to ±127.
    pub scale: f32,
}

impl Default for QuantizerConfig {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

/// Symmetric i8 scalar quantizer with a single per-index scale.
#[derive(Clone, Copy, Debug)]
pub struct ScalarQuantizer {
    config: QuantizerConfig,
}

impl ScalarQuantizer {
    /// Creates a quantizer with an explicit scale.
    ///
    /// Non-finite or non-positive scales fall back to 1.0.
    #[must_use]
    pub fn new(config: QuantizerConfig) -> Self {
        let scale = if config.scale.is_finite() && config.scale > 0.0 {
            config.scale
        } else {
            1.0
        };
        Self {
            config: QuantizerConfig { scale },
        }
    }

    /// Fits the scale from a single vector: its max absolute value.
    ///
    /// An all-zero (or empty) vector yields scale 1.0 so the quantizer
    /// stays usable.
    #[must_use]
    pub fn fit(vector: &[f32]) -> Self {
        let max_abs = vector
            .iter()
            .filter(|v| v.is_finite())
            .fold(0.0f32, |acc, v| acc.max(v.abs()));
        let scale = if max_abs > 0.0 { max_abs } else { 1.0 };
        Self {
            config: QuantizerConfig { scale },
        }
    }

    /// Encodes one f32 element.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn encode(&self, value: f32) -> i8 {
        let normalized = (value / self.config.scale).clamp(-1.0, 1.0);
        (normalized * 127.0).round() as i8
    }

    /// Decodes one i8 element.
    #[inline]
    #[must_use]
    pub fn decode(&self, code: i8) -> f32 {
        f32::from(code) / 127.0 * self.config.scale
    }

    /// Encodes a vector into `out` (cleared first).
    pub fn quantize_into(&self, vector: &[f32], out: &mut Vec<i8>) {
        out.clear();
        out.reserve(vector.len());
        for &v in vector {
            out.push(self.encode(v));
        }
    }

    /// Decodes a code slice into a fresh f32 vector.
    #[must_use]
    pub fn dequantize(&self, codes: &[i8]) -> Vec<f32> {
        codes.iter().map(|&c| self.decode(c)).collect()
    }

    /// The quantizer configuration.
    #[must_use]
    pub fn config(&self) -> QuantizerConfig {
        self.config
    }

    /// The full-scale magnitude.
    #[must_use]
    pub fn scale(&self) -> f32 {
        self.config.scale
    }
}
