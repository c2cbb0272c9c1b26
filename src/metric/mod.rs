//! Distance metrics.
//!
//! Every metric is a pure function `(a, b) -> f32` over equal-length f32
//! slices where **lower means more similar**. The concrete function is
//! picked once, at index construction, from the metric kind and the
//! detected instruction set; after that every distance call is a plain
//! indirect call with no dispatch logic on the hot path.

use crate::simd::{select_isa, Isa};
use serde::{Deserialize, Serialize};

/// Cosine distance kernel.
pub mod cosine;
/// Inner-product distance kernel.
pub mod dot;
/// Thresholded Hamming distance kernel.
pub mod hamming;
/// Thresholded Jaccard distance kernel.
pub mod jaccard;
/// Squared-L2 distance kernel.
pub mod l2;
/// AVX2 / NEON kernel variants.
pub mod simd;

/// Identifies one of the supported distance metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricKind {
    /// `1 - dot(a,b) / (|a|*|b|)`, range `[0, 2]`. Zero-norm inputs score 1.0.
    Cos,
    /// `sum((a_i - b_i)^2)`. No square root: ranking-equivalent and cheaper.
    L2Sq,
    /// `-dot(a,b)`, negated so smaller is more similar.
    Ip,
    /// Differing bits after thresholding each element at 0.5.
    Hamming,
    /// `1 - |A n B| / |A u B|` over the sets `{i : x_i > 0.5}`. Both empty -> 0.0.
    Jaccard,
}

impl MetricKind {
    /// Canonical metric name as accepted by the factory.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Cos => "cos",
            Self::L2Sq => "l2sq",
            Self::Ip => "ip",
            Self::Hamming => "hamming",
            Self::Jaccard => "jaccard",
        }
    }

    /// Wire code used by the on-disk header.
    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            Self::Cos => 0,
            Self::L2Sq => 1,
            Self::Ip => 2,
            Self::Hamming => 3,
            Self::Jaccard => 4,
        }
    }

    /// Inverse of [`MetricKind::code`].
    #[must_use]
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::Cos),
            1 => Some(Self::L2Sq),
            2 => Some(Self::Ip),
            3 => Some(Self::Hamming),
            4 => Some(Self::Jaccard),
            _ => None,
        }
    }

    /// Parses a factory metric name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "cos" => Some(Self::Cos),
            "l2sq" => Some(Self::L2Sq),
            "ip" => Some(Self::Ip),
            "hamming" => Some(Self::Hamming),
            "jaccard" => Some(Self::Jaccard),
            _ => None,
        }
    }
}

/// Signature shared by every distance kernel.
pub type DistanceFn = fn(&[f32], &[f32]) -> f32;

/// A distance kernel bound to a metric and an instruction set.
///
/// `Copy` on purpose: the graph and facade pass it by value and call
/// through the function pointer directly.
#[derive(Debug, Clone, Copy)]
pub struct Kernel {
    kind: MetricKind,
    isa: Isa,
    f: DistanceFn,
}

impl Kernel {
    /// Selects the kernel for `kind` on the current CPU.
    #[must_use]
    pub fn select(kind: MetricKind) -> Self {
        let isa = select_isa();
        Self::with_isa(kind, isa)
    }

    /// Builds the kernel for an explicit instruction set.
    ///
    /// Used by `select` and by tests that compare vector and serial paths.
    /// Requesting an ISA the CPU lacks falls back to serial; `Sve` always
    /// falls back (no stable intrinsics).
    #[must_use]
    pub fn with_isa(kind: MetricKind, isa: Isa) -> Self {
        // Hamming and Jaccard are threshold-compare loops; they run serial
        // on every ISA.
        let (f, isa): (DistanceFn, Isa) = match kind {
            MetricKind::Cos => match isa {
                #[cfg(target_arch = "x86_64")]
                Isa::Avx2 => (simd::x86::cosine, Isa::Avx2),
                #[cfg(target_arch = "aarch64")]
                Isa::Neon => (simd::neon::cosine, Isa::Neon),
                _ => (cosine::distance, Isa::Serial),
            },
            MetricKind::L2Sq => match isa {
                #[cfg(target_arch = "x86_64")]
                Isa::Avx2 => (simd::x86::l2_squared, Isa::Avx2),
                #[cfg(target_arch = "aarch64")]
                Isa::Neon => (simd::neon::l2_squared, Isa::Neon),
                _ => (l2::distance, Isa::Serial),
            },
            MetricKind::Ip => match isa {
                #[cfg(target_arch = "x86_64")]
                Isa::Avx2 => (simd::x86::inner_product, Isa::Avx2),
                #[cfg(target_arch = "aarch64")]
                Isa::Neon => (simd::neon::inner_product, Isa::Neon),
                _ => (dot::distance, Isa::Serial),
            },
            MetricKind::Hamming => (hamming::distance, isa),
            MetricKind::Jaccard => (jaccard::distance, isa),
        };
        Self { kind, isa, f }
    }

    /// Computes the distance between two equal-length vectors.
    #[inline]
    #[must_use]
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        (self.f)(a, b)
    }

    /// The metric this kernel computes.
    #[must_use]
    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// The instruction set the kernel was built for.
    #[must_use]
    pub fn isa(&self) -> Isa {
        self.isa
    }
}
