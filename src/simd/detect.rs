//! Runtime SIMD capability detection.
//!
//! Detects CPU SIMD features once per process and selects the instruction
//! set every metric kernel will use. Selection happens at index
//! construction and never changes afterwards; the chosen ISA is exposed to
//! hosts through the facade's `isa` property.

use std::sync::OnceLock;

/// SIMD capabilities detected at runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct SimdCapabilities {
    /// AVX2 (256-bit vectors) available.
    pub avx2: bool,
    /// FMA (fused multiply-add) available.
    pub fma: bool,
    /// NEON (ARM 128-bit vectors) available.
    pub neon: bool,
    /// SVE (ARM scalable vectors) available.
    pub sve: bool,
}

impl SimdCapabilities {
    /// Detect SIMD capabilities of the current CPU.
    #[must_use]
    pub fn detect() -> Self {
        cfg_if::cfg_if! {
            if #[cfg(target_arch = "x86_64")] {
                Self {
                    avx2: is_x86_feature_detected!("avx2"),
                    fma: is_x86_feature_detected!("fma"),
                    neon: false,
                    sve: false,
                }
            } else if #[cfg(target_arch = "aarch64")] {
                Self {
                    avx2: false,
                    fma: false,
                    neon: std::arch::is_aarch64_feature_detected!("neon"),
                    sve: std::arch::is_aarch64_feature_detected!("sve"),
                }
            } else {
                Self::default()
            }
        }
    }
}

/// The instruction set a kernel table was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Isa {
    /// ARM NEON (128-bit).
    Neon,
    /// x86-64 AVX2 (256-bit).
    Avx2,
    /// ARM SVE. Reserved: stable Rust has no SVE intrinsics, so selection
    /// never yields this variant; it exists so the name set is complete.
    Sve,
    /// Portable scalar fallback.
    Serial,
}

impl Isa {
    /// Human-readable name reported through the facade.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Neon => "neon",
            Self::Avx2 => "avx2",
            Self::Sve => "sve",
            Self::Serial => "serial",
        }
    }
}

/// Global cached capabilities (detected once).
static CAPABILITIES: OnceLock<SimdCapabilities> = OnceLock::new();

/// Returns the cached SIMD capabilities, detecting on first call.
#[must_use]
pub fn capabilities() -> &'static SimdCapabilities {
    CAPABILITIES.get_or_init(SimdCapabilities::detect)
}

/// Selects the instruction set for kernel dispatch.
///
/// AVX2 on x86-64 when both AVX2 and FMA are present (the vector kernels
/// use fused multiply-add), NEON on aarch64 when present, serial otherwise.
/// SVE hardware still selects NEON (no stable SVE intrinsics).
#[must_use]
pub fn select_isa() -> Isa {
    let caps = capabilities();
    if caps.avx2 && caps.fma {
        Isa::Avx2
    } else if caps.neon {
        Isa::Neon
    } else {
        Isa::Serial
    }
}
