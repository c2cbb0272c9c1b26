use crate::error::{IndexError, Result};
use serde::{Deserialize, Serialize};

/// HNSW algorithm parameters.
///
/// # Parameter guidelines (from the paper)
/// - `m`: 12-48 for high recall, 4-8 for speed
/// - `ef_construction`: higher = better graph quality, slower build
/// - `ef_search`: higher = better recall, slower search
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HnswParams {
    /// Max connections per node in layers above 0.
    pub m: u32,

    /// Max connections per node in layer 0 (2 * m).
    pub m0: u32,

    /// Construction-time beam width.
    pub ef_construction: u32,

    /// Search-time beam width.
    pub ef_search: u32,
}

impl HnswParams {
    /// Default `m`.
    pub const DEFAULT_M: u32 = 16;
    /// Default construction beam width.
    pub const DEFAULT_EF_CONSTRUCTION: u32 = 64;
    /// Default search beam width.
    pub const DEFAULT_EF_SEARCH: u32 = 64;

    /// Builds parameters with `m0 = 2 * m`.
    #[must_use]
    pub fn new(m: u32, ef_construction: u32, ef_search: u32) -> Self {
        Self {
            m,
            m0: m.saturating_mul(2),
            ef_construction,
            ef_search,
        }
    }

    /// Validates the parameter set.
    ///
    /// # Errors
    ///
    /// [`IndexError::Config`] when `m < 2`, `m0 < m`, or a beam width is 0.
    pub fn validate(&self) -> Result<()> {
        if self.m < 2 {
            return Err(IndexError::Config(format!("m must be >= 2, got {}", self.m)));
        }
        if self.m0 < self.m {
            return Err(IndexError::Config(format!(
                "m0 must be >= m, got {} < {}",
                self.m0, self.m
            )));
        }
        if self.ef_construction == 0 {
            return Err(IndexError::Config("ef_construction must be > 0".into()));
        }
        if self.ef_search == 0 {
            return Err(IndexError::Config("ef_search must be > 0".into()));
        }
        Ok(())
    }

    /// Max connections for a layer.
    #[must_use]
    pub fn max_connections(&self, layer: u8) -> usize {
        if layer == 0 {
            self.m0 as usize
        } else {
            self.m as usize
        }
    }
}

impl Default for HnswParams {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_M,
            Self::DEFAULT_EF_CONSTRUCTION,
            Self::DEFAULT_EF_SEARCH,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let p = HnswParams::default();
        assert_eq!(p.m, 16);
        assert_eq!(p.m0, 32);
        assert_eq!(p.ef_construction, 64);
        assert_eq!(p.ef_search, 64);
        p.validate().unwrap();
    }

    #[test]
    fn rejects_degenerate_m() {
        let p = HnswParams::new(1, 64, 64);
        assert!(matches!(p.validate(), Err(IndexError::Config(_))));
    }

    #[test]
    fn rejects_zero_beam() {
        let p = HnswParams {
            ef_search: 0,
            ..HnswParams::default()
        };
        assert!(matches!(p.validate(), Err(IndexError::Config(_))));
    }

    #[test]
    fn layer_caps() {
        let p = HnswParams::default();
        assert_eq!(p.max_connections(0), 32);
        assert_eq!(p.max_connections(1), 16);
        assert_eq!(p.max_connections(7), 16);
    }
}
