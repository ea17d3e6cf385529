//! Input size sweeps
//!
//! Every sampler iterates a [`SizeSweep`]: a non-empty, strictly ascending list of
//! positive byte lengths. Latency and memory use the fine sweep; CPU uses the
//! coarse one because instantaneous CPU readings are meaningless for tiny inputs.

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};

/// Fine-grained sizes used for latency and memory sampling
pub const FINE_SIZES: [usize; 5] = [10, 100, 1_000, 10_000, 100_000];

/// Coarse sizes used for CPU sampling
pub const COARSE_SIZES: [usize; 3] = [1_000, 10_000, 100_000];

/// An ordered sequence of payload sizes in bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct SizeSweep {
    sizes: Vec<usize>,
}

impl SizeSweep {
    /// Build a sweep, rejecting empty, zero-sized or unordered input
    pub fn new(sizes: Vec<usize>) -> Result<Self> {
        if sizes.is_empty() {
            return Err(BenchError::InvalidSweep("sweep must not be empty".to_string()));
        }
        if let Some(pos) = sizes.iter().position(|&s| s == 0) {
            return Err(BenchError::InvalidSweep(format!(
                "size at position {} is zero",
                pos
            )));
        }
        if let Some(w) = sizes.windows(2).find(|w| w[0] >= w[1]) {
            return Err(BenchError::InvalidSweep(format!(
                "sizes must be strictly ascending ({} followed by {})",
                w[0], w[1]
            )));
        }
        Ok(Self { sizes })
    }

    /// Five power-of-ten steps from 10 to 100,000 bytes
    pub fn fine() -> Self {
        Self {
            sizes: FINE_SIZES.to_vec(),
        }
    }

    /// 1,000, 10,000 and 100,000 bytes
    pub fn coarse() -> Self {
        Self {
            sizes: COARSE_SIZES.to_vec(),
        }
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    /// Always false for a constructed sweep
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.sizes.iter().copied()
    }
}

impl TryFrom<Vec<usize>> for SizeSweep {
    type Error = BenchError;

    fn try_from(sizes: Vec<usize>) -> Result<Self> {
        Self::new(sizes)
    }
}

impl From<SizeSweep> for Vec<usize> {
    fn from(sweep: SizeSweep) -> Self {
        sweep.sizes
    }
}

/// All-zero payload of `size` bytes
pub fn zero_payload(size: usize) -> Vec<u8> {
    vec![0u8; size]
}
