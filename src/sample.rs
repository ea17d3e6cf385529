//! Sample tuples produced by the samplers

use serde::{Deserialize, Serialize};

/// Bytes per reported kilobyte
pub const BYTES_PER_KB: f64 = 1024.0;

/// One encrypt and one decrypt timing for a single payload size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencySample {
    /// Payload size in bytes
    pub size: usize,
    /// Encrypt duration in seconds
    pub encrypt_secs: f64,
    /// Decrypt duration in seconds
    pub decrypt_secs: f64,
}

/// Heap usage attributed to one primitive call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemorySample {
    /// Payload size in bytes
    pub size: usize,
    /// Allocation still outstanding when the trace was read, in KB
    pub current_kb: f64,
    /// Highest outstanding allocation seen during the call, in KB
    pub peak_kb: f64,
}

impl MemorySample {
    /// Build a sample from raw byte counts
    pub fn from_bytes(size: usize, current_bytes: usize, peak_bytes: usize) -> Self {
        Self {
            size,
            current_kb: current_bytes as f64 / BYTES_PER_KB,
            peak_kb: peak_bytes as f64 / BYTES_PER_KB,
        }
    }
}

/// Process CPU utilization delta around one primitive call.
///
/// `percent_delta` is `after - before` of two instantaneous readings and may be
/// zero or negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CpuSample {
    /// Payload size in bytes
    pub size: usize,
    /// Utilization after the call minus utilization before it, in percent
    pub percent_delta: f64,
}

/// Encryption and decryption series over the same sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairedSeries<T> {
    pub encryption: Vec<T>,
    pub decryption: Vec<T>,
}

impl<T> PairedSeries<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            encryption: Vec::with_capacity(capacity),
            decryption: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.encryption.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encryption.is_empty()
    }
}
