//! Heap allocation sampling
//!
//! [`MemorySampler`] brackets each primitive call with a [`TraceSession`]: the
//! session starts the tracer right before the call and stops it when dropped, so
//! a failing call never leaves tracing switched on for the next measurement.

pub mod alloc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::primitive::CipherPrimitive;
use crate::sample::{MemorySample, PairedSeries};
use crate::sweep::{zero_payload, SizeSweep};

pub use self::alloc::{AllocationTracer, TrackingAllocator};

/// Outstanding and high-water allocation for a traced region, in bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapUsage {
    pub current_bytes: usize,
    pub peak_bytes: usize,
}

/// Heap allocation tracing capability
pub trait HeapTracer {
    /// Reset counters and begin tracing
    fn start(&self) -> Result<()>;

    /// Counters accumulated since `start`
    fn usage(&self) -> HeapUsage;

    /// End tracing and discard counters
    fn stop(&self);
}

/// Scoped trace; stopping happens on drop
pub struct TraceSession<'a> {
    tracer: &'a dyn HeapTracer,
}

impl<'a> TraceSession<'a> {
    pub fn open(tracer: &'a dyn HeapTracer) -> Result<Self> {
        tracer.start()?;
        Ok(Self { tracer })
    }

    pub fn usage(&self) -> HeapUsage {
        self.tracer.usage()
    }
}

impl Drop for TraceSession<'_> {
    fn drop(&mut self) {
        self.tracer.stop();
    }
}

/// Measures heap usage of one encrypt and one decrypt per payload size
pub struct MemorySampler<'a> {
    cipher: &'a dyn CipherPrimitive,
    key: &'a str,
    tracer: &'a dyn HeapTracer,
}

impl<'a> MemorySampler<'a> {
    pub fn new(cipher: &'a dyn CipherPrimitive, key: &'a str, tracer: &'a dyn HeapTracer) -> Self {
        Self {
            cipher,
            key,
            tracer,
        }
    }

    /// Encryption and decryption series, both in sweep order
    pub fn measure(&self, sweep: &SizeSweep) -> Result<PairedSeries<MemorySample>> {
        let mut results = PairedSeries::with_capacity(sweep.len());

        for size in sweep.iter() {
            let message = zero_payload(size);

            let (encrypted, enc_usage) = {
                let session = TraceSession::open(self.tracer)?;
                let encrypted = self.cipher.encrypt(self.key, &message)?;
                (encrypted, session.usage())
            };

            let dec_usage = {
                let session = TraceSession::open(self.tracer)?;
                // Plaintext is dropped before reading, as it is not kept by the caller.
                drop(self.cipher.decrypt(self.key, &encrypted)?);
                session.usage()
            };

            log::debug!(
                "memory size={} enc(current={}B peak={}B) dec(current={}B peak={}B)",
                size,
                enc_usage.current_bytes,
                enc_usage.peak_bytes,
                dec_usage.current_bytes,
                dec_usage.peak_bytes
            );

            results.encryption.push(MemorySample::from_bytes(
                size,
                enc_usage.current_bytes,
                enc_usage.peak_bytes,
            ));
            results.decryption.push(MemorySample::from_bytes(
                size,
                dec_usage.current_bytes,
                dec_usage.peak_bytes,
            ));
        }

        Ok(results)
    }
}
