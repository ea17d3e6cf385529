//! Wall-clock latency of single encrypt/decrypt calls

use std::time::Instant;

use crate::error::Result;
use crate::primitive::CipherPrimitive;
use crate::sample::LatencySample;
use crate::sweep::{zero_payload, SizeSweep};

/// Times one encrypt and one decrypt per payload size
pub struct LatencySampler<'a> {
    cipher: &'a dyn CipherPrimitive,
    key: &'a str,
}

impl<'a> LatencySampler<'a> {
    pub fn new(cipher: &'a dyn CipherPrimitive, key: &'a str) -> Self {
        Self { cipher, key }
    }

    /// One sample per size, in sweep order. Primitive errors abort the sweep.
    pub fn measure(&self, sweep: &SizeSweep) -> Result<Vec<LatencySample>> {
        let mut results = Vec::with_capacity(sweep.len());

        for size in sweep.iter() {
            let message = zero_payload(size);

            let start = Instant::now();
            let encrypted = self.cipher.encrypt(self.key, &message)?;
            let encrypt_secs = start.elapsed().as_secs_f64();

            let start = Instant::now();
            self.cipher.decrypt(self.key, &encrypted)?;
            let decrypt_secs = start.elapsed().as_secs_f64();

            log::debug!(
                "latency size={} encrypt={:.9}s decrypt={:.9}s",
                size,
                encrypt_secs,
                decrypt_secs
            );
            results.push(LatencySample {
                size,
                encrypt_secs,
                decrypt_secs,
            });
        }

        Ok(results)
    }
}
