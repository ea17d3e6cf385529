// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cipher Bench: latency, heap and CPU profiling for encrypt/decrypt primitives
//!
//! The harness runs an injected [`CipherPrimitive`] over fixed payload sizes and
//! records, for every size, one encrypt and one decrypt measurement of:
//!
//! - wall-clock latency ([`latency::LatencySampler`])
//! - heap allocation, current and peak ([`memory::MemorySampler`])
//! - process CPU utilization delta ([`cpu::CpuSampler`])
//!
//! [`Reporter`] runs the three samplers in order, prints a text report and emits
//! one chart per metric.
//!
//! # Examples
//!
//! ```no_run
//! use cbenchlib::memory::alloc::TrackingAllocator;
//! use cbenchlib::{AesGcmCipher, HarnessConfig, Reporter};
//!
//! #[global_allocator]
//! static GLOBAL: TrackingAllocator = TrackingAllocator::system();
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut reporter = Reporter::new(Box::new(AesGcmCipher::new()), HarnessConfig::default());
//! let report = reporter.run(&mut std::io::stdout())?;
//! println!("{} speed samples", report.speed.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod cpu;
pub mod error;
pub mod latency;
pub mod memory;
pub mod primitive;
pub mod report;
pub mod sample;
pub mod sweep;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ChartConfig, HarnessConfig};
pub use error::{BenchError, Result};
pub use primitive::{AesGcmCipher, CipherPrimitive};
pub use report::{BenchReport, Reporter};
pub use sweep::SizeSweep;

#[cfg(test)]
#[global_allocator]
static TEST_ALLOCATOR: memory::TrackingAllocator = memory::TrackingAllocator::system();
