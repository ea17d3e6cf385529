// SPDX-License-Identifier: AGPL-3.0-or-later
//! Process CPU utilization sampling
//!
//! [`ProcessCpuProbe`] returns the share of one core this process used since the
//! previous reading, computed from two instantaneous reads with no sleep in
//! between. [`CpuSampler`] reads it immediately before and after a call and
//! records the difference. Very short calls routinely produce deltas of zero or
//! below; those values are reported unchanged.
//!
//! The decrypt bracket covers decryption only: the ciphertext it consumes comes
//! from a separate encrypt run before the first reading. Decrypt deltas
//! therefore exclude encryption work that a combined `decrypt(encrypt(m))`
//! measurement would include.
//!
//! ## Platform Support
//!
//! - **Linux**: `utime + stime` from `/proc/self/stat`
//! - **Other Unix**: `getrusage(RUSAGE_SELF)`
//! - **Other platforms**: [`BenchError::MetricsUnavailable`]

use std::time::{Duration, Instant};

use crate::error::{BenchError, Result};
use crate::primitive::CipherPrimitive;
use crate::sample::{CpuSample, PairedSeries};
use crate::sweep::{zero_payload, SizeSweep};

/// Instantaneous process CPU utilization source
pub trait CpuProbe {
    /// Percent of one core used since the previous call; 0.0 on the first call
    fn cpu_percent(&mut self) -> Result<f64>;
}

impl<P: CpuProbe + ?Sized> CpuProbe for &mut P {
    fn cpu_percent(&mut self) -> Result<f64> {
        (**self).cpu_percent()
    }
}

/// [`CpuProbe`] for the current process
pub struct ProcessCpuProbe {
    /// Wall clock and cumulative CPU time at the previous reading
    last: Option<(Instant, Duration)>,
}

impl ProcessCpuProbe {
    pub fn new() -> Self {
        Self { last: None }
    }
}

impl Default for ProcessCpuProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuProbe for ProcessCpuProbe {
    fn cpu_percent(&mut self) -> Result<f64> {
        let now = Instant::now();
        let cpu_time = process_cpu_time()?;

        let percent = match self.last {
            Some((prev_wall, prev_cpu)) => {
                let wall = now.duration_since(prev_wall).as_secs_f64();
                if wall > 0.0 {
                    cpu_time.saturating_sub(prev_cpu).as_secs_f64() / wall * 100.0
                } else {
                    0.0
                }
            }
            None => 0.0,
        };

        self.last = Some((now, cpu_time));
        Ok(percent)
    }
}

/// Cumulative user + system CPU time consumed by this process
pub fn process_cpu_time() -> Result<Duration> {
    #[cfg(target_os = "linux")]
    {
        linux::process_cpu_time()
    }
    #[cfg(all(unix, not(target_os = "linux")))]
    {
        unix::process_cpu_time()
    }
    #[cfg(not(unix))]
    {
        Err(BenchError::MetricsUnavailable(
            "process CPU time is not supported on this platform".to_string(),
        ))
    }
}

#[cfg(target_os = "linux")]
mod linux {
    use super::*;
    use std::fs;

    pub fn process_cpu_time() -> Result<Duration> {
        let stat = fs::read_to_string("/proc/self/stat").map_err(|e| {
            BenchError::MetricsUnavailable(format!("cannot read /proc/self/stat: {}", e))
        })?;
        let ticks = stat_cpu_ticks(&stat)?;
        Ok(Duration::from_secs_f64(ticks as f64 / clock_ticks_per_second()?))
    }

    /// `utime + stime` in clock ticks from a `/proc/[pid]/stat` line
    pub(super) fn stat_cpu_ticks(stat: &str) -> Result<u64> {
        let fields = parse_stat_fields(stat)?;

        // Fields after the command name, 0-indexed: state(0) ... utime(11) stime(12)
        if fields.len() < 13 {
            return Err(unreadable("insufficient fields"));
        }
        let utime: u64 = fields[11]
            .parse()
            .map_err(|e| unreadable(&format!("bad utime: {}", e)))?;
        let stime: u64 = fields[12]
            .parse()
            .map_err(|e| unreadable(&format!("bad stime: {}", e)))?;
        Ok(utime.saturating_add(stime))
    }

    /// Fields following `pid (comm)`; the command name may itself contain ')'
    pub(super) fn parse_stat_fields(stat: &str) -> Result<Vec<&str>> {
        let end = stat
            .rfind(')')
            .ok_or_else(|| unreadable("no closing parenthesis"))?;
        let rest = stat
            .get(end + 1..)
            .ok_or_else(|| unreadable("truncated line"))?;
        Ok(rest.split_whitespace().collect())
    }

    fn unreadable(detail: &str) -> BenchError {
        BenchError::MetricsUnavailable(format!("malformed /proc/self/stat: {}", detail))
    }

    fn clock_ticks_per_second() -> Result<f64> {
        // SAFETY: sysconf has no preconditions.
        let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
        if ticks <= 0 {
            return Err(BenchError::MetricsUnavailable(
                "sysconf(_SC_CLK_TCK) failed".to_string(),
            ));
        }
        Ok(ticks as f64)
    }
}

#[cfg(all(unix, not(target_os = "linux")))]
mod unix {
    use super::*;

    pub fn process_cpu_time() -> Result<Duration> {
        let mut usage = std::mem::MaybeUninit::<libc::rusage>::uninit();
        // SAFETY: getrusage fills the struct on success.
        let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, usage.as_mut_ptr()) };
        if rc != 0 {
            return Err(BenchError::MetricsUnavailable(format!(
                "getrusage failed: {}",
                std::io::Error::last_os_error()
            )));
        }
        // SAFETY: rc == 0 guarantees initialization.
        let usage = unsafe { usage.assume_init() };
        Ok(timeval(usage.ru_utime) + timeval(usage.ru_stime))
    }

    fn timeval(tv: libc::timeval) -> Duration {
        Duration::from_secs(tv.tv_sec as u64) + Duration::from_micros(tv.tv_usec as u64)
    }
}

/// Measures CPU utilization deltas around one encrypt and one decrypt per size
pub struct CpuSampler<'a, P: CpuProbe> {
    cipher: &'a dyn CipherPrimitive,
    key: &'a str,
    probe: P,
}

impl<'a, P: CpuProbe> CpuSampler<'a, P> {
    pub fn new(cipher: &'a dyn CipherPrimitive, key: &'a str, probe: P) -> Self {
        Self { cipher, key, probe }
    }

    /// Encryption and decryption deltas, both in sweep order
    pub fn measure(&mut self, sweep: &SizeSweep) -> Result<PairedSeries<CpuSample>> {
        let mut results = PairedSeries::with_capacity(sweep.len());

        for size in sweep.iter() {
            let message = zero_payload(size);

            let before = self.probe.cpu_percent()?;
            self.cipher.encrypt(self.key, &message)?;
            let after = self.probe.cpu_percent()?;
            let enc_delta = after - before;

            // Fresh ciphertext for the decrypt bracket; this encrypt is not measured.
            let encrypted = self.cipher.encrypt(self.key, &message)?;
            let before = self.probe.cpu_percent()?;
            self.cipher.decrypt(self.key, &encrypted)?;
            let after = self.probe.cpu_percent()?;
            let dec_delta = after - before;

            for (op, delta) in [("encrypt", enc_delta), ("decrypt", dec_delta)] {
                if delta < 0.0 {
                    log::warn!(
                        "negative CPU delta for {} at size {}: {:.2}% (point-sample noise)",
                        op,
                        size,
                        delta
                    );
                }
            }
            log::debug!(
                "cpu size={} encrypt={:.2}% decrypt={:.2}%",
                size,
                enc_delta,
                dec_delta
            );

            results.encryption.push(CpuSample {
                size,
                percent_delta: enc_delta,
            });
            results.decryption.push(CpuSample {
                size,
                percent_delta: dec_delta,
            });
        }

        Ok(results)
    }

    /// Give back the probe, e.g. to keep its reference point for later reads
    pub fn into_probe(self) -> P {
        self.probe
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingCipher, PassthroughCipher, ScriptedCpuProbe};

    #[test]
    fn test_deltas_are_after_minus_before() {
        let cipher = PassthroughCipher;
        // enc: 10 -> 25, dec: 40 -> 30 (negative must survive)
        let probe = ScriptedCpuProbe::new(vec![10.0, 25.0, 40.0, 30.0]);
        let sweep = SizeSweep::new(vec![1000]).unwrap();
        let series = CpuSampler::new(&cipher, "k", probe).measure(&sweep).unwrap();

        assert_eq!(series.encryption[0].percent_delta, 15.0);
        assert_eq!(series.decryption[0].percent_delta, -10.0);
    }

    #[test]
    fn test_coarse_sweep_ordering() {
        let cipher = PassthroughCipher;
        let probe = ScriptedCpuProbe::new(vec![0.0; 12]);
        let sweep = SizeSweep::coarse();
        let mut sampler = CpuSampler::new(&cipher, "k", probe);
        let series = sampler.measure(&sweep).unwrap();

        let enc: Vec<usize> = series.encryption.iter().map(|s| s.size).collect();
        assert_eq!(enc, vec![1000, 10000, 100000]);
        assert_eq!(series.decryption.len(), 3);
        assert!(!series.is_empty());
        assert_eq!(sampler.into_probe().reads(), 12);
    }

    #[test]
    fn test_primitive_failure_propagates() {
        let cipher = FailingCipher::encrypt_at(10_000);
        let probe = ScriptedCpuProbe::new(vec![0.0; 12]);
        let err = CpuSampler::new(&cipher, "k", probe)
            .measure(&SizeSweep::coarse())
            .unwrap_err();
        assert!(err.is_primitive());
    }

    #[test]
    fn test_probe_failure_propagates() {
        let cipher = PassthroughCipher;
        // Runs out after the encrypt bracket.
        let probe = ScriptedCpuProbe::new(vec![1.0, 2.0]);
        let err = CpuSampler::new(&cipher, "k", probe)
            .measure(&SizeSweep::coarse())
            .unwrap_err();
        assert!(matches!(err, BenchError::MetricsUnavailable(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_process_probe_first_read_is_zero() {
        let mut probe = ProcessCpuProbe::new();
        assert_eq!(probe.cpu_percent().unwrap(), 0.0);

        let mut acc = 0u64;
        for i in 0..200_000u64 {
            acc = acc.wrapping_mul(31).wrapping_add(i);
        }
        std::hint::black_box(acc);

        let second = probe.cpu_percent().unwrap();
        assert!(second.is_finite());
        assert!(second >= 0.0);
    }

    #[cfg(unix)]
    #[test]
    fn test_process_cpu_time_monotonic() {
        let a = process_cpu_time().unwrap();
        let b = process_cpu_time().unwrap();
        assert!(b >= a);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_parse_stat_fields_with_paren_in_name() {
        let line = "1234 (my (odd) proc) S 1 2 3 4 5 6 7 8 9 10 150 25 0 0";
        let fields = linux::parse_stat_fields(line).unwrap();
        assert_eq!(fields[0], "S");
        assert_eq!(fields[11], "150");
        assert_eq!(fields[12], "25");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_stat_cpu_ticks_sums_utime_and_stime() {
        let line = "1234 (bench) S 1 2 3 4 5 6 7 8 9 10 150 25 0 0";
        assert_eq!(linux::stat_cpu_ticks(line).unwrap(), 175);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_malformed_stat_is_metrics_unavailable() {
        let err = linux::parse_stat_fields("1234 no paren").unwrap_err();
        assert!(matches!(err, BenchError::MetricsUnavailable(_)));

        let err = linux::stat_cpu_ticks("1234 (bench) S 1 2").unwrap_err();
        assert!(matches!(err, BenchError::MetricsUnavailable(_)));

        let err = linux::stat_cpu_ticks("1234 (bench) S 1 2 3 4 5 6 7 8 9 10 x 25").unwrap_err();
        assert!(matches!(err, BenchError::MetricsUnavailable(_)));
    }
}
