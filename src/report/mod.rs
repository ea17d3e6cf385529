//! Run orchestration and reporting
//!
//! [`Reporter::run`] drives the samplers in a fixed order (latency, memory, CPU),
//! writes the text report, then sends one [`PlotRequest`] per metric to the
//! configured [`ChartSink`]. Text and charts consume the same [`BenchReport`]
//! independently: a chart failure is returned only after the text is written.

pub mod chart;
pub mod text;

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{ChartConfig, HarnessConfig};
use crate::cpu::{CpuProbe, CpuSampler, ProcessCpuProbe};
use crate::error::Result;
use crate::latency::LatencySampler;
use crate::memory::{AllocationTracer, HeapTracer, MemorySampler};
use crate::primitive::CipherPrimitive;
use crate::sample::{CpuSample, LatencySample, MemorySample, PairedSeries};

use chart::{ChartSink, PlotRequest, PlotSeries, SvgChartSink};

/// Context recorded alongside the samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub started_at: DateTime<Utc>,
    pub hostname: Option<String>,
    /// CPU deltas are per-core percentages and can exceed 100 on multi-core hosts
    pub logical_cpus: usize,
    pub cipher: String,
    pub key_len: usize,
}

impl RunMetadata {
    fn collect(cipher: &dyn CipherPrimitive, key: &str) -> Self {
        Self {
            started_at: Utc::now(),
            hostname: hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok()),
            logical_cpus: num_cpus::get(),
            cipher: cipher.name().to_string(),
            key_len: key.len(),
        }
    }
}

/// All samples from one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchReport {
    pub metadata: RunMetadata,
    pub speed: Vec<LatencySample>,
    pub memory: PairedSeries<MemorySample>,
    pub cpu: PairedSeries<CpuSample>,
}

impl BenchReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Speed, Memory and CPU chart requests, in that order
    pub fn plot_requests(&self, charts: &ChartConfig) -> Vec<PlotRequest> {
        let x = |size: usize| size as f64;

        let speed = PlotRequest {
            artifact: charts.speed_artifact.clone(),
            title: "Encryption/Decryption Time vs Input Size".into(),
            x_label: "Input Size (bytes)".into(),
            y_label: "Time (seconds)".into(),
            series: vec![
                PlotSeries::new(
                    "Encryption Time",
                    self.speed.iter().map(|s| (x(s.size), s.encrypt_secs)).collect(),
                ),
                PlotSeries::new(
                    "Decryption Time",
                    self.speed.iter().map(|s| (x(s.size), s.decrypt_secs)).collect(),
                ),
            ],
        };

        let enc = &self.memory.encryption;
        let dec = &self.memory.decryption;
        let memory = PlotRequest {
            artifact: charts.memory_artifact.clone(),
            title: "Memory Usage During Encryption and Decryption".into(),
            x_label: "Input Size (bytes)".into(),
            y_label: "Memory Usage (KB)".into(),
            series: vec![
                PlotSeries::new(
                    "Encryption Current Usage (KB)",
                    enc.iter().map(|s| (x(s.size), s.current_kb)).collect(),
                ),
                PlotSeries::new(
                    "Encryption Peak Usage (KB)",
                    enc.iter().map(|s| (x(s.size), s.peak_kb)).collect(),
                ),
                PlotSeries::new(
                    "Decryption Current Usage (KB)",
                    dec.iter().map(|s| (x(s.size), s.current_kb)).collect(),
                ),
                PlotSeries::new(
                    "Decryption Peak Usage (KB)",
                    dec.iter().map(|s| (x(s.size), s.peak_kb)).collect(),
                ),
            ],
        };

        let cpu = PlotRequest {
            artifact: charts.cpu_artifact.clone(),
            title: "CPU Utilization During Encryption and Decryption".into(),
            x_label: "Input Size (bytes)".into(),
            y_label: "CPU Utilization (%)".into(),
            series: vec![
                PlotSeries::new(
                    "Encryption CPU Utilization (%)",
                    self.cpu
                        .encryption
                        .iter()
                        .map(|s| (x(s.size), s.percent_delta))
                        .collect(),
                ),
                PlotSeries::new(
                    "Decryption CPU Utilization (%)",
                    self.cpu
                        .decryption
                        .iter()
                        .map(|s| (x(s.size), s.percent_delta))
                        .collect(),
                ),
            ],
        };

        vec![speed, memory, cpu]
    }
}

/// Runs every sampler and reports the results
pub struct Reporter {
    cipher: Box<dyn CipherPrimitive>,
    config: HarnessConfig,
    heap: Box<dyn HeapTracer>,
    cpu: Box<dyn CpuProbe>,
    charts: Option<Box<dyn ChartSink>>,
}

impl Reporter {
    /// Reporter using the process probes and an SVG sink in `config.output_dir`
    pub fn new(cipher: Box<dyn CipherPrimitive>, config: HarnessConfig) -> Self {
        let charts: Option<Box<dyn ChartSink>> = if config.charts.enabled {
            Some(Box::new(
                SvgChartSink::new(config.output_dir.clone())
                    .with_size(config.charts.width, config.charts.height)
                    .with_x_scale(config.charts.x_scale),
            ))
        } else {
            None
        };
        Self {
            cipher,
            config,
            heap: Box::new(AllocationTracer::new()),
            cpu: Box::new(ProcessCpuProbe::new()),
            charts,
        }
    }

    pub fn with_heap_tracer(mut self, tracer: Box<dyn HeapTracer>) -> Self {
        self.heap = tracer;
        self
    }

    pub fn with_cpu_probe(mut self, probe: Box<dyn CpuProbe>) -> Self {
        self.cpu = probe;
        self
    }

    pub fn with_chart_sink(mut self, sink: Box<dyn ChartSink>) -> Self {
        self.charts = Some(sink);
        self
    }

    /// Skip chart emission entirely
    pub fn without_charts(mut self) -> Self {
        self.charts = None;
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run all samplers without printing or charting
    pub fn collect(&mut self) -> Result<BenchReport> {
        let key = self.config.key.as_str();
        let cipher = self.cipher.as_ref();
        let metadata = RunMetadata::collect(cipher, key);

        log::info!(
            "measuring speed over {} sizes",
            self.config.latency_sizes.len()
        );
        let speed = LatencySampler::new(cipher, key).measure(&self.config.latency_sizes)?;

        log::info!(
            "measuring memory over {} sizes",
            self.config.latency_sizes.len()
        );
        let memory =
            MemorySampler::new(cipher, key, self.heap.as_ref()).measure(&self.config.latency_sizes)?;

        log::info!("measuring CPU over {} sizes", self.config.cpu_sizes.len());
        let cpu = CpuSampler::new(cipher, key, &mut *self.cpu).measure(&self.config.cpu_sizes)?;

        Ok(BenchReport {
            metadata,
            speed,
            memory,
            cpu,
        })
    }

    /// Measure, print the text report to `out`, then emit the charts
    pub fn run<W: Write>(&mut self, out: &mut W) -> Result<BenchReport> {
        let report = self.collect()?;
        text::write_report(out, &report)?;
        self.emit_charts(&report)?;
        Ok(report)
    }

    /// Send the three plot requests; stops at the first sink failure
    pub fn emit_charts(&mut self, report: &BenchReport) -> Result<()> {
        let Some(sink) = self.charts.as_mut() else {
            log::debug!("chart emission disabled");
            return Ok(());
        };
        for request in report.plot_requests(&self.config.charts) {
            sink.render(&request)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BenchError;
    use crate::sweep::SizeSweep;
    use crate::testing::{
        FailingCipher, FailingChartSink, PassthroughCipher, RecordingChartSink, ScriptedCpuProbe,
        UnavailableTracer,
    };

    fn small_config() -> HarnessConfig {
        HarnessConfig {
            latency_sizes: SizeSweep::new(vec![10, 100]).unwrap(),
            ..HarnessConfig::default()
        }
    }

    fn stub_reporter(cipher: Box<dyn CipherPrimitive>, config: HarnessConfig) -> (Reporter, RecordingChartSink) {
        let sink = RecordingChartSink::default();
        let reporter = Reporter::new(cipher, config)
            .with_cpu_probe(Box::new(ScriptedCpuProbe::repeating(0.0)))
            .with_chart_sink(Box::new(sink.clone()));
        (reporter, sink)
    }

    fn section<'a>(text: &'a str, heading: &str) -> Vec<&'a str> {
        text.lines()
            .skip_while(|l| *l != heading)
            .skip(1)
            .take_while(|l| !l.is_empty())
            .collect()
    }

    #[test]
    fn test_speed_section_rows_for_two_sizes() {
        let (mut reporter, _) = stub_reporter(Box::new(PassthroughCipher), small_config());
        let mut out = Vec::new();
        reporter.run(&mut out).unwrap();
        let printed = String::from_utf8(out).unwrap();

        let rows: Vec<&str> = section(&printed, text::SPEED_HEADING)
            .into_iter()
            .skip(1) // column header
            .collect();
        assert_eq!(rows.len(), 2);
        for (row, expected) in rows.iter().zip(["10", "100"]) {
            let cols: Vec<&str> = row.split('|').map(str::trim).collect();
            assert_eq!(cols.len(), 3);
            assert_eq!(cols[0], expected);
            for c in &cols[1..] {
                let v: f64 = c.parse().unwrap();
                assert!(v >= 0.0);
            }
        }
    }

    #[test]
    fn test_sections_in_fixed_order() {
        let (mut reporter, _) = stub_reporter(Box::new(PassthroughCipher), small_config());
        let mut out = Vec::new();
        reporter.run(&mut out).unwrap();
        let printed = String::from_utf8(out).unwrap();

        let speed = printed.find(text::SPEED_HEADING).unwrap();
        let memory = printed.find(text::MEMORY_HEADING).unwrap();
        let cpu = printed.find(text::CPU_HEADING).unwrap();
        assert!(speed < memory && memory < cpu);
    }

    #[test]
    fn test_three_distinct_chart_requests() {
        let (mut reporter, sink) = stub_reporter(Box::new(PassthroughCipher), small_config());
        reporter.run(&mut Vec::new()).unwrap();

        let requests = sink.requests();
        assert_eq!(requests.len(), 3);
        let mut names: Vec<&str> = requests.iter().map(|r| r.artifact.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 3);
        assert!(requests.iter().all(|r| !r.series.is_empty()));
        assert_eq!(requests[0].series.len(), 2);
        assert_eq!(requests[1].series.len(), 4);
        assert_eq!(requests[2].series.len(), 2);
    }

    #[test]
    fn test_cpu_uses_coarse_sweep_only() {
        let (mut reporter, _) = stub_reporter(Box::new(PassthroughCipher), HarnessConfig::default());
        let report = reporter.run(&mut Vec::new()).unwrap();

        assert_eq!(report.speed.len(), 5);
        assert_eq!(report.memory.len(), 5);
        let cpu_sizes: Vec<usize> = report.cpu.encryption.iter().map(|s| s.size).collect();
        assert_eq!(cpu_sizes, SizeSweep::coarse().sizes());
        assert_eq!(report.cpu.decryption.len(), 3);
    }

    #[test]
    fn test_repeated_runs_share_structure() {
        let shape = |text: &str| -> Vec<(usize, String)> {
            text.lines()
                .map(|l| (l.split('|').count(), l.split('|').next().unwrap_or("").to_string()))
                .collect()
        };

        let mut texts = Vec::new();
        for _ in 0..2 {
            let (mut reporter, _) = stub_reporter(Box::new(PassthroughCipher), small_config());
            let mut out = Vec::new();
            reporter.run(&mut out).unwrap();
            texts.push(String::from_utf8(out).unwrap());
        }
        assert_eq!(texts[0].lines().count(), texts[1].lines().count());
        assert_eq!(shape(&texts[0]), shape(&texts[1]));
    }

    #[test]
    fn test_failure_at_largest_size_aborts_before_cpu() {
        let (mut reporter, sink) =
            stub_reporter(Box::new(FailingCipher::encrypt_at(100_000)), HarnessConfig::default());
        let mut out = Vec::new();
        let err = reporter.run(&mut out).unwrap_err();

        assert!(err.is_primitive());
        let printed = String::from_utf8(out).unwrap();
        assert!(!printed.contains(text::CPU_HEADING));
        assert!(sink.requests().is_empty());
    }

    #[test]
    fn test_metrics_unavailable_aborts_run() {
        let (reporter, _) = stub_reporter(Box::new(PassthroughCipher), small_config());
        let mut reporter = reporter.with_heap_tracer(Box::new(UnavailableTracer));
        let err = reporter.run(&mut Vec::new()).unwrap_err();
        assert!(matches!(err, BenchError::MetricsUnavailable(_)));
    }

    #[test]
    fn test_chart_failure_surfaces_after_text() {
        let (reporter, _) = stub_reporter(Box::new(PassthroughCipher), small_config());
        let mut reporter = reporter.with_chart_sink(Box::new(FailingChartSink));
        let mut out = Vec::new();
        let err = reporter.run(&mut out).unwrap_err();

        assert!(matches!(err, BenchError::ArtifactWrite { .. }));
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains(text::SPEED_HEADING));
        assert!(printed.contains(text::CPU_HEADING));
    }

    #[test]
    fn test_without_charts_skips_sink() {
        let (reporter, sink) = stub_reporter(Box::new(PassthroughCipher), small_config());
        let mut reporter = reporter.without_charts();
        reporter.run(&mut Vec::new()).unwrap();
        assert!(sink.requests().is_empty());
    }

    #[test]
    fn test_svg_charts_written_to_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig {
            output_dir: dir.path().to_path_buf(),
            ..small_config()
        };
        let mut reporter = Reporter::new(Box::new(PassthroughCipher), config)
            .with_cpu_probe(Box::new(ScriptedCpuProbe::repeating(0.0)));
        reporter.run(&mut Vec::new()).unwrap();

        for name in ["speed_results.svg", "memory_results.svg", "cpu_results.svg"] {
            assert!(dir.path().join(name).exists(), "missing {}", name);
        }
    }

    #[test]
    fn test_report_json_export() {
        let (mut reporter, _) = stub_reporter(Box::new(PassthroughCipher), small_config());
        let report = reporter.collect().unwrap();
        let json = report.to_json().unwrap();
        let back: BenchReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.speed.len(), 2);
        assert_eq!(back.metadata.cipher, "passthrough");
        assert_eq!(back.metadata.key_len, "my secret key".len());
    }
}
