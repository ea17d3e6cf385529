// SPDX-License-Identifier: AGPL-3.0-or-later
//! Harness configuration
//!
//! The defaults reproduce the fixed run: key `"my secret key"`, the fine sweep for
//! latency and memory, the coarse sweep for CPU, and three SVG charts in the
//! current directory. The `cbench` binary can override them from a TOML file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};
use crate::report::chart::AxisScale;
use crate::sweep::SizeSweep;

/// Default key handed to every encrypt/decrypt call
pub const DEFAULT_KEY: &str = "my secret key";

/// Chart output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub enabled: bool,
    pub width: u32,
    pub height: u32,
    pub x_scale: AxisScale,
    pub speed_artifact: String,
    pub memory_artifact: String,
    pub cpu_artifact: String,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            width: 1000,
            height: 600,
            x_scale: AxisScale::Linear,
            speed_artifact: "speed_results.svg".into(),
            memory_artifact: "memory_results.svg".into(),
            cpu_artifact: "cpu_results.svg".into(),
        }
    }
}

/// Complete harness configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Credential passed to the primitive
    pub key: String,
    /// Sizes for latency and memory sampling
    pub latency_sizes: SizeSweep,
    /// Sizes for CPU sampling
    pub cpu_sizes: SizeSweep,
    /// Directory receiving chart artifacts
    pub output_dir: PathBuf,
    pub charts: ChartConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            key: DEFAULT_KEY.into(),
            latency_sizes: SizeSweep::fine(),
            cpu_sizes: SizeSweep::coarse(),
            output_dir: PathBuf::from("."),
            charts: ChartConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Load from TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            BenchError::Configuration(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| BenchError::Configuration(format!("TOML parse error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Cross-field checks that serde cannot express
    pub fn validate(&self) -> Result<()> {
        let names = [
            &self.charts.speed_artifact,
            &self.charts.memory_artifact,
            &self.charts.cpu_artifact,
        ];
        if names.iter().any(|n| n.trim().is_empty()) {
            return Err(BenchError::Configuration(
                "chart artifact names must not be empty".to_string(),
            ));
        }
        if names[0] == names[1] || names[0] == names[2] || names[1] == names[2] {
            return Err(BenchError::Configuration(
                "chart artifact names must be distinct".to_string(),
            ));
        }
        if self.charts.width == 0 || self.charts.height == 0 {
            return Err(BenchError::Configuration(
                "chart dimensions must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Generate sample config
    pub fn sample_toml() -> String {
        r#"# Cipher Bench configuration
key = "my secret key"
latency_sizes = [10, 100, 1000, 10000, 100000]
# CPU deltas are noise below ~1 KB, so this sweep is coarser
cpu_sizes = [1000, 10000, 100000]
output_dir = "."

[charts]
enabled = true
width = 1000
height = 600
# "linear" or "log10"
x_scale = "linear"
speed_artifact = "speed_results.svg"
memory_artifact = "memory_results.svg"
cpu_artifact = "cpu_results.svg"
"#
        .into()
    }
}
