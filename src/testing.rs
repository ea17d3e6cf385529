//! Stub capabilities shared by unit tests

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;

use crate::cpu::CpuProbe;
use crate::error::{BenchError, Result};
use crate::memory::{HeapTracer, HeapUsage};
use crate::primitive::CipherPrimitive;
use crate::report::chart::{ChartSink, PlotRequest};

/// Returns its input unchanged in both directions
pub struct PassthroughCipher;

impl CipherPrimitive for PassthroughCipher {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn encrypt(&self, _key: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        Ok(plaintext.to_vec())
    }

    fn decrypt(&self, _key: &str, ciphertext: &[u8]) -> Result<Vec<u8>> {
        Ok(ciphertext.to_vec())
    }
}

/// Passthrough cipher that fails for one input length
#[derive(Default)]
pub struct FailingCipher {
    encrypt_at: Option<usize>,
    decrypt_at: Option<usize>,
}

impl FailingCipher {
    pub fn encrypt_at(size: usize) -> Self {
        Self {
            encrypt_at: Some(size),
            ..Self::default()
        }
    }

    pub fn decrypt_at(size: usize) -> Self {
        Self {
            decrypt_at: Some(size),
            ..Self::default()
        }
    }
}

impl CipherPrimitive for FailingCipher {
    fn name(&self) -> &str {
        "failing"
    }

    fn encrypt(&self, _key: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        if self.encrypt_at == Some(plaintext.len()) {
            return Err(BenchError::Primitive(format!(
                "encrypt rejected {} bytes",
                plaintext.len()
            )));
        }
        Ok(plaintext.to_vec())
    }

    fn decrypt(&self, _key: &str, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if self.decrypt_at == Some(ciphertext.len()) {
            return Err(BenchError::Primitive(format!(
                "decrypt rejected {} bytes",
                ciphertext.len()
            )));
        }
        Ok(ciphertext.to_vec())
    }
}

/// Replays fixed readings; errors once exhausted unless repeating
pub struct ScriptedCpuProbe {
    values: VecDeque<f64>,
    repeat: Option<f64>,
    reads: usize,
}

impl ScriptedCpuProbe {
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            values: values.into(),
            repeat: None,
            reads: 0,
        }
    }

    pub fn repeating(value: f64) -> Self {
        Self {
            values: VecDeque::new(),
            repeat: Some(value),
            reads: 0,
        }
    }

    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl CpuProbe for ScriptedCpuProbe {
    fn cpu_percent(&mut self) -> Result<f64> {
        self.reads += 1;
        self.values
            .pop_front()
            .or(self.repeat)
            .ok_or_else(|| BenchError::MetricsUnavailable("script exhausted".to_string()))
    }
}

/// Tracer that can never start
pub struct UnavailableTracer;

impl HeapTracer for UnavailableTracer {
    fn start(&self) -> Result<()> {
        Err(BenchError::MetricsUnavailable(
            "heap tracing disabled".to_string(),
        ))
    }

    fn usage(&self) -> HeapUsage {
        HeapUsage::default()
    }

    fn stop(&self) {}
}

/// Records requests instead of writing files; clones share the log
#[derive(Clone, Default)]
pub struct RecordingChartSink {
    requests: Rc<RefCell<Vec<PlotRequest>>>,
}

impl RecordingChartSink {
    pub fn requests(&self) -> Vec<PlotRequest> {
        self.requests.borrow().clone()
    }
}

impl ChartSink for RecordingChartSink {
    fn render(&mut self, request: &PlotRequest) -> Result<()> {
        self.requests.borrow_mut().push(request.clone());
        Ok(())
    }
}

/// Sink whose destination is never writable
pub struct FailingChartSink;

impl ChartSink for FailingChartSink {
    fn render(&mut self, request: &PlotRequest) -> Result<()> {
        Err(BenchError::ArtifactWrite {
            path: PathBuf::from(&request.artifact),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only filesystem"),
        })
    }
}
