//! Fixed-width text rendering of a [`BenchReport`]

use std::io::{self, Write};

use crate::report::BenchReport;
use crate::sample::{CpuSample, LatencySample, MemorySample, PairedSeries};

pub const SPEED_HEADING: &str = "### Speed Results ###";
pub const MEMORY_HEADING: &str = "### Memory Results ###";
pub const CPU_HEADING: &str = "### CPU Utilization Results ###";

/// Speed, Memory and CPU Utilization sections, in that order
pub fn write_report<W: Write>(out: &mut W, report: &BenchReport) -> io::Result<()> {
    write_speed(out, &report.speed)?;
    write_memory(out, &report.memory)?;
    write_cpu(out, &report.cpu)?;
    out.flush()
}

pub fn write_speed<W: Write>(out: &mut W, samples: &[LatencySample]) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", SPEED_HEADING)?;
    writeln!(
        out,
        "{:<18} | {:<19} | {}",
        "Input Size (bytes)", "Encryption Time (s)", "Decryption Time (s)"
    )?;
    for s in samples {
        writeln!(
            out,
            "{:<18} | {:<19.9} | {:.9}",
            s.size, s.encrypt_secs, s.decrypt_secs
        )?;
    }
    Ok(())
}

pub fn write_memory<W: Write>(out: &mut W, series: &PairedSeries<MemorySample>) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", MEMORY_HEADING)?;
    for (op, samples) in [
        ("Encryption", &series.encryption),
        ("Decryption", &series.decryption),
    ] {
        for s in samples {
            writeln!(
                out,
                "Input Size: {:<7} | {} (Current, Peak): {:.2} KB, {:.2} KB",
                s.size, op, s.current_kb, s.peak_kb
            )?;
        }
    }
    Ok(())
}

pub fn write_cpu<W: Write>(out: &mut W, series: &PairedSeries<CpuSample>) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", CPU_HEADING)?;
    for (op, samples) in [
        ("Encryption", &series.encryption),
        ("Decryption", &series.decryption),
    ] {
        for s in samples {
            writeln!(
                out,
                "Input Size: {:<7} | {} CPU Utilization: {:.2}%",
                s.size, op, s.percent_delta
            )?;
        }
    }
    Ok(())
}
