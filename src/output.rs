//! Human-readable rendering of reports.

use scdloop_edit::{LoopPoints, LoopReport, StreamMetadata, WriteOutcome};
use std::fmt::Write;
use std::path::Path;

/// `mm:ss.mmm` position of a sample.
pub fn timestamp(samples: u64, sample_rate: u32) -> String {
    if sample_rate == 0 {
        return "--:--.---".to_string();
    }
    let millis = samples * 1000 / sample_rate as u64;
    let secs = millis / 1000;
    format!("{:02}:{:02}.{:03}", secs / 60, secs % 60, millis % 1000)
}

fn loop_line(points: Option<&LoopPoints>, sample_rate: u32) -> String {
    match points {
        Some(p) => {
            let mut line = format!(
                "{} - {} ({} samples, {} - {})",
                p.start,
                p.end,
                p.len(),
                timestamp(p.start, sample_rate),
                timestamp(p.end, sample_rate)
            );
            if !p.valid {
                line.push_str(" [out of range]");
            }
            line
        }
        None => "none".to_string(),
    }
}

pub fn render_report(path: &Path, report: &LoopReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "File: {}", path.display());
    let strategy = report
        .strategy
        .map_or("no loop support", |strategy| strategy.as_str());
    let _ = writeln!(out, "Codec: {} ({strategy})", report.codec);
    let _ = writeln!(out, "Channels: {}", report.channels);
    let _ = writeln!(out, "Sample rate: {} Hz", report.sample_rate);
    let _ = writeln!(
        out,
        "Length: {} samples ({})",
        report.total_samples,
        timestamp(report.total_samples, report.sample_rate)
    );
    let _ = writeln!(
        out,
        "Loop: {}",
        loop_line(report.loop_points.as_ref(), report.sample_rate)
    );
    let _ = write!(
        out,
        "Header loop fields: {:#x} / {:#x}",
        report.header_bytes.0, report.header_bytes.1
    );
    out
}

pub fn render_outcome(path: &Path, outcome: &WriteOutcome, sample_rate: u32) -> String {
    let action = match outcome.loop_points {
        Some(_) => "Wrote loop",
        None => "Cleared loop",
    };
    let mut out = format!("{action} in {} via {}", path.display(), outcome.strategy);
    if outcome.loop_points.is_some() {
        let _ = write!(
            out,
            "\nLoop: {}",
            loop_line(outcome.loop_points.as_ref(), sample_rate)
        );
    }
    let _ = write!(out, "\nSize change: {:+} bytes", outcome.size_delta);
    out
}

pub fn render_metadata(path: &Path, meta: &StreamMetadata) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "File: {}", path.display());
    let _ = writeln!(out, "Codec: {}", meta.codec);
    let _ = writeln!(out, "Channels: {}", meta.channels);
    let _ = writeln!(out, "Sample rate: {} Hz", meta.sample_rate);
    let _ = writeln!(out, "Sound entry: {:#x}", meta.entry_offset);
    let _ = writeln!(out, "Extradata: {} bytes", meta.extradata_size);
    let _ = write!(out, "Stream data: {} bytes", meta.stream_size);
    out
}
