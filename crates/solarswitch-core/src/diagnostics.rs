//! Rendering of monitor snapshots for a line-oriented debug port.

use std::io::Write;

use crate::monitor::{ConditionSnapshot, MonitorSnapshot};

/// Receives pre-formatted diagnostic lines.
pub trait DebugSink {
    fn emit_debug_line(&mut self, line: &str);
}

/// Forwards lines to the `log` facade at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DebugSink for LogSink {
    fn emit_debug_line(&mut self, line: &str) {
        log::debug!("{line}");
    }
}

/// Writes lines to any byte stream (stdout, a serial port, a buffer).
#[derive(Debug)]
pub struct WriterSink<W> {
    out: W,
}

impl<W: Write> WriterSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> DebugSink for WriterSink<W> {
    fn emit_debug_line(&mut self, line: &str) {
        if let Err(e) = writeln!(self.out, "{line}") {
            log::warn!("debug output failed: {e}");
        }
    }
}

impl DebugSink for Vec<String> {
    fn emit_debug_line(&mut self, line: &str) {
        self.push(line.to_string());
    }
}

fn boundary(c: &ConditionSnapshot) -> String {
    c.boundary_at_entry
        .map(|b| format!("{b:.2}"))
        .unwrap_or_else(|| "-".to_string())
}

pub fn render_snapshot(s: &MonitorSnapshot) -> Vec<String> {
    let last = s
        .last_sample
        .map(|v| format!("{v:.2}"))
        .unwrap_or_else(|| "-".to_string());
    let condition = s
        .condition
        .map(|c| format!("{c:?}"))
        .unwrap_or_else(|| "-".to_string());
    vec![
        format!(
            "Bounds: max {:.2} min {:.2}, last index {last} ({condition})",
            s.bounds.max, s.bounds.min
        ),
        format!(
            "Total duration above max threshold (ms): {}",
            s.above_max.total.as_millis()
        ),
        format!("Max threshold during exceed: {}", boundary(&s.above_max)),
        format!(
            "Total duration below min threshold (ms): {}",
            s.below_min.total.as_millis()
        ),
        format!("Min threshold during fall: {}", boundary(&s.below_min)),
        format!(
            "Total duration within threshold (ms): {}",
            s.within_bounds.total.as_millis()
        ),
    ]
}

pub fn emit_snapshot(sink: &mut dyn DebugSink, snapshot: &MonitorSnapshot) {
    for line in render_snapshot(snapshot) {
        sink.emit_debug_line(&line);
    }
}
