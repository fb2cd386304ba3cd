//! Per-tick JSONL output.
//!
//! One JSON object per line, append-only.  Observer methods have no return
//! value, so write errors are stashed and retrieved after the run with
//! [`take_error`](JsonlTickWriter::take_error).

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::{SimError, SimResult};
use crate::observer::RunObserver;
use crate::runtime::TickReport;

/// Flat row shape, one per tick.
#[derive(Debug, Serialize)]
struct TickRow<'a> {
    tick: u64,
    policy: Option<&'a str>,
    status: &'a str,
    reward: f64,
    keyframe: bool,
    keyframe_reasons: Vec<&'a str>,
    written: usize,
    hunger: f64,
    fatigue: f64,
    warmth: f64,
}

/// Appends one row per tick to a JSONL file.
pub struct JsonlTickWriter {
    out: BufWriter<File>,
    last_error: Option<SimError>,
}

impl JsonlTickWriter {
    /// Create (or append to) the log at `path`.
    pub fn create(path: &Path) -> SimResult<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(JsonlTickWriter { out: BufWriter::new(file), last_error: None })
    }

    /// Take the first stored write error, if any, after the run.
    pub fn take_error(&mut self) -> Option<SimError> {
        self.last_error.take()
    }

    /// Flush buffered rows.  Idempotent.
    pub fn finish(&mut self) -> SimResult<()> {
        self.out.flush()?;
        Ok(())
    }

    fn write_row(&mut self, report: &TickReport) -> SimResult<()> {
        let row = TickRow {
            tick: report.tick,
            policy: report.outcome.policy.as_deref(),
            status: report.outcome.status.as_str(),
            reward: report.outcome.reward,
            keyframe: report.ingest.keyframe,
            keyframe_reasons: report.ingest.keyframe_reasons.iter().map(|r| r.as_str()).collect(),
            written: report.ingest.written,
            hunger: report.drives.hunger,
            fatigue: report.drives.fatigue,
            warmth: report.drives.warmth,
        };
        let line = serde_json::to_string(&row)
            .map_err(|e| SimError::Snapshot(format!("tick row serialization: {e}")))?;
        writeln!(self.out, "{line}")?;
        Ok(())
    }

    fn store_err(&mut self, result: SimResult<()>) {
        if let Err(e) = result {
            // Keep only the first error.
            if self.last_error.is_none() {
                self.last_error = Some(e);
            }
        }
    }
}

impl RunObserver for JsonlTickWriter {
    fn on_tick_end(&mut self, report: &TickReport) {
        let result = self.write_row(report);
        self.store_err(result);
    }

    fn on_run_end(&mut self, _final_tick: u64) {
        let result = self.finish();
        self.store_err(result);
    }
}
