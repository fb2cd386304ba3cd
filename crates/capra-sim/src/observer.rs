//! Run observer callbacks.

use crate::runtime::TickReport;

/// Callbacks invoked by [`Runtime::run`][crate::Runtime::run] at key
/// points in the tick loop.
///
/// All methods have default no-op implementations so implementors only
/// need to override what they care about.
pub trait RunObserver {
    /// Called before perception, with the upcoming tick number.
    fn on_tick_start(&mut self, _tick: u64) {}

    /// Called after the policy step with the full tick report.
    fn on_tick_end(&mut self, _report: &TickReport) {}

    /// Called when a tick took a keyframe.
    fn on_keyframe(&mut self, _report: &TickReport) {}

    /// Called once after the final tick.
    fn on_run_end(&mut self, _final_tick: u64) {}
}

/// A [`RunObserver`] that does nothing.  Use when you need to call `run`
/// but don't want callbacks.
pub struct NoopObserver;

impl RunObserver for NoopObserver {}
