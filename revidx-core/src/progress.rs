//! Coarse progress notifications for long construction runs

use std::fmt;

/// Construction phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    SegmentBuild,
    Merge,
    Finalize,
    Finished,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::SegmentBuild => "segment build",
            Phase::Merge => "merge",
            Phase::Finalize => "finalize",
            Phase::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// Receives progress notifications; never influences construction
pub trait ProgressSink: Send + Sync {
    fn phase(&self, phase: Phase);

    /// `done` of `total` units of the current phase are complete
    fn progress(&self, _done: u64, _total: u64) {}
}

/// Discards notifications
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn phase(&self, _phase: Phase) {}
}

/// Reports through the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn phase(&self, phase: Phase) {
        log::info!("Reverse index construction: {}", phase);
    }

    fn progress(&self, done: u64, total: u64) {
        log::info!("Reverse index construction: {}/{}", done, total);
    }
}
