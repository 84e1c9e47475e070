//! Progress reporting between a running batch and whoever displays it.
//!
//! The batch runs on a worker thread and never touches the display. It sends
//! [`BatchEvent`]s over a channel; a controller on the other end drains them
//! and forwards them to a [`Reporter`]. Two draining styles are provided:
//!
//! - [`drive`] blocks until the batch finishes (CLI use).
//! - [`pump`] handles whatever is queued and returns immediately, for
//!   controllers that poll from their own event loop.
//!
//! Event order for one batch:
//!
//! ```text
//! Started { total }
//! FileDone { .. }, Progress { completed, total }   // once per finished file
//! ...
//! Completed(summary) | Aborted(summary)            // exactly one, always last
//! ```
//!
//! `Progress::completed` is non-decreasing and never exceeds `total`.
//! Cancellation is cooperative: [`AbortFlag::abort`] stops new files from
//! starting, files already being cropped run to completion.

use crate::process::{BatchSummary, CropResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, TryRecvError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    Started {
        total: usize,
    },
    FileDone {
        relative_path: PathBuf,
        result: CropResult,
    },
    Progress {
        completed: usize,
        total: usize,
    },
    Completed(BatchSummary),
    Aborted(BatchSummary),
}

impl BatchEvent {
    /// True for the final event of a batch.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchEvent::Completed(_) | BatchEvent::Aborted(_))
    }
}

/// Receives batch progress on the controller side.
pub trait Reporter {
    fn on_started(&mut self, _total: usize) {}
    fn on_progress(&mut self, completed: usize, total: usize);
    fn on_file(&mut self, _relative_path: &Path, _result: &CropResult) {}
    fn on_complete(&mut self, summary: &BatchSummary);
    fn on_aborted(&mut self, summary: &BatchSummary);
}

/// Shared cancellation signal. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Forward one event to the reporter. Returns the summary for terminal events.
pub fn dispatch(event: BatchEvent, reporter: &mut impl Reporter) -> Option<BatchSummary> {
    match event {
        BatchEvent::Started { total } => reporter.on_started(total),
        BatchEvent::FileDone {
            relative_path,
            result,
        } => reporter.on_file(&relative_path, &result),
        BatchEvent::Progress { completed, total } => reporter.on_progress(completed, total),
        BatchEvent::Completed(summary) => {
            reporter.on_complete(&summary);
            return Some(summary);
        }
        BatchEvent::Aborted(summary) => {
            reporter.on_aborted(&summary);
            return Some(summary);
        }
    }
    None
}

/// Block on `events` until the terminal event arrives.
///
/// Returns `None` if the sender hung up without one, which only happens if
/// the batch never started or its worker died.
pub fn drive(events: &Receiver<BatchEvent>, reporter: &mut impl Reporter) -> Option<BatchSummary> {
    events.iter().find_map(|event| dispatch(event, reporter))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PumpStatus {
    /// Queue drained, batch still running.
    Pending,
    Finished(BatchSummary),
    /// Sender gone without a terminal event.
    Disconnected,
}

/// Handle every queued event without blocking.
pub fn pump(events: &Receiver<BatchEvent>, reporter: &mut impl Reporter) -> PumpStatus {
    loop {
        match events.try_recv() {
            Ok(event) => {
                if let Some(summary) = dispatch(event, reporter) {
                    return PumpStatus::Finished(summary);
                }
            }
            Err(TryRecvError::Empty) => return PumpStatus::Pending,
            Err(TryRecvError::Disconnected) => return PumpStatus::Disconnected,
        }
    }
}
