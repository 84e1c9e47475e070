//! Batch cropping of every image in a directory tree.
//!
//! Takes the tasks planned by [`scan`](crate::scan) and crops each source into
//! its mirrored destination. One bad file never stops the batch: every file
//! ends in exactly one [`CropResult`], and the batch ends in one
//! [`BatchSummary`].
//!
//! ## Per-file steps
//!
//! ```text
//! create destination directory
//! identify            → Failed(reason) on unreadable/undecodable input
//! compute crop box    → SkippedTooSmall when the image cannot fit the crop
//! crop + encode       → Cropped, or Failed(reason)
//! ```
//!
//! ## Concurrency
//!
//! `jobs <= 1` runs on the calling thread in walk order. Larger values run
//! on a dedicated [rayon](https://docs.rs/rayon) pool of that size; files are
//! independent, so completion order is unspecified. Counters and event sends
//! share one lock, which keeps `Progress` monotonic even when several
//! workers finish at once.
//!
//! ## Cancellation
//!
//! The [`AbortFlag`] is checked before each file starts. Files already in
//! flight finish normally, and the summary reports `aborted: true` when at
//! least one file was never attempted.

use crate::imaging::{CropParams, CropSpec, ImageBackend, Quality, RustBackend, compute_crop_box};
use crate::progress::{AbortFlag, BatchEvent};
use crate::scan::{self, ImageTask, ScanError};
use rayon::prelude::*;
use serde::Serialize;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, PoisonError};
use std::thread::JoinHandle;
use thiserror::Error;
use tracing::{debug, info, warn};

/// At most this many failures are itemized in [`BatchSummary::errors`].
pub const MAX_REPORTED_ERRORS: usize = 10;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("Could not start worker pool: {0}")]
    ThreadPool(String),
    #[error("Batch worker panicked")]
    WorkerPanicked,
}

/// Outcome for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum CropResult {
    Cropped,
    SkippedTooSmall,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileError {
    /// Path relative to the input root.
    pub filename: String,
    pub reason: String,
}

/// Aggregate outcome of a batch.
///
/// Once the batch has finished without being aborted,
/// `processed + skipped == total`. `failed` counts the subset of `skipped`
/// that failed rather than being too small.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// The first [`MAX_REPORTED_ERRORS`] failures.
    pub errors: Vec<FileError>,
    pub aborted: bool,
}

impl BatchSummary {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Files that have reached a final result.
    pub fn completed(&self) -> usize {
        self.processed + self.skipped
    }

    /// Files skipped because they could not fit the crop.
    pub fn too_small(&self) -> usize {
        self.skipped - self.failed
    }

    /// Failures beyond the itemized ones.
    pub fn unreported_errors(&self) -> usize {
        self.failed - self.errors.len()
    }

    pub fn record(&mut self, relative_path: &Path, result: &CropResult) {
        match result {
            CropResult::Cropped => self.processed += 1,
            CropResult::SkippedTooSmall => self.skipped += 1,
            CropResult::Failed(reason) => {
                self.skipped += 1;
                self.failed += 1;
                if self.errors.len() < MAX_REPORTED_ERRORS {
                    self.errors.push(FileError {
                        filename: relative_path.display().to_string(),
                        reason: reason.clone(),
                    });
                }
            }
        }
    }
}

/// Knobs for one batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Worker count. `0` and `1` both mean sequential.
    pub jobs: usize,
    pub quality: Quality,
    pub events: Option<Sender<BatchEvent>>,
    pub abort: Option<AbortFlag>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            jobs: 1,
            quality: Quality::default(),
            events: None,
            abort: None,
        }
    }
}

impl BatchOptions {
    fn emit(&self, event: BatchEvent) {
        if let Some(tx) = &self.events {
            // A controller that stopped listening does not stop the batch.
            let _ = tx.send(event);
        }
    }
}

/// Validate the roots, create the output root and plan one task per image.
///
/// Nothing is written before the input root has been validated.
pub fn prepare(input_root: &Path, output_root: &Path) -> Result<Vec<ImageTask>, ProcessError> {
    let tasks = scan::plan_tasks(input_root, output_root)?;
    std::fs::create_dir_all(output_root)?;
    info!(
        input = %input_root.display(),
        output = %output_root.display(),
        images = tasks.len(),
        "planned batch"
    );
    Ok(tasks)
}

/// Crop every image under `input_root` into `output_root` with the pure-Rust backend.
pub fn run(
    input_root: &Path,
    output_root: &Path,
    spec: &CropSpec,
    options: &BatchOptions,
) -> Result<BatchSummary, ProcessError> {
    let tasks = prepare(input_root, output_root)?;
    run_with_backend(&RustBackend::new(), &tasks, spec, options)
}

/// Run planned tasks against a specific backend (allows testing with mock).
pub fn run_with_backend(
    backend: &impl ImageBackend,
    tasks: &[ImageTask],
    spec: &CropSpec,
    options: &BatchOptions,
) -> Result<BatchSummary, ProcessError> {
    let total = tasks.len();
    let abort = options.abort.clone().unwrap_or_default();
    let state = Mutex::new(BatchSummary::new(total));

    options.emit(BatchEvent::Started { total });

    let process_one = |task: &ImageTask| {
        if abort.is_aborted() {
            return;
        }
        let result = crop_task(backend, task, spec, options.quality);

        let mut summary = state.lock().unwrap_or_else(PoisonError::into_inner);
        summary.record(&task.relative_path, &result);
        let completed = summary.completed();
        options.emit(BatchEvent::FileDone {
            relative_path: task.relative_path.clone(),
            result,
        });
        options.emit(BatchEvent::Progress { completed, total });
    };

    if options.jobs <= 1 {
        tasks.iter().for_each(process_one);
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.jobs)
            .build()
            .map_err(|e| ProcessError::ThreadPool(e.to_string()))?;
        pool.install(|| tasks.par_iter().for_each(process_one));
    }

    let mut summary = state.into_inner().unwrap_or_else(PoisonError::into_inner);
    summary.aborted = summary.completed() < total;

    if summary.aborted {
        info!(
            completed = summary.completed(),
            total, "batch aborted before all files were attempted"
        );
        options.emit(BatchEvent::Aborted(summary.clone()));
    } else {
        info!(
            processed = summary.processed,
            skipped = summary.skipped,
            failed = summary.failed,
            "batch complete"
        );
        options.emit(BatchEvent::Completed(summary.clone()));
    }
    Ok(summary)
}

fn crop_task(
    backend: &impl ImageBackend,
    task: &ImageTask,
    spec: &CropSpec,
    quality: Quality,
) -> CropResult {
    let result = try_crop_task(backend, task, spec, quality);
    match &result {
        CropResult::Cropped => debug!(file = %task.relative_path.display(), "cropped"),
        CropResult::SkippedTooSmall => {
            debug!(file = %task.relative_path.display(), %spec, "too small, skipped")
        }
        CropResult::Failed(reason) => {
            warn!(file = %task.relative_path.display(), %reason, "crop failed")
        }
    }
    result
}

fn try_crop_task(
    backend: &impl ImageBackend,
    task: &ImageTask,
    spec: &CropSpec,
    quality: Quality,
) -> CropResult {
    if let Some(parent) = task.destination_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            return CropResult::Failed(format!("cannot create {}: {e}", parent.display()));
        }
    }

    let dimensions = match backend.identify(&task.source_path) {
        Ok(d) => d,
        Err(e) => return CropResult::Failed(e.to_string()),
    };

    let Some(crop_box) = compute_crop_box(dimensions.width, dimensions.height, spec) else {
        return CropResult::SkippedTooSmall;
    };

    let params = CropParams {
        source: task.source_path.clone(),
        output: task.destination_path.clone(),
        crop_box,
        quality,
    };
    match backend.crop(&params) {
        Ok(()) => CropResult::Cropped,
        Err(e) => CropResult::Failed(e.to_string()),
    }
}

// ============================================================================
// Background batches
// ============================================================================

/// A batch running on its own thread.
///
/// The owner drains [`events`](Self::events) to follow progress, may call
/// [`abort`](Self::abort) at any time, and collects the summary with
/// [`join`](Self::join).
pub struct BatchHandle {
    events: Receiver<BatchEvent>,
    abort: AbortFlag,
    worker: JoinHandle<Result<BatchSummary, ProcessError>>,
}

impl BatchHandle {
    pub fn events(&self) -> &Receiver<BatchEvent> {
        &self.events
    }

    pub fn abort_flag(&self) -> AbortFlag {
        self.abort.clone()
    }

    /// Ask the batch to stop starting new files.
    pub fn abort(&self) {
        self.abort.abort();
    }

    pub fn join(self) -> Result<BatchSummary, ProcessError> {
        self.worker
            .join()
            .unwrap_or(Err(ProcessError::WorkerPanicked))
    }
}

/// Start a batch on a background thread.
///
/// Roots are validated and tasks planned before the thread starts, so a bad
/// input root is reported here and no events are ever sent. The handle owns
/// the event channel; any `events` sender in `options` is replaced. An
/// `abort` flag in `options` is kept, so callers may share one.
pub fn spawn_batch(
    input_root: &Path,
    output_root: &Path,
    spec: CropSpec,
    options: BatchOptions,
) -> Result<BatchHandle, ProcessError> {
    let tasks = prepare(input_root, output_root)?;
    Ok(spawn_tasks(RustBackend::new(), tasks, spec, options))
}

fn spawn_tasks<B>(
    backend: B,
    tasks: Vec<ImageTask>,
    spec: CropSpec,
    options: BatchOptions,
) -> BatchHandle
where
    B: ImageBackend + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let abort = options.abort.clone().unwrap_or_default();
    let options = BatchOptions {
        events: Some(tx),
        abort: Some(abort.clone()),
        ..options
    };

    let worker = std::thread::spawn(move || run_with_backend(&backend, &tasks, &spec, &options));

    BatchHandle {
        events: rx,
        abort,
        worker,
    }
}
