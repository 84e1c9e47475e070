//! End-to-end tests of the batch cropping library.
//!
//! Each test lays out a small input tree of synthetic images in a temp dir,
//! runs a batch through the public API and inspects the output tree.

use batch_crop::imaging::CropSpec;
use batch_crop::process::{self, BatchOptions, BatchSummary, CropResult, ProcessError};
use batch_crop::progress::{self, AbortFlag, BatchEvent, Reporter};
use batch_crop::scan::ScanError;
use image::{ImageEncoder, RgbImage, RgbaImage};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ============================================================================
// Fixtures
// ============================================================================

fn write_jpeg(path: &Path, width: u32, height: u32) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x * y) % 256) as u8])
    });
    let writer = std::io::BufWriter::new(fs::File::create(path).unwrap());
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

fn write_png(path: &Path, width: u32, height: u32) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let img = RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, 40, (y % 256) as u8, 200])
    });
    img.save_with_format(path, image::ImageFormat::Png).unwrap();
}

fn write_corrupt(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"\x89PNG\r\n\x1a\nthis is not a png").unwrap();
}

/// Sorted relative paths of every file under `root`.
fn files_under(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    files.sort();
    files
}

fn dimensions(path: &Path) -> (u32, u32) {
    image::image_dimensions(path).unwrap()
}

fn assert_counts_add_up(summary: &BatchSummary) {
    assert!(summary.failed <= summary.skipped);
    assert!(summary.errors.len() <= summary.failed);
    assert!(summary.errors.len() <= process::MAX_REPORTED_ERRORS);
    if !summary.aborted {
        assert_eq!(summary.processed + summary.skipped, summary.total);
    }
}

struct Fixture {
    _tmp: TempDir,
    input: PathBuf,
    output: PathBuf,
}

/// Mixed tree: nested folders, both formats, upper-case extension, one
/// image too small, one corrupt file, a non-image and a hidden file.
fn mixed_tree() -> Fixture {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("photos");
    let output = tmp.path().join("photos-cropped");

    write_jpeg(&input.join("a.jpg"), 320, 400);
    write_jpeg(&input.join("2023/summer/B.JPEG"), 500, 300);
    write_png(&input.join("2023/c.png"), 260, 260);
    write_jpeg(&input.join("tiny.jpg"), 64, 64);
    write_corrupt(&input.join("2023/broken.png"));
    fs::write(input.join("readme.txt"), "not an image").unwrap();
    write_jpeg(&input.join(".hidden/secret.jpg"), 400, 400);

    Fixture {
        _tmp: tmp,
        input,
        output,
    }
}

// ============================================================================
// Whole-batch behaviour
// ============================================================================

#[test]
fn crops_mirrored_tree_and_reports_each_outcome() {
    let fx = mixed_tree();

    let summary = process::run(
        &fx.input,
        &fx.output,
        &CropSpec::BottomMargin(175),
        &BatchOptions::default(),
    )
    .unwrap();

    assert_eq!(summary.total, 5);
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.failed, 1);
    assert!(!summary.aborted);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].filename, "2023/broken.png");
    assert_counts_add_up(&summary);

    assert_eq!(
        files_under(&fx.output),
        vec!["2023/c.png", "2023/summer/B.JPEG", "a.jpg"]
    );
    assert_eq!(dimensions(&fx.output.join("a.jpg")), (320, 225));
    assert_eq!(dimensions(&fx.output.join("2023/summer/B.JPEG")), (500, 125));
    assert_eq!(dimensions(&fx.output.join("2023/c.png")), (260, 85));
}

#[test]
fn output_keeps_source_format() {
    let fx = mixed_tree();
    process::run(
        &fx.input,
        &fx.output,
        &CropSpec::BottomMargin(10),
        &BatchOptions::default(),
    )
    .unwrap();

    let jpeg = fs::read(fx.output.join("a.jpg")).unwrap();
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    let png = fs::read(fx.output.join("2023/c.png")).unwrap();
    assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    assert_eq!(
        image::open(fx.output.join("2023/c.png")).unwrap().color(),
        image::ColorType::Rgba8
    );
}

#[test]
fn sources_are_never_modified() {
    let fx = mixed_tree();
    let before: Vec<Vec<u8>> = files_under(&fx.input)
        .iter()
        .map(|f| fs::read(fx.input.join(f)).unwrap())
        .collect();

    process::run(
        &fx.input,
        &fx.output,
        &CropSpec::CenteredSquare(50),
        &BatchOptions::default(),
    )
    .unwrap();

    let after: Vec<Vec<u8>> = files_under(&fx.input)
        .iter()
        .map(|f| fs::read(fx.input.join(f)).unwrap())
        .collect();
    assert_eq!(before, after);
}

#[test]
fn rerun_is_idempotent() {
    let fx = mixed_tree();
    let spec = CropSpec::EdgeMargins {
        top: 10,
        right: 20,
        bottom: 30,
        left: 40,
    };

    let first = process::run(&fx.input, &fx.output, &spec, &BatchOptions::default()).unwrap();
    let first_bytes: Vec<Vec<u8>> = files_under(&fx.output)
        .iter()
        .map(|f| fs::read(fx.output.join(f)).unwrap())
        .collect();

    let second = process::run(&fx.input, &fx.output, &spec, &BatchOptions::default()).unwrap();
    let second_bytes: Vec<Vec<u8>> = files_under(&fx.output)
        .iter()
        .map(|f| fs::read(fx.output.join(f)).unwrap())
        .collect();

    assert_eq!(first, second);
    assert_eq!(first_bytes, second_bytes);
    assert_eq!(dimensions(&fx.output.join("a.jpg")), (260, 360));
}

#[test]
fn parallel_run_matches_sequential_run() {
    let fx = mixed_tree();
    let spec = CropSpec::BottomMargin(100);
    let sequential_out = fx.output.with_file_name("seq");

    let sequential =
        process::run(&fx.input, &sequential_out, &spec, &BatchOptions::default()).unwrap();
    let parallel = process::run(
        &fx.input,
        &fx.output,
        &spec,
        &BatchOptions {
            jobs: 4,
            ..BatchOptions::default()
        },
    )
    .unwrap();

    assert_eq!(sequential.processed, parallel.processed);
    assert_eq!(sequential.skipped, parallel.skipped);
    assert_eq!(sequential.errors, parallel.errors);
    assert_eq!(files_under(&sequential_out), files_under(&fx.output));
    for file in files_under(&fx.output) {
        assert_eq!(
            fs::read(sequential_out.join(&file)).unwrap(),
            fs::read(fx.output.join(&file)).unwrap(),
            "{file} differs between sequential and parallel runs"
        );
    }
}

#[test]
fn output_inside_input_is_not_recropped() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("photos");
    let output = input.join("cropped");
    write_jpeg(&input.join("a.jpg"), 300, 300);

    let first = process::run(
        &input,
        &output,
        &CropSpec::BottomMargin(50),
        &BatchOptions::default(),
    )
    .unwrap();
    let second = process::run(
        &input,
        &output,
        &CropSpec::BottomMargin(50),
        &BatchOptions::default(),
    )
    .unwrap();

    assert_eq!(first.total, 1);
    assert_eq!(second.total, 1);
    assert_eq!(dimensions(&output.join("a.jpg")), (300, 250));
    assert_eq!(files_under(&output), vec!["a.jpg"]);
}

#[test]
fn many_failures_are_capped_in_report() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("in");
    for i in 0..13 {
        write_corrupt(&input.join(format!("bad{i:02}.png")));
    }
    write_jpeg(&input.join("good.jpg"), 300, 300);

    let summary = process::run(
        &input,
        &tmp.path().join("out"),
        &CropSpec::BottomMargin(10),
        &BatchOptions::default(),
    )
    .unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 13);
    assert_eq!(summary.errors.len(), process::MAX_REPORTED_ERRORS);
    assert_counts_add_up(&summary);
}

#[cfg(unix)]
#[test]
fn symlinked_duplicates_are_cropped_once() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("in");
    write_jpeg(&input.join("Photo.jpg"), 300, 300);
    std::os::unix::fs::symlink(input.join("Photo.jpg"), input.join("photo.JPG")).unwrap();

    let summary = process::run(
        &input,
        &tmp.path().join("out"),
        &CropSpec::BottomMargin(10),
        &BatchOptions::default(),
    )
    .unwrap();

    assert_eq!(summary.total, 1);
    assert_eq!(summary.processed, 1);
}

// ============================================================================
// Configuration errors
// ============================================================================

#[test]
fn missing_input_is_rejected_before_any_write() {
    let tmp = TempDir::new().unwrap();
    let output = tmp.path().join("out");
    let result = process::run(
        &tmp.path().join("nope"),
        &output,
        &CropSpec::BottomMargin(10),
        &BatchOptions::default(),
    );
    assert!(matches!(
        result,
        Err(ProcessError::Scan(ScanError::InputNotFound(_)))
    ));
    assert!(!output.exists());
}

#[test]
fn file_as_input_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("a.jpg");
    write_jpeg(&file, 10, 10);
    let result = process::run(
        &file,
        &tmp.path().join("out"),
        &CropSpec::BottomMargin(10),
        &BatchOptions::default(),
    );
    assert!(matches!(
        result,
        Err(ProcessError::Scan(ScanError::InputNotDirectory(_)))
    ));
}

// ============================================================================
// Background batches and cancellation
// ============================================================================

/// Records what the controller saw and aborts after the first finished file.
struct AbortingReporter {
    abort: AbortFlag,
    progress: Vec<usize>,
    files: Vec<(PathBuf, CropResult)>,
    terminal: Vec<&'static str>,
}

impl Reporter for AbortingReporter {
    fn on_progress(&mut self, completed: usize, _total: usize) {
        self.progress.push(completed);
        self.abort.abort();
    }
    fn on_file(&mut self, relative_path: &Path, result: &CropResult) {
        self.files.push((relative_path.to_path_buf(), result.clone()));
    }
    fn on_complete(&mut self, _summary: &BatchSummary) {
        self.terminal.push("complete");
    }
    fn on_aborted(&mut self, _summary: &BatchSummary) {
        self.terminal.push("aborted");
    }
}

#[test]
fn abort_from_controller_stops_the_batch() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("in");
    let output = tmp.path().join("out");
    for i in 0..30 {
        write_jpeg(&input.join(format!("{i:02}.jpg")), 200, 200);
    }

    let handle = process::spawn_batch(
        &input,
        &output,
        CropSpec::BottomMargin(20),
        BatchOptions::default(),
    )
    .unwrap();
    let mut reporter = AbortingReporter {
        abort: handle.abort_flag(),
        progress: Vec::new(),
        files: Vec::new(),
        terminal: Vec::new(),
    };
    let driven = progress::drive(handle.events(), &mut reporter).unwrap();
    let summary = handle.join().unwrap();

    assert_eq!(driven, summary);
    assert_eq!(reporter.terminal.len(), 1);
    assert!(summary.aborted || summary.completed() == summary.total);
    if summary.aborted {
        assert_eq!(reporter.terminal, vec!["aborted"]);
        assert!(summary.completed() < summary.total);
    }
    // Only files that reported a result exist, and nothing is half written.
    assert_eq!(files_under(&output).len(), summary.processed);
    assert_eq!(reporter.files.len(), summary.completed());
    assert_eq!(
        reporter.progress,
        (1..=summary.completed()).collect::<Vec<_>>()
    );
}

#[test]
fn pre_set_abort_flag_attempts_nothing() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("in");
    let output = tmp.path().join("out");
    write_jpeg(&input.join("a.jpg"), 200, 200);
    write_jpeg(&input.join("sub/b.jpg"), 200, 200);

    let abort = AbortFlag::new();
    abort.abort();
    let handle = process::spawn_batch(
        &input,
        &output,
        CropSpec::BottomMargin(20),
        BatchOptions {
            abort: Some(abort),
            ..BatchOptions::default()
        },
    )
    .unwrap();
    let events: Vec<BatchEvent> = handle.events().iter().collect();
    let summary = handle.join().unwrap();

    assert!(summary.aborted);
    assert_eq!(summary.completed(), 0);
    assert_eq!(
        events,
        vec![
            BatchEvent::Started { total: 2 },
            BatchEvent::Aborted(summary)
        ]
    );
    assert!(files_under(&output).is_empty());
}

#[test]
fn background_batch_delivers_ordered_progress() {
    let fx = mixed_tree();
    let handle = process::spawn_batch(
        &fx.input,
        &fx.output,
        CropSpec::BottomMargin(175),
        BatchOptions {
            jobs: 3,
            ..BatchOptions::default()
        },
    )
    .unwrap();

    let events: Vec<BatchEvent> = handle.events().iter().collect();
    let summary = handle.join().unwrap();

    assert_eq!(events.first(), Some(&BatchEvent::Started { total: 5 }));
    assert_eq!(events.last(), Some(&BatchEvent::Completed(summary.clone())));
    let progress: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            BatchEvent::Progress { completed, total } => {
                assert_eq!(*total, 5);
                Some(*completed)
            }
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![1, 2, 3, 4, 5]);
    assert_counts_add_up(&summary);
}
