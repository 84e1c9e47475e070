use batch_crop::config::{self, ConfigLoad, DEFAULT_APP_KEY};
use batch_crop::imaging::CropSpec;
use batch_crop::output::{self, CliReporter};
use batch_crop::process::{self, BatchOptions};
use batch_crop::{progress, scan, version};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "batch-crop")]
#[command(about = "Crop every photo in a folder tree into a mirrored output tree")]
#[command(long_about = "\
Crop every photo in a folder tree into a mirrored output tree

Every .jpg, .jpeg and .png file under INPUT (case-insensitive, hidden
entries skipped) is cropped with the same rule and written to the same
relative path under the output folder, in its original format. Images too
small for the rule are skipped; unreadable files are reported and skipped.
Source files are never modified.

Crop modes (pick one):

  --bottom N          remove N pixels from the bottom edge (default: 175,
                      or crop.bottom from the config file)
  --square N          keep a 2N x 2N square around the image centre
  --margins T,R,B,L   remove the given margin from each edge

Run 'batch-crop gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "config.toml", global = true)]
    config: PathBuf,

    /// Log more detail to stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crop all images under a folder
    Crop(CropArgs),
    /// Compare a release feed against the running version
    CheckUpdate {
        /// Feed JSON file, or `-` for stdin
        #[arg(long)]
        feed: Option<PathBuf>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[derive(clap::Args)]
struct CropArgs {
    /// Folder to read images from
    input: PathBuf,

    /// Folder to write cropped images to [default: ./<INPUT name>-cropped]
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[command(flatten)]
    mode: CropMode,

    /// Parallel workers [default: processing.max_processes, or all cores]
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Print only the summary
    #[arg(short, long)]
    quiet: bool,

    /// Print the summary as JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args)]
#[group(multiple = false)]
struct CropMode {
    /// Remove PX pixels from the bottom edge
    #[arg(long, value_name = "PX")]
    bottom: Option<u32>,

    /// Keep a square of side 2*PX centred on the image
    #[arg(long, value_name = "PX")]
    square: Option<u32>,

    /// Remove a margin from each edge
    #[arg(long, value_name = "T,R,B,L", value_parser = parse_margins)]
    margins: Option<CropSpec>,
}

impl CropMode {
    fn resolve(&self, default_bottom: u32) -> CropSpec {
        if let Some(spec) = self.margins {
            spec
        } else if let Some(half) = self.square {
            CropSpec::CenteredSquare(half)
        } else {
            CropSpec::BottomMargin(self.bottom.unwrap_or(default_bottom))
        }
    }
}

fn parse_margins(value: &str) -> Result<CropSpec, String> {
    let parts = value
        .split(',')
        .map(|p| p.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid margin: {e}"))?;
    match parts[..] {
        [top, right, bottom, left] => Ok(CropSpec::EdgeMargins {
            top,
            right,
            bottom,
            left,
        }),
        _ => Err(format!(
            "expected 4 comma-separated values (top,right,bottom,left), got {}",
            parts.len()
        )),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let ConfigLoad { config, warning } =
        config::load_app_config_or_default(&cli.config, DEFAULT_APP_KEY);
    if let Some(warning) = warning {
        eprintln!(
            "Warning: ignoring {} ({}), using defaults",
            cli.config.display(),
            warning
        );
    }

    match cli.command {
        Command::Crop(args) => {
            let spec = args.mode.resolve(config.crop.bottom);
            let output_root = args
                .output
                .unwrap_or_else(|| scan::default_output_root(&args.input));
            let jobs = args
                .jobs
                .unwrap_or_else(|| config::effective_threads(&config.processing));

            if !args.quiet && !args.json {
                println!(
                    "{}",
                    output::format_batch_header(&args.input, &output_root, &spec)
                );
            }

            let options = BatchOptions {
                jobs,
                ..BatchOptions::default()
            };
            let handle = process::spawn_batch(&args.input, &output_root, spec, options)?;
            let mut reporter = if args.json {
                CliReporter::silent()
            } else {
                CliReporter::new(args.quiet)
            };
            progress::drive(handle.events(), &mut reporter);
            let summary = handle.join()?;

            if args.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
        }
        Command::CheckUpdate { feed } => {
            let Some(feed) = feed else {
                let hint = if config.update_url.is_empty() {
                    String::new()
                } else {
                    format!(" (published at {})", config.update_url)
                };
                return Err(format!("no update feed given; pass one with --feed{hint}").into());
            };
            let text = if feed.as_os_str() == "-" {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                buf
            } else {
                std::fs::read_to_string(&feed)?
            };
            let release = version::parse_feed(&text)?;
            let status = version::check_update(&release, &config.version);
            output::print_update_status(&status, &config.version);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Install the stderr log subscriber. `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
