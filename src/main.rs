use clap::Parser;
use raw_to_jpg::config::{self, ConfigError};
use raw_to_jpg::convert::ConvertOptions;
use raw_to_jpg::imaging::{LibRawBackend, OutputFormat, Quality, WhiteBalance};
use raw_to_jpg::output;
use raw_to_jpg::run::{self, Mode, RunTarget, UsageError};
use raw_to_jpg::walk::WalkOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "raw-to-jpg")]
#[command(about = "Convert camera RAW files (CR2/NEF) to JPEG or TIFF")]
#[command(long_about = "\
Convert camera RAW files (CR2/NEF) to JPEG or TIFF

SOURCE is a RAW file or a folder. Folders are mirrored into DESTINATION:
RAW files are converted, every other file is copied alongside (smart mode).
Existing outputs are left alone unless --force is given.

  in/                          out/
  ├── IMG_0001.CR2      →      ├── IMG_0001.jpg   (same mtime as the RAW)
  ├── notes.txt         →      ├── notes.txt
  └── 2024/                    └── 2024/
      └── DSC_0100.NEF  →          └── DSC_0100.jpg   (with --recursive)

Modes:
  default          convert RAW files, copy the rest
  --group-enhance  one bad-pixel map per folder, shared by all its RAW files
  --archive        copy RAW files only, unconverted, always recursive

Set RUST_LOG=debug for diagnostic logging on stderr.
Run 'raw-to-jpg --gen-config' to print a documented config.toml.")]
#[command(version)]
struct Cli {
    /// RAW file or folder to convert
    #[arg(required_unless_present = "gen_config")]
    source: Option<PathBuf>,

    /// Folder to write into
    #[arg(required_unless_present = "gen_config")]
    destination: Option<PathBuf>,

    /// Recurse into subfolders
    #[arg(short, long)]
    recursive: bool,

    /// Overwrite existing output files
    #[arg(short, long)]
    force: bool,

    /// Do not copy non-RAW files (disables smart mode)
    #[arg(short, long)]
    stupid: bool,

    /// Suppress progress output
    #[arg(short, long)]
    quiet: bool,

    /// Copy RAW files unconverted, preserving the folder structure
    #[arg(short, long)]
    archive: bool,

    /// Repair bad pixels found in each file before converting it
    #[arg(short, long)]
    enhance: bool,

    /// Repair bad pixels with one map per folder (supersedes --enhance)
    #[arg(short, long)]
    group_enhance: bool,

    /// Write TIFF instead of JPEG
    #[arg(short, long)]
    tiff: bool,

    /// Use automatic white balance instead of the camera's
    #[arg(short = 'w', long)]
    auto_wb: bool,

    /// Configuration file (see --gen-config)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print a stock config.toml with all options documented
    #[arg(long)]
    gen_config: bool,
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Usage(#[from] UsageError),
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("Failed to install the Ctrl-C handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

impl Cli {
    /// Archive beats group enhance beats plain conversion.
    fn mode(&self, quality: Quality) -> Mode {
        if self.archive {
            return Mode::Archive {
                overwrite: self.force,
            };
        }
        let walk = WalkOptions {
            recursive: self.recursive,
            smart: !self.stupid,
        };
        let convert = ConvertOptions {
            overwrite: self.force,
            white_balance: if self.auto_wb {
                WhiteBalance::Auto
            } else {
                WhiteBalance::Camera
            },
            format: if self.tiff {
                OutputFormat::Tiff
            } else {
                OutputFormat::Jpeg
            },
            quality,
        };
        if self.group_enhance {
            Mode::GroupEnhance { walk, convert }
        } else {
            Mode::Convert {
                walk,
                convert,
                enhance: self.enhance,
            }
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    if cli.gen_config {
        print!("{}", config::stock_config_toml());
        return ExitCode::SUCCESS;
    }

    match execute(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Usage(e)) => {
            println!("{}", e);
            ExitCode::from(1)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(1)
        }
    }
}

fn execute(cli: &Cli) -> Result<(), CliError> {
    let (Some(source), Some(destination)) = (&cli.source, &cli.destination) else {
        return Err(UsageError::MissingArguments.into());
    };
    let config = config::load_config(cli.config.as_deref())?;
    let mode = cli.mode(config.quality());
    let banner = run::plan(&mode, source)?;
    tracing::debug!("mode: {:?}", mode);

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        ctrlc::set_handler(move || cancel.store(true, Ordering::SeqCst))?;
    }

    if !cli.quiet {
        output::print_banner(banner, source, destination);
    }
    let start = Instant::now();

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            println!("{}", output::format_event(&event));
        }
    });

    let backend = LibRawBackend::new(config.detection());
    let catalog = config.catalog();
    let target = RunTarget {
        source: source.as_path(),
        destination: destination.as_path(),
        catalog: &catalog,
        events: (!cli.quiet).then_some(&tx),
        cancel: Some(cancel.as_ref()),
    };
    let result = run::run(&backend, &mode, &target);
    drop(tx);
    if printer.join().is_err() {
        tracing::warn!("progress printer thread panicked");
    }
    let report = result?;

    if !cli.quiet {
        output::print_summary(&report, start.elapsed());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode_for(flags: &[&str]) -> Mode {
        let args = ["raw-to-jpg"]
            .into_iter()
            .chain(flags.iter().copied())
            .chain(["in", "out"]);
        Cli::try_parse_from(args).unwrap().mode(Quality::default())
    }

    fn convert_options(overwrite: bool) -> ConvertOptions {
        ConvertOptions {
            overwrite,
            ..Default::default()
        }
    }

    #[test]
    fn no_flags_is_smart_flat_conversion() {
        assert_eq!(
            mode_for(&[]),
            Mode::Convert {
                walk: WalkOptions {
                    recursive: false,
                    smart: true,
                },
                convert: convert_options(false),
                enhance: false,
            }
        );
    }

    #[test]
    fn archive_beats_group_enhance_and_enhance() {
        assert_eq!(mode_for(&["-a", "-g", "-e"]), Mode::Archive { overwrite: false });
        assert_eq!(mode_for(&["-a", "-f"]), Mode::Archive { overwrite: true });
    }

    #[test]
    fn group_enhance_supersedes_enhance() {
        assert_eq!(
            mode_for(&["-g", "-e"]),
            Mode::GroupEnhance {
                walk: WalkOptions::default(),
                convert: convert_options(false),
            }
        );
    }

    #[test]
    fn enhance_alone_enables_per_file_repair() {
        assert!(matches!(
            mode_for(&["-e"]),
            Mode::Convert { enhance: true, .. }
        ));
    }

    #[test]
    fn walk_and_conversion_flags_are_mapped() {
        let mode = mode_for(&["-r", "-s", "-t", "-w", "-f"]);
        assert_eq!(
            mode,
            Mode::Convert {
                walk: WalkOptions {
                    recursive: true,
                    smart: false,
                },
                convert: ConvertOptions {
                    overwrite: true,
                    white_balance: WhiteBalance::Auto,
                    format: OutputFormat::Tiff,
                    quality: Quality::default(),
                },
                enhance: false,
            }
        );
    }

    #[test]
    fn force_sets_overwrite_in_group_mode() {
        assert!(matches!(
            mode_for(&["-g", "--force"]),
            Mode::GroupEnhance { convert, .. } if convert.overwrite
        ));
    }

    #[test]
    fn configured_quality_reaches_the_mode() {
        let cli = Cli::try_parse_from(["raw-to-jpg", "in", "out"]).unwrap();
        assert!(matches!(
            cli.mode(Quality::new(70)),
            Mode::Convert { convert, .. } if convert.quality == Quality::new(70)
        ));
    }

    #[test]
    fn gen_config_needs_no_paths() {
        let cli = Cli::try_parse_from(["raw-to-jpg", "--gen-config"]).unwrap();
        assert!(cli.gen_config);
        assert!(cli.source.is_none());
    }
}
