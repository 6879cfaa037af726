use std::{ffi::OsString, path::PathBuf};

use clap::Parser;
use color_eyre::eyre::{self, Context};
use framediff::{
    batch,
    diff::Threshold,
    extract::{self, ExtractOptions, DEFAULT_JPEG_QUALITY},
};
use framediff_common::{
    bin_common::init::{init_eyre, init_logger},
    utils::fsutils::{self, read_optional_file},
};

#[derive(Parser, Debug)]
#[command()]
/// Saves the frames of videos where the picture changes.
///
/// Every video under VIDEO_DIR is sampled once per second. A sample is saved as
/// `<OUTPUT>/output_<video name>/frame_HH_MM_SS.jpg` when its mean absolute pixel
/// difference to the previous sample exceeds the threshold.
///
/// Flags are read from `.framediffrc` in the current directory when none are given.
struct Cli {
    /// Where to place the folders with the saved frames
    #[arg(long, default_value = "out_frames")]
    output: PathBuf,

    /// Save a sample when its difference to the previous one is above this (0-255)
    #[arg(long, default_value_t = Threshold::DEFAULT)]
    threshold: Threshold,

    /// The quality of the saved JPEGs
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// A file to additionally write the logs to
    #[arg(long)]
    logfile: Option<PathBuf>,

    /// Log the difference of every sampled second
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Folder to search for videos in, recursively
    video_dir: PathBuf,
}

const ARGS_FILE: &str = ".framediffrc";

fn cli_arguments() -> eyre::Result<Cli> {
    let args: Vec<OsString> = std::env::args_os().collect();
    let flags = if args.len() == 1 {
        read_optional_file(ARGS_FILE)
            .wrap_err_with(|| format!("Could not read config file at: {ARGS_FILE}"))?
    } else {
        None
    };

    Ok(Cli::parse_from(add_default_flags(args, flags.as_deref())))
}

/// The whitespace separated `flags` are only used when no arguments were given.
fn add_default_flags(mut args: Vec<OsString>, flags: Option<&str>) -> Vec<OsString> {
    if args.len() == 1 {
        if let Some(flags) = flags {
            args.extend(flags.split_whitespace().map(OsString::from));
        }
    }
    args
}

fn main() -> eyre::Result<()> {
    init_eyre()?;
    let cli = cli_arguments()?;
    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    init_logger(cli.logfile.as_deref(), level)?;

    log::debug!("CLI arguments: {cli:#?}");

    eyre::ensure!(
        cli.video_dir.is_dir(),
        "The video folder is not a directory: {}",
        cli.video_dir.display()
    );
    if fsutils::ensure_dir(&cli.output).wrap_err_with(|| {
        format!("Failed to create the output folder at {}", cli.output.display())
    })? {
        log::info!("Created output folder: {}", cli.output.display());
    }

    let options = ExtractOptions {
        threshold: cli.threshold,
        jpeg_quality: cli.jpeg_quality,
    };
    log::info!(
        "Searching {} for videos, saving frames with a difference above {}",
        cli.video_dir.display(),
        options.threshold
    );

    let report = batch::process_directory(&cli.video_dir, |video| {
        extract::extract_frames(video, &cli.output, &options)
    });
    log::info!("{report}");

    Ok(())
}
