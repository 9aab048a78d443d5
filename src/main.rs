use anyhow::{Result, bail};
use audio_batch_prep::{
    AudioFormats, AudioTargetOutput, BatchReport, FileNameFormatter, RegexReplaceFormatter,
    RenameFileCommandGetter, SampleLimit, Terminal, TitleCaseSanitizer, convert_audio_files,
    normalize_audio_filenames, remove_audio_files_metadata,
};
use clap::{Parser, Subcommand};
use log::{error, info};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize file names
    Rename {
        /// input directory
        root: PathBuf,

        /// extension of the files to rename
        #[arg(long, default_value = "wav", value_parser = parse_format)]
        ext: AudioFormats,

        /// rename files matching REGEX with TEMPLATE, first match wins; TEMPLATE may use $1 and {count}
        #[arg(short, long = "pattern", value_name = "REGEX=TEMPLATE")]
        patterns: Vec<String>,

        /// do not apply Title Case sanitization before the patterns
        #[arg(long)]
        keep_case: bool,
    },
    /// Downscale sample rate and bit depth to what the device supports
    Convert {
        /// input directory
        root: PathBuf,

        /// max sample rate in Hz
        #[arg(long, default_value_t = 44100)]
        max_sample_rate: u32,

        /// max bit depth, one of 8, 16, 24, 32
        #[arg(long, default_value_t = 16, value_parser = parse_bit_depth)]
        max_bit_depth: u16,
    },
    /// Remove all metadata from WAV files
    StripMetadata {
        /// input directory
        root: PathBuf,
    },
    /// Rename, convert and strip metadata for an Alesis Strike Multipad
    Prepare {
        /// input directory
        root: PathBuf,
    },
}

fn parse_format(value: &str) -> Result<AudioFormats, String> {
    AudioFormats::from_extension(value).ok_or_else(|| {
        format!(
            "unsupported extension, expected one of {}",
            AudioFormats::supported_extensions().join(", ")
        )
    })
}

fn parse_bit_depth(value: &str) -> Result<u16, String> {
    match value.trim().parse::<u16>() {
        Ok(bits @ (8 | 16 | 24 | 32)) => Ok(bits),
        _ => Err("expected one of 8, 16, 24, 32".to_string()),
    }
}

fn title_case_getter() -> RenameFileCommandGetter {
    RenameFileCommandGetter::new(vec![Box::new(TitleCaseSanitizer)])
}

fn summarize(report: &BatchReport) {
    info!(
        "{:?}: {} planned, {} succeeded, {} failed, {} skipped",
        report.outcome,
        report.planned,
        report.succeeded,
        report.failed(),
        report.skipped
    );
}

fn check(report: BatchReport) -> Result<()> {
    summarize(&report);
    if report.failed() > 0 {
        bail!("{} operations failed", report.failed());
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let mut console = Terminal::stdio();
    match cli.cmd {
        Commands::Rename {
            root,
            ext,
            patterns,
            keep_case,
        } => {
            let mut chain: Vec<Box<dyn FileNameFormatter>> = Vec::new();
            if !keep_case {
                chain.push(Box::new(TitleCaseSanitizer));
            }
            if !patterns.is_empty() {
                chain.push(Box::new(RegexReplaceFormatter::parse(&patterns[..])?));
            }
            if chain.is_empty() {
                bail!("--keep-case without any --pattern has nothing to do");
            }
            let getter = RenameFileCommandGetter::new(chain);
            check(normalize_audio_filenames(&root, &getter, ext, &mut console)?)
        }
        Commands::Convert {
            root,
            max_sample_rate,
            max_bit_depth,
        } => {
            let target = AudioTargetOutput {
                format: AudioFormats::Wav,
                max_sample_rate_hertz: max_sample_rate,
                sample_limit: SampleLimit::MaxWidthBytes(max_bit_depth / 8),
            };
            info!("  Target: {:?}", target);
            check(convert_audio_files(&root, &target, &mut console)?)
        }
        Commands::StripMetadata { root } => check(remove_audio_files_metadata(
            &root,
            AudioFormats::Wav,
            &mut console,
        )?),
        Commands::Prepare { root } => {
            let reports = [
                normalize_audio_filenames(&root, &title_case_getter(), AudioFormats::Wav, &mut console)?,
                convert_audio_files(&root, &AudioTargetOutput::alesis_strike_multipad(), &mut console)?,
                remove_audio_files_metadata(&root, AudioFormats::Wav, &mut console)?,
            ];
            reports.iter().for_each(summarize);
            let failed: usize = reports.iter().map(BatchReport::failed).sum();
            if failed > 0 {
                bail!("{} operations failed", failed);
            }
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    _ = pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .parse_filters("symphonia=error")
        .parse_default_env()
        .try_init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(_) => {
            info!("Finished successfully!");
            Ok(())
        }
        Err(e) => {
            error!("Failed: {}", e);
            Err(e)
        }
    }
}
