//! CLI tool for Cipher Bench (cbench)

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;

use cbenchlib::memory::alloc::TrackingAllocator;
use cbenchlib::{AesGcmCipher, HarnessConfig, Reporter};

#[global_allocator]
static GLOBAL: TrackingAllocator = TrackingAllocator::system();

#[derive(Parser)]
#[command(name = "cbench")]
#[command(about = "Cipher Bench: latency, heap and CPU profiling for AES-256-GCM encrypt/decrypt", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full sweep, print the report and write charts
    Run {
        /// TOML configuration file (defaults are used when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory for chart artifacts (overrides the config file)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Also write the full report as JSON to this file
        #[arg(long)]
        json: Option<PathBuf>,

        /// Print the text report only
        #[arg(long)]
        no_charts: bool,
    },
    /// Print a sample configuration file
    SampleConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    env_logger::init();

    match cli.command {
        Some(Commands::Run {
            config,
            output_dir,
            json,
            no_charts,
        }) => handle_run(config, output_dir, json, no_charts)?,
        Some(Commands::SampleConfig) => print!("{}", HarnessConfig::sample_toml()),
        None => handle_run(None, None, None, false)?,
    }

    Ok(())
}

fn handle_run(
    config_path: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    json: Option<PathBuf>,
    no_charts: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match config_path {
        Some(path) => HarnessConfig::from_toml_file(&path)?,
        None => HarnessConfig::default(),
    };
    if let Some(dir) = output_dir {
        config.output_dir = dir;
    }
    if no_charts {
        config.charts.enabled = false;
    }

    let mut reporter = Reporter::new(Box::new(AesGcmCipher::new()), config);
    let mut stdout = std::io::stdout().lock();
    let report = reporter.run(&mut stdout)?;

    let config = reporter.config();
    if config.charts.enabled {
        eprintln!(
            "{} charts written to {}",
            "[INFO]".cyan(),
            config.output_dir.display()
        );
    }

    if let Some(path) = json {
        std::fs::write(&path, report.to_json()?)?;
        eprintln!("{} report written to {}", "[INFO]".cyan(), path.display());
    }

    Ok(())
}
