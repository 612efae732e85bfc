use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use trellis_batch::{AckMode, Encoding};
use trellis_cli::config::{Config, OutputFormat};
use trellis_cli::demo::{self, DEFAULT_CLICKS, DemoOptions};
use trellis_cli::inspect;

#[derive(Parser)]
#[command(name = "trellis")]
#[command(version, about, long_about = None)]
struct Cli {
    /// JSON config file (log_level, encoding, ack_mode, output)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter used when TRELLIS_LOG and RUST_LOG are unset
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Output format: pretty (default), json
    #[arg(short, long, global = true)]
    output: Option<OutputFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the built-in demo app, clicking buttons by label
    Demo {
        /// Wire encoding for batches
        #[arg(long)]
        encoding: Option<EncodingArg>,
        /// Acknowledge batches after applying them instead of on encode
        #[arg(long)]
        deferred_ack: bool,
        /// Write every batch to this directory as batch-<id>.bin
        #[arg(long)]
        dump: Option<PathBuf>,
        /// Button to click; repeat for more. Defaults to a built-in script
        #[arg(long = "click")]
        clicks: Vec<String>,
    },
    /// Decode a linear batch file
    Inspect {
        /// Path to the batch
        file: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum EncodingArg {
    Linear,
    SharedMemory,
}

impl From<EncodingArg> for Encoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Linear => Encoding::Linear,
            EncodingArg::SharedMemory => Encoding::SharedMemory,
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_env("TRELLIS_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if let Some(output) = cli.output {
        config.output = output;
    }
    init_tracing(&config.log_level);
    debug!(?config, "loaded config");

    match cli.command {
        Commands::Demo {
            encoding,
            deferred_ack,
            dump,
            clicks,
        } => {
            if let Some(encoding) = encoding {
                config.encoding = encoding.into();
            }
            if deferred_ack {
                config.ack_mode = AckMode::Deferred;
            }
            let clicks = if clicks.is_empty() {
                DEFAULT_CLICKS.iter().map(|c| c.to_string()).collect()
            } else {
                clicks
            };
            let report = demo::run_demo(&DemoOptions {
                encoding: config.encoding,
                ack_mode: config.ack_mode,
                clicks,
                dump,
            })?;
            demo::print_report(&report, config.output)
        }
        Commands::Inspect { file } => inspect::run_inspect(&file, config.output),
    }
}
