use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ifsweep::commands;
use ifsweep::{SweepFile, init_logging};
use ifsweep_core::progress::SweepProgress;

#[derive(Parser, Debug)]
#[command(name = "ifsweep")]
#[command(about = "Parameter sweep scheduler for the IFs simulation engine")]
struct Args {
    /// Directory for ifsweep.log (default: ~/.ifsweep/)
    #[arg(short = 'd', long, global = true)]
    log_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every combination of the sweep
    Run {
        /// Path to the sweep file
        sweep: PathBuf,

        /// Stop after this many combinations
        #[arg(long)]
        limit: Option<u64>,
    },
    /// Show the size of the sweep and preview its first scenarios
    Plan {
        /// Path to the sweep file
        sweep: PathBuf,

        /// Number of scenarios to render
        #[arg(long, default_value_t = 1)]
        preview: usize,
    },
}

fn default_log_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ifsweep")
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let log_dir = args.log_dir.unwrap_or_else(default_log_dir);
    init_logging(&log_dir, &args.log_level)?;

    match args.command {
        Command::Run { sweep, limit } => {
            let sweep = SweepFile::load(&sweep)?;
            let progress = SweepProgress::default();
            ctrlc::set_handler(commands::interrupt_handler(progress.clone()))?;
            let summary = commands::run(&sweep, limit, progress)?;
            tracing::info!(
                completed = summary.completed,
                failed = summary.failed,
                cancelled = summary.cancelled,
                elapsed_mins = summary.elapsed.as_secs_f64() / 60.0,
                "Sweep complete"
            );
            if summary.failed > 0 {
                tracing::warn!(
                    failed = summary.failed,
                    "Some combinations failed, see {}",
                    log_dir.join(ifsweep::logging::LOG_FILE).display()
                );
            }
        }
        Command::Plan { sweep, preview } => {
            let sweep = SweepFile::load(&sweep)?;
            commands::plan(&sweep, preview, &mut io::stdout().lock())?;
        }
    }

    tracing::info!("ifsweep shutting down");
    Ok(())
}
