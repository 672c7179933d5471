//! runlog: turn terminal sessions into runbooks.
//!
//! Records the commands typed in an instrumented subshell, or expands a
//! selection of past shell history without re-running it, and exports the
//! resulting command list.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use runlog_cli::config::{self, Config};
use runlog_cli::display;
use runlog_core::RunlogError;
use tracing::error;

/// runlog: record terminal sessions into runbooks
#[derive(Parser)]
#[command(name = "runlog", version = "0.1.0", about = "Record terminal sessions and shell history into runbooks")]
struct Cli {
    /// Config file path
    #[arg(long = "config", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record the commands you run in a new subshell
    Record {
        /// Accepted for compatibility; has no effect, every command is kept
        #[arg(long)]
        ignore_errors: bool,

        /// Write the runbook as JSON instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Shell to record (defaults to $SHELL)
        #[arg(long)]
        shell: Option<PathBuf>,

        /// Collector socket path
        #[arg(long)]
        socket: Option<PathBuf>,
    },

    /// Create a runbook from recent shell history
    History {
        /// Number of recent history entries to offer
        #[arg(short, long)]
        limit: Option<usize>,

        /// Use every entry instead of prompting for a selection
        #[arg(long)]
        all: bool,

        /// Write the runbook as JSON instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Shell whose history is read (defaults to $SHELL)
        #[arg(long)]
        shell: Option<PathBuf>,

        /// Collector socket path
        #[arg(long)]
        socket: Option<PathBuf>,

        /// Seconds to wait for alias expansion
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Print the shell hook to add to your rc file
    Init {
        /// bash or zsh
        shell: String,
    },

    /// Report one command to a running collector
    #[command(hide = true)]
    Send {
        /// Collector socket path
        #[arg(long)]
        socket: PathBuf,

        /// Command text
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        text: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing. RUST_LOG wins over the built-in filters.
    let filter = |default: &str| {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default))
    };
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(filter("runlog=debug,runlog_cli=debug,runlog_core=debug"))
            .with_writer(std::io::stderr)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter("runlog=warn,runlog_cli=warn,runlog_core=warn"))
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    // Load config file.
    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let cfg = match Config::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("runlog: {e:#}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Command::Record {
            ignore_errors,
            output,
            shell,
            socket,
        } => {
            let args = commands::record::RecordArgs {
                ignore_errors,
                output,
                shell,
                socket,
            };
            commands::record::run(&cfg, args).await
        }
        Command::History {
            limit,
            all,
            output,
            shell,
            socket,
            timeout,
        } => {
            let args = commands::history::HistoryArgs {
                limit,
                all,
                output,
                shell,
                socket,
                timeout_secs: timeout,
            };
            commands::history::run(&cfg, args).await
        }
        Command::Init { shell } => commands::init::run(&shell),
        Command::Send { socket, text } => commands::send::run(&socket, &text),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        match e.downcast_ref::<RunlogError>() {
            Some(err) if err.remediation().is_some() => display::error(&display::describe(err)),
            _ => eprintln!("runlog: {e:#}"),
        }
        std::process::exit(1);
    }
}
