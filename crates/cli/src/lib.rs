pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use mailquote_core::config::LoadOptions;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "mailquote",
    about = "Mailquote operator CLI",
    long_about = "Inspect configuration, check readiness, probe the mailbox connection and run one-shot ingestion.",
    after_help = "Examples:\n  mailquote doctor --json\n  mailquote config\n  mailquote probe\n  mailquote fetch --store"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Read configuration from this TOML file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, mailbox credentials, DB connectivity and Graph access")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Run the mailbox connection test and print its step-by-step result")]
    Probe,
    #[command(about = "Fetch recent mailbox messages once and print the processed batch")]
    Fetch {
        #[arg(long, help = "Persist processed messages to the configured database")]
        store: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let options = LoadOptions {
        require_file: cli.config.is_some(),
        config_path: cli.config,
        ..LoadOptions::default()
    };

    let result = match cli.command {
        Command::Config => commands::config::run(options),
        Command::Doctor { json } => commands::doctor::run(options, json),
        Command::Probe => commands::probe::run(options),
        Command::Fetch { store } => commands::fetch::run(options, store),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Command output owns stdout, so diagnostics go to stderr and stay quiet
/// unless `RUST_LOG` asks for more.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}
