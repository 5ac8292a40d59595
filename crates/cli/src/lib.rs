pub mod commands;

use clap::{Parser, Subcommand};
use pricetrail_core::config::{AppConfig, LogFormat};
use std::process::ExitCode;
use tracing::Level;

use crate::commands::history::DEFAULT_HISTORY_LIMIT;
use crate::commands::quote::QuoteArgs;

#[derive(Debug, Parser)]
#[command(
    name = "pricetrail",
    about = "Pricetrail operator CLI",
    long_about = "Quote adjusted prices, inspect the price-change audit trail, and manage the pricing database.",
    after_help = "Examples:\n  pricetrail migrate\n  pricetrail quote --base 100 --multiplier 1.5 --discount 20 --setup-fee 25\n  pricetrail history --price-id 42 --limit 10"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Validate config, database connectivity, and migration status")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Compute an adjusted price, optionally converted into another currency")]
    Quote(QuoteArgs),
    #[command(about = "List audit records for a price, newest first")]
    History {
        #[arg(long = "price-id")]
        price_id: i64,
        #[arg(long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: u32,
    },
    #[command(about = "Count audit records per change type for a price")]
    Summary {
        #[arg(long = "price-id")]
        price_id: i64,
    },
}

/// Installs the global subscriber. Events go to stderr so stdout stays a
/// single JSON outcome per command.
pub fn init_logging(config: &AppConfig) {
    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let installed = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if installed.is_err() {
        tracing::debug!(event_name = "cli.logging.already_initialized", "subscriber already set");
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Quote(args) => commands::quote::run(&args),
        Command::History { price_id, limit } => commands::history::run(price_id, limit),
        Command::Summary { price_id } => commands::summary::run(price_id),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
