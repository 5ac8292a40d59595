use std::process::ExitCode;

use pricetrail_core::config::{AppConfig, LoadOptions};

fn main() -> ExitCode {
    // Config errors are reported by the command itself; logging just stays off.
    if let Ok(config) = AppConfig::load(LoadOptions::default()) {
        pricetrail_cli::init_logging(&config);
    }
    pricetrail_cli::run()
}
