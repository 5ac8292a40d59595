use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use pricetrail_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_FILE};
use toml::Value;

struct ConfigFile {
    path: PathBuf,
    doc: Value,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };
    let file = detect_config_file();

    let entries: [(&str, String, &[&str]); 7] = [
        ("database.url", config.database.url.clone(), &["PRICETRAIL_DATABASE_URL"]),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["PRICETRAIL_DATABASE_MAX_CONNECTIONS"],
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["PRICETRAIL_DATABASE_TIMEOUT_SECS"],
        ),
        (
            "pricing.system_actor_id",
            config.pricing.system_actor_id.to_string(),
            &["PRICETRAIL_PRICING_SYSTEM_ACTOR_ID"],
        ),
        (
            "pricing.base_currency",
            config.pricing.base_currency.clone(),
            &["PRICETRAIL_PRICING_BASE_CURRENCY"],
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            &["PRICETRAIL_LOGGING_LEVEL", "PRICETRAIL_LOG_LEVEL"],
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            &["PRICETRAIL_LOGGING_FORMAT", "PRICETRAIL_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_keys) in entries {
        let source = field_source(key, env_keys, file.as_ref());
        lines.push(format!("- {key} = {value} (source: {source})"));
    }
    lines.join("\n")
}

fn detect_config_file() -> Option<ConfigFile> {
    let path = [PathBuf::from(DEFAULT_CONFIG_FILE), Path::new("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())?;
    let doc = fs::read_to_string(&path).ok()?.parse::<Value>().ok()?;
    Some(ConfigFile { path, doc })
}

fn field_source(key_path: &str, env_keys: &[&str], file: Option<&ConfigFile>) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    match file {
        Some(file) if contains_path(&file.doc, key_path) => {
            format!("file ({})", file.path.display())
        }
        _ => "default".to_string(),
    }
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}
