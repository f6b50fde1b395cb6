//! Configuration loading

use anyhow::Result;

use crate::Config;

/// Load configuration from config file or environment variables
///
/// Config file search order:
/// 1. `PREDLIVE_CONFIG_PATH` environment variable (explicit path)
/// 2. ./config.yaml (current working directory)
/// 3. Fall back to environment variables only
///
/// Runs before logging is initialized, so progress goes to stderr.
pub fn load_config() -> Result<Config> {
    let config_path = std::env::var("PREDLIVE_CONFIG_PATH")
        .ok()
        .filter(|p| std::path::Path::new(p).exists())
        .or_else(|| {
            let cwd = "config.yaml";
            if std::path::Path::new(cwd).exists() {
                Some(cwd.to_string())
            } else {
                None
            }
        });

    let config = if let Some(path) = config_path {
        eprintln!("Loading config from {path}");
        match Config::from_file(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Failed to load {path}: {e}");
                eprintln!("Falling back to environment variables");
                Config::from_env().unwrap_or_default()
            }
        }
    } else {
        Config::from_env().unwrap_or_else(|e| {
            eprintln!("Failed to load config: {e}");
            eprintln!("Using default configuration");
            Config::default()
        })
    };

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Config validation error: {error}");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s): {}",
            errors.len(),
            errors.join("; ")
        ));
    }

    Ok(config)
}
