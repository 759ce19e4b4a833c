pub mod agents;
pub mod config_cmd;
pub mod serve;
pub mod status;

use std::path::Path;

use agentbridge_config::AppConfig;

/// Load config from `path` if given, else the default location; env overrides apply.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    };
    config.map_err(|e| format!("Failed to load config: {e}").into())
}

/// The config file in use.
pub fn config_file(path: Option<&Path>) -> std::path::PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}
