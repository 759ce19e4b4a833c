//! `agentbridge config`: configuration management commands.

use std::path::Path;

use agentbridge_config::AppConfig;

use super::{config_file, load_config};

pub fn show(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    println!("{}", toml::to_string_pretty(&config.redacted())?);
    Ok(())
}

pub fn path(config_path: Option<&Path>) {
    println!("{}", config_file(config_path).display());
}

pub fn init(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_file(config_path);
    if write_default(&path)? {
        println!("Wrote default config to {}", path.display());
    } else {
        println!("Config already exists at {}", path.display());
    }
    Ok(())
}

/// Write the default config unless a file is already there.
fn write_default(path: &Path) -> std::io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, AppConfig::default_toml())?;
    Ok(true)
}

pub fn validate(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            println!("   ❌ {e}");
            return Err(e);
        }
    };
    println!("   ✅ Config parsed successfully");

    let warnings = warnings(&config);
    if warnings.is_empty() {
        println!("   ✅ All checks passed");
    } else {
        println!();
        for w in &warnings {
            println!("   ⚠️  {w}");
        }
    }

    Ok(())
}

fn warnings(config: &AppConfig) -> Vec<&'static str> {
    let mut warnings = Vec::new();
    if config.is_hosted_backend() && config.backend.api_key.is_none() {
        warnings.push("Hosted backend without an API key (set LETTA_API_KEY)");
    }
    if config.caches_diverge() {
        warnings.push("[sessions] and [session_keys] caches are configured differently");
    }
    if config.gateway.host == "0.0.0.0" {
        warnings.push("Gateway bound to 0.0.0.0; it has no authentication of its own");
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_writes_loadable_default_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        assert!(write_default(&path).unwrap());
        assert!(!write_default(&path).unwrap());

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.gateway.port, AppConfig::default().gateway.port);
    }

    #[test]
    fn default_config_has_no_warnings() {
        assert!(warnings(&AppConfig::default()).is_empty());
    }

    #[test]
    fn hosted_backend_without_key_warns() {
        let mut config = AppConfig::default();
        config.backend.base_url = "https://api.letta.com".into();
        assert_eq!(warnings(&config).len(), 1);
    }

    #[test]
    fn explicit_path_wins() {
        let path = Path::new("/etc/agentbridge.toml");
        assert_eq!(config_file(Some(path)), path);
        assert!(config_file(None).ends_with("config.toml"));
    }
}
