//! Configuration loading and data root resolution

use crate::{Error, Result};
use std::path::PathBuf;

/// Default port for the resource management service
pub const DEFAULT_RM_PORT: u16 = 5740;

/// Data root resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file (`data_root` key)
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_data_root(cli_arg: Option<&str>, env_var_name: &str) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = locate_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(data_root) = config.get("data_root").and_then(|v| v.as_str()) {
                    return PathBuf::from(data_root);
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    default_data_root()
}

/// Resolve the service port: CLI argument > environment variable > default
pub fn resolve_port(cli_arg: Option<u16>, env_var_name: &str, default: u16) -> u16 {
    if let Some(port) = cli_arg {
        return port;
    }
    if let Ok(raw) = std::env::var(env_var_name) {
        if let Ok(port) = raw.parse::<u16>() {
            return port;
        }
    }
    default
}

/// Ensure the data root directory exists, creating it if necessary
pub fn ensure_data_dir(data_root: &PathBuf) -> Result<()> {
    if !data_root.exists() {
        std::fs::create_dir_all(data_root)?;
    }
    if !data_root.is_dir() {
        return Err(Error::Config(format!(
            "Data root is not a directory: {}",
            data_root.display()
        )));
    }
    Ok(())
}

/// Get default configuration file path for the platform
fn locate_config_file() -> Result<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("tutorium").join("config.toml"));

    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/tutorium/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// Get OS-dependent default data root path
fn default_data_root() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("tutorium"))
        .unwrap_or_else(|| PathBuf::from("./tutorium_data"))
}
