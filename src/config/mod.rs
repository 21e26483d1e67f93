mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./config.toml",
        "./reelstitch.toml",
        "~/.config/reelstitch/config.toml",
        "/etc/reelstitch/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
fn validate_config(config: &Config) -> Result<()> {
    if config.storage.work_dir.as_os_str().is_empty() {
        anyhow::bail!("storage.work_dir cannot be empty");
    }

    if config.delivery.direct_ceiling_bytes == 0 || config.delivery.relay_ceiling_bytes == 0 {
        anyhow::bail!("delivery ceilings cannot be 0");
    }

    if config.delivery.direct_ceiling_bytes > config.delivery.relay_ceiling_bytes {
        anyhow::bail!(
            "delivery.direct_ceiling_bytes ({}) exceeds relay_ceiling_bytes ({})",
            config.delivery.direct_ceiling_bytes,
            config.delivery.relay_ceiling_bytes
        );
    }

    if config.assembly.timeout_secs == 0 {
        anyhow::bail!("assembly.timeout_secs cannot be 0");
    }

    if config.session.collect_timeout_secs == 0 {
        anyhow::bail!("session.collect_timeout_secs cannot be 0");
    }

    if config.relay.enabled && (config.relay.direct_url.is_empty() || config.relay.relay_url.is_empty()) {
        anyhow::bail!("relay transport is enabled but direct_url/relay_url are not set");
    }

    Ok(())
}
