mod types;

pub use types::*;

use anyhow::{Context, Result};
use bitforge_av::template::missing_placeholders;
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

    let default_paths = [
        "./bitforge.toml",
        "~/.config/bitforge/config.toml",
        "/etc/bitforge/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.ingest.batch_size == 0 {
        anyhow::bail!("ingest.batch_size cannot be 0");
    }
    if config.ingest.chunk_size == 0 {
        anyhow::bail!("ingest.chunk_size cannot be 0");
    }
    if config.ingest.bitstream_marker.trim().is_empty() {
        anyhow::bail!("ingest.bitstream_marker cannot be empty");
    }

    let service = &config.service;
    if service.container_name.trim().is_empty() {
        anyhow::bail!("service.container_name cannot be empty");
    }
    if service.command.is_empty() {
        anyhow::bail!("service.command cannot be empty");
    }
    let missing = missing_placeholders(&service.command, &["input", "output"]);
    if !missing.is_empty() {
        anyhow::bail!(
            "service.command must reference {}",
            missing
                .iter()
                .map(|m| format!("{{{}}}", m))
                .collect::<Vec<_>>()
                .join(" and ")
        );
    }
    for (name, mount) in [
        ("input_mount", &service.input_mount),
        ("output_mount", &service.output_mount),
    ] {
        if !mount.is_absolute() {
            anyhow::bail!("service.{} must be an absolute path: {:?}", name, mount);
        }
    }
    if service.input_mount == service.output_mount {
        anyhow::bail!("service.input_mount and service.output_mount must differ");
    }
    if service.derivative_extension.starts_with('.') || service.derivative_extension.is_empty() {
        anyhow::bail!("service.derivative_extension must be a bare extension such as \"jpx\"");
    }

    for (tool, path) in [
        ("docker", &config.tools.docker_path),
        ("ffprobe", &config.tools.ffprobe_path),
        ("ffmpeg", &config.tools.ffmpeg_path),
    ] {
        if let Some(path) = path {
            if !path.exists() {
                tracing::warn!("Configured {} path does not exist: {:?}", tool, path);
            }
        }
    }

    Ok(())
}
