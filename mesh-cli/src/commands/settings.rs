//! Load and show configuration.

use anyhow::{Context, Result};
use mesh_client::Config;
use std::fmt::Write;
use std::path::Path;

/// Config file picked up from the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "geomesh.toml";

/// Load configuration from `path`, falling back to `./geomesh.toml` and
/// then to built-in defaults.
pub fn load(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => {
            let fallback = Path::new(DEFAULT_CONFIG_FILE);
            if fallback.exists() {
                Config::from_file(fallback).context("Failed to load ./geomesh.toml")
            } else {
                tracing::debug!("no config file, using defaults");
                Ok(Config::default())
            }
        }
    }
}

/// Run the config command.
pub fn show(path: Option<&Path>) -> Result<()> {
    let config = load(path)?;
    print!("{}", render(&config));
    Ok(())
}

/// Render the effective configuration in config-file layout.
pub fn render(config: &Config) -> String {
    let view = config.view.settings();
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(out, "[channel]");
    let _ = writeln!(out, "address = {:?}", config.channel.address);
    let _ = writeln!(out);
    let _ = writeln!(out, "[position]");
    let _ = writeln!(out, "high_accuracy = {}", config.position.high_accuracy);
    let _ = writeln!(out, "timeout_ms = {}", config.position.timeout_ms);
    let _ = writeln!(out, "maximum_age_ms = {}", config.position.maximum_age_ms);
    let _ = writeln!(out);
    let _ = writeln!(out, "[view]");
    let _ = writeln!(out, "zoom = {}", view.zoom());
    let _ = writeln!(out, "max_zoom = {}", view.max_zoom());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    #[test]
    fn render_defaults() {
        let text = render(&Config::default());
        assert!(text.contains("address = \"local\""));
        assert!(text.contains("timeout_ms = 5000"));
        assert!(text.contains("maximum_age_ms = 0"));
        assert!(text.contains("zoom = 16"));
        assert!(text.contains("max_zoom = 19"));
    }

    #[test]
    fn render_shows_clamped_zoom() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[view]\nzoom = 25\nmax_zoom = 18").unwrap();

        let config = load(Some(file.path())).unwrap();
        let text = render(&config);
        assert!(text.contains("\nzoom = 18\n"));
    }

    #[test]
    fn load_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = load(Some(&dir.path().join("nope.toml")));
        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("Failed to load config"));
    }
}
