use anyhow::{Context, Result};
use clap::Subcommand;

use crate::cli::output::get_formatter;
use crate::models::{Config, ENV_API_KEY, ENV_COLLECTION, ENV_QDRANT_URL, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Initialize configuration file")]
    Init {
        #[arg(long, help = "Force overwrite existing config")]
        force: bool,
    },
    #[command(about = "Show current configuration")]
    Show,
    #[command(about = "Show configuration file path")]
    Path,
}

pub async fn handle_config(cmd: ConfigCommand, format: OutputFormat, _verbose: bool) -> Result<()> {
    match cmd {
        ConfigCommand::Init { force } => handle_init(force, format),
        ConfigCommand::Show => handle_show(format),
        ConfigCommand::Path => handle_path(),
    }
}

fn handle_init(force: bool, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let config_path =
        Config::config_path().ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config already exists at: {}\nUse --force to overwrite.",
            config_path.display()
        );
    }

    let path = Config::default()
        .save()
        .context("failed to write config file")?;
    print!(
        "{}",
        formatter.format_message(&format!("Created config at: {}", path.display()))
    );
    Ok(())
}

/// Copy with secrets masked, for display.
fn redacted(config: &Config) -> Config {
    let mut shown = config.clone();
    let mask = |key: &mut Option<String>| {
        if key.is_some() {
            *key = Some("********".to_string());
        }
    };
    mask(&mut shown.embedding.api_key);
    mask(&mut shown.vector_store.api_key);
    shown
}

fn handle_show(format: OutputFormat) -> Result<()> {
    let config = Config::load()?;
    let shown = redacted(&config);

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }

    if let Some(path) = Config::config_path().filter(|p| p.exists()) {
        println!("# Config file: {}", path.display());
    } else {
        println!("# No config file, using defaults");
    }
    println!();
    print!(
        "{}",
        toml::to_string_pretty(&shown).context("failed to render config")?
    );
    Ok(())
}

fn handle_path() -> Result<()> {
    let path =
        Config::config_path().ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;

    let state = if path.exists() { "active" } else { "would be" };
    println!("Config file ({state}): {}", path.display());

    if let Ok(cwd) = std::env::current_dir() {
        let env_path = cwd.join(".env");
        let state = if env_path.exists() { "active" } else { "would be" };
        println!(".env file ({state}): {}", env_path.display());
    }

    println!();
    println!("Environment overrides: {ENV_API_KEY}, {ENV_QDRANT_URL}, {ENV_COLLECTION}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacted_masks_keys() {
        let mut config = Config::default();
        config.embedding.api_key = Some("sk-secret".into());
        let shown = redacted(&config);
        assert_eq!(shown.embedding.api_key.as_deref(), Some("********"));
        assert!(shown.vector_store.api_key.is_none());
        assert_eq!(config.embedding.api_key.as_deref(), Some("sk-secret"));
    }
}
