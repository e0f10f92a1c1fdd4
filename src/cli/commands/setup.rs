use anyhow::{Context, Result};

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};
use crate::services::{SchemaManager, create_backend};

async fn schema_manager(config: &Config) -> Result<SchemaManager> {
    let backend = create_backend(&config.vector_store)
        .await
        .with_context(|| format!("failed to connect to {}", config.vector_store.driver))?;
    Ok(SchemaManager::new(
        backend,
        u64::from(config.embedding.dimension),
    ))
}

pub async fn handle_setup(recreate: bool, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);
    let manager = schema_manager(&config).await?;

    if verbose {
        let schema = manager.describe();
        eprintln!("Collection: {}", schema.name);
        eprintln!("  Vector size: {}", schema.vector_size);
        eprintln!("  Distance: {}", schema.distance);
        let indexes: Vec<&str> = schema.indexes.iter().map(|f| f.as_str()).collect();
        eprintln!("  Indexes: {}", indexes.join(", "));
        if recreate {
            eprintln!("  Recreating: existing points will be deleted");
        }
    }

    let report = manager
        .initialize(recreate)
        .await
        .context("collection setup failed")?;

    print!(
        "{}",
        formatter.format_schema_report(&config.vector_store.collection, &report)
    );
    Ok(())
}

pub async fn handle_verify(format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);
    let manager = schema_manager(&config).await?;

    let report = manager.verify().await;
    print!(
        "{}",
        formatter.format_schema_report(&config.vector_store.collection, &report)
    );

    if !report.schema_valid {
        anyhow::bail!(
            "collection '{}' does not match the configured schema",
            config.vector_store.collection
        );
    }
    Ok(())
}
