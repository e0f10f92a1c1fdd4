use anyhow::{Context, Result};

use super::open_gateway;
use crate::cli::output::get_formatter;
use crate::error::VectorStoreError;
use crate::models::{Config, OutputFormat};

pub async fn handle_get(vector_id: String, format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);
    let gateway = open_gateway(&config).await?;

    let record = gateway
        .get(&vector_id)
        .await
        .with_context(|| format!("failed to fetch record {vector_id}"))?;
    print!("{}", formatter.format_records(std::slice::from_ref(&record)));
    Ok(())
}

pub async fn handle_delete(
    vector_ids: Vec<String>,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);
    let gateway = open_gateway(&config).await?;

    let mut deleted = 0usize;
    let mut missing = Vec::new();
    for id in &vector_ids {
        match gateway.delete(id).await {
            Ok(()) => {
                deleted += 1;
                if verbose {
                    eprintln!("Deleted {id}");
                }
            }
            Err(VectorStoreError::NotFound(_)) => missing.push(id.as_str()),
            Err(err) => return Err(err).with_context(|| format!("failed to delete {id}")),
        }
    }

    print!(
        "{}",
        formatter.format_message(&format!("Deleted {deleted} of {} records", vector_ids.len()))
    );
    if !missing.is_empty() {
        eprintln!("Not found: {}", missing.join(", "));
    }
    Ok(())
}

pub async fn handle_count(format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);
    let gateway = open_gateway(&config).await?;

    let count = gateway.count().await.context("failed to count records")?;
    print!(
        "{}",
        formatter.format_count(&config.vector_store.collection, count)
    );
    Ok(())
}
