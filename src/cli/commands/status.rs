use anyhow::Result;

use crate::cli::output::{StatusInfo, get_formatter};
use crate::models::{Config, OutputFormat, VectorDriver};
use crate::services::create_backend;

pub async fn handle_status(format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    let (vector_store_connected, collection_info) =
        match create_backend(&config.vector_store).await {
            Ok(store) => {
                let connected = store.health_check().await.unwrap_or(false);
                let info = if connected {
                    store.collection_info().await.ok().flatten()
                } else {
                    None
                };
                (connected, info)
            }
            Err(err) => {
                if verbose {
                    eprintln!("Vector store error: {err}");
                }
                (false, None)
            }
        };

    let status = StatusInfo {
        embedding_model: config.embedding.model.clone(),
        embedding_url: config.embedding.url.clone(),
        embedding_dimension: config.embedding.dimension,
        api_key_configured: config.embedding.api_key.is_some(),
        vector_store_driver: config.vector_store.driver.to_string(),
        vector_store_url: config.vector_store.url.clone(),
        vector_store_connected,
        collection: config.vector_store.collection.clone(),
        collection_exists: collection_info.is_some(),
        vector_store_points: collection_info.map_or(0, |info| info.points_count),
    };

    print!("{}", formatter.format_status(&status));

    if !status.api_key_configured || !vector_store_connected || !status.collection_exists {
        eprintln!();
        if !status.api_key_configured {
            eprintln!("Hint: no embedding API key. Set OPENAI_API_KEY or embedding.api_key.");
        }
        if !vector_store_connected {
            match config.vector_store.driver {
                VectorDriver::Qdrant => {
                    eprintln!(
                        "Warning: Qdrant not running. Start with: docker-compose up -d qdrant"
                    );
                }
                VectorDriver::PostgreSQL => {
                    eprintln!("Warning: PostgreSQL not accessible. Check connection settings.");
                }
                VectorDriver::Memory => {}
            }
        } else if !status.collection_exists {
            eprintln!("Hint: collection missing. Create it with: curator setup");
        }
    }

    Ok(())
}
