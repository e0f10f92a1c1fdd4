mod config;
mod records;
mod search;
mod setup;
mod status;

pub use config::ConfigCommand;
pub use search::{FilterArgs, SearchArgs, SimilarArgs};

pub use config::handle_config;
pub use records::{handle_count, handle_delete, handle_get};
pub use search::{handle_search, handle_similar};
pub use setup::{handle_setup, handle_verify};
pub use status::handle_status;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::models::Config;
use crate::services::{Embedder, VectorStoreGateway, create_backend};

/// Build the embedder and backend described by `config` and check the
/// collection schema before handing out the gateway.
pub(crate) async fn open_gateway(config: &Config) -> Result<VectorStoreGateway> {
    let embedder = Embedder::from_config(&config.embedding)
        .context("failed to initialize embedding provider")?;
    let backend = create_backend(&config.vector_store)
        .await
        .with_context(|| format!("failed to connect to {}", config.vector_store.driver))?;
    VectorStoreGateway::connect(backend, Arc::new(embedder))
        .await
        .context("collection is not ready; run `curator setup` (or `curator verify` for details)")
}
