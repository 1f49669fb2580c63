#![forbid(unsafe_code)]
//! Star notary service entry point: open the ledger, bootstrap the chain,
//! and serve the REST API.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use starnotary::api::{self, AppState};
use starnotary::chain::Chain;
use starnotary::config::load_config;
use starnotary::mempool::Mempool;
use starnotary::store::SqliteStore;

/// How often expired mempool entries are reclaimed. Expiry itself is
/// enforced lazily on every access; this only frees memory.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = load_config()?;

    std::fs::create_dir_all(&config.database.path)?;
    let db_path = Path::new(&config.database.path).join("notary.db");
    let store = SqliteStore::open(&db_path)?;

    let chain = Arc::new(Chain::open(Box::new(store))?);
    let mempool = Arc::new(Mempool::new());
    tracing::info!(
        db = %db_path.display(),
        blocks = chain.height_count()?,
        "ledger opened"
    );

    let sweeper = mempool.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(SWEEP_INTERVAL).await;
            match sweeper.sweep() {
                Ok(removed) if removed > 0 => {
                    tracing::debug!(removed, "mempool sweep");
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "mempool sweep failed"),
            }
        }
    });

    api::serve(AppState { chain, mempool }, config.network.api_port).await
}
