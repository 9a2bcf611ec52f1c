//! Registry poll and crossmatch batch job.
//!
//! Usage:
//!   poll_registry [--days-ago <n>|all] [--radius <arcsec>]
//!
//! `--days-ago all` is the operator-invoked full rebuild: it clears the
//! mirror and every derived region and hit before re-fetching the whole
//! upstream snapshot.

use astroflow::config::RegistryPollConfig;
use astroflow::notify::notify_operator;
use astroflow::registry::fetch::HttpRegistryFetcher;
use astroflow::registry::poll_registry;
use astroflow::spatial::{GridIndex, TILE_DEPTH};
use astroflow::status::{nid_now, StatusPublisher};
use astroflow::store::CatalogStore;
use dotenv::dotenv;

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let config = match RegistryPollConfig::from_args() {
        Ok(c) => c,
        Err(e) => {
            log::error!("❌ {}", e);
            std::process::exit(2);
        }
    };

    log::info!("🚀 Starting registry poll");
    log::info!("   ├─ window: {:?}", config.window);
    log::info!("   ├─ radius: {}\"", config.radius_arcsec);
    log::info!("   └─ database: {}", config.db_path);

    if let Err(e) = run(&config).await {
        let text = format!("ERROR in astroflow poll_registry: {}", e);
        log::error!("❌ {}", text);
        notify_operator(&text).await;
        std::process::exit(2);
    }
}

async fn run(config: &RegistryPollConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = CatalogStore::open(&config.db_path)?;
    let fetcher = HttpRegistryFetcher::new(config.registry_url.clone());
    let index = GridIndex::new(TILE_DEPTH);

    let report = poll_registry(&store, &fetcher, &index, &config.window, config.radius_arcsec).await?;
    log::info!(
        "✅ Poll complete: {} added, {} changed, {} hits",
        report.added,
        report.changed,
        report.hits
    );

    let status = StatusPublisher::new(&store);
    status.set("countRegistry", store.count_mirror()?, nid_now())?;
    Ok(())
}
