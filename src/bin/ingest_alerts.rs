//! Alert ingestion batch job.
//!
//! Usage:
//!   ingest_alerts --host <kafka:9092> --topic <topic> [--group <id>]
//!                 [--maxalert <n>] [--nprocess <n>]
//!
//! Exit codes: 0 when at least one message was processed, 1 on zero
//! throughput, 2 on a fatal failure (with an operator notification).

use astroflow::config::IngestConfig;
use astroflow::ingest::run_ingest;
use astroflow::notify::notify_operator;
use dotenv::dotenv;

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let config = match IngestConfig::from_args() {
        Ok(c) => c,
        Err(e) => {
            log::error!("❌ {}", e);
            std::process::exit(2);
        }
    };

    match run_ingest(config).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            let text = format!("ERROR in astroflow ingest_alerts: {}", e);
            log::error!("❌ {}", text);
            notify_operator(&text).await;
            std::process::exit(2);
        }
    }
}
