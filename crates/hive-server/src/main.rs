use std::time::Duration;

use hive_server::{api, AppState, ServerConfig};
use hive_store::Database;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Queue rows older than this belong to clients that went away.
const STALE_QUEUE_MINUTES: i64 = 30;
const HOUSEKEEPING_PERIOD: Duration = Duration::from_secs(300);
const BUCKET_IDLE: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG overrides the default filter.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hive_server=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ServerConfig::from_env();
    info!(version = env!("CARGO_PKG_VERSION"), ?config, "VideoHive server starting");

    let database = Database::open_at(&config.database_path)?;
    let http_addr = config.http_addr;
    let state = AppState::new(config, database);

    spawn_housekeeping(&state);

    tokio::select! {
        result = api::serve(state, http_addr) => {
            if let Err(e) = &result {
                error!(error = %e, "HTTP server failed");
            }
            result
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received, shutting down");
            Ok(())
        }
    }
}

/// Periodically evicts idle rate-limit buckets and abandoned queue rows.
fn spawn_housekeeping(state: &AppState) {
    let ip_limiter = state.rate_limiter.clone();
    let search_limiter = state.search_limiter.clone();
    let db = state.db.clone();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(HOUSEKEEPING_PERIOD);
        loop {
            ticker.tick().await;

            let evicted =
                ip_limiter.purge_stale(BUCKET_IDLE).await + search_limiter.purge_stale(BUCKET_IDLE).await;
            if evicted > 0 {
                debug!(evicted, "purged idle rate limit buckets");
            }

            let cutoff = chrono::Utc::now() - chrono::Duration::minutes(STALE_QUEUE_MINUTES);
            match db.call(move |db| Ok(db.purge_queue_older_than(cutoff)?)).await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "purged stale queue entries"),
                Err(e) => warn!(error = %e, "queue purge failed"),
            }
        }
    });
}
