use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::calendar::now_ms;
use crate::engine::Engine;
use crate::store::WalStore;

const COMPACT_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Background task that periodically marks finished bookings as completed.
pub async fn run_completer(engine: Arc<Engine>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        if let Err(e) = engine.complete_finished(now_ms()).await {
            warn!("completion sweep failed: {e}");
        }
    }
}

/// Background task that rewrites the booking log once enough appends pile up.
pub async fn run_compactor(store: Arc<WalStore>, threshold: u64) {
    let mut interval = tokio::time::interval(COMPACT_CHECK_INTERVAL);
    loop {
        interval.tick().await;
        let appends = store.appends_since_compact().await;
        if appends < threshold {
            debug!(appends, threshold, "compaction not due");
            continue;
        }
        if let Err(e) = store.compact().await {
            warn!("compaction failed: {e}");
        }
    }
}
