use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::news::{NewsAggregator, RefreshStatus};

/// Periodic refresh of the aggregated news cache.
///
/// The first tick fires immediately when `run_immediately` is set, otherwise
/// after one full `interval`. Abort the returned handle to stop the loop.
pub fn spawn_refresh_loop(
    aggregator: Arc<NewsAggregator>,
    interval: Duration,
    run_immediately: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = if run_immediately {
            tokio::time::Instant::now()
        } else {
            tokio::time::Instant::now() + interval
        };
        let mut ticker = tokio::time::interval_at(start, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Scheduled refresh every {}s", interval.as_secs());

        loop {
            ticker.tick().await;
            debug!("Running scheduled refresh");

            match aggregator.refresh().await {
                Ok(report) => match report.status {
                    RefreshStatus::Ok => {
                        info!("Scheduled refresh cached {} articles", report.articles_scraped)
                    }
                    _ => info!("Scheduled refresh found no new articles"),
                },
                Err(e) => error!("Scheduled refresh failed: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::news::ArticleFetcher;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn test_loop_runs_and_aborts() {
        let store = Arc::new(MemoryStore::new());
        let aggregator = Arc::new(NewsAggregator::new(ArticleFetcher::new().unwrap(), vec![], store));

        let handle = spawn_refresh_loop(aggregator, Duration::from_millis(10), true);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());

        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
    }
}
