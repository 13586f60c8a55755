//! The `agg` command: run the polling loop until Ctrl-C.

use std::io::Write;
use std::time::Duration;

use tracing::{info, warn};

use super::AppState;
use crate::feed::{start_aggregator, FeedFetcher, FetchScheduler, SqliteFeedStore};
use crate::{GatorError, Result};

pub(super) async fn run<W: Write>(state: &AppState, interval: Duration, out: &mut W) -> Result<()> {
    let config = &state.config.aggregator;
    let fetcher = FeedFetcher::new(config)?;
    let store = SqliteFeedStore::new(state.db.pool().clone());
    let scheduler = FetchScheduler::new(
        store,
        fetcher,
        Duration::from_secs(config.fetch_deadline_secs),
    );

    writeln!(out, "Collecting feeds every {:?}", interval)?;
    out.flush()?;

    let (handle, mut task) = start_aggregator(scheduler, interval);

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => {
                    info!("Shutting down aggregator");
                    handle.shutdown().await;
                }
                Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
            }
            task.await.map_err(|e| GatorError::Io(std::io::Error::other(e)))?;
        }
        joined = &mut task => {
            joined.map_err(|e| GatorError::Io(std::io::Error::other(e)))?;
        }
    }

    Ok(())
}
