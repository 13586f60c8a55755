//! Polling loop that runs fetch cycles until told to stop.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};

use super::fetcher::FeedSource;
use super::scheduler::{CycleOutcome, FetchScheduler};
use super::store::FeedStore;
use crate::{GatorError, Result};

/// Parse a polling interval such as `30s`, `5m` or `1h`.
///
/// Only a positive integer followed by one unit is accepted.
pub fn parse_interval(s: &str) -> Result<Duration> {
    let invalid = || {
        GatorError::Validation(format!(
            "invalid interval '{s}': expected a positive number followed by s, m or h"
        ))
    };

    let unit = s.chars().last().ok_or_else(invalid)?;
    let digits = &s[..s.len() - unit.len_utf8()];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let value: u64 = digits.parse().map_err(|_| invalid())?;
    if value == 0 {
        return Err(invalid());
    }

    let secs = match unit {
        's' => Some(value),
        'm' => value.checked_mul(60),
        'h' => value.checked_mul(3600),
        _ => None,
    }
    .ok_or_else(invalid)?;

    Ok(Duration::from_secs(secs))
}

/// Messages accepted by a running aggregator.
#[derive(Debug)]
pub enum AggregatorMessage {
    Shutdown,
}

/// Handle for stopping a running aggregator.
#[derive(Debug, Clone)]
pub struct AggregatorHandle {
    sender: mpsc::Sender<AggregatorMessage>,
}

impl AggregatorHandle {
    /// Ask the loop to stop after the current cycle.
    pub async fn shutdown(&self) {
        let _ = self.sender.send(AggregatorMessage::Shutdown).await;
    }
}

/// Runs a [`FetchScheduler`] cycle every `interval`.
pub struct Aggregator<S, F> {
    scheduler: FetchScheduler<S, F>,
    interval: Duration,
}

impl<S: FeedStore, F: FeedSource> Aggregator<S, F> {
    /// Create an aggregator.
    pub fn new(scheduler: FetchScheduler<S, F>, interval: Duration) -> Self {
        Self {
            scheduler,
            interval,
        }
    }

    /// Run cycles until a shutdown message arrives or every handle is dropped.
    ///
    /// The first cycle starts immediately. A cycle that overruns the
    /// interval delays the next tick rather than overlapping it.
    pub async fn run(self, mut shutdown: mpsc::Receiver<AggregatorMessage>) {
        info!("Collecting feeds every {:?}", self.interval);

        self.run_once().await;

        let mut timer = interval_at(Instant::now() + self.interval, self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                msg = shutdown.recv() => {
                    match msg {
                        Some(AggregatorMessage::Shutdown) | None => {
                            info!("Aggregator stopped");
                            break;
                        }
                    }
                }
                _ = timer.tick() => {
                    self.run_once().await;
                }
            }
        }
    }

    /// Run one cycle and log its outcome.
    async fn run_once(&self) {
        match self.scheduler.run_cycle().await {
            Ok(CycleOutcome::NoFeeds) => warn!("No feeds to fetch"),
            Ok(CycleOutcome::Fetched { feed, report }) => info!(
                "Fetched {} ({}): {} new, {} already stored, {} without link",
                feed.name, feed.url, report.inserted, report.duplicates, report.skipped_no_link
            ),
            Err(e) => warn!("Feed cycle failed: {}", e),
        }
    }
}

/// Spawn an aggregator on the runtime.
///
/// Returns the handle used to stop it and the task to await afterwards.
pub fn start_aggregator<S, F>(
    scheduler: FetchScheduler<S, F>,
    interval: Duration,
) -> (AggregatorHandle, JoinHandle<()>)
where
    S: FeedStore + 'static,
    F: FeedSource + 'static,
{
    let (sender, receiver) = mpsc::channel(8);
    let aggregator = Aggregator::new(scheduler, interval);
    let task = tokio::spawn(aggregator.run(receiver));

    (AggregatorHandle { sender }, task)
}
