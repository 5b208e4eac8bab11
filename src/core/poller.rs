//! Periodic state polling
//!
//! The cloud has no push channel, so state changes are observed by asking
//! for the arm status on a fixed interval. Only the last observed state is
//! kept.

use super::manager::CloudSessionManager;
use super::session::TransportFactory;
use crate::models::AlarmState;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// A change between two consecutive polls
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    /// `None` on the first poll
    pub previous: Option<AlarmState>,
    pub current: AlarmState,
    pub observed_at: DateTime<Utc>,
}

pub struct StatePoller<F: TransportFactory> {
    manager: Arc<CloudSessionManager<F>>,
    interval: Duration,
    max_polls: Option<u64>,
}

impl<F: TransportFactory> StatePoller<F> {
    pub fn new(manager: Arc<CloudSessionManager<F>>, interval: Duration) -> Self {
        Self {
            manager,
            interval,
            max_polls: None,
        }
    }

    /// Stop after `count` polls
    pub fn with_max_polls(mut self, count: u64) -> Self {
        self.max_polls = Some(count);
        self
    }

    /// Poll until `shutdown` resolves or the poll limit is reached
    ///
    /// `on_change` runs for the first observation and for every transition.
    /// A failed read is reported as `Unknown` rather than ending the loop.
    /// `shutdown` also cancels a poll that is still retrying. Returns the last
    /// observed state.
    pub async fn run<S, C>(&self, shutdown: S, mut on_change: C) -> Option<AlarmState>
    where
        S: Future<Output = ()>,
        C: FnMut(&StateChange),
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut last: Option<AlarmState> = None;
        let mut polls: u64 = 0;

        loop {
            if self.max_polls.is_some_and(|max| polls >= max) {
                break;
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Polling stopped");
                    break;
                }
                _ = ticker.tick() => {}
            }

            polls += 1;
            let result = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Polling stopped during a poll");
                    break;
                }
                result = self.manager.get_arm_status() => result,
            };
            let current = match result {
                Ok(state) => state,
                Err(err) => {
                    warn!(error = %err, "State poll failed");
                    AlarmState::Unknown
                }
            };

            if last != Some(current) {
                let change = StateChange {
                    previous: last,
                    current,
                    observed_at: Utc::now(),
                };
                info!(previous = ?change.previous, %current, "Alarm state changed");
                on_change(&change);
                last = Some(current);
            }
        }

        last
    }
}
