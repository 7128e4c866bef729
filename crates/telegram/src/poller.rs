//! Long-poll loop with reconnect backoff. A transport failure never crashes
//! the process; retries exhaust quietly and the poller stops.

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::api::{BotApi, TelegramError, Update};
use crate::events::{UpdateDispatcher, UpdateEvent};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Source of update batches. `Ok(None)` means the stream is closed and the
/// poller should stop; the live Bot API never closes.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    async fn next_batch(
        &self,
        offset: i64,
        timeout: u64,
    ) -> Result<Option<Vec<Update>>, TelegramError>;
}

#[async_trait]
impl UpdateSource for BotApi {
    async fn next_batch(
        &self,
        offset: i64,
        timeout: u64,
    ) -> Result<Option<Vec<Update>>, TelegramError> {
        self.get_updates(offset, timeout).await.map(Some)
    }
}

pub struct PollingRunner {
    source: Arc<dyn UpdateSource>,
    dispatcher: UpdateDispatcher,
    reconnect_policy: ReconnectPolicy,
    poll_timeout_secs: u64,
}

impl PollingRunner {
    pub fn new(
        source: Arc<dyn UpdateSource>,
        dispatcher: UpdateDispatcher,
        reconnect_policy: ReconnectPolicy,
        poll_timeout_secs: u64,
    ) -> Self {
        Self { source, dispatcher, reconnect_policy, poll_timeout_secs }
    }

    pub async fn start(&self) -> Result<()> {
        let mut offset = 0_i64;
        let mut attempt = 0_u32;

        info!(poll_timeout_secs = self.poll_timeout_secs, "starting long-poll loop");

        loop {
            match self.source.next_batch(offset, self.poll_timeout_secs).await {
                Ok(None) => {
                    info!("update stream closed");
                    return Ok(());
                }
                Ok(Some(batch)) => {
                    attempt = 0;
                    for update in batch {
                        offset = offset.max(update.update_id + 1);
                        let update_id = update.update_id;
                        let event = UpdateEvent::from_update(update);

                        if let Err(error) = self.dispatcher.dispatch(&event).await {
                            warn!(
                                update_id,
                                error = %error,
                                "update dispatch failed; continuing poll loop"
                            );
                        }
                    }
                }
                Err(error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %error,
                        "long poll failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "poll retries exhausted; stopping poller without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}
