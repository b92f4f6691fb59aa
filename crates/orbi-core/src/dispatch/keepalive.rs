//! Typing indicator keepalive.
//!
//! The transport clears a chat action after about five seconds, so while a
//! generation call is in flight the indicator is re-sent on a shorter period
//! until the caller stops it.

use std::sync::Arc;
use std::time::Duration;

use orbi_types::transport::ChatAction;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};

use super::transport::ChatTransport;

/// Re-sends the typing action every `period` until stopped or dropped.
pub struct TypingKeepalive {
    guard: DropGuard,
    handle: JoinHandle<()>,
}

impl TypingKeepalive {
    /// Spawn the keepalive loop. The first tick fires after one full period.
    pub fn start<T: ChatTransport + 'static>(transport: Arc<T>, chat_id: i64, period: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = transport.send_chat_action(chat_id, ChatAction::Typing).await {
                            tracing::debug!(chat_id, error = %e, "failed to refresh typing indicator");
                        }
                    }
                }
            }
        });

        Self {
            guard: cancel.drop_guard(),
            handle,
        }
    }

    /// Cancel the loop and wait for it to exit.
    pub async fn stop(self) {
        drop(self.guard);
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "typing keepalive task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingTransport;

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_ticks_until_stopped() {
        let transport = Arc::new(RecordingTransport::new());
        let keepalive = TypingKeepalive::start(transport.clone(), 55, Duration::from_secs(4));

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(transport.action_count(), 2);

        keepalive.stop().await;
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(transport.action_count(), 2);
        assert!(
            transport
                .actions
                .lock()
                .unwrap()
                .iter()
                .all(|(chat, action)| *chat == 55 && *action == ChatAction::Typing)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_keepalive_cancels_it() {
        let transport = Arc::new(RecordingTransport::new());
        let keepalive = TypingKeepalive::start(transport.clone(), 55, Duration::from_secs(4));
        drop(keepalive);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(transport.action_count(), 0);
    }
}
