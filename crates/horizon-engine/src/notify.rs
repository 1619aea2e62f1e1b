//! # Notifications
//!
//! Outbound messages to users (payment receipts, refund outcomes, approval
//! decisions). Delivery is fire-and-forget:
//!
//! ```text
//! BoxOffice op ──commit──► Outcome::Applied ──► dispatch() ──► tokio::spawn
//!                                                                  │
//!                                             Err ──► warn!, dropped
//! ```
//!
//! Nothing is sent for `Outcome::Duplicate`, so a redelivered gateway
//! callback never produces a second receipt.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: String,
    pub subject: String,
    pub message: String,
}

impl Notification {
    pub fn new(
        user_id: impl Into<String>,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Notification {
            user_id: user_id.into(),
            subject: subject.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),
}

pub type NotifyFuture<'a> = Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + 'a>>;

/// Delivers a message to one user (email, push, ...).
pub trait Notifier: Send + Sync + 'static {
    fn notify<'a>(&'a self, notification: &'a Notification) -> NotifyFuture<'a>;
}

/// Writes notifications to the log. Used by the sweeper binary, where no
/// delivery channel is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify<'a>(&'a self, notification: &'a Notification) -> NotifyFuture<'a> {
        Box::pin(async move {
            info!(
                user_id = %notification.user_id,
                subject = %notification.subject,
                "Notification"
            );
            Ok(())
        })
    }
}

/// Sends in the background. Failures are logged and swallowed.
pub(crate) fn dispatch(notifier: &Arc<dyn Notifier>, notification: Notification) {
    let notifier = Arc::clone(notifier);
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(&notification).await {
            warn!(
                user_id = %notification.user_id,
                subject = %notification.subject,
                error = %e,
                "Notification not delivered"
            );
        }
    });
}

// =============================================================================
// Test Notifiers
// =============================================================================

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Forwards every notification to a channel the test reads.
    pub(crate) struct RecordingNotifier {
        tx: mpsc::UnboundedSender<Notification>,
    }

    impl RecordingNotifier {
        pub(crate) fn new() -> (Self, Inbox) {
            let (tx, rx) = mpsc::unbounded_channel();
            (RecordingNotifier { tx }, Inbox { rx })
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify<'a>(&'a self, notification: &'a Notification) -> NotifyFuture<'a> {
            Box::pin(async move {
                self.tx
                    .send(notification.clone())
                    .map_err(|e| NotifyError::DeliveryFailed(e.to_string()))
            })
        }
    }

    pub(crate) struct Inbox {
        rx: mpsc::UnboundedReceiver<Notification>,
    }

    impl Inbox {
        /// Waits for the next notification.
        pub(crate) async fn next(&mut self) -> Notification {
            tokio::time::timeout(Duration::from_secs(5), self.rx.recv())
                .await
                .expect("no notification within 5s")
                .expect("notifier dropped")
        }

        /// Lets spawned senders run, then asserts nothing else arrived.
        pub(crate) async fn assert_empty(&mut self) {
            tokio::time::sleep(Duration::from_millis(50)).await;
            if let Ok(extra) = self.rx.try_recv() {
                panic!("unexpected notification: {extra:?}");
            }
        }
    }

    /// Always fails.
    pub(crate) struct BrokenNotifier;

    impl Notifier for BrokenNotifier {
        fn notify<'a>(&'a self, _notification: &'a Notification) -> NotifyFuture<'a> {
            Box::pin(async { Err(NotifyError::DeliveryFailed("smtp down".into())) })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[tokio::test]
    async fn test_dispatch_delivers_in_background() {
        let (recorder, mut inbox) = RecordingNotifier::new();
        let notifier: Arc<dyn Notifier> = Arc::new(recorder);

        dispatch(&notifier, Notification::new("u1", "Hello", "World"));

        let received = inbox.next().await;
        assert_eq!(received.user_id, "u1");
        assert_eq!(received.subject, "Hello");
        inbox.assert_empty().await;
    }

    #[tokio::test]
    async fn test_dispatch_swallows_failures() {
        let notifier: Arc<dyn Notifier> = Arc::new(BrokenNotifier);
        dispatch(&notifier, Notification::new("u1", "Hello", "World"));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
}
