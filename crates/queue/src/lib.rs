//! Execution Publisher (C3) — one persistent connection + channel to the
//! durable work queue, with automatic reconnect. Publish is best-effort from
//! the gateway's point of view: durability is the broker's job.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use parking_lot::RwLock;

use npg_domain::model::ExecutionNotification;

/// Publishes execution notifications onto the work queue. Split out as a
/// trait so the gateway can be wired against a real broker in production and
/// a recording fake in tests.
#[async_trait]
pub trait ExecutionPublisher: Send + Sync {
    /// Serialize and publish `notification`. Returns `true` on success,
    /// `false` on any failure — this call must never panic or propagate an
    /// error, per spec.md §4.3.
    async fn publish(&self, notification: &ExecutionNotification) -> bool;

    /// Close the channel then the connection. Default no-op for publishers
    /// (e.g. test doubles) with nothing to close; `LapinPublisher` overrides
    /// this to tear down its AMQP connection on graceful shutdown.
    async fn shutdown(&self) {}
}

/// A `lapin`-backed publisher holding one long-lived connection with
/// automatic reconnect (5000ms interval, per spec.md §4.3).
pub struct LapinPublisher {
    queue_name: String,
    channel: Arc<RwLock<Option<Channel>>>,
    shutdown: Arc<std::sync::atomic::AtomicBool>,
}

impl LapinPublisher {
    /// Start the background connection-management task and return
    /// immediately; `publish` calls made before the first connection
    /// succeeds simply fail with `false` and are logged.
    pub fn connect(amqp_uri: String, queue_name: String, reconnect_interval_ms: u64) -> Self {
        let channel = Arc::new(RwLock::new(None));
        let shutdown = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let publisher = Self {
            queue_name: queue_name.clone(),
            channel: channel.clone(),
            shutdown: shutdown.clone(),
        };

        tokio::spawn(connection_loop(
            amqp_uri,
            queue_name,
            channel,
            shutdown,
            Duration::from_millis(reconnect_interval_ms),
        ));

        publisher
    }

    /// Close the channel then the connection. Double-close (e.g. calling
    /// this after the connection already dropped) is tolerated.
    pub async fn shutdown(&self) {
        self.shutdown.store(true, std::sync::atomic::Ordering::SeqCst);
        if let Some(channel) = self.channel.write().take() {
            if let Err(e) = channel.close(200, "gateway shutdown").await {
                tracing::debug!(error = %e, "channel close during shutdown (tolerated)");
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.channel.read().is_some()
    }
}

async fn connection_loop(
    amqp_uri: String,
    queue_name: String,
    channel_slot: Arc<RwLock<Option<Channel>>>,
    shutdown: Arc<std::sync::atomic::AtomicBool>,
    reconnect_interval: Duration,
) {
    loop {
        if shutdown.load(std::sync::atomic::Ordering::SeqCst) {
            return;
        }

        match establish(&amqp_uri, &queue_name).await {
            Ok((connection, channel, error_rx)) => {
                tracing::info!(queue = %queue_name, "connected to execution queue");
                *channel_slot.write() = Some(channel);

                // Block until `on_error` fires, then clear the channel so
                // `publish` fails fast instead of using a dead handle, and
                // loop to reconnect.
                let _ = error_rx.await;
                *channel_slot.write() = None;
                drop(connection);
                tracing::warn!(queue = %queue_name, "execution queue connection lost, reconnecting");
            }
            Err(e) => {
                tracing::warn!(error = %e, queue = %queue_name, "failed to connect to execution queue, retrying");
            }
        }

        if shutdown.load(std::sync::atomic::Ordering::SeqCst) {
            return;
        }
        tokio::time::sleep(reconnect_interval).await;
    }
}

async fn establish(
    amqp_uri: &str,
    queue_name: &str,
) -> Result<(Connection, Channel, tokio::sync::oneshot::Receiver<()>), lapin::Error> {
    let connection = Connection::connect(amqp_uri, ConnectionProperties::default()).await?;

    let (error_tx, error_rx) = tokio::sync::oneshot::channel();
    let error_tx = std::sync::Mutex::new(Some(error_tx));
    connection.on_error(move |err| {
        tracing::warn!(error = %err, "amqp connection error");
        if let Some(tx) = error_tx.lock().unwrap().take() {
            let _ = tx.send(());
        }
    });

    let channel = connection.create_channel().await?;
    channel
        .queue_declare(
            queue_name,
            QueueDeclareOptions {
                durable: true,
                ..QueueDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await?;
    Ok((connection, channel, error_rx))
}

#[async_trait]
impl ExecutionPublisher for LapinPublisher {
    async fn publish(&self, notification: &ExecutionNotification) -> bool {
        let channel = self.channel.read().clone();
        let Some(channel) = channel else {
            tracing::warn!(
                request_id = %notification.request_id,
                "publish attempted with no live queue channel"
            );
            return false;
        };

        let payload = match serde_json::to_vec(notification) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize execution notification");
                return false;
            }
        };

        let publish = channel
            .basic_publish(
                "",
                &self.queue_name,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_delivery_mode(2),
            )
            .await;

        match publish {
            Ok(confirm) => match confirm.await {
                Ok(_) => true,
                Err(e) => {
                    tracing::warn!(error = %e, request_id = %notification.request_id, "publish confirm failed");
                    false
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, request_id = %notification.request_id, "publish failed");
                false
            }
        }
    }

    async fn shutdown(&self) {
        LapinPublisher::shutdown(self).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A recording fake used by downstream crates' tests (not broker-backed).
    pub struct RecordingPublisher {
        pub published: parking_lot::Mutex<Vec<ExecutionNotification>>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl RecordingPublisher {
        pub fn new(fail: bool) -> Self {
            Self {
                published: parking_lot::Mutex::new(Vec::new()),
                fail,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ExecutionPublisher for RecordingPublisher {
        async fn publish(&self, notification: &ExecutionNotification) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return false;
            }
            self.published.lock().push(notification.clone());
            true
        }
    }

    fn notification() -> ExecutionNotification {
        ExecutionNotification {
            request_id: "r1".into(),
            service: "testservice".into(),
            operation: "do_thing".into(),
            callback_url: "http://gateway/callback".into(),
            tenant_id: "t1".into(),
            user_id: "u1".into(),
        }
    }

    #[tokio::test]
    async fn recording_publisher_captures_notification() {
        let publisher = RecordingPublisher::new(false);
        assert!(publisher.publish(&notification()).await);
        assert_eq!(publisher.published.lock().len(), 1);
    }

    #[tokio::test]
    async fn recording_publisher_failure_mode_returns_false() {
        let publisher = RecordingPublisher::new(true);
        assert!(!publisher.publish(&notification()).await);
        assert!(publisher.published.lock().is_empty());
    }

    #[test]
    fn fresh_lapin_publisher_reports_disconnected_until_established() {
        // connect() returns immediately; the background task has not had a
        // chance to run, so publish would currently fail with `false`.
        let publisher = LapinPublisher {
            queue_name: "npl.execution.requests".into(),
            channel: Arc::new(RwLock::new(None)),
            shutdown: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        };
        assert!(!publisher.is_connected());
    }
}
