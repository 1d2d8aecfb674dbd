//! Durable message broker client (AMQP 0.9.1)
//!
//! One connection and channel per process, shared by the publisher path and
//! all consumer loops. Queues are named after their topic, declared durable,
//! and messages are published persistent, so delivery is at-least-once:
//! unacknowledged deliveries are requeued by the broker when a consumer
//! drops.
//!
//! Failed handler invocations are rejected *without* requeue: a message that
//! cannot be processed is logged and dropped instead of circling the queue
//! forever. Dead-lettering with a bounded retry count would be the durable
//! alternative.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;

/// Broker client errors
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The broker could not be reached or the operation failed after the
    /// bounded reconnect retry
    #[error("broker unavailable: {0}")]
    Unavailable(#[source] lapin::Error),

    /// Event payload could not be serialized
    #[error("payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Publish seam for services that emit events
///
/// The concrete [`Broker`] implements this; tests substitute a recording
/// fake.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish_json(&self, topic: &str, payload: serde_json::Value)
        -> Result<(), BrokerError>;
}

/// Boxed delivery handler shared by the consumer loops
type Handler = dyn Fn(Vec<u8>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync;

/// Channel-level operations on one live connection
///
/// The AMQP implementation wraps a lapin connection/channel pair; unit tests
/// drive the reconnect logic with scripted fakes.
#[async_trait]
trait Conduit: Send + Sync {
    fn is_open(&self) -> bool;
    async fn publish(&self, topic: &str, body: &[u8]) -> Result<(), BrokerError>;
    async fn consume(&self, topic: &str, handler: &Handler) -> Result<(), BrokerError>;
}

/// Opens conduits; the production implementation dials the AMQP node
#[async_trait]
trait Connect: Send + Sync {
    async fn open(&self, url: &str) -> Result<Arc<dyn Conduit>, BrokerError>;
}

struct AmqpConduit {
    connection: Connection,
    channel: Channel,
}

impl AmqpConduit {
    async fn declare_queue(&self, topic: &str) -> lapin::Result<()> {
        self.channel
            .queue_declare(
                topic,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Conduit for AmqpConduit {
    fn is_open(&self) -> bool {
        self.connection.status().connected() && self.channel.status().connected()
    }

    async fn publish(&self, topic: &str, body: &[u8]) -> Result<(), BrokerError> {
        self.declare_queue(topic)
            .await
            .map_err(BrokerError::Unavailable)?;
        self.channel
            .basic_publish(
                "",
                topic,
                BasicPublishOptions::default(),
                body,
                BasicProperties::default().with_delivery_mode(2),
            )
            .await
            .map_err(BrokerError::Unavailable)?;
        tracing::debug!(topic, "message published");
        Ok(())
    }

    /// Run one consumer until the delivery stream ends
    async fn consume(&self, topic: &str, handler: &Handler) -> Result<(), BrokerError> {
        self.declare_queue(topic)
            .await
            .map_err(BrokerError::Unavailable)?;
        let mut consumer = self
            .channel
            .basic_consume(
                topic,
                "",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(BrokerError::Unavailable)?;
        tracing::info!(topic, "subscribed");

        while let Some(delivery) = consumer.next().await {
            let delivery = delivery.map_err(BrokerError::Unavailable)?;
            match handler(delivery.data.clone()).await {
                Ok(()) => {
                    if let Err(err) = delivery.ack(BasicAckOptions::default()).await {
                        tracing::warn!(topic, error = %err, "ack failed");
                    }
                }
                Err(err) => {
                    tracing::error!(topic, error = %err, "handler failed, dropping message");
                    let nack = BasicNackOptions {
                        requeue: false,
                        ..Default::default()
                    };
                    if let Err(err) = delivery.nack(nack).await {
                        tracing::warn!(topic, error = %err, "nack failed");
                    }
                }
            }
        }
        Ok(())
    }
}

struct AmqpConnector;

#[async_trait]
impl Connect for AmqpConnector {
    async fn open(&self, url: &str) -> Result<Arc<dyn Conduit>, BrokerError> {
        let options = ConnectionProperties::default()
            .with_executor(tokio_executor_trait::Tokio::current())
            .with_reactor(tokio_reactor_trait::Tokio);
        let connection = Connection::connect(url, options)
            .await
            .map_err(BrokerError::Unavailable)?;
        let channel = connection
            .create_channel()
            .await
            .map_err(BrokerError::Unavailable)?;
        Ok(Arc::new(AmqpConduit {
            connection,
            channel,
        }))
    }
}

/// Message broker client
///
/// Cheap to share behind an `Arc`. The cached connection/channel pair sits
/// behind one async mutex, so exactly one reconnect is in flight at a time
/// and concurrent callers await the same attempt.
pub struct Broker {
    url: String,
    connector: Box<dyn Connect>,
    link: Mutex<Option<Arc<dyn Conduit>>>,
}

impl Broker {
    pub fn new(url: impl Into<String>) -> Arc<Self> {
        Self::with_connector(url, Box::new(AmqpConnector))
    }

    fn with_connector(url: impl Into<String>, connector: Box<dyn Connect>) -> Arc<Self> {
        Arc::new(Self {
            url: url.into(),
            connector,
            link: Mutex::new(None),
        })
    }

    /// Establish the connection and channel; idempotent if already connected
    pub async fn connect(&self) -> Result<(), BrokerError> {
        self.ensure_conduit().await.map(|_| ())
    }

    /// Return the live conduit, reconnecting if the cached one is gone
    async fn ensure_conduit(&self) -> Result<Arc<dyn Conduit>, BrokerError> {
        let mut guard = self.link.lock().await;
        if let Some(conduit) = guard.as_ref() {
            if conduit.is_open() {
                return Ok(Arc::clone(conduit));
            }
            tracing::warn!("broker connection lost, reconnecting");
            *guard = None;
        }

        let conduit = self.connector.open(&self.url).await?;
        tracing::info!("connected to message broker");
        *guard = Some(Arc::clone(&conduit));
        Ok(conduit)
    }

    /// Drop the cached conduit so the next use reconnects
    async fn invalidate(&self) {
        let mut guard = self.link.lock().await;
        *guard = None;
    }

    /// Publish a persistent message to the durable queue named `topic`
    ///
    /// Fire-and-forget from the caller's perspective: no wait for consumer
    /// acknowledgment. On a transport error the cached channel is dropped
    /// and the publish is retried once on a fresh connection before the
    /// failure is surfaced.
    pub async fn publish<T: Serialize + Sync>(
        &self,
        topic: &str,
        payload: &T,
    ) -> Result<(), BrokerError> {
        let body = serde_json::to_vec(payload)?;

        let conduit = self.ensure_conduit().await?;
        match conduit.publish(topic, &body).await {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::warn!(topic, error = %err, "publish failed, retrying once");
                self.invalidate().await;
                let conduit = self.ensure_conduit().await?;
                conduit.publish(topic, &body).await
            }
        }
    }

    /// Consume the durable queue named `topic`, invoking `handler` for every
    /// delivery
    ///
    /// Handler success acknowledges the message; handler failure rejects it
    /// without requeue (see module docs). Each subscription runs its own
    /// delivery loop on a spawned task, so handlers for different topics
    /// never block one another. The loop survives broker disconnects by
    /// resubscribing with backoff.
    pub fn subscribe<F, Fut>(
        self: &Arc<Self>,
        topic: &str,
        handler: F,
    ) -> tokio::task::JoinHandle<()>
    where
        F: Fn(Vec<u8>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handler: Arc<Handler> = Arc::new(move |payload| handler(payload).boxed());
        let broker = Arc::clone(self);
        let topic = topic.to_string();
        tokio::spawn(async move {
            let mut backoff = Duration::from_secs(1);
            loop {
                let attempt = async {
                    let conduit = broker.ensure_conduit().await?;
                    conduit.consume(&topic, handler.as_ref()).await
                };
                match attempt.await {
                    Ok(()) => backoff = Duration::from_secs(1),
                    Err(err) => {
                        tracing::warn!(topic, error = %err, "consumer loop failed");
                    }
                }
                broker.invalidate().await;
                tracing::info!(topic, delay = ?backoff, "resubscribing after delay");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(Duration::from_secs(30));
            }
        })
    }
}

#[async_trait]
impl Publisher for Broker {
    async fn publish_json(
        &self,
        topic: &str,
        payload: serde_json::Value,
    ) -> Result<(), BrokerError> {
        self.publish(topic, &payload).await
    }
}

/// Connect with exponential backoff, up to `max_attempts`
pub async fn connect_with_backoff(
    broker: &Broker,
    max_attempts: u32,
) -> Result<(), BrokerError> {
    let mut delay = Duration::from_secs(1);
    let mut attempt = 1;
    loop {
        match broker.connect().await {
            Ok(()) => return Ok(()),
            Err(err) if attempt >= max_attempts => return Err(err),
            Err(err) => {
                tracing::warn!(attempt, error = %err, "broker connect failed, retrying");
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(Duration::from_secs(30));
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Mutex as StdMutex;

    fn transport_error() -> BrokerError {
        BrokerError::Unavailable(lapin::Error::InvalidConnectionState(
            lapin::ConnectionState::Error,
        ))
    }

    struct FakeConduit {
        open: AtomicBool,
        fail_publishes: AtomicU32,
        published: StdMutex<Vec<(String, Vec<u8>)>>,
    }

    impl FakeConduit {
        fn healthy() -> Arc<Self> {
            Arc::new(Self {
                open: AtomicBool::new(true),
                fail_publishes: AtomicU32::new(0),
                published: StdMutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            let conduit = Self::healthy();
            conduit.fail_publishes.store(u32::MAX, Ordering::SeqCst);
            conduit
        }

        fn published_topics(&self) -> Vec<String> {
            self.published
                .lock()
                .unwrap()
                .iter()
                .map(|(t, _)| t.clone())
                .collect()
        }
    }

    #[async_trait]
    impl Conduit for FakeConduit {
        fn is_open(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }

        async fn publish(&self, topic: &str, body: &[u8]) -> Result<(), BrokerError> {
            if self.fail_publishes.load(Ordering::SeqCst) > 0 {
                self.fail_publishes.fetch_sub(1, Ordering::SeqCst);
                self.open.store(false, Ordering::SeqCst);
                return Err(transport_error());
            }
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), body.to_vec()));
            Ok(())
        }

        async fn consume(&self, _topic: &str, _handler: &Handler) -> Result<(), BrokerError> {
            Ok(())
        }
    }

    struct FakeConnector {
        conduits: StdMutex<VecDeque<Arc<FakeConduit>>>,
        fail_opens: Arc<AtomicU32>,
        opens: Arc<AtomicU32>,
    }

    impl FakeConnector {
        /// Returns the connector plus a shared handle on its dial counter
        fn with(conduits: Vec<Arc<FakeConduit>>) -> (Box<Self>, Arc<AtomicU32>) {
            let opens = Arc::new(AtomicU32::new(0));
            let connector = Box::new(Self {
                conduits: StdMutex::new(conduits.into()),
                fail_opens: Arc::new(AtomicU32::new(0)),
                opens: opens.clone(),
            });
            (connector, opens)
        }
    }

    #[async_trait]
    impl Connect for FakeConnector {
        async fn open(&self, _url: &str) -> Result<Arc<dyn Conduit>, BrokerError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if self.fail_opens.load(Ordering::SeqCst) > 0 {
                self.fail_opens.fetch_sub(1, Ordering::SeqCst);
                return Err(transport_error());
            }
            self.conduits
                .lock()
                .unwrap()
                .pop_front()
                .map(|c| c as Arc<dyn Conduit>)
                .ok_or_else(transport_error)
        }
    }

    fn payload() -> serde_json::Value {
        serde_json::json!({ "order_id": "o1" })
    }

    #[tokio::test]
    async fn publish_reuses_the_cached_channel() {
        let conduit = FakeConduit::healthy();
        let (connector, opens) = FakeConnector::with(vec![conduit.clone()]);
        let broker = Broker::with_connector("amqp://test", connector);

        broker.publish("TOPIC.A", &payload()).await.unwrap();
        broker.publish("TOPIC.B", &payload()).await.unwrap();

        assert_eq!(conduit.published_topics(), vec!["TOPIC.A", "TOPIC.B"]);
        // One dial serves both publishes
        assert_eq!(opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn publish_retries_once_on_a_fresh_connection() {
        let broken = FakeConduit::failing();
        let fresh = FakeConduit::healthy();
        let (connector, opens) = FakeConnector::with(vec![broken.clone(), fresh.clone()]);
        let broker = Broker::with_connector("amqp://test", connector);

        broker.publish("TOPIC.A", &payload()).await.unwrap();

        // The message lands on the reconnected channel, not the broken one
        assert!(broken.published_topics().is_empty());
        assert_eq!(fresh.published_topics(), vec!["TOPIC.A"]);
        assert_eq!(opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn publish_retry_is_bounded() {
        let (connector, opens) =
            FakeConnector::with(vec![FakeConduit::failing(), FakeConduit::failing()]);
        let broker = Broker::with_connector("amqp://test", connector);

        let err = broker.publish("TOPIC.A", &payload()).await.unwrap_err();

        assert!(matches!(err, BrokerError::Unavailable(_)));
        // Exactly one reconnect attempt, then the failure surfaces
        assert_eq!(opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn closed_channel_reconnects_before_the_next_publish() {
        let first = FakeConduit::healthy();
        let second = FakeConduit::healthy();
        let (connector, opens) = FakeConnector::with(vec![first.clone(), second.clone()]);
        let broker = Broker::with_connector("amqp://test", connector);

        broker.publish("TOPIC.A", &payload()).await.unwrap();
        first.open.store(false, Ordering::SeqCst);
        broker.publish("TOPIC.B", &payload()).await.unwrap();

        assert_eq!(first.published_topics(), vec!["TOPIC.A"]);
        assert_eq!(second.published_topics(), vec!["TOPIC.B"]);
        assert_eq!(opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn connect_is_idempotent() {
        let (connector, opens) = FakeConnector::with(vec![FakeConduit::healthy()]);
        let broker = Broker::with_connector("amqp://test", connector);

        broker.connect().await.unwrap();
        broker.connect().await.unwrap();

        assert_eq!(opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_with_backoff_survives_a_cold_broker() {
        let (connector, opens) = FakeConnector::with(vec![FakeConduit::healthy()]);
        connector.fail_opens.store(2, Ordering::SeqCst);
        let broker = Broker::with_connector("amqp://test", connector);

        connect_with_backoff(&broker, 5).await.unwrap();

        assert_eq!(opens.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_with_backoff_gives_up_after_max_attempts() {
        let (connector, opens) = FakeConnector::with(vec![]);
        let broker = Broker::with_connector("amqp://test", connector);

        let err = connect_with_backoff(&broker, 3).await.unwrap_err();

        assert!(matches!(err, BrokerError::Unavailable(_)));
        assert_eq!(opens.load(Ordering::SeqCst), 3);
    }
}
