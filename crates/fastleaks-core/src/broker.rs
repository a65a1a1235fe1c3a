//! Broker adapter: a small trait over the `fastleaksdf` topic exchange, and
//! a `lapin`-backed implementation.
//!
//! Every stage connects, publishes, and opens its consumers through
//! [`BrokerClient`], so exchange declaration, DLX wiring, and prefetch setup
//! stay in one place. Each stage's own dispatch loop then drives the
//! returned `lapin::Consumer` and acks/nacks deliveries directly.

use async_trait::async_trait;
use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, ExchangeDeclareOptions, QueueBindOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use thiserror::Error;

/// Name of the durable topic exchange every stage publishes to and
/// consumes from.
pub const EXCHANGE: &str = "fastleaksdf";
/// Dead-letter exchange routing for permanently failed messages.
pub const DEAD_LETTER_EXCHANGE: &str = "fastleaksdf-dlx";
/// Dead-letter queue bound to [`DEAD_LETTER_EXCHANGE`].
pub const DEAD_LETTER_QUEUE: &str = "fastleaksdf-dlq";

/// Failure talking to the broker. Always transient: a stage's dispatcher
/// should nack-and-requeue the in-flight message (if any) and let the
/// process's reconnect/retry loop handle the rest.
#[derive(Error, Debug)]
pub enum BrokerError {
    /// Underlying AMQP error.
    #[error("amqp error: {0}")]
    Amqp(#[from] lapin::Error),
}

/// Adapter over the broker that every stage consumes and publishes through.
///
/// [`BrokerClient::consume`] hands back a raw `lapin::Consumer`: each
/// stage's dispatch loop acks/nacks the `lapin::message::Delivery` items it
/// yields directly, since ack/nack decisions are tied closely enough to
/// each stage's own error classification that a further wrapper type would
/// just forward calls.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Publish `body` to [`EXCHANGE`] under `routing_key`, persistently.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] if the publish cannot be confirmed sent.
    async fn publish(&self, routing_key: &str, body: &[u8]) -> Result<(), BrokerError>;

    /// Declare `queue`, bind it to [`EXCHANGE`] under `routing_key`, and
    /// begin consuming with the given prefetch count.
    ///
    /// `dlx` wires `x-dead-letter-exchange` into the queue's declaration.
    /// Only the ingress queue (`documents.pending`) is declared with
    /// `dlx: true`; every other queue is an internal pipeline hop and is
    /// declared with `dlx: false`.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] if declaration, binding, or consume setup
    /// fails.
    async fn consume(
        &self,
        queue: &str,
        routing_key: &str,
        prefetch: u16,
        dlx: bool,
    ) -> Result<lapin::Consumer, BrokerError>;

    /// Declare `queue` and bind it to [`EXCHANGE`] under `routing_key`,
    /// without consuming from it.
    ///
    /// A publisher calls this for the queue it produces into, so the queue
    /// exists and is durable even before any consumer has started -- the
    /// same "declare your own output queue" pattern every stage's AMQP
    /// setup follows. `dlx` has the same meaning as in [`Self::consume`].
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] if declaration or binding fails.
    async fn declare_queue(&self, queue: &str, routing_key: &str, dlx: bool) -> Result<(), BrokerError>;
}

/// `lapin`-backed [`BrokerClient`].
pub struct AmqpClient {
    channel: Channel,
}

impl AmqpClient {
    /// Connect to `url`, declare [`EXCHANGE`] and the dead-letter topology,
    /// and return a ready client.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] if the connection or any declaration fails.
    pub async fn connect(url: &str) -> Result<Self, BrokerError> {
        let executor = tokio_executor_trait::Tokio::current();
        let reactor = tokio_reactor_trait::Tokio;
        let conn = Connection::connect(
            url,
            ConnectionProperties::default()
                .with_executor(executor)
                .with_reactor(reactor),
        )
        .await?;
        let channel = conn.create_channel().await?;

        channel
            .exchange_declare(
                EXCHANGE,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;

        channel
            .exchange_declare(
                DEAD_LETTER_EXCHANGE,
                ExchangeKind::Fanout,
                ExchangeDeclareOptions {
                    durable: true,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;

        channel
            .queue_declare(
                DEAD_LETTER_QUEUE,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;

        channel
            .queue_bind(
                DEAD_LETTER_QUEUE,
                DEAD_LETTER_EXCHANGE,
                "",
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        Ok(Self { channel })
    }

    fn dead_letter_args() -> FieldTable {
        let mut args = FieldTable::default();
        args.insert(
            "x-dead-letter-exchange".into(),
            lapin::types::AMQPValue::LongString(DEAD_LETTER_EXCHANGE.into()),
        );
        args
    }
}

#[async_trait]
impl BrokerClient for AmqpClient {
    async fn publish(&self, routing_key: &str, body: &[u8]) -> Result<(), BrokerError> {
        self.channel
            .basic_publish(
                EXCHANGE,
                routing_key,
                BasicPublishOptions::default(),
                body,
                BasicProperties::default().with_delivery_mode(2),
            )
            .await?
            .await?;
        Ok(())
    }

    async fn consume(
        &self,
        queue: &str,
        routing_key: &str,
        prefetch: u16,
        dlx: bool,
    ) -> Result<lapin::Consumer, BrokerError> {
        self.channel
            .basic_qos(prefetch, lapin::options::BasicQosOptions::default())
            .await?;

        self.declare_and_bind(queue, routing_key, dlx).await?;

        let consumer = self
            .channel
            .basic_consume(
                queue,
                queue,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        Ok(consumer)
    }

    async fn declare_queue(&self, queue: &str, routing_key: &str, dlx: bool) -> Result<(), BrokerError> {
        self.declare_and_bind(queue, routing_key, dlx).await
    }
}

impl AmqpClient {
    async fn declare_and_bind(&self, queue: &str, routing_key: &str, dlx: bool) -> Result<(), BrokerError> {
        let args = if dlx {
            Self::dead_letter_args()
        } else {
            FieldTable::default()
        };

        self.channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                args,
            )
            .await?;

        self.channel
            .queue_bind(
                queue,
                EXCHANGE,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        Ok(())
    }
}
