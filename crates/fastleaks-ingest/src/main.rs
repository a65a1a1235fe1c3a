//! Ingest stage: watches the configured chat channels and publishes a
//! `TelegramDocument` to `documents.pending` for each qualifying
//! attachment.

use std::sync::Arc;

use fastleaks_core::{AmqpClient, BrokerClient, ChatEvent, ChatSource, ChatSourceError, Settings};
use fastleaks_schema::TelegramDocument;
use thiserror::Error;

/// Errors the ingest loop can hit while handling one event.
#[derive(Error, Debug)]
enum IngestError {
    #[error("broker error: {0}")]
    Broker(#[from] fastleaks_core::BrokerError),

    #[error("chat source error: {0}")]
    ChatSource(#[from] ChatSourceError),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Production [`ChatSource`]: wraps the upstream chat client.
///
/// The client's wire protocol is explicitly out of scope for this system;
/// this type is the seam a deployment wires a real client into. It's kept
/// here, rather than mocked away, so the integration point is visible
/// rather than implicit.
struct TelegramChatSource {
    channel_ids: Vec<i64>,
}

#[async_trait::async_trait]
impl ChatSource for TelegramChatSource {
    async fn next_event(&mut self) -> Result<Option<ChatEvent>, ChatSourceError> {
        Err(ChatSourceError(format!(
            "no chat client wired up for channels {:?}; provide a ChatSource implementation",
            self.channel_ids
        )))
    }
}

async fn run_ingest_loop(
    mut source: impl ChatSource,
    broker: Arc<dyn BrokerClient>,
) -> Result<(), IngestError> {
    while let Some(event) = source.next_event().await? {
        if event.size_bytes == 0 || event.mime_type.is_empty() {
            tracing::warn!(
                doc_id = event.doc_id,
                "skipping attachment with zero size or missing mime type"
            );
            continue;
        }

        let doc = TelegramDocument::new(
            event.doc_id,
            event.chat_id,
            event.message_id,
            &event.filename,
            event.mime_type.clone(),
            event.size_bytes,
            event.channel_url.clone(),
        );

        let body = serde_json::to_vec(&doc)?;
        broker.publish("documents.pending", &body).await?;

        tracing::info!(
            job_id = %doc.job_id,
            doc_id = doc.doc_id,
            filename = %doc.filename,
            "published pending document"
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    fastleaks_core::logging::init("ingest", &settings.rust_log);

    let broker: Arc<dyn BrokerClient> = Arc::new(AmqpClient::connect(&settings.rabbitmq_url).await?);
    broker
        .declare_queue("documents.pending", "documents.pending", true)
        .await?;

    let source = TelegramChatSource {
        channel_ids: settings.channel_ids(),
    };

    if let Err(err) = run_ingest_loop(source, broker).await {
        tracing::error!(error = %err, "ingest loop terminated");
        return Err(err.into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fastleaks_core::FixtureChatSource;

    struct RecordingBroker {
        published: tokio::sync::Mutex<Vec<(String, Vec<u8>)>>,
    }

    #[async_trait::async_trait]
    impl BrokerClient for RecordingBroker {
        async fn publish(&self, routing_key: &str, body: &[u8]) -> Result<(), fastleaks_core::BrokerError> {
            self.published
                .lock()
                .await
                .push((routing_key.to_string(), body.to_vec()));
            Ok(())
        }

        async fn consume(
            &self,
            _queue: &str,
            _routing_key: &str,
            _prefetch: u16,
            _dlx: bool,
        ) -> Result<lapin::Consumer, fastleaks_core::BrokerError> {
            unimplemented!("not exercised by these tests")
        }

        async fn declare_queue(
            &self,
            _queue: &str,
            _routing_key: &str,
            _dlx: bool,
        ) -> Result<(), fastleaks_core::BrokerError> {
            Ok(())
        }
    }

    fn event(doc_id: i64, size_bytes: u64) -> ChatEvent {
        ChatEvent {
            doc_id,
            chat_id: 1,
            message_id: 1,
            filename: "leak.txt".into(),
            mime_type: "text/plain".into(),
            size_bytes,
            channel_url: None,
        }
    }

    #[tokio::test]
    async fn publishes_one_message_per_qualifying_attachment() {
        let source = FixtureChatSource::new(vec![event(1, 10), event(2, 20)]);
        let broker = Arc::new(RecordingBroker {
            published: tokio::sync::Mutex::new(Vec::new()),
        });

        run_ingest_loop(source, broker.clone()).await.unwrap();

        let published = broker.published.lock().await;
        assert_eq!(published.len(), 2);
        assert!(published.iter().all(|(key, _)| key == "documents.pending"));
    }

    #[tokio::test]
    async fn zero_size_attachments_are_skipped() {
        let source = FixtureChatSource::new(vec![event(1, 0), event(2, 10)]);
        let broker = Arc::new(RecordingBroker {
            published: tokio::sync::Mutex::new(Vec::new()),
        });

        run_ingest_loop(source, broker.clone()).await.unwrap();

        let published = broker.published.lock().await;
        assert_eq!(published.len(), 1);
    }
}
