//! Downloader stage: consumes `documents.pending`, retrieves each
//! document's bytes, hashes and stores them, upserts the `documents` row,
//! and publishes `documents.downloaded`.

use std::path::PathBuf;
use std::sync::Arc;

use fastleaks_core::{AmqpClient, BrokerClient, DocumentFetcher, FetchError, Repository, Settings};
use fastleaks_schema::{is_extractable, DownloadedFile, TelegramDocument};
use thiserror::Error;

#[derive(Error, Debug)]
enum DownloaderError {
    #[error("broker error: {0}")]
    Broker(#[from] fastleaks_core::BrokerError),

    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("store error: {0}")]
    Store(#[from] fastleaks_core::StoreError),

    #[error("database error: {0}")]
    Db(#[from] fastleaks_core::DbError),

    #[error("malformed message: {0}")]
    Deserialize(#[from] serde_json::Error),
}

/// Production [`DocumentFetcher`]: wraps the upstream chat client's media
/// download. The client itself is out of scope; this is the seam a
/// deployment wires a real client into.
struct TelegramDocumentFetcher;

#[async_trait::async_trait]
impl DocumentFetcher for TelegramDocumentFetcher {
    async fn fetch(&self, chat_id: i64, message_id: i64) -> Result<PathBuf, FetchError> {
        Err(FetchError(format!(
            "no chat client wired up to download chat {chat_id} message {message_id}"
        )))
    }
}

async fn handle_document(
    tg_doc: &TelegramDocument,
    fetcher: &dyn DocumentFetcher,
    storage_root: &std::path::Path,
    repo: &Repository,
    broker: &dyn BrokerClient,
) -> Result<(), DownloaderError> {
    let staged = fetcher.fetch(tg_doc.chat_id, tg_doc.message_id).await?;

    match handle_staged(tg_doc, &staged, storage_root, repo, broker).await {
        Ok(()) => Ok(()),
        Err(err) => {
            let _ = tokio::fs::remove_file(&staged).await;
            Err(err)
        }
    }
}

async fn handle_staged(
    tg_doc: &TelegramDocument,
    staged: &std::path::Path,
    storage_root: &std::path::Path,
    repo: &Repository,
    broker: &dyn BrokerClient,
) -> Result<(), DownloaderError> {
    let stored = fastleaks_core::commit(storage_root, staged, &tg_doc.filename).await?;

    let source_id = repo.upsert_telegram_source(tg_doc).await?;
    repo.upsert_document(
        &stored.sha256,
        &stored.path.display().to_string(),
        &tg_doc.mime_type,
        stored.size_bytes as i64,
        Some(source_id),
        None,
    )
    .await?;

    let extractable = is_extractable(&tg_doc.filename, &tg_doc.mime_type);
    let downloaded = DownloadedFile {
        job_id: tg_doc.job_id,
        doc_id: tg_doc.doc_id,
        sha256: stored.sha256,
        storage_path: stored.path.display().to_string(),
        size_bytes: stored.size_bytes,
        mime_type: tg_doc.mime_type.clone(),
        extractable,
        original: tg_doc.clone(),
    };

    let body = serde_json::to_vec(&downloaded)?;
    broker.publish("documents.downloaded", &body).await?;

    tracing::info!(
        sha256 = %downloaded.sha256,
        filename = %tg_doc.filename,
        size_bytes = downloaded.size_bytes,
        extractable,
        "download completed"
    );

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    fastleaks_core::logging::init("downloader", &settings.rust_log);

    let repo = Repository::connect(&settings.database_url).await?;
    repo.migrate().await?;

    let broker = AmqpClient::connect(&settings.rabbitmq_url).await?;
    broker
        .declare_queue("documents.downloaded", "documents.downloaded", false)
        .await?;

    let mut consumer = broker
        .consume("documents.pending", "documents.pending", 1, true)
        .await?;
    let fetcher = TelegramDocumentFetcher;
    let storage_root = settings.storage_path.clone();
    let broker: Arc<dyn BrokerClient> = Arc::new(broker);

    use futures::StreamExt;
    while let Some(delivery) = consumer.next().await {
        let delivery = delivery?;
        let tg_doc: TelegramDocument = match serde_json::from_slice(&delivery.data) {
            Ok(doc) => doc,
            Err(err) => {
                tracing::error!(error = %err, "dropping malformed documents.pending message");
                delivery.acker.ack(Default::default()).await?;
                continue;
            }
        };

        match handle_document(&tg_doc, &fetcher, &storage_root, &repo, broker.as_ref()).await {
            Ok(()) => delivery.acker.ack(Default::default()).await?,
            Err(err) => {
                tracing::error!(doc_id = tg_doc.doc_id, error = %err, "download failed");
                delivery
                    .acker
                    .nack(lapin::options::BasicNackOptions {
                        requeue: true,
                        ..Default::default()
                    })
                    .await?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixtureFetcher {
        bytes: &'static [u8],
    }

    #[async_trait::async_trait]
    impl DocumentFetcher for FixtureFetcher {
        async fn fetch(&self, _chat_id: i64, _message_id: i64) -> Result<PathBuf, FetchError> {
            let mut tmp = tempfile::NamedTempFile::new().unwrap();
            std::io::Write::write_all(&mut tmp, self.bytes).unwrap();
            Ok(tmp.into_temp_path().keep().unwrap())
        }
    }

    fn sample_doc() -> TelegramDocument {
        TelegramDocument::new(1, 2, 3, "leak.zip", "application/zip", 100, None)
    }

    #[tokio::test]
    async fn fetched_bytes_land_in_content_store_and_are_marked_extractable() {
        let tg_doc = sample_doc();
        let storage = tempfile::tempdir().unwrap();
        let fetcher = FixtureFetcher { bytes: b"PK fake zip bytes" };

        let staged = fetcher.fetch(tg_doc.chat_id, tg_doc.message_id).await.unwrap();
        let stored = fastleaks_core::commit(storage.path(), &staged, &tg_doc.filename)
            .await
            .unwrap();

        assert!(stored.path.starts_with(storage.path()));
        assert!(stored.path.exists());
        assert!(is_extractable(&tg_doc.filename, &tg_doc.mime_type));
    }
}
