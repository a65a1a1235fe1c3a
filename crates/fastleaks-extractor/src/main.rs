//! Extractor stage: consumes `documents.downloaded` (extractable only),
//! safely unpacks ZIP/RAR archives up to three levels deep, and publishes
//! one `files.extracted` message per leaf.

use fastleaks_core::{AmqpClient, BrokerClient, Repository, Settings};
use fastleaks_schema::DownloadedFile;
use thiserror::Error;

#[derive(Error, Debug)]
enum ExtractorError {
    #[error("broker error: {0}")]
    Broker(#[from] fastleaks_core::BrokerError),

    #[error("database error: {0}")]
    Db(#[from] fastleaks_core::DbError),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

async fn handle_downloaded(
    downloaded: &DownloadedFile,
    storage_root: &std::path::Path,
    repo: &Repository,
    broker: &dyn BrokerClient,
) -> Result<usize, ExtractorError> {
    if !downloaded.extractable {
        return Ok(0);
    }

    let archive_path = std::path::Path::new(&downloaded.storage_path);
    let leaves = fastleaks_core::archive::extract_recursive(
        downloaded.job_id,
        archive_path,
        &downloaded.sha256,
        storage_root,
    )
    .await;

    for leaf in &leaves {
        repo.upsert_document(
            &leaf.sha256,
            &leaf.storage_path,
            &leaf.mime_type,
            0,
            None,
            None,
        )
        .await?;

        let body = serde_json::to_vec(leaf)?;
        broker.publish("files.extracted", &body).await?;
    }

    Ok(leaves.len())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    fastleaks_core::logging::init("extractor", &settings.rust_log);

    let repo = Repository::connect(&settings.database_url).await?;
    repo.migrate().await?;

    let broker = AmqpClient::connect(&settings.rabbitmq_url).await?;
    broker
        .declare_queue("files.extracted", "files.extracted", false)
        .await?;

    let mut consumer = broker
        .consume("documents.downloaded", "documents.downloaded", 1, false)
        .await?;

    use futures::StreamExt;
    while let Some(delivery) = consumer.next().await {
        let delivery = delivery?;
        let downloaded: DownloadedFile = match serde_json::from_slice(&delivery.data) {
            Ok(d) => d,
            Err(err) => {
                tracing::error!(error = %err, "dropping malformed documents.downloaded message");
                delivery.acker.ack(Default::default()).await?;
                continue;
            }
        };

        match handle_downloaded(&downloaded, &settings.storage_path, &repo, &broker).await {
            Ok(count) => {
                if count > 0 {
                    tracing::info!(
                        sha256 = %downloaded.sha256,
                        extracted = count,
                        "extraction completed"
                    );
                }
                delivery.acker.ack(Default::default()).await?;
            }
            Err(err) => {
                tracing::error!(sha256 = %downloaded.sha256, error = %err, "extraction failed");
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
    use fastleaks_schema::Sha256Hash;
    use std::io::Write;

    fn hash(byte: char) -> Sha256Hash {
        Sha256Hash::parse(byte.to_string().repeat(64)).unwrap()
    }

    #[tokio::test]
    async fn non_extractable_downloads_produce_no_leaves() {
        let storage = tempfile::tempdir().unwrap();
        let downloaded = DownloadedFile {
            job_id: uuid::Uuid::new_v4(),
            doc_id: 1,
            sha256: hash('a'),
            storage_path: storage.path().join("notes.txt").display().to_string(),
            size_bytes: 10,
            mime_type: "text/plain".into(),
            extractable: false,
            original: fastleaks_schema::TelegramDocument::new(
                1,
                2,
                3,
                "notes.txt",
                "text/plain",
                10,
                None,
            ),
        };

        let leaves = fastleaks_core::archive::extract_recursive(
            downloaded.job_id,
            std::path::Path::new(&downloaded.storage_path),
            &downloaded.sha256,
            storage.path(),
        )
        .await;
        assert!(!downloaded.extractable);
        assert!(leaves.is_empty());
    }

    #[tokio::test]
    async fn zip_archive_yields_leaves_with_immediate_parent_hash() {
        let storage = tempfile::tempdir().unwrap();
        let archive_path = storage.path().join("bundle.zip");
        {
            let file = std::fs::File::create(&archive_path).unwrap();
            let mut zip = zip::ZipWriter::new(file);
            zip.start_file("leak.txt", zip::write::FileOptions::default())
                .unwrap();
            zip.write_all(b"admin@example.gov.br").unwrap();
            zip.finish().unwrap();
        }

        let parent_sha = hash('b');
        let leaves = fastleaks_core::archive::extract_recursive(
            uuid::Uuid::new_v4(),
            &archive_path,
            &parent_sha,
            storage.path(),
        )
        .await;

        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].parent_sha256.as_str(), parent_sha.as_str());
        assert_eq!(leaves[0].depth, 1);
    }
}
