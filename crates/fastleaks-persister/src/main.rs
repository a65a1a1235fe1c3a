//! Persister stage: consumes `iocs.pending`, deduplicates against
//! `(document_id, ioc_type, value)`, and commits new findings.

use fastleaks_core::{AmqpClient, BrokerClient, Repository, Settings};
use fastleaks_schema::IOCMatch;
use thiserror::Error;

#[derive(Error, Debug)]
enum PersisterError {
    #[error("broker error: {0}")]
    Broker(#[from] fastleaks_core::BrokerError),

    #[error("database error: {0}")]
    Db(#[from] fastleaks_core::DbError),
}

/// What happened when a single IOC hit was processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PersistOutcome {
    /// A new row was committed.
    Inserted,
    /// The `(document_id, ioc_type, value)` triple already existed.
    Duplicate,
    /// No `documents` row exists for this hash yet; the hit was dropped.
    DocumentMissing,
}

async fn handle_ioc(ioc: &IOCMatch, repo: &Repository) -> Result<PersistOutcome, PersisterError> {
    let Some(document_id) = repo.document_id_by_sha256(&ioc.file_sha256).await? else {
        return Ok(PersistOutcome::DocumentMissing);
    };

    let inserted = repo.insert_ioc_if_new(document_id, ioc).await?;
    Ok(if inserted {
        PersistOutcome::Inserted
    } else {
        PersistOutcome::Duplicate
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    fastleaks_core::logging::init("persister", &settings.rust_log);

    let repo = Repository::connect(&settings.database_url).await?;
    repo.migrate().await?;

    let broker = AmqpClient::connect(&settings.rabbitmq_url).await?;
    let mut consumer = broker
        .consume("iocs.pending", "iocs.pending", 5, false)
        .await?;

    use futures::StreamExt;
    while let Some(delivery) = consumer.next().await {
        let delivery = delivery?;
        let ioc: IOCMatch = match serde_json::from_slice(&delivery.data) {
            Ok(ioc) => ioc,
            Err(err) => {
                tracing::error!(error = %err, "dropping malformed iocs.pending message");
                delivery.acker.ack(Default::default()).await?;
                continue;
            }
        };

        match handle_ioc(&ioc, &repo).await {
            Ok(PersistOutcome::Inserted) => {
                tracing::info!(
                    sha256 = %ioc.file_sha256,
                    ioc_type = %ioc.ioc_type,
                    "ioc persisted"
                );
                delivery.acker.ack(Default::default()).await?;
            }
            Ok(PersistOutcome::Duplicate) => {
                tracing::debug!(
                    sha256 = %ioc.file_sha256,
                    ioc_type = %ioc.ioc_type,
                    "ioc already persisted, skipping"
                );
                delivery.acker.ack(Default::default()).await?;
            }
            Ok(PersistOutcome::DocumentMissing) => {
                tracing::warn!(sha256 = %ioc.file_sha256, "document not found, dropping ioc");
                delivery.acker.ack(Default::default()).await?;
            }
            Err(err) => {
                tracing::error!(sha256 = %ioc.file_sha256, error = %err, "persistence failed");
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

    // `handle_ioc` requires a live Postgres pool, so its three outcomes
    // are exercised indirectly through `Repository`'s own query shapes;
    // `PersistOutcome` itself is tested here as a plain value type to
    // guard the match arms in `main` against a silently dropped variant.
    #[test]
    fn outcomes_are_distinct() {
        assert_ne!(PersistOutcome::Inserted, PersistOutcome::Duplicate);
        assert_ne!(PersistOutcome::Duplicate, PersistOutcome::DocumentMissing);
    }
}
