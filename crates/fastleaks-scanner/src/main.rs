//! Scanner stage: consumes `documents.downloaded` and `files.extracted`,
//! scans eligible files for IOCs, and publishes one `iocs.pending` message
//! per hit.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use fastleaks_core::{patterns::is_scan_eligible, AmqpClient, BrokerClient, IocMatcher, Settings};
use fastleaks_schema::{IOCMatch, Sha256Hash};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
enum ScannerError {
    #[error("broker error: {0}")]
    Broker(#[from] fastleaks_core::BrokerError),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("scan task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

async fn scan_and_publish(
    job_id: Uuid,
    sha256: &Sha256Hash,
    path: &Path,
    matcher: &Arc<IocMatcher>,
    broker: &dyn BrokerClient,
) -> Result<usize, ScannerError> {
    if !path.exists() {
        return Ok(0);
    }

    let matcher = Arc::clone(matcher);
    let owned_path = PathBuf::from(path);
    let hits = tokio::task::spawn_blocking(move || matcher.scan_file(&owned_path)).await?;
    let path_str = path.display().to_string();

    for hit in &hits {
        let ioc = IOCMatch {
            job_id,
            file_sha256: sha256.clone(),
            file_path: path_str.clone(),
            ioc_type: hit.ioc_type.clone(),
            value: hit.value.clone(),
            context: hit.context.clone(),
            line_number: hit.line_number,
        };
        let body = serde_json::to_vec(&ioc)?;
        broker.publish("iocs.pending", &body).await?;
    }

    Ok(hits.len())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    fastleaks_core::logging::init("scanner", &settings.rust_log);

    let matcher = Arc::new(IocMatcher::new(
        &settings.ioc_patterns_cpf,
        &settings.ioc_patterns_email,
        &settings.ioc_patterns_domain,
        &settings.ioc_patterns_ip_internal,
    )?);
    tracing::info!(patterns = ?matcher.pattern_names(), "scanner active");

    let broker = Arc::new(AmqpClient::connect(&settings.rabbitmq_url).await?);
    broker
        .declare_queue("iocs.pending", "iocs.pending", false)
        .await?;

    let mut downloaded_consumer = broker
        .consume("documents.downloaded", "documents.downloaded", 2, false)
        .await?;
    let mut extracted_consumer = broker
        .consume("files.extracted", "files.extracted", 2, false)
        .await?;

    use futures::StreamExt;
    loop {
        tokio::select! {
            Some(delivery) = downloaded_consumer.next() => {
                let delivery = delivery?;
                let doc: fastleaks_schema::DownloadedFile = match serde_json::from_slice(&delivery.data) {
                    Ok(d) => d,
                    Err(err) => {
                        tracing::error!(error = %err, "dropping malformed documents.downloaded message");
                        delivery.acker.ack(Default::default()).await?;
                        continue;
                    }
                };
                let filename = Path::new(&doc.storage_path)
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or_default();
                let result = if is_scan_eligible(&doc.mime_type, filename) {
                    scan_and_publish(
                        doc.job_id,
                        &doc.sha256,
                        Path::new(&doc.storage_path),
                        &matcher,
                        broker.as_ref(),
                    )
                    .await
                } else {
                    Ok(0)
                };
                match result {
                    Ok(_) => delivery.acker.ack(Default::default()).await?,
                    Err(err) => {
                        tracing::error!(sha256 = %doc.sha256, error = %err, "scan failed");
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
            Some(delivery) = extracted_consumer.next() => {
                let delivery = delivery?;
                let file: fastleaks_schema::ExtractedFile = match serde_json::from_slice(&delivery.data) {
                    Ok(f) => f,
                    Err(err) => {
                        tracing::error!(error = %err, "dropping malformed files.extracted message");
                        delivery.acker.ack(Default::default()).await?;
                        continue;
                    }
                };
                let result = if is_scan_eligible(&file.mime_type, &file.filename) {
                    scan_and_publish(
                        file.job_id,
                        &file.sha256,
                        Path::new(&file.storage_path),
                        &matcher,
                        broker.as_ref(),
                    )
                    .await
                } else {
                    Ok(0)
                };
                match result {
                    Ok(_) => delivery.acker.ack(Default::default()).await?,
                    Err(err) => {
                        tracing::error!(sha256 = %file.sha256, error = %err, "scan failed");
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
            else => break,
        }
    }

    Ok(())
}
