//! Postgres repository layer: `telegram_sources`, `documents`, `iocs`.
//!
//! Every write here is upsert-shaped so at-least-once redelivery is safe:
//! a row that already exists (by its natural key) is looked up rather than
//! re-inserted, and IOC inserts rely on a unique constraint plus
//! `ON CONFLICT DO NOTHING` rather than a check-then-insert race.

use fastleaks_schema::{IOCMatch, Sha256Hash, TelegramDocument};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;

/// Failure talking to the database. Always transient from a stage's point
/// of view: nack-and-retry is the correct response.
#[derive(Error, Debug)]
pub enum DbError {
    /// Underlying `sqlx`/Postgres error.
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// A schema migration failed to apply.
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// A row in `telegram_sources`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TelegramSourceRow {
    /// Primary key.
    pub id: i64,
    /// Remote document identifier, unique.
    pub doc_id: i64,
}

/// A row in `documents`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DocumentRow {
    /// Primary key.
    pub id: i64,
    /// Content hash, unique.
    pub sha256: String,
}

/// Connection pool plus the queries every stage needing the database runs.
pub struct Repository {
    pool: PgPool,
}

impl Repository {
    /// Connect to `database_url` with a small bounded pool.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the pool cannot establish a connection.
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Apply pending migrations from the workspace's `migrations/`
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if any migration fails to apply.
    pub async fn migrate(&self) -> Result<(), DbError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Look up a `telegram_sources` row by `doc_id`, inserting one from
    /// `doc` if absent. Idempotent under redelivery.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on a query failure.
    pub async fn upsert_telegram_source(&self, doc: &TelegramDocument) -> Result<i64, DbError> {
        if let Some(existing) =
            sqlx::query_scalar::<_, i64>("SELECT id FROM telegram_sources WHERE doc_id = $1")
                .bind(doc.doc_id)
                .fetch_optional(&self.pool)
                .await?
        {
            return Ok(existing);
        }

        let id = sqlx::query_scalar::<_, i64>(
            r"
            INSERT INTO telegram_sources
                (doc_id, chat_id, message_id, filename, mime_type, size_bytes, channel_url, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (doc_id) DO UPDATE SET doc_id = EXCLUDED.doc_id
            RETURNING id
            ",
        )
        .bind(doc.doc_id)
        .bind(doc.chat_id)
        .bind(doc.message_id)
        .bind(&doc.filename)
        .bind(&doc.mime_type)
        .bind(doc.size_bytes as i64)
        .bind(&doc.channel_url)
        .bind(doc.timestamp)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Look up a `documents` row by `sha256`, inserting one if absent.
    /// `source_id` and `parent_id` are only recorded on first insert.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on a query failure.
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert_document(
        &self,
        sha256: &Sha256Hash,
        storage_path: &str,
        mime_type: &str,
        size_bytes: i64,
        source_id: Option<i64>,
        parent_id: Option<i64>,
    ) -> Result<i64, DbError> {
        if let Some(id) = self.document_id_by_sha256(sha256).await? {
            return Ok(id);
        }

        let id = sqlx::query_scalar::<_, i64>(
            r"
            INSERT INTO documents
                (sha256, storage_path, mime_type, size_bytes, source_id, parent_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (sha256) DO UPDATE SET sha256 = EXCLUDED.sha256
            RETURNING id
            ",
        )
        .bind(sha256.as_str())
        .bind(storage_path)
        .bind(mime_type)
        .bind(size_bytes)
        .bind(source_id)
        .bind(parent_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Look up a `documents` row's id by content hash, without inserting.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on a query failure.
    pub async fn document_id_by_sha256(&self, sha256: &Sha256Hash) -> Result<Option<i64>, DbError> {
        let id = sqlx::query_scalar::<_, i64>("SELECT id FROM documents WHERE sha256 = $1")
            .bind(sha256.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    /// Insert an IOC hit for `document_id`, unless `(document_id, ioc_type,
    /// value)` already exists.
    ///
    /// Returns `true` if a new row was inserted, `false` if it was a
    /// duplicate. Relies on the unique constraint declared in the
    /// migrations rather than a check-then-insert race, so concurrent
    /// persisters (or redelivery of the same message) can't double-insert.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on a query failure.
    pub async fn insert_ioc_if_new(
        &self,
        document_id: i64,
        ioc: &IOCMatch,
    ) -> Result<bool, DbError> {
        let inserted = sqlx::query_scalar::<_, i64>(
            r"
            INSERT INTO iocs (document_id, ioc_type, value, context, line_number, created_at)
            VALUES ($1, $2, $3, $4, $5, now())
            ON CONFLICT (document_id, ioc_type, value) DO NOTHING
            RETURNING id
            ",
        )
        .bind(document_id)
        .bind(&ioc.ioc_type)
        .bind(&ioc.value)
        .bind(&ioc.context)
        .bind(ioc.line_number as i64)
        .fetch_optional(&self.pool)
        .await?;

        Ok(inserted.is_some())
    }
}
