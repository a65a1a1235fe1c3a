//! Engines shared by every fastleaksdf stage binary: the broker adapter,
//! content-addressed store, streaming hasher, safe recursive archive
//! extractor, IOC pattern matcher, configuration loading, and the shared
//! `tracing` setup.

/// Safe recursive ZIP/RAR extraction.
pub mod archive;
/// The AMQP adapter trait and `lapin` implementation.
pub mod broker;
/// The chat-source integration seam.
pub mod chat_source;
/// Typed configuration, loaded from `.env` and the process environment.
pub mod config;
/// Postgres repository layer.
pub mod db;
/// Streaming SHA-256.
pub mod hashing;
/// Shared `tracing` initialization.
pub mod logging;
/// IOC pattern matching and scan eligibility.
pub mod patterns;
/// Content-addressed store write path.
pub mod store;

pub use broker::{AmqpClient, BrokerClient, BrokerError};
pub use chat_source::{
    ChatEvent, ChatSource, ChatSourceError, DocumentFetcher, FetchError, FixtureChatSource,
};
pub use config::{ConfigError, Settings};
pub use db::{DbError, Repository};
pub use hashing::{hash_file, HashError};
pub use patterns::{IocMatcher, PatternError, RawMatch};
pub use store::{commit, StoreError, StoredFile};
