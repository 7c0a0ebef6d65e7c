//! Storage Manager - per-trading-system artifact storage
//!
//! Every trading system owns a directory of artifacts (metadata, free-form
//! documentation, equity-chart images) on the local filesystem. The storage
//! manager keeps those directories in step with the trading-system inventory
//! and serves the artifacts to clients.
//!
//! ## Architecture
//!
//! ```text
//! inventory ──► ChannelBroker ──► LifecycleSynchronizer ──┐
//!  (create/delete)   (ack/nack)      provision/teardown   │
//!                                                        ▼
//! HTTP client ──► Gateway (axum) ──► ArtifactService ──► ArtifactStore
//!                                    default chart        atomic writes
//!                                    fallback             {root}/{owner}/{id}/
//! ```
//!
//! ## Modules
//!
//! - [`storage`]: Directory layout and the atomic artifact store
//! - [`lifecycle`]: Inventory messages, the in-process broker and the synchronizer
//! - [`service`]: Documentation and equity-chart operations
//! - [`gateway`]: HTTP API and process lifecycle
//! - [`config`]: Configuration management

pub mod config;
pub mod error;
pub mod gateway;
pub mod lifecycle;
pub mod service;
pub mod storage;

pub use config::StorageManagerConfig;
pub use error::{Error, Result};
