//! Artifact storage: per trading system files on the local filesystem
//!
//! The store is the only component that touches the storage root. Everything
//! else goes through [`ArtifactStore`].

pub mod layout;
pub mod store;
pub mod types;

pub use layout::ArtifactKind;
pub use store::{load_default_chart, ArtifactStore};
pub use types::TradingSystem;
