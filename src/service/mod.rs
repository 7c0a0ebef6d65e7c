//! Artifact service: documentation and equity chart operations

mod artifacts;
pub mod types;

pub use artifacts::ArtifactService;
pub use types::DocumentationResponse;
