//! Request-shaped operations on top of the artifact store
//!
//! Adds two policies to the raw store: a missing equity chart is served as
//! the default image, and chart sets are written or deleted one by one,
//! stopping at the first failure without rolling back.

use super::types::DocumentationResponse;
use crate::error::Result;
use crate::storage::{ArtifactKind, ArtifactStore};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Artifact operations for the request adapter
#[derive(Clone)]
pub struct ArtifactService {
    store: Arc<ArtifactStore>,
}

impl ArtifactService {
    pub fn new(store: Arc<ArtifactStore>) -> Self {
        Self { store }
    }

    // =========================================================================
    // Documentation
    // =========================================================================

    pub fn get_documentation(&self, owner: &str, id: u64) -> Result<DocumentationResponse> {
        tracing::info!(%owner, id, "Getting documentation for trading system");

        let documentation = self.store.read_documentation(owner, id).map_err(|e| {
            tracing::error!(%owner, id, error = %e, "Cannot retrieve documentation for trading system");
            e
        })?;

        let info = self.store.read_info(owner, id).map_err(|e| {
            tracing::error!(%owner, id, error = %e, "Cannot retrieve info for trading system");
            e
        })?;

        tracing::info!(%owner, id, "Documentation retrieved");
        Ok(DocumentationResponse {
            id,
            name: info.name,
            documentation,
        })
    }

    pub fn set_documentation(&self, owner: &str, id: u64, text: &str) -> Result<()> {
        tracing::info!(%owner, id, "Setting documentation for trading system");

        match self.store.write_documentation(owner, id, text) {
            Ok(()) => {
                tracing::info!(%owner, id, "Documentation stored");
                Ok(())
            }
            Err(e) => {
                tracing::error!(%owner, id, error = %e, "Cannot store documentation for trading system");
                Err(e)
            }
        }
    }

    // =========================================================================
    // Equity charts
    // =========================================================================

    /// The stored chart, or the default image if it cannot be read.
    pub fn get_equity_chart(&self, owner: &str, id: u64, chart_type: &str) -> Bytes {
        match self
            .store
            .read_artifact(owner, id, ArtifactKind::EquityChart(chart_type))
        {
            Ok(data) => Bytes::from(data),
            Err(e) if e.is_not_found() => {
                tracing::debug!(%owner, id, chart_type, "No equity chart stored, serving default");
                self.store.default_chart_image()
            }
            Err(e) => {
                tracing::warn!(%owner, id, chart_type, error = %e, "Cannot read equity chart, serving default");
                self.store.default_chart_image()
            }
        }
    }

    pub fn list_equity_chart_types(&self, owner: &str, id: u64) -> Result<Vec<String>> {
        self.store.list_chart_types(owner, id).map_err(|e| {
            tracing::error!(%owner, id, error = %e, "Cannot list equity charts");
            e
        })
    }

    /// Write every chart in `charts`. Charts written before a failure stay on disk.
    pub fn set_equity_charts(
        &self,
        owner: &str,
        id: u64,
        charts: &BTreeMap<String, Vec<u8>>,
    ) -> Result<()> {
        tracing::info!(%owner, id, count = charts.len(), "Setting equity charts for trading system");

        for (chart_type, image) in charts {
            if let Err(e) =
                self.store
                    .write_artifact(owner, id, ArtifactKind::EquityChart(chart_type), image)
            {
                tracing::error!(%owner, id, %chart_type, error = %e, "Cannot write equity chart");
                return Err(e);
            }
        }

        tracing::info!(%owner, id, "Equity charts set");
        Ok(())
    }

    /// Delete every stored chart. Charts not reached before a failure stay on disk.
    pub fn delete_equity_charts(&self, owner: &str, id: u64) -> Result<()> {
        tracing::info!(%owner, id, "Deleting equity charts for trading system");

        for chart_type in self.list_equity_chart_types(owner, id)? {
            if let Err(e) =
                self.store
                    .delete_artifact(owner, id, ArtifactKind::EquityChart(&chart_type))
            {
                tracing::error!(%owner, id, %chart_type, error = %e, "Cannot delete equity chart");
                return Err(e);
            }
        }

        tracing::info!(%owner, id, "Equity charts deleted");
        Ok(())
    }
}
