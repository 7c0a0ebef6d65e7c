//! Gateway server for the Storage Manager
//!
//! Serves the storage REST API and runs the inventory lifecycle listener.

mod handler;
mod server;

pub use handler::{
    storage_router, ApiError, ApiErrorDetail, DocumentationRequest, EquityChartsRequest,
    SessionUser, StorageState, USERNAME_HEADER,
};
pub use server::{Gateway, GatewayBuilder, GatewayState};
