//! HTTP handlers for the Storage API
//!
//! - GET    /api/storage/v1/trading-systems/:id/documentation  (documentation + name)
//! - PUT    /api/storage/v1/trading-systems/:id/documentation  (replace documentation)
//! - GET    /api/storage/v1/trading-systems/:id/equity-chart/:type  (chart image, default if absent)
//! - GET    /api/storage/v1/trading-systems/:id/equity-charts  (stored chart types)
//! - PUT    /api/storage/v1/trading-systems/:id/equity-charts  (write charts for a target owner)
//! - DELETE /api/storage/v1/trading-systems/:id/equity-charts  (delete charts for a target owner)
//! - POST   /api/storage/v1/messages  (enqueue an inventory message)
//!
//! Every endpoint requires a session, taken from the `X-Username` header.
//! Equity chart writes name their target owner explicitly because the
//! portfolio evaluator stores charts on behalf of other users.

use crate::error::Error;
use crate::lifecycle::{BrokerHandle, Envelope, Message};
use crate::service::{ArtifactService, DocumentationResponse};
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Header carrying the authenticated user
pub const USERNAME_HEADER: &str = "x-username";

/// Shared state for storage handlers
#[derive(Clone)]
pub struct StorageState {
    pub service: ArtifactService,
    pub broker: BrokerHandle,
}

/// Create the storage router with all REST endpoints
pub fn storage_router(state: StorageState) -> Router {
    Router::new()
        .route(
            "/api/storage/v1/trading-systems/:id/documentation",
            get(get_documentation).put(set_documentation),
        )
        .route(
            "/api/storage/v1/trading-systems/:id/equity-chart/:chart_type",
            get(get_equity_chart),
        )
        .route(
            "/api/storage/v1/trading-systems/:id/equity-charts",
            get(list_equity_charts)
                .put(set_equity_charts)
                .delete(delete_equity_charts),
        )
        .route("/api/storage/v1/messages", post(publish_message))
        .with_state(state)
}

// =============================================================================
// Request / response types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct DocumentationRequest {
    pub documentation: String,
}

/// Equity charts written on behalf of `username`, images base64 encoded
#[derive(Debug, Deserialize)]
pub struct EquityChartsRequest {
    pub username: String,
    pub images: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct OwnerQuery {
    username: String,
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

/// API error detail
#[derive(Debug, Serialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::MalformedInput(_) => StatusCode::BAD_REQUEST,
            Error::StorageUnavailable { .. }
            | Error::Config(_)
            | Error::Serialization(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ApiError::new(self.kind(), self.to_string()))).into_response()
    }
}

// =============================================================================
// Session
// =============================================================================

/// Owner of the current request
#[derive(Debug, Clone)]
pub struct SessionUser(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USERNAME_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| SessionUser(v.to_string()))
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(ApiError::new("UNAUTHORIZED", "Missing session user")),
                )
                    .into_response()
            })
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Run a service call off the async runtime
async fn blocking<T, F>(service: &ArtifactService, f: F) -> Result<T, Error>
where
    F: FnOnce(&ArtifactService) -> Result<T, Error> + Send + 'static,
    T: Send + 'static,
{
    let service = service.clone();
    tokio::task::spawn_blocking(move || f(&service))
        .await
        .map_err(|e| Error::Internal(format!("Blocking task failed: {}", e)))?
}

/// GET /api/storage/v1/trading-systems/:id/documentation
async fn get_documentation(
    State(state): State<StorageState>,
    SessionUser(owner): SessionUser,
    Path(id): Path<u64>,
) -> Result<Json<DocumentationResponse>, Error> {
    let doc = blocking(&state.service, move |s| s.get_documentation(&owner, id)).await?;
    Ok(Json(doc))
}

/// PUT /api/storage/v1/trading-systems/:id/documentation
async fn set_documentation(
    State(state): State<StorageState>,
    SessionUser(owner): SessionUser,
    Path(id): Path<u64>,
    Json(request): Json<DocumentationRequest>,
) -> Result<StatusCode, Error> {
    blocking(&state.service, move |s| {
        s.set_documentation(&owner, id, &request.documentation)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/storage/v1/trading-systems/:id/equity-chart/:chart_type
async fn get_equity_chart(
    State(state): State<StorageState>,
    SessionUser(owner): SessionUser,
    Path((id, chart_type)): Path<(u64, String)>,
) -> Result<impl IntoResponse, Error> {
    let image = blocking(&state.service, move |s| {
        Ok(s.get_equity_chart(&owner, id, &chart_type))
    })
    .await?;
    Ok(([(header::CONTENT_TYPE, "image/png")], image))
}

/// GET /api/storage/v1/trading-systems/:id/equity-charts
async fn list_equity_charts(
    State(state): State<StorageState>,
    SessionUser(owner): SessionUser,
    Path(id): Path<u64>,
) -> Result<Json<Vec<String>>, Error> {
    let types = blocking(&state.service, move |s| s.list_equity_chart_types(&owner, id)).await?;
    Ok(Json(types))
}

/// PUT /api/storage/v1/trading-systems/:id/equity-charts
async fn set_equity_charts(
    State(state): State<StorageState>,
    SessionUser(session): SessionUser,
    Path(id): Path<u64>,
    Json(request): Json<EquityChartsRequest>,
) -> Result<StatusCode, Error> {
    let mut charts = BTreeMap::new();
    for (chart_type, encoded) in request.images {
        let image = STANDARD.decode(encoded.as_bytes()).map_err(|e| {
            Error::MalformedInput(format!("Chart '{}' is not valid base64: {}", chart_type, e))
        })?;
        charts.insert(chart_type, image);
    }

    let owner = request.username;
    tracing::debug!(%session, %owner, id, "Equity charts written on behalf of owner");
    blocking(&state.service, move |s| s.set_equity_charts(&owner, id, &charts)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/storage/v1/trading-systems/:id/equity-charts?username=
async fn delete_equity_charts(
    State(state): State<StorageState>,
    SessionUser(session): SessionUser,
    Path(id): Path<u64>,
    Query(query): Query<OwnerQuery>,
) -> Result<StatusCode, Error> {
    let owner = query.username;
    tracing::debug!(%session, %owner, id, "Equity charts deleted on behalf of owner");
    blocking(&state.service, move |s| s.delete_equity_charts(&owner, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/storage/v1/messages
async fn publish_message(
    State(state): State<StorageState>,
    SessionUser(session): SessionUser,
    Json(envelope): Json<Envelope>,
) -> Result<StatusCode, Error> {
    tracing::debug!(%session, source = %envelope.source, kind = %envelope.kind, "Publishing inventory message");
    state.broker.publish(Message::from(envelope)).await?;
    Ok(StatusCode::ACCEPTED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{ChannelBroker, MessageSource, INVENTORY_TO_STORAGE};
    use crate::storage::{ArtifactStore, TradingSystem};
    use axum::body::Body;
    use axum::http::Request;
    use bytes::Bytes;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const DEFAULT_CHART: &[u8] = b"default-chart";

    struct TestApp {
        app: Router,
        store: Arc<ArtifactStore>,
        broker: ChannelBroker,
        _dir: TempDir,
    }

    fn make_app() -> TestApp {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(
            ArtifactStore::open(dir.path().join("storage"), Bytes::from_static(DEFAULT_CHART))
                .unwrap(),
        );
        let (broker, handle) = ChannelBroker::new(INVENTORY_TO_STORAGE, 8, Duration::ZERO);
        let state = StorageState {
            service: ArtifactService::new(store.clone()),
            broker: handle,
        };
        TestApp {
            app: storage_router(state),
            store,
            broker,
            _dir: dir,
        }
    }

    fn provision(store: &ArtifactStore, owner: &str, id: u64, name: &str) {
        store.provision(owner, id).unwrap();
        store.write_info(&TradingSystem::new(id, owner, name)).unwrap();
        store.write_documentation(owner, id, "").unwrap();
    }

    fn request(method: &str, uri: &str, user: Option<&str>, body: Option<serde_json::Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(USERNAME_HEADER, user);
        }
        match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn body_bytes(response: Response) -> Bytes {
        axum::body::to_bytes(response.into_body(), 1024 * 64)
            .await
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_documentation_round_trip() {
        let t = make_app();
        provision(&t.store, "alice", 42, "Breakout");

        let resp = t
            .app
            .clone()
            .oneshot(request(
                "PUT",
                "/api/storage/v1/trading-systems/42/documentation",
                Some("alice"),
                Some(serde_json::json!({ "documentation": "hello" })),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = t
            .app
            .oneshot(request(
                "GET",
                "/api/storage/v1/trading-systems/42/documentation",
                Some("alice"),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["id"], 42);
        assert_eq!(json["name"], "Breakout");
        assert_eq!(json["documentation"], "hello");
    }

    #[tokio::test]
    async fn test_documentation_is_scoped_to_session_owner() {
        let t = make_app();
        provision(&t.store, "alice", 42, "Breakout");

        let resp = t
            .app
            .oneshot(request(
                "GET",
                "/api/storage/v1/trading-systems/42/documentation",
                Some("mallory"),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let json = body_json(resp).await;
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_missing_session_user_is_unauthorized() {
        let t = make_app();
        let resp = t
            .app
            .oneshot(request(
                "GET",
                "/api/storage/v1/trading-systems/1/documentation",
                None,
                None,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_equity_chart_falls_back_to_default() {
        let t = make_app();
        let resp = t
            .app
            .oneshot(request(
                "GET",
                "/api/storage/v1/trading-systems/7/equity-chart/daily",
                Some("alice"),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(body_bytes(resp).await, Bytes::from_static(DEFAULT_CHART));
    }

    #[tokio::test]
    async fn test_set_list_and_delete_equity_charts() {
        let t = make_app();
        provision(&t.store, "bob", 3, "Portfolio");

        let body = serde_json::json!({
            "username": "bob",
            "images": { "daily": STANDARD.encode([1u8, 2, 3]), "cumulative": STANDARD.encode([9u8]) }
        });
        let resp = t
            .app
            .clone()
            .oneshot(request(
                "PUT",
                "/api/storage/v1/trading-systems/3/equity-charts",
                Some("portfolio-trader"),
                Some(body),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = t
            .app
            .clone()
            .oneshot(request(
                "GET",
                "/api/storage/v1/trading-systems/3/equity-chart/daily",
                Some("bob"),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(body_bytes(resp).await, Bytes::from_static(&[1, 2, 3]));

        let resp = t
            .app
            .clone()
            .oneshot(request(
                "GET",
                "/api/storage/v1/trading-systems/3/equity-charts",
                Some("bob"),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(body_json(resp).await, serde_json::json!(["cumulative", "daily"]));

        let resp = t
            .app
            .clone()
            .oneshot(request(
                "DELETE",
                "/api/storage/v1/trading-systems/3/equity-charts?username=bob",
                Some("portfolio-trader"),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert!(t.store.list_chart_types("bob", 3).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_equity_charts_rejects_bad_input() {
        let t = make_app();
        provision(&t.store, "bob", 3, "Portfolio");

        let resp = t
            .app
            .clone()
            .oneshot(request(
                "PUT",
                "/api/storage/v1/trading-systems/3/equity-charts",
                Some("portfolio-trader"),
                Some(serde_json::json!({ "username": "bob", "images": { "daily": "***" } })),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = t
            .app
            .oneshot(request(
                "PUT",
                "/api/storage/v1/trading-systems/3/equity-charts",
                Some("portfolio-trader"),
                Some(serde_json::json!({ "username": "../bob", "images": { "daily": "AA==" } })),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        assert_eq!(json["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_publish_message_enqueues() {
        let mut t = make_app();
        let body = serde_json::json!({
            "source": "trading-system",
            "type": "create",
            "entity": { "tradingSystem": { "id": 42, "username": "alice" } }
        });

        let resp = t
            .app
            .oneshot(request("POST", "/api/storage/v1/messages", Some("inventory"), Some(body)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);

        let delivery = t.broker.recv().await.unwrap();
        assert_eq!(delivery.message.source, "trading-system");
        assert_eq!(delivery.message.kind, "create");
    }

    #[tokio::test]
    async fn test_cross_owner_writes_require_session() {
        let t = make_app();
        provision(&t.store, "bob", 3, "Portfolio");
        t.store
            .write_artifact("bob", 3, crate::storage::ArtifactKind::EquityChart("daily"), b"png")
            .unwrap();

        let put = serde_json::json!({ "username": "bob", "images": { "weekly": "AA==" } });
        let envelope = serde_json::json!({
            "source": "trading-system",
            "type": "delete",
            "entity": { "tradingSystem": { "id": 3, "username": "bob" } }
        });
        let requests = [
            request("PUT", "/api/storage/v1/trading-systems/3/equity-charts", None, Some(put)),
            request(
                "DELETE",
                "/api/storage/v1/trading-systems/3/equity-charts?username=bob",
                None,
                None,
            ),
            request("POST", "/api/storage/v1/messages", None, Some(envelope)),
        ];

        for req in requests {
            let resp = t.app.clone().oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
            let json = body_json(resp).await;
            assert_eq!(json["error"]["code"], "UNAUTHORIZED");
        }

        assert_eq!(t.store.list_chart_types("bob", 3).unwrap(), vec!["daily"]);
    }
}
