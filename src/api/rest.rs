//! REST API Handlers
//!
//! Implements the REST endpoints for node registration, lookup,
//! capability updates and deletion.

use crate::error::Error;
use crate::registry::{NodeKey, NodePatch, NodeRecord, NodeRegistry, RegisterOutcome, UpdateOutcome};
use axum::{
    extract::{Json, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

/// The only action tag `POST /register` accepts
pub const REGISTER_ACTION: &str = "REGISTER";

// =============================================================================
// Request/Response Types
// =============================================================================

/// Node registration request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// Action tag, must be `REGISTER`
    pub action: String,
    /// Node identifier
    pub client_id: Uuid,
    /// Run the node joins; the configured default run when absent
    #[serde(default)]
    pub run_id: Option<String>,
    /// Reported image capacity
    #[serde(default)]
    pub number_images: Option<u32>,
}

/// Run selector for single-node endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunQuery {
    #[serde(default)]
    pub run_id: Option<String>,
}

/// Plain confirmation response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

/// API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

fn api_error(status: StatusCode, error: &str, message: impl Into<String>, details: Option<String>) -> Response {
    (
        status,
        Json(ApiErrorResponse {
            error: error.into(),
            message: message.into(),
            details,
        }),
    )
        .into_response()
}

fn not_found(key: &NodeKey) -> Response {
    api_error(
        StatusCode::NOT_FOUND,
        "not_found",
        "Node not found",
        Some(
            Error::NodeNotFound {
                client_id: key.client_id.to_string(),
                run_id: key.run_id.clone(),
            }
            .to_string(),
        ),
    )
}

fn internal_error(e: Error) -> Response {
    error!("Registry operation failed: {}", e);
    api_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "Internal server error",
        Some(e.to_string()),
    )
}

// =============================================================================
// REST Router
// =============================================================================

/// REST API router builder
pub struct RestRouter {
    registry: Arc<NodeRegistry>,
    default_run_id: String,
    request_timeout: Duration,
}

impl RestRouter {
    /// Create a new REST router
    pub fn new(registry: Arc<NodeRegistry>, default_run_id: impl Into<String>) -> Self {
        Self {
            registry,
            default_run_id: default_run_id.into(),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Set the per-request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Build the Axum router
    pub fn build(self) -> Router {
        let state = AppState {
            registry: self.registry,
            default_run_id: Arc::from(self.default_run_id),
        };

        Router::new()
            .route("/", get(root))
            .route("/ready", get(readiness_check))
            .route("/metrics", get(metrics))
            // Node endpoints
            .route("/nodes", get(list_nodes).delete(delete_all_nodes))
            .route(
                "/nodes/:client_id",
                get(get_node).patch(update_node).delete(delete_node),
            )
            .route("/register", post(register_node))
            .layer(TimeoutLayer::new(self.request_timeout))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    registry: Arc<NodeRegistry>,
    default_run_id: Arc<str>,
}

impl AppState {
    /// Resolve the key for a request; an absent or empty run selects the default run
    fn key(&self, client_id: Uuid, run_id: Option<String>) -> NodeKey {
        let run_id = run_id
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| self.default_run_id.to_string());
        NodeKey::new(client_id, run_id)
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Liveness
async fn root() -> impl IntoResponse {
    MessageResponse::new("API is running")
}

/// Readiness: the store must answer
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.registry.health_check().await {
        Ok(true) => (StatusCode::OK, "ready"),
        Ok(false) | Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "store unavailable"),
    }
}

/// Prometheus metrics
async fn metrics(State(state): State<AppState>) -> Response {
    match state.registry.render_metrics().await {
        Ok((content_type, body)) => ([(header::CONTENT_TYPE, content_type)], body).into_response(),
        Err(e) => internal_error(e),
    }
}

/// List all nodes
async fn list_nodes(State(state): State<AppState>) -> Response {
    match state.registry.list().await {
        Ok(nodes) => (StatusCode::OK, Json(nodes)).into_response(),
        Err(e) => internal_error(e),
    }
}

/// Get a single node
async fn get_node(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
    Query(query): Query<RunQuery>,
) -> Response {
    let key = state.key(client_id, query.run_id);

    match state.registry.get(&key).await {
        Ok(Some(node)) => (StatusCode::OK, Json(node)).into_response(),
        Ok(None) => not_found(&key),
        Err(e) => internal_error(e),
    }
}

/// Update a node's capability metadata
///
/// Responds with the full record as stored after the update.
async fn update_node(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
    Query(query): Query<RunQuery>,
    Json(patch): Json<NodePatch>,
) -> Response {
    let key = state.key(client_id, query.run_id);

    match state.registry.get(&key).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found(&key),
        Err(e) => return internal_error(e),
    }

    match state.registry.update(&key, &patch).await {
        Ok(UpdateOutcome::Updated) => {}
        Ok(outcome) => {
            let details = match outcome {
                UpdateOutcome::NoOp => Error::NothingToUpdate {
                    client_id: key.client_id.to_string(),
                    run_id: key.run_id.clone(),
                },
                _ => Error::NodeNotFound {
                    client_id: key.client_id.to_string(),
                    run_id: key.run_id.clone(),
                },
            };
            warn!("Update not applied: {}", details);
            return api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "update_failed",
                "Failed to update node",
                Some(details.to_string()),
            );
        }
        Err(e) => return internal_error(e),
    }

    match state.registry.get(&key).await {
        Ok(Some(node)) => (StatusCode::OK, Json::<NodeRecord>(node)).into_response(),
        Ok(None) => not_found(&key),
        Err(e) => internal_error(e),
    }
}

/// Delete a single node
async fn delete_node(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
    Query(query): Query<RunQuery>,
) -> Response {
    let key = state.key(client_id, query.run_id);

    match state.registry.deregister(&key).await {
        Ok(_) => (
            StatusCode::OK,
            MessageResponse::new(format!("Node {} deleted successfully", client_id)),
        )
            .into_response(),
        Err(e) => internal_error(e),
    }
}

/// Delete all nodes
async fn delete_all_nodes(State(state): State<AppState>) -> Response {
    match state.registry.clear().await {
        Ok(_) => (StatusCode::OK, MessageResponse::new("All nodes deleted successfully")).into_response(),
        Err(e) => internal_error(e),
    }
}

/// Register a node
async fn register_node(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Response {
    if request.action != REGISTER_ACTION {
        let e = Error::InvalidAction {
            action: request.action,
        };
        info!("Rejected registration: {}", e);
        return api_error(StatusCode::BAD_REQUEST, "invalid_action", "Invalid action", Some(e.to_string()));
    }

    let key = state.key(request.client_id, request.run_id);

    match state.registry.register(&key, request.number_images).await {
        Ok(RegisterOutcome::Created) | Ok(RegisterOutcome::AlreadyExists) => {
            (StatusCode::OK, MessageResponse::new("Node registered successfully")).into_response()
        }
        Err(e) => internal_error(e),
    }
}
