//! HTTP gateway for Innkeeper.
//!
//! Exposes the chat endpoint plus the session inspection/restore surface:
//! `POST /chat`, `GET /sessions`, `GET /sessions/{id}`,
//! `POST /sessions/import` (admin-token gated), and `GET /health`.
//!
//! Built on Axum. Raw user ids are hashed at this boundary; the orchestrator
//! only ever sees the hash.

use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use innkeeper_config::AppConfig;
use innkeeper_core::{
    AgentState, SessionError, SnapshotBody, SnapshotImport, SnapshotStore, StoreError,
};
use innkeeper_reasoner::OpenAiCompatReasoner;
use innkeeper_session::{SessionEngine, TurnRequest, TurnResult};
use innkeeper_store::{InMemoryStore, SqliteStore};
use innkeeper_telemetry::TraceCorrelator;
use innkeeper_tools::{default_registry, Dispatcher, HttpTransport};

const MAX_USER_ID_LEN: usize = 256;
const MAX_MESSAGE_LEN: usize = 6_000;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub engine: Arc<SessionEngine>,
    pub store: Arc<dyn SnapshotStore>,
    pub correlator: Arc<TraceCorrelator>,
    pub tenant_id: String,
    pub admin_token: String,
}

type SharedState = Arc<GatewayState>;

/// SHA-256 hex of the raw user id. Provenance only, never routing.
pub fn hash_user_id(user_id: &str) -> String {
    let digest = Sha256::digest(user_id.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState, allowed_origin: &str) -> Router {
    // CORS: only the configured dev-UI origin.
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::AllowOrigin::exact(
            allowed_origin.parse().expect("invalid allowed_origin"),
        ))
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::HeaderName::from_static("x-admin-token"),
        ]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/chat", post(chat_handler))
        .route("/sessions", get(list_sessions_handler))
        .route("/sessions/{id}", get(session_detail_handler))
        .route("/sessions/import", post(import_session_handler))
        .route("/traces/{trace_id}", get(trace_lookup_handler))
        .layer(DefaultBodyLimit::max(256 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server with everything wired from config.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store: Arc<dyn SnapshotStore> = match config.store.backend.as_str() {
        "in_memory" => Arc::new(InMemoryStore::new()),
        _ => Arc::new(SqliteStore::new(&config.store.path).await?),
    };

    let api_key = config.reasoner.api_key.clone().ok_or(
        "reasoner.api_key is not set — configure it or export INNKEEPER_REASONER_API_KEY",
    )?;
    let reasoner = Arc::new(OpenAiCompatReasoner::new(
        "openai_compat",
        &config.reasoner.base_url,
        api_key,
        &config.reasoner.model,
    ));

    let registry = Arc::new(default_registry(&config.tools.base_url));
    let dispatcher = Arc::new(Dispatcher::new(registry, Arc::new(HttpTransport::new())));
    let correlator = Arc::new(TraceCorrelator::new(config.telemetry.recent_traces));

    let engine = Arc::new(SessionEngine::new(
        store.clone(),
        reasoner,
        dispatcher,
        correlator.clone(),
        config.guardrails.clone(),
        config.tenant_id.clone(),
    ));

    let state = Arc::new(GatewayState {
        engine,
        store,
        correlator,
        tenant_id: config.tenant_id.clone(),
        admin_token: config.gateway.admin_token.clone(),
    });

    let app = build_router(state, &config.gateway.allowed_origin);
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    info!(addr = %addr, store = %config.store.backend, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Request/response documents ---

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub session_id: Option<Uuid>,
    pub user_id: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct SessionListResponse {
    sessions: Vec<innkeeper_core::SessionSummary>,
}

#[derive(Debug, Serialize)]
struct SessionDetailResponse {
    session_id: Uuid,
    updated_at: DateTime<Utc>,
    agent_state: AgentState,
    constraints: innkeeper_core::Constraints,
    snapshot: SnapshotBody,
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub session_id: Uuid,
    pub user_id: String,
    pub agent_state: String,
    pub constraints: serde_json::Value,
    pub snapshot: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct OkResponse {
    ok: bool,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn chat_handler(
    State(state): State<SharedState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<TurnResult>, ApiError> {
    if req.user_id.is_empty() || req.user_id.len() > MAX_USER_ID_LEN {
        return Err(api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "user_id must be 1-256 characters",
        ));
    }
    if req.message.is_empty() || req.message.len() > MAX_MESSAGE_LEN {
        return Err(api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "message must be 1-6000 characters",
        ));
    }

    let turn = TurnRequest {
        session_id: req.session_id,
        user_id_hash: hash_user_id(&req.user_id),
        message: req.message,
    };

    match state.engine.run_turn(turn).await {
        Ok(result) => Ok(Json(result)),
        Err(SessionError::TurnConflict { session_id }) => {
            warn!(session_id = %session_id, "Turn conflicted twice — reporting to caller");
            Err(api_error(
                StatusCode::CONFLICT,
                "session was modified concurrently; retry the message",
            ))
        }
        Err(e) => {
            error!(error = %e, "Turn failed");
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("turn failed: {e}"),
            ))
        }
    }
}

async fn list_sessions_handler(
    State(state): State<SharedState>,
) -> Result<Json<SessionListResponse>, ApiError> {
    let sessions = state.store.list().await.map_err(|e| {
        error!(error = %e, "Session listing failed");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok(Json(SessionListResponse { sessions }))
}

async fn session_detail_handler(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionDetailResponse>, ApiError> {
    let snapshot = state
        .store
        .load(id)
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "session not found"))?;

    Ok(Json(SessionDetailResponse {
        session_id: snapshot.session_id,
        updated_at: snapshot.updated_at,
        agent_state: snapshot.agent_state,
        constraints: snapshot.constraints.clone(),
        snapshot: snapshot.body(),
    }))
}

#[derive(Debug, Serialize)]
struct TraceLookupResponse {
    trace_id: String,
    session_id: Uuid,
    turn_index: usize,
}

/// Resolve a trace id to the turn that produced it, for trace-viewer links.
async fn trace_lookup_handler(
    State(state): State<SharedState>,
    Path(trace_id): Path<String>,
) -> Result<Json<TraceLookupResponse>, ApiError> {
    let turn = state
        .correlator
        .lookup(&trace_id)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "trace not found"))?;
    Ok(Json(TraceLookupResponse {
        trace_id,
        session_id: turn.session_id,
        turn_index: turn.turn_index,
    }))
}

async fn import_session_handler(
    State(state): State<SharedState>,
    headers: axum::http::HeaderMap,
    Json(req): Json<ImportRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let provided = headers.get("X-Admin-Token").and_then(|v| v.to_str().ok());
    if provided != Some(state.admin_token.as_str()) {
        return Err(api_error(StatusCode::FORBIDDEN, "forbidden"));
    }

    let import = SnapshotImport {
        session_id: req.session_id,
        tenant_id: state.tenant_id.clone(),
        user_id_hash: hash_user_id(&req.user_id),
        agent_state: req.agent_state,
        constraints: req.constraints,
        snapshot: req.snapshot,
    };

    match state.store.import(import).await {
        Ok(()) => {
            info!(session_id = %req.session_id, "Session imported");
            Ok(Json(OkResponse { ok: true }))
        }
        Err(StoreError::InvalidImport(reason)) => {
            warn!(session_id = %req.session_id, reason = %reason, "Import rejected");
            Err(api_error(StatusCode::UNPROCESSABLE_ENTITY, reason))
        }
        Err(e) => Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use innkeeper_core::{ConstraintDelta, GuardrailPolicy, Interpretation};
    use innkeeper_reasoner::ScriptedReasoner;
    use innkeeper_tools::{ToolTransport, TransportError};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct EmptyTransport;

    #[async_trait]
    impl ToolTransport for EmptyTransport {
        async fn post(&self, _url: &str, _payload: &Value) -> Result<Value, TransportError> {
            Ok(json!({"offers": []}))
        }
    }

    fn test_router(reasoner: ScriptedReasoner) -> (Router, Arc<GatewayState>) {
        let store: Arc<dyn SnapshotStore> = Arc::new(InMemoryStore::new());
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(default_registry("http://localhost:8001")),
            Arc::new(EmptyTransport),
        ));
        let correlator = Arc::new(TraceCorrelator::default());
        let engine = Arc::new(SessionEngine::new(
            store.clone(),
            Arc::new(reasoner),
            dispatcher,
            correlator.clone(),
            GuardrailPolicy::default(),
            "t_default",
        ));
        let state = Arc::new(GatewayState {
            engine,
            store,
            correlator,
            tenant_id: "t_default".into(),
            admin_token: "dev-admin".into(),
        });
        (build_router(state.clone(), "http://localhost:3000"), state)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let (app, _) = test_router(ScriptedReasoner::new(vec![]));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn chat_runs_a_turn() {
        let (app, _) = test_router(ScriptedReasoner::new(vec![Interpretation::provide_info(
            ConstraintDelta {
                city: Some("Austin".into()),
                ..Default::default()
            },
        )]));

        let response = app
            .oneshot(post_json(
                "/chat",
                json!({"user_id": "u1", "message": "Austin"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["agent_state"], "COLLECTING_CONSTRAINTS");
        assert_eq!(body["guardrails"]["tool_calls_used"], 0);
        assert!(body["trace_id"].as_str().unwrap().len() == 32);
    }

    #[tokio::test]
    async fn chat_rejects_empty_message() {
        let (app, _) = test_router(ScriptedReasoner::new(vec![]));
        let response = app
            .oneshot(post_json("/chat", json!({"user_id": "u1", "message": ""})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn import_requires_admin_token() {
        let (app, _) = test_router(ScriptedReasoner::new(vec![]));
        let response = app
            .oneshot(post_json(
                "/sessions/import",
                json!({
                    "session_id": Uuid::new_v4(),
                    "user_id": "u1",
                    "agent_state": "INIT",
                    "constraints": {},
                    "snapshot": {},
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn import_rejects_unknown_state() {
        let (app, _) = test_router(ScriptedReasoner::new(vec![]));
        let mut request = post_json(
            "/sessions/import",
            json!({
                "session_id": Uuid::new_v4(),
                "user_id": "u1",
                "agent_state": "TELEPORTING",
                "constraints": {},
                "snapshot": {},
            }),
        );
        request
            .headers_mut()
            .insert("X-Admin-Token", "dev-admin".parse().unwrap());
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn import_then_list_and_detail() {
        let (app, _) = test_router(ScriptedReasoner::new(vec![]));
        let session_id = Uuid::new_v4();
        let mut request = post_json(
            "/sessions/import",
            json!({
                "session_id": session_id,
                "user_id": "u1",
                "agent_state": "WAIT_FOR_SELECTION",
                "constraints": {"city": "Austin", "currency": "USD"},
                "snapshot": {"turns": [], "recommended_offers": [], "recent_trace_ids": []},
            }),
        );
        request
            .headers_mut()
            .insert("X-Admin-Token", "dev-admin".parse().unwrap());
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let listing = app
            .clone()
            .oneshot(Request::builder().uri("/sessions").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(listing.status(), StatusCode::OK);
        let listing = body_json(listing).await;
        assert_eq!(listing["sessions"].as_array().unwrap().len(), 1);

        let detail = app
            .oneshot(
                Request::builder()
                    .uri(format!("/sessions/{session_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(detail.status(), StatusCode::OK);
        let detail = body_json(detail).await;
        assert_eq!(detail["agent_state"], "WAIT_FOR_SELECTION");
        assert_eq!(detail["constraints"]["city"], "Austin");
    }

    #[tokio::test]
    async fn trace_lookup_resolves_completed_turns() {
        let (app, _) = test_router(ScriptedReasoner::new(vec![Interpretation::provide_info(
            ConstraintDelta {
                city: Some("Austin".into()),
                ..Default::default()
            },
        )]));

        let response = app
            .clone()
            .oneshot(post_json(
                "/chat",
                json!({"user_id": "u1", "message": "Austin"}),
            ))
            .await
            .unwrap();
        let body = body_json(response).await;
        let trace_id = body["trace_id"].as_str().unwrap().to_string();

        let lookup = app
            .oneshot(
                Request::builder()
                    .uri(format!("/traces/{trace_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(lookup.status(), StatusCode::OK);
        let lookup = body_json(lookup).await;
        assert_eq!(lookup["turn_index"], 0);
        assert_eq!(
            lookup["session_id"].as_str().unwrap(),
            body["session_id"].as_str().unwrap()
        );
    }

    #[tokio::test]
    async fn missing_session_detail_is_404() {
        let (app, _) = test_router(ScriptedReasoner::new(vec![]));
        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/sessions/{}", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn user_ids_are_hashed_stably() {
        assert_eq!(hash_user_id("u1"), hash_user_id("u1"));
        assert_ne!(hash_user_id("u1"), hash_user_id("u2"));
        assert_eq!(hash_user_id("u1").len(), 64);
    }
}
