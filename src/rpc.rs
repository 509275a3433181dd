//! HTTP endpoints for the dojo registry
//!
//! - `GET /server` - every team's address and status (messages stripped)
//! - `POST /server?token=..&url=..` - register or update the caller's address
//! - `GET /server/:team` - one team's address, status and message
//! - `DELETE /server/:team?token=..` - remove the caller's own entry
//! - `GET /health` - liveness
//!
//! Paths nested deeper under `/server/` are rejected with 400, so a 404 always
//! means a missing team.

use crate::error::RegistryError;
use crate::health::HealthRecord;
use crate::service::RegistrationService;
use crate::tokens::TeamId;
use axum::{
    body::Bytes,
    extract::{Path, Query, RawQuery, State},
    http::{header, HeaderMap, StatusCode, Uri},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// RPC Configuration
#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// RPC Server State
pub struct RpcState {
    pub service: Arc<RegistrationService>,
}

/// Dojo registry HTTP server
pub struct DojoRpc {
    config: RpcConfig,
    state: Arc<RpcState>,
}

impl DojoRpc {
    pub fn new(config: RpcConfig, service: Arc<RegistrationService>) -> Self {
        Self {
            config,
            state: Arc::new(RpcState { service }),
        }
    }

    /// Create the router
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_check))
            .route("/server", get(list_servers).post(register_server))
            .route("/server/", get(list_servers).post(register_server))
            .route("/server/:team", get(get_server).delete(delete_server))
            .fallback(unmatched_path)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind to the configured address and serve until the process exits
    pub async fn start(&self) -> anyhow::Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> anyhow::Result<()> {
        info!("Dojo registry listening on {}", listener.local_addr()?);
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

// ==================== Request Types ====================

#[derive(Debug, Default, Deserialize)]
pub struct RegisterParams {
    pub token: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

// ==================== Handlers ====================

type ApiError = (StatusCode, String);

fn error_response(err: RegistryError) -> ApiError {
    let status = match err {
        RegistryError::NoSuchTeam(_) => StatusCode::NOT_FOUND,
        RegistryError::Auth(_) | RegistryError::Address(_) => StatusCode::BAD_REQUEST,
    };
    (status, err.to_string())
}

fn parse_team(raw: &str) -> Result<TeamId, ApiError> {
    raw.parse()
        .map_err(|_| (StatusCode::BAD_REQUEST, "invalid server path".to_string()))
}

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Reject `%` escapes that are not followed by two hex digits; the decoder
/// would otherwise pass them through literally
fn check_escapes(raw: &[u8]) -> Result<(), String> {
    let mut rest = raw;
    while let Some(pos) = rest.iter().position(|&b| b == b'%') {
        let escape = &rest[pos..(pos + 3).min(rest.len())];
        if escape.len() < 3 || !escape[1..].iter().all(u8::is_ascii_hexdigit) {
            return Err(format!(
                "invalid URL escape {:?}",
                String::from_utf8_lossy(escape)
            ));
        }
        rest = &rest[pos + 3..];
    }
    Ok(())
}

fn decode_form(raw: &[u8]) -> Result<RegisterParams, ApiError> {
    check_escapes(raw)
        .and_then(|()| serde_urlencoded::from_bytes(raw).map_err(|e| e.to_string()))
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("bad form: {}", e)))
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with(FORM_CONTENT_TYPE))
        .unwrap_or(false)
}

/// Anything under `/server/` that is not a single team segment
fn unmatched_status(path: &str) -> ApiError {
    if path.starts_with("/server/") {
        (StatusCode::BAD_REQUEST, "bad server path".to_string())
    } else {
        (StatusCode::NOT_FOUND, "not found".to_string())
    }
}

async fn unmatched_path(uri: Uri) -> ApiError {
    unmatched_status(uri.path())
}

async fn health_check() -> &'static str {
    "OK"
}

async fn list_servers(State(state): State<Arc<RpcState>>) -> Json<BTreeMap<String, HealthRecord>> {
    Json(state.service.registry().public_listing())
}

async fn get_server(
    State(state): State<Arc<RpcState>>,
    Path(team): Path<String>,
) -> Result<Json<HealthRecord>, ApiError> {
    let team = parse_team(&team)?;
    state
        .service
        .registry()
        .get(team)
        .map(Json)
        .ok_or_else(|| error_response(RegistryError::NoSuchTeam(team)))
}

/// Parameters may come from the query string or a form body; the body wins.
async fn register_server(
    State(state): State<Arc<RpcState>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let query = decode_form(query.unwrap_or_default().as_bytes())?;
    let form = if is_form(&headers) {
        decode_form(&body)?
    } else {
        RegisterParams::default()
    };
    let token = form.token.or(query.token).unwrap_or_default();
    let url = form.url.or(query.url).unwrap_or_default();

    match state.service.register(&token, &url) {
        Ok(_) => Ok(StatusCode::OK),
        Err(e) => {
            warn!("Registration rejected: {}", e);
            Err(error_response(e))
        }
    }
}

async fn delete_server(
    State(state): State<Arc<RpcState>>,
    Path(team): Path<String>,
    Query(query): Query<TokenQuery>,
) -> Result<StatusCode, ApiError> {
    let team = parse_team(&team)?;
    let token = query.token.unwrap_or_default();

    match state.service.deregister(&token, team) {
        Ok(()) => Ok(StatusCode::OK),
        Err(e) => {
            warn!(team = %team, "Deregistration rejected: {}", e);
            Err(error_response(e))
        }
    }
}
