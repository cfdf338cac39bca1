//! Forwarding Gateway
//!
//! Relays any sub-path under `/proxy` to the configured upstream:
//!
//! ```text
//! Browser ──HTTP──► Gateway /proxy/{path} ──HTTP──► {UPSTREAM}/{path}
//! ```
//!
//! Key invariants:
//! - The upstream host comes only from `GatewayConfig`, never from the path
//! - Upstream status and body are relayed byte-for-byte
//! - GET forwards are unbounded
//! - POST forwards are cancelled after `forward_timeout`; a cancelled or failed
//!   POST always answers `504 "Upstream timeout"`
//! - Every armed cancellation guard is released exactly once
//! - No state is carried between requests beyond counters

use crate::client::UpstreamClient;
use crate::config::GatewayConfig;
use axum::{
    body::{Body, Bytes},
    extract::{Path, RawQuery, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Fixed body of the timeout response
pub const UPSTREAM_TIMEOUT_BODY: &str = "Upstream timeout";

/// Body returned when a GET forward cannot reach the upstream
pub const UPSTREAM_UNAVAILABLE_BODY: &str = "Upstream unavailable";

// ============================================================================
// GATEWAY STATE
// ============================================================================

pub struct GatewayState {
    pub config: Arc<GatewayConfig>,
    pub http: reqwest::Client,
    pub upstream: UpstreamClient,
    pub stats: ForwardStats,
}

impl GatewayState {
    pub fn new(config: Arc<GatewayConfig>) -> Self {
        let http = reqwest::Client::new();
        Self {
            upstream: UpstreamClient::with_client(&config.upstream_base, http.clone()),
            http,
            config,
            stats: ForwardStats::default(),
        }
    }
}

/// Counters for mutating forwards
#[derive(Debug, Default)]
pub struct ForwardStats {
    armed: AtomicU64,
    released: AtomicU64,
    timeouts: AtomicU64,
    transport_failures: AtomicU64,
}

impl ForwardStats {
    fn arm(&self) -> ForwardGuard<'_> {
        let seq = self.armed.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Armed forward guard #{}", seq);
        ForwardGuard { stats: self, seq }
    }

    pub fn armed(&self) -> u64 {
        self.armed.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> u64 {
        self.released.load(Ordering::SeqCst)
    }

    pub fn inflight(&self) -> u64 {
        self.armed().saturating_sub(self.released())
    }

    pub fn timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::SeqCst)
    }

    pub fn transport_failures(&self) -> u64 {
        self.transport_failures.load(Ordering::SeqCst)
    }
}

/// Scoped cancellation guard for one POST forward.
///
/// Released on drop, which covers normal return, upstream error, timeout and
/// the handler future itself being dropped by a disconnecting client.
struct ForwardGuard<'a> {
    stats: &'a ForwardStats,
    seq: u64,
}

impl Drop for ForwardGuard<'_> {
    fn drop(&mut self) {
        self.stats.released.fetch_add(1, Ordering::SeqCst);
        debug!("Released forward guard #{}", self.seq);
    }
}

// ============================================================================
// RELAYED RESPONSE
// ============================================================================

/// Upstream response captured in full
struct Relayed {
    status: StatusCode,
    content_type: Option<HeaderValue>,
    body: Bytes,
}

impl Relayed {
    async fn capture(resp: reqwest::Response) -> Result<Self, reqwest::Error> {
        let status = resp.status();
        let content_type = resp.headers().get(header::CONTENT_TYPE).cloned();
        let body = resp.bytes().await?;
        Ok(Self {
            status,
            content_type,
            body,
        })
    }
}

impl IntoResponse for Relayed {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        if let Some(ct) = self.content_type {
            response.headers_mut().insert(header::CONTENT_TYPE, ct);
        }
        response
    }
}

async fn relay(request: reqwest::RequestBuilder) -> Result<Relayed, reqwest::Error> {
    let resp = request.send().await?;
    Relayed::capture(resp).await
}

fn upstream_timeout() -> Response {
    (StatusCode::GATEWAY_TIMEOUT, UPSTREAM_TIMEOUT_BODY).into_response()
}

// ============================================================================
// /proxy/{path} ENDPOINTS
// ============================================================================

/// GET /proxy/{path} - Unbounded read forward
pub async fn forward_read(
    State(state): State<Arc<GatewayState>>,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
) -> Response {
    let url = state.config.upstream_url(&path, query.as_deref());

    let request = state
        .http
        .get(&url)
        .header(header::CONTENT_TYPE, "application/json");

    match relay(request).await {
        Ok(relayed) => {
            debug!("GET {} -> {}", url, relayed.status);
            relayed.into_response()
        }
        Err(e) => {
            warn!("GET {} failed: {}", url, e);
            (StatusCode::BAD_GATEWAY, UPSTREAM_UNAVAILABLE_BODY).into_response()
        }
    }
}

/// POST /proxy/{path} - Bounded write forward
///
/// The body is passed through unmodified. If the upstream has not answered
/// (headers and body) within `forward_timeout`, the request future is dropped,
/// which cancels the in-flight call.
pub async fn forward_write(
    State(state): State<Arc<GatewayState>>,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    let url = state.config.upstream_url(&path, query.as_deref());
    let _guard = state.stats.arm();

    let request = state
        .http
        .post(&url)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body);

    match tokio::time::timeout(state.config.forward_timeout, relay(request)).await {
        Ok(Ok(relayed)) => {
            debug!("POST {} -> {}", url, relayed.status);
            relayed.into_response()
        }
        Ok(Err(e)) => {
            state.stats.transport_failures.fetch_add(1, Ordering::SeqCst);
            warn!("POST {} failed: {}", url, e);
            upstream_timeout()
        }
        Err(_) => {
            state.stats.timeouts.fetch_add(1, Ordering::SeqCst);
            warn!(
                "POST {} cancelled after {}ms",
                url,
                state.config.forward_timeout.as_millis()
            );
            upstream_timeout()
        }
    }
}

// ============================================================================
// /health ENDPOINT
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub upstream: String,
    pub upstream_reachable: bool,
    pub inflight_forwards: u64,
    pub forwards_total: u64,
    pub timeouts_total: u64,
    pub transport_failures_total: u64,
}

pub async fn health_check(State(state): State<Arc<GatewayState>>) -> Json<HealthResponse> {
    let upstream_reachable = state.upstream.healthz(state.config.forward_timeout).await;
    Json(HealthResponse {
        status: if upstream_reachable { "ok" } else { "degraded" },
        upstream: state.config.upstream_base.clone(),
        upstream_reachable,
        inflight_forwards: state.stats.inflight(),
        forwards_total: state.stats.armed(),
        timeouts_total: state.stats.timeouts(),
        transport_failures_total: state.stats.transport_failures(),
    })
}

// ============================================================================
// SERVER STARTUP
// ============================================================================

pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/proxy/*path", get(forward_read).post(forward_write))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn run_gateway(config: GatewayConfig) -> anyhow::Result<()> {
    let config = Arc::new(config);
    let state = Arc::new(GatewayState::new(config.clone()));
    let app = router(state);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("╔══════════════════════════════════════════════════════════════╗");
    info!("║              Ops Console - Forwarding Gateway                ║");
    info!("╠══════════════════════════════════════════════════════════════╣");
    info!("║  Upstream:      {:44} ║", config.upstream_base);
    info!("║  Listening on:  {:44} ║", addr);
    info!(
        "║  POST bound:    {:44} ║",
        format!("{}ms", config.forward_timeout.as_millis())
    );
    info!("╠══════════════════════════════════════════════════════════════╣");
    info!("║  Endpoints:                                                  ║");
    info!("║    GET  /health        - Gateway + upstream health           ║");
    info!("║    GET  /proxy/{{path}}  - Forward read (unbounded)            ║");
    info!("║    POST /proxy/{{path}}  - Forward write (bounded)             ║");
    info!("╚══════════════════════════════════════════════════════════════╝");

    axum::serve(listener, app).await?;

    Ok(())
}
