//! HTTP API for health checks, assets and swap status

use crate::config::ApiConfig;
use crate::engine::SwapEngine;
use crate::error::{SwapError, SwapResult};
use crate::state::SwapStore;
use crate::swap::{ActiveSwap, Asset};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

const DEFAULT_HISTORY_LIMIT: u32 = 50;
const MAX_HISTORY_LIMIT: u32 = 500;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SwapStore>,
    pub engine: Arc<SwapEngine>,
    pub started_at: Instant,
}

/// Run the HTTP API server
pub async fn run_server(
    config: ApiConfig,
    store: Arc<SwapStore>,
    engine: Arc<SwapEngine>,
) -> SwapResult<()> {
    let app = router(AppState {
        store,
        engine,
        started_at: Instant::now(),
    });

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SwapError::Internal(format!("failed to bind API server on {addr}: {e}")))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| SwapError::Internal(format!("API server failed: {e}")))?;

    Ok(())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/status", get(get_status))
        .route("/assets", get(get_assets))
        .route("/swaps", get(get_swaps))
        .route("/swaps/active", get(get_active_swaps))
        .route("/swaps/:id", get(get_swap))
        .route("/stats", get(get_stats))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint - basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check - database reachable
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = state.store.health_check().await.is_ok();
    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            ready: database,
            database,
            mode: state.engine.mode().to_string(),
        }),
    )
}

async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        mode: state.engine.mode().to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

async fn get_assets(State(state): State<AppState>) -> impl IntoResponse {
    Json(AssetsResponse {
        assets: state.engine.list_assets().await,
    })
}

async fn get_swaps(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);
    swaps_response(state.store.get_swap_history(limit).await)
}

async fn get_active_swaps(State(state): State<AppState>) -> impl IntoResponse {
    swaps_response(state.store.get_active_swaps().await)
}

async fn get_swap(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.store.get_swap(&id).await {
        Ok(Some(swap)) => (StatusCode::OK, Json(ApiResponse::Ok(swap))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::Error(ErrorResponse {
                error: SwapError::NotFound(id).to_string(),
            })),
        ),
        Err(e) => {
            warn!("Failed to load swap {}: {}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::Error(ErrorResponse {
                    error: e.to_string(),
                })),
            )
        }
    }
}

/// Get swap statistics
async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.get_stats().await {
        Ok(stats) => (StatusCode::OK, Json(ApiResponse::Ok(stats))),
        Err(e) => {
            warn!("Failed to load stats: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::Error(ErrorResponse {
                    error: e.to_string(),
                })),
            )
        }
    }
}

fn swaps_response(
    result: SwapResult<Vec<ActiveSwap>>,
) -> (StatusCode, Json<ApiResponse<SwapsResponse>>) {
    match result {
        Ok(swaps) => (
            StatusCode::OK,
            Json(ApiResponse::Ok(SwapsResponse {
                count: swaps.len(),
                swaps,
            })),
        ),
        Err(e) => {
            warn!("Failed to list swaps: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::Error(ErrorResponse {
                    error: e.to_string(),
                })),
            )
        }
    }
}

// Request and response types

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<u32>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct ReadinessResponse {
    ready: bool,
    database: bool,
    mode: String,
}

#[derive(Serialize)]
struct StatusResponse {
    version: String,
    mode: String,
    uptime_seconds: u64,
}

#[derive(Serialize)]
struct AssetsResponse {
    assets: Vec<Asset>,
}

#[derive(Serialize)]
struct SwapsResponse {
    count: usize,
    swaps: Vec<ActiveSwap>,
}

/// A payload on success, `{"error": ...}` otherwise
#[derive(Serialize)]
#[serde(untagged)]
enum ApiResponse<T> {
    Ok(T),
    Error(ErrorResponse),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}
