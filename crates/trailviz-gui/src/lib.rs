//! Trailviz GUI - HTTP view of the most recent publish cycle
//!
//! The node publishes into a [`SharedPublisher`]; the router serves whatever
//! it last stored:
//! - `GET /api/transform` current world-frame transform
//! - `GET /api/path/{kind}` `waypoints` or `trail`
//! - `GET /api/status` tick count and sizes

use std::sync::{Arc, RwLock};

use axum::extract::{Path as UrlPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::debug;
use trailviz_core::{ArtifactKind, Path, PublishError, Publisher, TransformStamped};

/// Last artifact of each kind.
#[derive(Debug, Clone, Default)]
pub struct LatestArtifacts {
    pub transform: Option<TransformStamped>,
    pub waypoints: Option<Path>,
    pub trail: Option<Path>,
    /// Count of transforms received, one per tick.
    pub ticks: u64,
}

pub type SharedArtifacts = Arc<RwLock<LatestArtifacts>>;

/// Publisher that stores artifacts for the HTTP handlers.
#[derive(Debug, Clone, Default)]
pub struct SharedPublisher {
    latest: SharedArtifacts,
}

impl SharedPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn artifacts(&self) -> SharedArtifacts {
        Arc::clone(&self.latest)
    }

    fn store(
        &self,
        artifact: ArtifactKind,
        f: impl FnOnce(&mut LatestArtifacts),
    ) -> Result<(), PublishError> {
        let mut latest = self.latest.write().map_err(|_| PublishError::Rejected {
            artifact,
            reason: "artifact store poisoned".into(),
        })?;
        f(&mut latest);
        Ok(())
    }
}

impl Publisher for SharedPublisher {
    fn publish_transform(&mut self, t: &TransformStamped) -> Result<(), PublishError> {
        self.store(ArtifactKind::Transform, |latest| {
            latest.transform = Some(t.clone());
            latest.ticks += 1;
        })
    }

    fn publish_waypoint_path(&mut self, path: &Path) -> Result<(), PublishError> {
        self.store(ArtifactKind::WaypointPath, |latest| {
            latest.waypoints = Some(path.clone());
        })
    }

    fn publish_trail_path(&mut self, path: &Path) -> Result<(), PublishError> {
        self.store(ArtifactKind::TrailPath, |latest| {
            latest.trail = Some(path.clone());
        })
    }
}

/// Creates the Axum router with all routes
pub fn create_router(state: SharedArtifacts) -> Router {
    Router::new()
        .route("/api/transform", get(handle_transform))
        .route("/api/path/{kind}", get(handle_path))
        .route("/api/status", get(handle_status))
        .with_state(state)
}

pub async fn serve(listener: TcpListener, state: SharedArtifacts) -> std::io::Result<()> {
    axum::serve(listener, create_router(state)).await
}

#[derive(Debug)]
enum ApiError {
    NotPublished,
    UnknownPath(String),
    Poisoned,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotPublished => (
                StatusCode::SERVICE_UNAVAILABLE,
                "nothing published yet".to_string(),
            ),
            ApiError::UnknownPath(kind) => (
                StatusCode::NOT_FOUND,
                format!("unknown path '{kind}', expected 'waypoints' or 'trail'"),
            ),
            ApiError::Poisoned => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "artifact store poisoned".to_string(),
            ),
        };
        (status, message).into_response()
    }
}

fn read<T>(
    state: &SharedArtifacts,
    f: impl FnOnce(&LatestArtifacts) -> Option<T>,
) -> Result<T, ApiError> {
    let latest = state.read().map_err(|_| ApiError::Poisoned)?;
    f(&latest).ok_or(ApiError::NotPublished)
}

async fn handle_transform(
    State(state): State<SharedArtifacts>,
) -> Result<Json<TransformStamped>, ApiError> {
    read(&state, |latest| latest.transform.clone()).map(Json)
}

async fn handle_path(
    State(state): State<SharedArtifacts>,
    UrlPath(kind): UrlPath<String>,
) -> Result<Json<Path>, ApiError> {
    debug!(%kind, "path request");
    match kind.as_str() {
        "waypoints" => read(&state, |latest| latest.waypoints.clone()).map(Json),
        "trail" => read(&state, |latest| latest.trail.clone()).map(Json),
        _ => Err(ApiError::UnknownPath(kind)),
    }
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    ticks: u64,
    trail_len: usize,
    waypoint_count: usize,
    last_stamp: Option<f64>,
}

async fn handle_status(State(state): State<SharedArtifacts>) -> Result<Json<StatusResponse>, ApiError> {
    let latest = state.read().map_err(|_| ApiError::Poisoned)?;
    Ok(Json(StatusResponse {
        ticks: latest.ticks,
        trail_len: latest.trail.as_ref().map_or(0, |p| p.poses.len()),
        // The origin pose leads the waypoint path.
        waypoint_count: latest
            .waypoints
            .as_ref()
            .map_or(0, |p| p.poses.len().saturating_sub(1)),
        last_stamp: latest.transform.as_ref().map(|t| t.stamp.as_secs_f64()),
    }))
}
