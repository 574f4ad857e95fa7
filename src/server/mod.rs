//! HTTP serving surface.
//!
//! Thin axum layer over the stores and the pipeline worker: file uploads,
//! upload-job bookkeeping and listening statistics. Users are identified by
//! the `X-User-Id` header; account management is not this server's concern.

use crate::catalog_store::{ActivityGranularity, SqliteCatalogStore};
use crate::ingestion::SqliteUploadStore;
use crate::worker::PipelineCommand;
use anyhow::Result;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const DEFAULT_USER_ID: &str = "local";
const DEFAULT_JOB_LIST_LIMIT: usize = 50;
const DEFAULT_RANKING_LIMIT: usize = 20;

#[derive(Clone)]
pub struct ServerState {
    pub uploads: Arc<SqliteUploadStore>,
    pub catalog: Arc<SqliteCatalogStore>,
    pub pipeline_tx: mpsc::Sender<PipelineCommand>,
    pub start_time: Instant,
}

#[derive(Serialize)]
struct ServerStats {
    uptime: String,
    version: String,
    artists: usize,
    albums: usize,
    tracks: usize,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

fn user_id(headers: &HeaderMap) -> String {
    headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_USER_ID)
        .to_string()
}

fn internal_error(e: anyhow::Error) -> Response {
    error!("Request failed: {:#}", e);
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    Json(ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        version: env!("CARGO_PKG_VERSION").to_string(),
        artists: state.catalog.get_artists_count(),
        albums: state.catalog.get_albums_count(),
        tracks: state.catalog.get_tracks_count(),
    })
}

async fn upload_files(
    State(state): State<ServerState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let user = user_id(&headers);
    let mut jobs = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return (StatusCode::BAD_REQUEST, format!("Invalid multipart body: {}", e))
                    .into_response()
            }
        };

        let filename = field
            .file_name()
            .unwrap_or("streaming_history.json")
            .to_string();
        let data = match field.bytes().await {
            Ok(data) => data,
            Err(e) => {
                return (StatusCode::BAD_REQUEST, format!("Failed to read upload: {}", e))
                    .into_response()
            }
        };

        match state.uploads.create_job(&user, &filename, &data) {
            Ok(job) => jobs.push(job),
            Err(e) => return internal_error(e),
        }
    }

    if jobs.is_empty() {
        return (StatusCode::BAD_REQUEST, "No files in upload").into_response();
    }

    let job_ids: Vec<String> = jobs.iter().map(|job| job.id.clone()).collect();
    info!("User {} uploaded {} files", user, jobs.len());
    if let Err(e) = state
        .pipeline_tx
        .send(PipelineCommand::ProcessUploads { job_ids })
        .await
    {
        return internal_error(anyhow::anyhow!("Pipeline worker unavailable: {}", e));
    }

    (StatusCode::ACCEPTED, Json(jobs)).into_response()
}

#[derive(Deserialize)]
struct JobListParams {
    limit: Option<usize>,
}

async fn list_jobs(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Query(params): Query<JobListParams>,
) -> Response {
    let user = user_id(&headers);
    let limit = params.limit.unwrap_or(DEFAULT_JOB_LIST_LIMIT);
    match state.uploads.list_jobs_by_user(&user, limit) {
        Ok(jobs) => Json(jobs).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn get_job(State(state): State<ServerState>, Path(id): Path<String>) -> Response {
    match state.uploads.get_job(&id) {
        Ok(Some(job)) => Json(job).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => internal_error(e),
    }
}

async fn delete_job(State(state): State<ServerState>, Path(id): Path<String>) -> Response {
    match state.uploads.delete_job(&id) {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => internal_error(e),
    }
}

#[derive(Deserialize)]
struct RankingParams {
    limit: Option<usize>,
}

async fn top_artists(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Query(params): Query<RankingParams>,
) -> Response {
    let limit = params.limit.unwrap_or(DEFAULT_RANKING_LIMIT);
    match state.catalog.top_artists(&user_id(&headers), limit) {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn top_albums(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Query(params): Query<RankingParams>,
) -> Response {
    let limit = params.limit.unwrap_or(DEFAULT_RANKING_LIMIT);
    match state.catalog.top_albums(&user_id(&headers), limit) {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn top_tracks(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Query(params): Query<RankingParams>,
) -> Response {
    let limit = params.limit.unwrap_or(DEFAULT_RANKING_LIMIT);
    match state.catalog.top_tracks(&user_id(&headers), limit) {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn listening_summary(State(state): State<ServerState>, headers: HeaderMap) -> Response {
    match state.catalog.listening_summary(&user_id(&headers)) {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => internal_error(e),
    }
}

#[derive(Deserialize)]
struct ActivityParams {
    granularity: Option<String>,
}

async fn listening_activity(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Query(params): Query<ActivityParams>,
) -> Response {
    let granularity = match params.granularity.as_deref() {
        None => ActivityGranularity::Monthly,
        Some(raw) => match ActivityGranularity::parse(raw) {
            Some(granularity) => granularity,
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    "granularity must be one of: yearly, monthly, daily",
                )
                    .into_response()
            }
        },
    };

    match state.catalog.listening_activity(&user_id(&headers), granularity) {
        Ok(buckets) => Json(buckets).into_response(),
        Err(e) => internal_error(e),
    }
}

pub fn make_router(state: ServerState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/v1/uploads", post(upload_files).get(list_jobs))
        .route("/v1/uploads/{id}", get(get_job).delete(delete_job))
        .route("/v1/stats/top-artists", get(top_artists))
        .route("/v1/stats/top-albums", get(top_albums))
        .route("/v1/stats/top-tracks", get(top_tracks))
        .route("/v1/stats/summary", get(listening_summary))
        .route("/v1/stats/activity", get(listening_activity))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(state: ServerState, port: u16) -> Result<()> {
    let router = make_router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "0d 00:00:00");
        assert_eq!(format_uptime(Duration::from_secs(61)), "0d 00:01:01");
        assert_eq!(
            format_uptime(Duration::from_secs(2 * 86_400 + 3 * 3600 + 4 * 60 + 5)),
            "2d 03:04:05"
        );
    }

    #[test]
    fn test_user_id_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(user_id(&headers), "local");

        headers.insert("x-user-id", "alice".parse().unwrap());
        assert_eq!(user_id(&headers), "alice");

        headers.insert("x-user-id", "".parse().unwrap());
        assert_eq!(user_id(&headers), "local");
    }
}
