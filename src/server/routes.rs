use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::jobs::{ArtifactKind, CancelOutcome};
use crate::models::{CrawlConfig, GenerationRequest, GenerationResponse, HealthResponse};
use crate::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn error_response(status: StatusCode, detail: impl Into<String>) -> Response {
    (status, Json(json!({ "detail": detail.into() }))).into_response()
}

fn no_store() -> [(header::HeaderName, &'static str); 1] {
    [(header::CACHE_CONTROL, "no-store")]
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: VERSION.to_string(),
        timestamp: now(),
    })
}

/// POST /v1/generations
pub async fn create_generation(
    State(state): State<AppState>,
    Json(request): Json<GenerationRequest>,
) -> Response {
    if let Err(detail) = validate_request(&request) {
        return error_response(StatusCode::BAD_REQUEST, detail);
    }

    let crawl_config = CrawlConfig {
        max_pages: request.max_pages,
        max_depth: request.max_depth,
        request_delay_seconds: 1.0,
        user_agent: state.config.default_user_agent.clone(),
        respect_robots: request.respect_robots,
        follow_redirects: true,
        timeout_seconds: 30,
        language: request.language,
    };

    let job = state
        .job_manager
        .submit(request.url, crawl_config, request.full_version)
        .await;

    tracing::info!(job_id = %job.job_id, url = %job.url, "generation job created");

    (
        StatusCode::ACCEPTED,
        Json(GenerationResponse {
            job_id: job.job_id,
            status: job.status,
            message: job.message,
        }),
    )
        .into_response()
}

fn validate_request(request: &GenerationRequest) -> Result<(), String> {
    let parsed = url::Url::parse(&request.url).map_err(|_| "url must be an absolute URL".to_string())?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err("url must use http or https".to_string());
    }
    if !(1..=1000).contains(&request.max_pages) {
        return Err("max_pages must be between 1 and 1000".to_string());
    }
    if !(1..=10).contains(&request.max_depth) {
        return Err("max_depth must be between 1 and 10".to_string());
    }
    Ok(())
}

/// GET /v1/generations/{job_id}
pub async fn get_generation(State(state): State<AppState>, Path(job_id): Path<String>) -> Response {
    match state.job_manager.status(&job_id).await {
        Some(job) => (StatusCode::OK, no_store(), Json(job)).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "job not found"),
    }
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    #[serde(default)]
    pub raw: Option<String>,
}

/// GET /v1/generations/{job_id}/download/{file_type}
pub async fn download_generation(
    State(state): State<AppState>,
    Path((job_id, file_type)): Path<(String, String)>,
    Query(query): Query<DownloadQuery>,
) -> Response {
    let kind = match file_type.as_str() {
        "llm.txt" => ArtifactKind::LlmTxt,
        "llms-full.txt" => ArtifactKind::LlmsFullTxt,
        _ => return error_response(StatusCode::BAD_REQUEST, "file_type must be llm.txt or llms-full.txt"),
    };

    let Some(content) = state.job_manager.artifact(&job_id, kind).await else {
        return error_response(StatusCode::NOT_FOUND, "artifact not found");
    };

    let raw = matches!(query.raw.as_deref(), Some("1") | Some("true"));
    if raw {
        (StatusCode::OK, no_store(), [(header::CONTENT_TYPE, "text/plain; charset=utf-8")], content)
            .into_response()
    } else {
        (StatusCode::OK, no_store(), Json(json!({ "content": content }))).into_response()
    }
}

/// DELETE /v1/generations/{job_id}
pub async fn cancel_generation(State(state): State<AppState>, Path(job_id): Path<String>) -> Response {
    match state.job_manager.cancel(&job_id).await {
        CancelOutcome::Cancelled => {
            (StatusCode::OK, Json(json!({ "job_id": job_id, "status": "cancelled" }))).into_response()
        }
        CancelOutcome::NotCancellable => {
            (StatusCode::OK, Json(json!({ "job_id": job_id, "status": "not_cancellable" }))).into_response()
        }
        CancelOutcome::NotFound => error_response(StatusCode::NOT_FOUND, "job not found"),
    }
}

fn now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_scheme() {
        let request = GenerationRequest {
            url: "ftp://example.com".to_string(),
            max_pages: 10,
            max_depth: 2,
            full_version: false,
            respect_robots: true,
            language: "en".to_string(),
        };
        assert!(validate_request(&request).is_err());
    }

    #[test]
    fn rejects_out_of_range_max_pages() {
        let request = GenerationRequest {
            url: "https://example.com".to_string(),
            max_pages: 0,
            max_depth: 2,
            full_version: false,
            respect_robots: true,
            language: "en".to_string(),
        };
        assert!(validate_request(&request).is_err());
    }

    #[test]
    fn accepts_well_formed_request() {
        let request = GenerationRequest {
            url: "https://example.com".to_string(),
            max_pages: 10,
            max_depth: 2,
            full_version: false,
            respect_robots: true,
            language: "en".to_string(),
        };
        assert!(validate_request(&request).is_ok());
    }
}
