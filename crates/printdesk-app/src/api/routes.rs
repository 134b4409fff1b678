// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Route table and handlers.

use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use printdesk_core::error::PrintdeskError;
use printdesk_core::status::{ALLOWED_STATUS_UPDATES, ALLOWED_STATUS_VALUES};
use printdesk_core::types::{Job, JobId, JobStatus, StatusTransition};
use printdesk_queue::{JobStats, QueuePosition, QueueSummary, Upload, position};

use super::{ApiError, ApiResponse};
use crate::services::AppServices;

type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

static ENDPOINTS: [&str; 12] = [
    "GET /health",
    "POST /api/jobs/upload",
    "GET /api/jobs",
    "GET /api/jobs/stats",
    "GET /api/jobs/queue/summary",
    "GET /api/jobs/{id}",
    "GET /api/jobs/{id}/queue",
    "GET /api/jobs/{id}/history",
    "PUT /api/jobs/{id}/approve",
    "PUT /api/jobs/{id}/reject",
    "PUT /api/jobs/{id}/status",
    "GET /",
];

/// Build the API router over `services`.
pub fn router(services: AppServices) -> Router {
    let upload_limit = services.config().server.max_upload_bytes;
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route(
            "/api/jobs/upload",
            post(upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/jobs", get(list_jobs))
        .route("/api/jobs/stats", get(job_stats))
        .route("/api/jobs/queue/summary", get(queue_summary))
        .route("/api/jobs/{id}", get(get_job))
        .route("/api/jobs/{id}/queue", get(job_queue))
        .route("/api/jobs/{id}/history", get(job_history))
        .route("/api/jobs/{id}/approve", put(approve))
        .route("/api/jobs/{id}/reject", put(reject))
        .route("/api/jobs/{id}/status", put(update_status))
        .fallback(not_found)
        .with_state(services)
}

#[derive(Debug, Serialize)]
struct RootInfo {
    success: bool,
    message: &'static str,
    endpoints: &'static [&'static str],
}

async fn root() -> Json<RootInfo> {
    Json(RootInfo {
        success: true,
        message: "Printdesk job API is running",
        endpoints: &ENDPOINTS,
    })
}

#[derive(Debug, Serialize)]
struct Health {
    success: bool,
    message: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health {
        success: true,
        message: "Server is healthy",
    })
}

async fn not_found() -> ApiError {
    ApiError::RouteNotFound
}

fn parse_id(raw: &str) -> Result<JobId, ApiError> {
    Ok(raw.parse::<JobId>()?)
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::BadRequest(format!("Could not read upload: {}", err.body_text()))
    }
}

/// `multipart/form-data` with `file`, and optional `copies` and `pageRange`.
async fn upload(State(services): State<AppServices>, mut form: Multipart) -> ApiResult<Job> {
    let mut upload = Upload::default();
    let mut has_file = false;

    while let Some(field) = form.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "file" => {
                upload.file_name = field.file_name().unwrap_or("document").to_owned();
                upload.bytes = field.bytes().await.map_err(multipart_error)?.to_vec();
                has_file = true;
            }
            "copies" => upload.copies = Some(field.text().await.map_err(multipart_error)?),
            "pageRange" => upload.page_range = Some(field.text().await.map_err(multipart_error)?),
            other => debug!(field = other, "ignoring unknown form field"),
        }
    }

    if !has_file {
        return Err(PrintdeskError::InvalidInput(
            "No file uploaded. Use form-data key \"file\".".into(),
        )
        .into());
    }

    let job = services.lifecycle().submit(upload).await?;
    Ok(ApiResponse::created(job))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<String>,
}

fn allowed(statuses: &[JobStatus]) -> String {
    statuses.iter().map(JobStatus::as_str).collect::<Vec<_>>().join(", ")
}

async fn list_jobs(
    State(services): State<AppServices>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Job>> {
    let status = match query.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => None,
        Some(raw) => Some(raw.to_ascii_uppercase().parse::<JobStatus>().map_err(|_| {
            PrintdeskError::InvalidInput(format!(
                "Invalid status filter. Allowed: {}",
                allowed(&ALLOWED_STATUS_VALUES)
            ))
        })?),
    };
    let jobs = services.lifecycle().list(status).await?;
    Ok(ApiResponse::ok(jobs))
}

async fn job_stats(State(services): State<AppServices>) -> ApiResult<JobStats> {
    let stats = position::stats(services.store(), Utc::now()).await?;
    Ok(ApiResponse::ok(stats))
}

async fn queue_summary(State(services): State<AppServices>) -> ApiResult<QueueSummary> {
    let summary = position::summary(services.store()).await?;
    Ok(ApiResponse::ok(summary))
}

async fn get_job(State(services): State<AppServices>, Path(id): Path<String>) -> ApiResult<Job> {
    let job = services.lifecycle().get(parse_id(&id)?).await?;
    Ok(ApiResponse::ok(job))
}

async fn job_queue(
    State(services): State<AppServices>,
    Path(id): Path<String>,
) -> ApiResult<QueuePosition> {
    let queue = position::position(services.store(), parse_id(&id)?).await?;
    Ok(ApiResponse::ok(queue))
}

async fn job_history(
    State(services): State<AppServices>,
    Path(id): Path<String>,
) -> ApiResult<Vec<StatusTransition>> {
    let history = services.lifecycle().history(parse_id(&id)?).await?;
    Ok(ApiResponse::ok(history))
}

async fn approve(State(services): State<AppServices>, Path(id): Path<String>) -> ApiResult<Job> {
    let job = services.lifecycle().approve(parse_id(&id)?).await?;
    Ok(ApiResponse::ok(job))
}

async fn reject(State(services): State<AppServices>, Path(id): Path<String>) -> ApiResult<Job> {
    let job = services.lifecycle().reject(parse_id(&id)?).await?;
    Ok(ApiResponse::ok(job))
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: String,
}

async fn update_status(
    State(services): State<AppServices>,
    Path(id): Path<String>,
    body: Result<Json<StatusBody>, JsonRejection>,
) -> ApiResult<Job> {
    let id = parse_id(&id)?;
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let next = body
        .status
        .trim()
        .to_ascii_uppercase()
        .parse::<JobStatus>()
        .map_err(|_| {
            PrintdeskError::InvalidInput(format!(
                "Invalid status. Allowed: {}",
                allowed(&ALLOWED_STATUS_UPDATES)
            ))
        })?;
    let job = services.lifecycle().update_status(id, next).await?;
    Ok(ApiResponse::ok(job))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::Request;
    use axum::response::{IntoResponse, Response};
    use printdesk_core::config::DeskConfig;
    use printdesk_store::{FsBlobStore, SqliteJobStore};
    use serde_json::Value;

    use super::*;

    fn services() -> (tempfile::TempDir, AppServices) {
        let dir = tempfile::tempdir().unwrap();
        let blobs = FsBlobStore::open(dir.path(), "print-files").unwrap();
        let store = SqliteJobStore::open_in_memory().unwrap();
        let services = AppServices::with_stores(
            DeskConfig::default(),
            Arc::new(store),
            Arc::new(blobs),
        );
        (dir, services)
    }

    async fn body_json(response: Response) -> (StatusCode, Value) {
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn respond<T: Serialize>(result: ApiResult<T>) -> (StatusCode, Value) {
        body_json(result.into_response()).await
    }

    async fn multipart(parts: &[(&str, Option<&str>, &str)]) -> Multipart {
        let mut body = String::new();
        for (name, file_name, value) in parts {
            body.push_str("--BOUNDARY\r\n");
            match file_name {
                Some(file_name) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/pdf\r\n\r\n"
                )),
                None => body.push_str(&format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n")),
            }
            body.push_str(value);
            body.push_str("\r\n");
        }
        body.push_str("--BOUNDARY--\r\n");

        let request = Request::builder()
            .method("POST")
            .uri("/api/jobs/upload")
            .header("content-type", "multipart/form-data; boundary=BOUNDARY")
            .body(Body::from(body))
            .unwrap();
        Multipart::from_request(request, &()).await.unwrap()
    }

    async fn uploaded(services: &AppServices) -> Value {
        let form = multipart(&[("file", Some("flyer.pdf"), "%PDF-1.7 flyer")]).await;
        let (status, json) = respond(upload(State(services.clone()), form).await).await;
        assert_eq!(status, StatusCode::CREATED);
        json["data"].clone()
    }

    #[tokio::test]
    async fn upload_creates_pending_job() {
        let (_dir, services) = services();
        let form = multipart(&[
            ("file", Some("report.pdf"), "%PDF-1.7 report"),
            ("copies", None, "2"),
            ("pageRange", None, "1-3, 5"),
        ])
        .await;
        let (status, json) = respond(upload(State(services.clone()), form).await).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["status"], "PENDING");
        assert_eq!(json["data"]["copies"], 2);
        assert_eq!(json["data"]["page_range"], "1-3,5");
        assert_eq!(json["data"]["file_name"], "report.pdf");
    }

    #[tokio::test]
    async fn upload_validation_errors_are_400() {
        let (_dir, services) = services();

        let no_file = multipart(&[("copies", None, "1")]).await;
        let (status, json) = respond(upload(State(services.clone()), no_file).await).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);

        let too_many = multipart(&[("file", Some("a.pdf"), "%PDF"), ("copies", None, "101")]).await;
        let (status, json) = respond(upload(State(services.clone()), too_many).await).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            json["error"],
            "Invalid copies value. Must be an integer between 1 and 100."
        );

        let bad_range = multipart(&[("file", Some("a.pdf"), "%PDF"), ("pageRange", None, "one")]).await;
        let (status, _) = respond(upload(State(services), bad_range).await).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn approve_then_approve_again_conflicts() {
        let (_dir, services) = services();
        let job = uploaded(&services).await;
        let id = job["id"].as_str().unwrap().to_owned();

        let (status, json) = respond(approve(State(services.clone()), Path(id.clone())).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["status"], "APPROVED");

        let (status, json) = respond(approve(State(services.clone()), Path(id)).await).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"], "Invalid status transition: APPROVED -> APPROVED");
    }

    #[tokio::test]
    async fn malformed_and_unknown_ids() {
        let (_dir, services) = services();
        let (status, json) = respond(get_job(State(services.clone()), Path("not-a-uuid".into())).await).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid job id format");

        let missing = JobId::new().to_string();
        let (status, json) = respond(reject(State(services), Path(missing)).await).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "Job not found");
    }

    #[tokio::test]
    async fn status_endpoint_only_takes_worker_statuses() {
        let (_dir, services) = services();
        let job = uploaded(&services).await;
        let id = job["id"].as_str().unwrap().to_owned();

        let body = Ok(Json(StatusBody { status: "approved".into() }));
        let (status, json) =
            respond(update_status(State(services.clone()), Path(id.clone()), body).await).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid status. Allowed: PRINTING, DONE, FAILED");

        approve(State(services.clone()), Path(id.clone())).await.unwrap();
        let body = Ok(Json(StatusBody { status: "printing".into() }));
        let (status, json) = respond(update_status(State(services.clone()), Path(id), body).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["status"], "PRINTING");
    }

    #[tokio::test]
    async fn list_filters_and_rejects_unknown_status() {
        let (_dir, services) = services();
        let first = uploaded(&services).await;
        let second = uploaded(&services).await;
        let second_id = second["id"].as_str().unwrap().to_owned();
        approve(State(services.clone()), Path(second_id.clone())).await.unwrap();

        let query = Query(ListQuery { status: None });
        let (_, json) = respond(list_jobs(State(services.clone()), query).await).await;
        let ids: Vec<&str> = json["data"].as_array().unwrap().iter().map(|j| j["id"].as_str().unwrap()).collect();
        assert_eq!(ids, [second_id.as_str(), first["id"].as_str().unwrap()]);

        let query = Query(ListQuery { status: Some("approved".into()) });
        let (_, json) = respond(list_jobs(State(services.clone()), query).await).await;
        assert_eq!(json["data"].as_array().unwrap().len(), 1);

        let query = Query(ListQuery { status: Some("LOST".into()) });
        let (status, _) = respond(list_jobs(State(services), query).await).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn queue_position_and_summary() {
        let (_dir, services) = services();
        let first = uploaded(&services).await;
        let second = uploaded(&services).await;
        for job in [&first, &second] {
            let id = job["id"].as_str().unwrap().to_owned();
            approve(State(services.clone()), Path(id)).await.unwrap();
        }

        let id = second["id"].as_str().unwrap().to_owned();
        let (status, json) = respond(job_queue(State(services.clone()), Path(id)).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["position"], 1);
        assert_eq!(json["data"]["estimated_seconds"], 30);

        let (_, json) = respond(queue_summary(State(services.clone())).await).await;
        assert_eq!(json["data"]["people_ahead"], 2);
        assert_eq!(json["data"]["estimated_seconds"], 60);

        let (_, json) = respond(job_stats(State(services)).await).await;
        assert_eq!(json["data"]["counts"]["APPROVED"], 2);
    }

    #[tokio::test]
    async fn unknown_route_uses_error_envelope() {
        let (status, json) = body_json(not_found().await.into_response()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json, serde_json::json!({ "success": false, "error": "Route not found" }));
    }

    #[tokio::test]
    async fn root_lists_paths_in_router_syntax() {
        let Json(info) = root().await;
        assert!(info.endpoints.contains(&"GET /api/jobs/{id}/history"));
        assert!(info.endpoints.iter().all(|e| !e.contains("/:")));
    }

    #[test]
    fn router_builds() {
        let (_dir, services) = services();
        let _router = router(services);
    }
}
