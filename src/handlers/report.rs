use crate::config::LifecycleConfig;
use crate::error::{AppError, AppResult};
use crate::models::{NewReport, Report};
use crate::response::ApiResponse;
use crate::services::report::ReportService;
use crate::services::store::ReportStore;
use axum::{extract::Path, extract::Query, response::IntoResponse, Extension, Json};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateReportRequest {
    /// Short summary of the issue
    #[serde(default)]
    #[validate(length(max = 200))]
    pub title: String,
    /// What is wrong
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: String,
    /// Where the issue is
    #[serde(default)]
    #[validate(length(max = 500))]
    pub location: String,
    /// Optional photo, base64 or data URL
    pub image: Option<String>,
    /// Issue category (may come from the suggestion service)
    #[serde(default)]
    #[validate(length(max = 100))]
    pub category: String,
}

impl From<CreateReportRequest> for NewReport {
    fn from(req: CreateReportRequest) -> Self {
        Self {
            title: req.title,
            description: req.description,
            location: req.location,
            image: req.image,
            category: req.category,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ListReportsQuery {
    /// Filter by status
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateStatusRequest {
    /// New status: pending, verified, resolved or rejected
    #[validate(length(min = 1, max = 20))]
    pub status: String,
    /// Bypass the transition table (requires ALLOW_STATUS_OVERRIDE)
    #[serde(default)]
    pub force: bool,
}

/// Ids that are not UUIDs cannot exist in the store.
fn parse_report_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::NotFound)
}

#[utoipa::path(
    post,
    path = "/api/v1/reports",
    request_body = CreateReportRequest,
    responses(
        (status = 200, description = "Report created", body = Report),
        (status = 400, description = "Validation error", body = AppError),
        (status = 500, description = "Report could not be saved", body = AppError),
    ),
    tag = "reports"
)]
pub async fn create_report(
    Extension(store): Extension<ReportStore>,
    Extension(config): Extension<LifecycleConfig>,
    Json(payload): Json<CreateReportRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let service = ReportService::new(store, config);
    let report = service.submit(payload.into()).await?;

    Ok(ApiResponse::ok(report))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports",
    params(
        ("status" = Option<String>, Query, description = "Filter by status"),
    ),
    responses(
        (status = 200, description = "All reports in submission order", body = Vec<Report>),
        (status = 400, description = "Unknown status filter", body = AppError),
    ),
    tag = "reports"
)]
pub async fn list_reports(
    Extension(store): Extension<ReportStore>,
    Extension(config): Extension<LifecycleConfig>,
    Query(params): Query<ListReportsQuery>,
) -> AppResult<impl IntoResponse> {
    let service = ReportService::new(store, config);
    let reports = service.list(params.status.as_deref()).await?;

    Ok(ApiResponse::ok(reports))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/{id}",
    params(("id" = String, Path, description = "Report ID")),
    responses(
        (status = 200, description = "Report", body = Report),
        (status = 404, description = "Report not found", body = AppError),
    ),
    tag = "reports"
)]
pub async fn get_report(
    Extension(store): Extension<ReportStore>,
    Extension(config): Extension<LifecycleConfig>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let id = parse_report_id(&id)?;

    let service = ReportService::new(store, config);
    let report = service.get(id).await?;

    Ok(ApiResponse::ok(report))
}

#[utoipa::path(
    put,
    path = "/api/v1/reports/{id}/status",
    params(("id" = String, Path, description = "Report ID")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = Report),
        (status = 400, description = "Invalid status or transition", body = AppError),
        (status = 404, description = "Report not found", body = AppError),
    ),
    tag = "reports"
)]
pub async fn update_status(
    Extension(store): Extension<ReportStore>,
    Extension(config): Extension<LifecycleConfig>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateStatusRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let id = parse_report_id(&id)?;

    let service = ReportService::new(store, config);
    let report = service
        .update_status(id, &payload.status, payload.force)
        .await?;

    Ok(ApiResponse::ok(report))
}

#[utoipa::path(
    put,
    path = "/api/v1/reports/{id}/fine",
    params(("id" = String, Path, description = "Report ID")),
    responses(
        (status = 200, description = "Fine issued and report resolved", body = Report),
        (status = 400, description = "Report is not verified", body = AppError),
        (status = 404, description = "Report not found", body = AppError),
    ),
    tag = "reports"
)]
pub async fn issue_fine(
    Extension(store): Extension<ReportStore>,
    Extension(config): Extension<LifecycleConfig>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let id = parse_report_id(&id)?;

    let service = ReportService::new(store, config);
    let report = service.issue_fine(id).await?;

    Ok(ApiResponse::ok(report))
}

#[utoipa::path(
    put,
    path = "/api/v1/reports/{id}/resolve",
    params(("id" = String, Path, description = "Report ID")),
    responses(
        (status = 200, description = "Report resolved", body = Report),
        (status = 400, description = "Report is not verified", body = AppError),
        (status = 404, description = "Report not found", body = AppError),
    ),
    tag = "reports"
)]
pub async fn resolve_report(
    Extension(store): Extension<ReportStore>,
    Extension(config): Extension<LifecycleConfig>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let id = parse_report_id(&id)?;

    let service = ReportService::new(store, config);
    let report = service.resolve(id).await?;

    Ok(ApiResponse::ok(report))
}
