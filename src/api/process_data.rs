// src/api/process_data.rs

use actix_web::{get, post, web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::auth::AuthUser;
use crate::error::{ApiError, ApiResult, FieldError};
use crate::models::{JobStatus, ProcessingJob};
use crate::AppState;

const MAX_NORMALIZE_RECORDS: usize = 1000;
const MAX_ANALYZE_THEMES: usize = 100;
const MAX_BATCH_SIZE: u32 = 500;
const DEFAULT_JOB_LIMIT: usize = 10;
const MAX_JOB_LIMIT: usize = 100;

/// Raw request body. Validated into [`ProcessOperation`] before anything is
/// sent to the function runtime.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ProcessDataBody {
    pub operation: Option<String>,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub options: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizeData {
    pub source: String,
    pub records: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchUpdateData {
    #[serde(default)]
    pub theme_ids: Vec<Uuid>,
    /// Refresh every theme whose score is out of date instead of a fixed list.
    #[serde(default)]
    pub stale_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeSyncData {
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeThemesData {
    pub theme_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOperation {
    Normalize(NormalizeData),
    BatchUpdate(BatchUpdateData),
    RealtimeSync(RealtimeSyncData),
    AnalyzeThemes(AnalyzeThemesData),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessOptions {
    #[serde(default)]
    pub batch_size: Option<u32>,
    #[serde(default)]
    pub dry_run: bool,
}

impl ProcessOperation {
    pub const NAMES: [&'static str; 4] =
        ["normalize", "batch_update", "realtime_sync", "analyze_themes"];

    pub fn name(&self) -> &'static str {
        match self {
            ProcessOperation::Normalize(_) => "normalize",
            ProcessOperation::BatchUpdate(_) => "batch_update",
            ProcessOperation::RealtimeSync(_) => "realtime_sync",
            ProcessOperation::AnalyzeThemes(_) => "analyze_themes",
        }
    }

    /// Function runtime endpoint handling this operation.
    pub fn function_name(&self) -> &'static str {
        match self {
            ProcessOperation::Normalize(_) => "normalize-data",
            ProcessOperation::BatchUpdate(_) => "batch-update",
            ProcessOperation::RealtimeSync(_) => "realtime-sync",
            ProcessOperation::AnalyzeThemes(_) => "analyze-themes",
        }
    }

    fn payload(&self, options: &ProcessOptions) -> Value {
        let data = match self {
            ProcessOperation::Normalize(d) => json!(d),
            ProcessOperation::BatchUpdate(d) => json!(d),
            ProcessOperation::RealtimeSync(d) => json!(d),
            ProcessOperation::AnalyzeThemes(d) => json!(d),
        };
        json!({ "operation": self.name(), "data": data, "options": options })
    }

    pub fn from_body(body: ProcessDataBody) -> Result<(Self, ProcessOptions), ApiError> {
        let mut errors = Vec::new();

        let options = if body.options.is_null() {
            ProcessOptions::default()
        } else {
            match serde_json::from_value::<ProcessOptions>(body.options) {
                Ok(o) => o,
                Err(e) => {
                    errors.push(FieldError::new("options", e.to_string()));
                    ProcessOptions::default()
                }
            }
        };
        if let Some(size) = options.batch_size {
            if size == 0 || size > MAX_BATCH_SIZE {
                errors.push(FieldError::new(
                    "options.batch_size",
                    format!("must be between 1 and {MAX_BATCH_SIZE}"),
                ));
            }
        }

        let operation = match body.operation.as_deref() {
            None | Some("") => {
                errors.push(FieldError::new("operation", "is required"));
                None
            }
            Some(name) => Self::parse_data(name, body.data, &mut errors),
        };

        match operation {
            Some(op) if errors.is_empty() => Ok((op, options)),
            _ => Err(ApiError::Validation(errors)),
        }
    }

    fn parse_data(name: &str, data: Value, errors: &mut Vec<FieldError>) -> Option<Self> {
        fn decode<T: serde::de::DeserializeOwned>(
            data: Value,
            errors: &mut Vec<FieldError>,
        ) -> Option<T> {
            if data.is_null() {
                errors.push(FieldError::new("data", "is required"));
                return None;
            }
            serde_json::from_value(data)
                .map_err(|e| errors.push(FieldError::new("data", e.to_string())))
                .ok()
        }

        match name {
            "normalize" => {
                let d: NormalizeData = decode(data, errors)?;
                if d.source.trim().is_empty() {
                    errors.push(FieldError::new("data.source", "must not be empty"));
                }
                if d.records.is_empty() {
                    errors.push(FieldError::new("data.records", "must not be empty"));
                } else if d.records.len() > MAX_NORMALIZE_RECORDS {
                    errors.push(FieldError::new(
                        "data.records",
                        format!("at most {MAX_NORMALIZE_RECORDS} records per request"),
                    ));
                }
                Some(ProcessOperation::Normalize(d))
            }
            "batch_update" => {
                let d: BatchUpdateData = decode(data, errors)?;
                if d.theme_ids.is_empty() && !d.stale_only {
                    errors.push(FieldError::new(
                        "data.theme_ids",
                        "must not be empty unless stale_only is set",
                    ));
                }
                Some(ProcessOperation::BatchUpdate(d))
            }
            "realtime_sync" => {
                let d: RealtimeSyncData = decode(data, errors)?;
                if d.sources.is_empty() || d.sources.iter().any(|s| s.trim().is_empty()) {
                    errors.push(FieldError::new(
                        "data.sources",
                        "must list at least one non-empty source",
                    ));
                }
                Some(ProcessOperation::RealtimeSync(d))
            }
            "analyze_themes" => {
                let d: AnalyzeThemesData = decode(data, errors)?;
                if d.theme_ids.is_empty() {
                    errors.push(FieldError::new("data.theme_ids", "must not be empty"));
                } else if d.theme_ids.len() > MAX_ANALYZE_THEMES {
                    errors.push(FieldError::new(
                        "data.theme_ids",
                        format!("at most {MAX_ANALYZE_THEMES} themes per request"),
                    ));
                }
                Some(ProcessOperation::AnalyzeThemes(d))
            }
            other => {
                errors.push(FieldError::new(
                    "operation",
                    format!(
                        "unknown operation {other:?}; expected one of {}",
                        Self::NAMES.join(", ")
                    ),
                ));
                None
            }
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProcessDataResponse {
    pub success: bool,
    pub operation: String,
    pub result: Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProcessingStatusResponse {
    pub jobs: Vec<ProcessingJob>,
    pub last_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub limit: Option<usize>,
}

/// Sends a validated operation to the function runtime and records the job.
/// Shared by the HTTP route and the scheduled batch update.
pub async fn run_operation(
    state: &AppState,
    operation: &ProcessOperation,
    options: &ProcessOptions,
    requested_by: Option<Uuid>,
) -> ApiResult<ProcessDataResponse> {
    let timestamp = Utc::now();

    if options.dry_run {
        return Ok(ProcessDataResponse {
            success: true,
            operation: operation.name().to_string(),
            result: json!({ "dry_run": true }),
            timestamp,
        });
    }

    let outcome = state
        .functions
        .invoke(operation.function_name(), &operation.payload(options))
        .await;

    let job = ProcessingJob {
        id: Uuid::new_v4(),
        operation: operation.name().to_string(),
        status: if outcome.is_ok() {
            JobStatus::Completed
        } else {
            JobStatus::Failed
        },
        requested_by,
        result: outcome.as_ref().ok().cloned(),
        error: outcome.as_ref().err().map(|e| e.to_string()),
        created_at: timestamp,
    };
    if let Err(e) = state.jobs.record_job(&job).await {
        log::error!("record job error operation={} error={}", job.operation, e);
    }

    let result = outcome?;
    log::info!(
        "process-data completed operation={} job_id={}",
        operation.name(),
        job.id
    );

    Ok(ProcessDataResponse {
        success: true,
        operation: operation.name().to_string(),
        result,
        timestamp,
    })
}

#[utoipa::path(
    post,
    path = "/api/process-data",
    tag = "processing",
    request_body = ProcessDataBody,
    responses(
        (status = 200, description = "Operation completed", body = ProcessDataResponse),
        (status = 400, description = "Invalid operation or data"),
        (status = 401, description = "Missing or invalid session"),
        (status = 500, description = "Function runtime failure")
    )
)]
#[post("/process-data")]
pub async fn process_data(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    body: web::Json<ProcessDataBody>,
) -> ApiResult<HttpResponse> {
    let (operation, options) = ProcessOperation::from_body(body.into_inner())?;
    let response = run_operation(&state, &operation, &options, Some(user.id)).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[utoipa::path(
    get,
    path = "/api/process-data",
    tag = "processing",
    params(("limit" = Option<usize>, Query, description = "Number of jobs, at most 100")),
    responses(
        (status = 200, description = "Recent jobs", body = ProcessingStatusResponse),
        (status = 401, description = "Missing or invalid session")
    )
)]
#[get("/process-data")]
pub async fn processing_status(
    state: web::Data<AppState>,
    query: web::Query<StatusQuery>,
) -> ApiResult<HttpResponse> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_JOB_LIMIT)
        .clamp(1, MAX_JOB_LIMIT);
    let jobs = state.jobs.recent_jobs(limit).await?;
    let last_update = state.jobs.last_update().await?;

    Ok(HttpResponse::Ok().json(ProcessingStatusResponse { jobs, last_update }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(v: Value) -> ProcessDataBody {
        serde_json::from_value(v).unwrap()
    }

    fn fields(err: ApiError) -> Vec<String> {
        match err {
            ApiError::Validation(fields) => fields.into_iter().map(|f| f.field).collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn parses_each_operation() {
        let id = Uuid::new_v4();
        let cases = [
            json!({"operation": "normalize", "data": {"source": "google_trends", "records": [{"k": 1}]}}),
            json!({"operation": "batch_update", "data": {"theme_ids": [id]}}),
            json!({"operation": "realtime_sync", "data": {"sources": ["reddit"]}}),
            json!({"operation": "analyze_themes", "data": {"theme_ids": [id]}, "options": {"batch_size": 50}}),
        ];
        let names: Vec<&str> = cases
            .into_iter()
            .map(|c| ProcessOperation::from_body(body(c)).unwrap().0.name())
            .collect();
        assert_eq!(names, ProcessOperation::NAMES);
    }

    #[test]
    fn missing_operation_is_reported() {
        let err = ProcessOperation::from_body(body(json!({"data": {}}))).unwrap_err();
        assert_eq!(fields(err), vec!["operation"]);
    }

    #[test]
    fn unknown_operation_is_reported() {
        let err = ProcessOperation::from_body(body(json!({"operation": "drop_tables", "data": {}})))
            .unwrap_err();
        assert_eq!(fields(err), vec!["operation"]);
    }

    #[test]
    fn reports_every_bad_field() {
        let err = ProcessOperation::from_body(body(json!({
            "operation": "normalize",
            "data": {"source": " ", "records": []},
            "options": {"batch_size": 0}
        })))
        .unwrap_err();
        assert_eq!(
            fields(err),
            vec!["options.batch_size", "data.source", "data.records"]
        );
    }

    #[test]
    fn wrong_data_shape_is_reported() {
        let err = ProcessOperation::from_body(body(json!({
            "operation": "analyze_themes",
            "data": {"theme_ids": ["not-a-uuid"]}
        })))
        .unwrap_err();
        assert_eq!(fields(err), vec!["data"]);
    }

    #[test]
    fn stale_only_batch_update_needs_no_ids() {
        let (op, _) = ProcessOperation::from_body(body(json!({
            "operation": "batch_update",
            "data": {"stale_only": true}
        })))
        .unwrap();
        assert_eq!(
            op,
            ProcessOperation::BatchUpdate(BatchUpdateData {
                theme_ids: vec![],
                stale_only: true
            })
        );
    }
}
