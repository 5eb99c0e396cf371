use aide::axum::routing::get_with;
use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::Serialize;

use crate::database::AppState;
use crate::error::{ServiceError, ServiceResult};
use crate::models;
use crate::pagination::{self, PageDto, SortOrder, TableQuery};
use crate::permissions;
use crate::request_state::RequestState;

pub fn router(app_state: AppState) -> ApiRouter {
    ApiRouter::new()
        .api_route(
            "/error-logs",
            get_with(list_error_logs, list_error_logs_docs),
        )
        .api_route(
            "/error-log/:id",
            get_with(get_error_log, get_error_log_docs)
                .delete_with(delete_error_log, delete_error_log_docs),
        )
        .with_state(app_state)
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct ErrorLogDto {
    pub id: u64,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&models::ErrorLog> for ErrorLogDto {
    fn from(value: &models::ErrorLog) -> Self {
        Self {
            id: value.id,
            text: value.text.to_owned(),
            timestamp: value.timestamp,
        }
    }
}

fn sort_error_logs(logs: &mut [models::ErrorLog], query: &TableQuery) -> ServiceResult<()> {
    match query.sort.as_deref() {
        // rows arrive newest first from the database
        None => {}
        Some("id") => logs.sort_by_key(|log| log.id),
        Some("timestamp") => logs.sort_by_key(|log| log.timestamp),
        Some(other) => {
            return Err(ServiceError::BadRequest(
                "sort",
                format!("unknown column '{}'", other),
            ))
        }
    }
    if query.order == Some(SortOrder::Desc) {
        logs.reverse();
    }
    Ok(())
}

async fn list_error_logs(
    mut state: RequestState,
    Query(query): Query<TableQuery>,
) -> ServiceResult<Json<PageDto<ErrorLogDto>>> {
    state.session_require_permission(permissions::LOGS_VIEW)?;

    let mut logs = state.db.get_all_error_logs().await?;
    if let Some(ref filter) = query.filter {
        let needle = filter.to_lowercase();
        logs.retain(|log| log.text.to_lowercase().contains(&needle));
    }
    sort_error_logs(&mut logs, &query)?;

    let rows = logs.iter().map(ErrorLogDto::from).collect();
    Ok(Json(pagination::paginate(rows, &query)))
}

fn list_error_logs_docs(op: TransformOperation) -> TransformOperation {
    op.description("List error logs as a paginated table, newest first.")
        .tag("error-logs")
        .response::<200, Json<PageDto<ErrorLogDto>>>()
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "logs:view"])
}

async fn get_error_log(
    mut state: RequestState,
    Path(id): Path<u64>,
) -> ServiceResult<Json<ErrorLogDto>> {
    state.session_require_permission(permissions::LOGS_VIEW)?;

    let log = state.db.get_error_log_by_id(id).await?;
    if let Some(log) = log {
        return Ok(Json(ErrorLogDto::from(&log)));
    }

    Err(ServiceError::NotFound)
}

fn get_error_log_docs(op: TransformOperation) -> TransformOperation {
    op.description("Get an error log entry by id.")
        .tag("error-logs")
        .response::<200, Json<ErrorLogDto>>()
        .response_with::<404, (), _>(|res| res.description("The requested entry does not exist!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "logs:view"])
}

async fn delete_error_log(
    mut state: RequestState,
    Path(id): Path<u64>,
) -> ServiceResult<StatusCode> {
    state.session_require_admin()?;

    state.db.delete_error_log(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn delete_error_log_docs(op: TransformOperation) -> TransformOperation {
    op.description("Delete an error log entry by id.")
        .tag("error-logs")
        .response_with::<204, (), _>(|res| res.description("The entry was deleted!"))
        .response_with::<404, (), _>(|res| res.description("The requested entry does not exist!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin"])
}
