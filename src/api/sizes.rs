use aide::axum::routing::get_with;
use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::Json;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::database::AppState;
use crate::error::{ServiceError, ServiceResult};
use crate::models;
use crate::pagination::{self, PageDto, SortOrder, TableQuery};
use crate::permissions;
use crate::request_state::RequestState;

pub fn router(app_state: AppState) -> ApiRouter {
    ApiRouter::new()
        .api_route(
            "/sizes",
            get_with(list_sizes, list_sizes_docs).post_with(create_size, create_size_docs),
        )
        .api_route(
            "/size/:id",
            get_with(get_size, get_size_docs)
                .put_with(update_size, update_size_docs)
                .delete_with(delete_size, delete_size_docs),
        )
        .with_state(app_state)
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct LockerSizeDto {
    pub id: u64,
    pub name: String,
    pub image_url: String,
}

impl From<&models::LockerSize> for LockerSizeDto {
    fn from(value: &models::LockerSize) -> Self {
        Self {
            id: value.id,
            name: value.name.to_owned(),
            image_url: value.image_url.to_owned(),
        }
    }
}

#[derive(Debug, PartialEq, Deserialize, JsonSchema)]
pub struct SaveLockerSizeDto {
    pub name: String,
    #[serde(default)]
    pub image_url: String,
}

fn sort_sizes(sizes: &mut [models::LockerSize], query: &TableQuery) -> ServiceResult<()> {
    match query.sort.as_deref() {
        None | Some("id") => sizes.sort_by_key(|size| size.id),
        Some("name") => sizes.sort_by(|a, b| a.name.cmp(&b.name)),
        Some(other) => {
            return Err(ServiceError::BadRequest(
                "sort",
                format!("unknown column '{}'", other),
            ))
        }
    }
    if query.order == Some(SortOrder::Desc) {
        sizes.reverse();
    }
    Ok(())
}

async fn list_sizes(
    mut state: RequestState,
    Query(query): Query<TableQuery>,
) -> ServiceResult<Json<PageDto<LockerSizeDto>>> {
    state.session_require_permission(permissions::SIZES_MANAGE)?;

    let mut sizes = state.db.get_all_locker_sizes().await?;
    if let Some(ref filter) = query.filter {
        let needle = filter.to_lowercase();
        sizes.retain(|size| size.name.to_lowercase().contains(&needle));
    }
    sort_sizes(&mut sizes, &query)?;

    let rows = sizes.iter().map(LockerSizeDto::from).collect();
    Ok(Json(pagination::paginate(rows, &query)))
}

fn list_sizes_docs(op: TransformOperation) -> TransformOperation {
    op.description("List locker sizes as a paginated table.")
        .tag("sizes")
        .response::<200, Json<PageDto<LockerSizeDto>>>()
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "sizes:manage"])
}

async fn get_size(
    mut state: RequestState,
    Path(id): Path<u64>,
) -> ServiceResult<Json<LockerSizeDto>> {
    state.session_require_permission(permissions::SIZES_MANAGE)?;

    let size = state.db.get_locker_size_by_id(id).await?;
    if let Some(size) = size {
        return Ok(Json(LockerSizeDto::from(&size)));
    }

    Err(ServiceError::NotFound)
}

fn get_size_docs(op: TransformOperation) -> TransformOperation {
    op.description("Get a locker size by id.")
        .tag("sizes")
        .response::<200, Json<LockerSizeDto>>()
        .response_with::<404, (), _>(|res| res.description("The requested size does not exist!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "sizes:manage"])
}

async fn create_size(
    mut state: RequestState,
    form: Json<SaveLockerSizeDto>,
) -> ServiceResult<Json<LockerSizeDto>> {
    state.session_require_permission(permissions::SIZES_MANAGE)?;

    let form = form.0;
    super::validate_required_str("name", &form.name, super::MAX_NAME_LENGTH)?;
    super::validate_str("image_url", &form.image_url, super::MAX_URL_LENGTH)?;

    let size = models::LockerSize {
        id: 0,
        name: form.name,
        image_url: form.image_url,
    };

    let size = state.db.store_locker_size(size).await?;
    Ok(Json(LockerSizeDto::from(&size)))
}

fn create_size_docs(op: TransformOperation) -> TransformOperation {
    op.description("Create a new locker size.")
        .tag("sizes")
        .response::<200, Json<LockerSizeDto>>()
        .response_with::<400, (), _>(|res| res.description("Invalid input!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "sizes:manage"])
}

async fn update_size(
    mut state: RequestState,
    Path(id): Path<u64>,
    form: Json<SaveLockerSizeDto>,
) -> ServiceResult<Json<LockerSizeDto>> {
    state.session_require_permission(permissions::SIZES_MANAGE)?;

    let form = form.0;
    super::validate_required_str("name", &form.name, super::MAX_NAME_LENGTH)?;
    super::validate_str("image_url", &form.image_url, super::MAX_URL_LENGTH)?;

    let size = state.db.get_locker_size_by_id(id).await?;
    if let Some(mut size) = size {
        size.name = form.name;
        size.image_url = form.image_url;

        let size = state.db.store_locker_size(size).await?;
        return Ok(Json(LockerSizeDto::from(&size)));
    }

    Err(ServiceError::NotFound)
}

fn update_size_docs(op: TransformOperation) -> TransformOperation {
    op.description("Update an existing locker size.")
        .tag("sizes")
        .response::<200, Json<LockerSizeDto>>()
        .response_with::<400, (), _>(|res| res.description("Invalid input!"))
        .response_with::<404, (), _>(|res| res.description("The requested size does not exist!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "sizes:manage"])
}

async fn delete_size(mut state: RequestState, Path(id): Path<u64>) -> ServiceResult<StatusCode> {
    state.session_require_permission(permissions::SIZES_MANAGE)?;

    state.db.delete_locker_size(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn delete_size_docs(op: TransformOperation) -> TransformOperation {
    op.description("Delete a locker size by id.")
        .tag("sizes")
        .response_with::<204, (), _>(|res| res.description("The size was deleted!"))
        .response_with::<404, (), _>(|res| res.description("The requested size does not exist!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "sizes:manage"])
}
