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
            "/roles",
            get_with(list_roles, list_roles_docs).post_with(create_role, create_role_docs),
        )
        .api_route(
            "/role/:id",
            get_with(get_role, get_role_docs)
                .put_with(update_role, update_role_docs)
                .delete_with(delete_role, delete_role_docs),
        )
        .with_state(app_state)
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct RoleDto {
    pub id: u64,
    pub name: String,
    pub company_id: Option<u64>,
    /// Permission strings derived from the role name.
    pub permissions: Vec<String>,
}

impl From<&models::Role> for RoleDto {
    fn from(value: &models::Role) -> Self {
        Self {
            id: value.id,
            name: value.name.to_owned(),
            company_id: value.company_id,
            permissions: permissions::permissions_for_role(&value.name)
                .iter()
                .map(|permission| permission.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, PartialEq, Deserialize, JsonSchema)]
pub struct SaveRoleDto {
    pub name: String,
    pub company_id: Option<u64>,
}

async fn resolve_company(state: &mut RequestState, form: &SaveRoleDto) -> ServiceResult<()> {
    if let Some(company_id) = form.company_id {
        if state.db.get_company_by_id(company_id).await?.is_none() {
            return Err(ServiceError::BadRequest(
                "company_id",
                format!("company {} does not exist", company_id),
            ));
        }
    }
    Ok(())
}

fn sort_roles(roles: &mut [models::Role], query: &TableQuery) -> ServiceResult<()> {
    match query.sort.as_deref() {
        None | Some("id") => roles.sort_by_key(|role| role.id),
        Some("name") => roles.sort_by(|a, b| a.name.cmp(&b.name)),
        Some(other) => {
            return Err(ServiceError::BadRequest(
                "sort",
                format!("unknown column '{}'", other),
            ))
        }
    }
    if query.order == Some(SortOrder::Desc) {
        roles.reverse();
    }
    Ok(())
}

async fn list_roles(
    mut state: RequestState,
    Query(query): Query<TableQuery>,
) -> ServiceResult<Json<PageDto<RoleDto>>> {
    state.session_require_permission(permissions::ROLES_MANAGE)?;

    let mut roles = state.db.get_all_roles().await?;
    if let Some(ref filter) = query.filter {
        let needle = filter.to_lowercase();
        roles.retain(|role| role.name.to_lowercase().contains(&needle));
    }
    sort_roles(&mut roles, &query)?;

    let rows = roles.iter().map(RoleDto::from).collect();
    Ok(Json(pagination::paginate(rows, &query)))
}

fn list_roles_docs(op: TransformOperation) -> TransformOperation {
    op.description("List roles as a paginated table.")
        .tag("roles")
        .response::<200, Json<PageDto<RoleDto>>>()
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "roles:manage"])
}

async fn get_role(mut state: RequestState, Path(id): Path<u64>) -> ServiceResult<Json<RoleDto>> {
    state.session_require_permission(permissions::ROLES_MANAGE)?;

    let role = state.db.get_role_by_id(id).await?;
    if let Some(role) = role {
        return Ok(Json(RoleDto::from(&role)));
    }

    Err(ServiceError::NotFound)
}

fn get_role_docs(op: TransformOperation) -> TransformOperation {
    op.description("Get a role by id.")
        .tag("roles")
        .response::<200, Json<RoleDto>>()
        .response_with::<404, (), _>(|res| res.description("The requested role does not exist!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "roles:manage"])
}

async fn create_role(
    mut state: RequestState,
    form: Json<SaveRoleDto>,
) -> ServiceResult<Json<RoleDto>> {
    state.session_require_permission(permissions::ROLES_MANAGE)?;

    let form = form.0;
    super::validate_required_str("name", &form.name, super::MAX_NAME_LENGTH)?;
    resolve_company(&mut state, &form).await?;

    let role = models::Role {
        id: 0,
        name: form.name,
        company_id: form.company_id,
    };

    let role = state.db.store_role(role).await?;
    Ok(Json(RoleDto::from(&role)))
}

fn create_role_docs(op: TransformOperation) -> TransformOperation {
    op.description("Create a new role. The permission set is derived from the role name.")
        .tag("roles")
        .response::<200, Json<RoleDto>>()
        .response_with::<400, (), _>(|res| res.description("Invalid input!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "roles:manage"])
}

async fn update_role(
    mut state: RequestState,
    Path(id): Path<u64>,
    form: Json<SaveRoleDto>,
) -> ServiceResult<Json<RoleDto>> {
    state.session_require_permission(permissions::ROLES_MANAGE)?;

    let form = form.0;
    super::validate_required_str("name", &form.name, super::MAX_NAME_LENGTH)?;
    resolve_company(&mut state, &form).await?;

    let role = state.db.get_role_by_id(id).await?;
    if let Some(mut role) = role {
        role.name = form.name;
        role.company_id = form.company_id;

        let role = state.db.store_role(role).await?;
        return Ok(Json(RoleDto::from(&role)));
    }

    Err(ServiceError::NotFound)
}

fn update_role_docs(op: TransformOperation) -> TransformOperation {
    op.description("Update an existing role.")
        .tag("roles")
        .response::<200, Json<RoleDto>>()
        .response_with::<400, (), _>(|res| res.description("Invalid input!"))
        .response_with::<404, (), _>(|res| res.description("The requested role does not exist!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "roles:manage"])
}

async fn delete_role(mut state: RequestState, Path(id): Path<u64>) -> ServiceResult<StatusCode> {
    state.session_require_permission(permissions::ROLES_MANAGE)?;

    state.db.delete_role(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn delete_role_docs(op: TransformOperation) -> TransformOperation {
    op.description("Delete a role by id.")
        .tag("roles")
        .response_with::<204, (), _>(|res| res.description("The role was deleted!"))
        .response_with::<404, (), _>(|res| res.description("The requested role does not exist!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "roles:manage"])
}
