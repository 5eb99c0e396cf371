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
            "/companies",
            get_with(list_companies, list_companies_docs)
                .post_with(create_company, create_company_docs),
        )
        .api_route(
            "/company/:id",
            get_with(get_company, get_company_docs)
                .put_with(update_company, update_company_docs)
                .delete_with(delete_company, delete_company_docs),
        )
        .with_state(app_state)
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct CompanyDto {
    pub id: u64,
    pub name: String,
}

impl From<&models::Company> for CompanyDto {
    fn from(value: &models::Company) -> Self {
        Self {
            id: value.id,
            name: value.name.to_owned(),
        }
    }
}

#[derive(Debug, PartialEq, Deserialize, JsonSchema)]
pub struct SaveCompanyDto {
    pub name: String,
}

fn sort_companies(companies: &mut [models::Company], query: &TableQuery) -> ServiceResult<()> {
    match query.sort.as_deref() {
        None | Some("id") => companies.sort_by_key(|company| company.id),
        Some("name") => companies.sort_by(|a, b| a.name.cmp(&b.name)),
        Some(other) => {
            return Err(ServiceError::BadRequest(
                "sort",
                format!("unknown column '{}'", other),
            ))
        }
    }
    if query.order == Some(SortOrder::Desc) {
        companies.reverse();
    }
    Ok(())
}

async fn list_companies(
    mut state: RequestState,
    Query(query): Query<TableQuery>,
) -> ServiceResult<Json<PageDto<CompanyDto>>> {
    state.session_require_permission(permissions::COMPANIES_MANAGE)?;

    let mut companies = state.db.get_all_companies().await?;
    if let Some(ref filter) = query.filter {
        let needle = filter.to_lowercase();
        companies.retain(|company| company.name.to_lowercase().contains(&needle));
    }
    sort_companies(&mut companies, &query)?;

    let rows = companies.iter().map(CompanyDto::from).collect();
    Ok(Json(pagination::paginate(rows, &query)))
}

fn list_companies_docs(op: TransformOperation) -> TransformOperation {
    op.description("List companies as a paginated table.")
        .tag("companies")
        .response::<200, Json<PageDto<CompanyDto>>>()
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "companies:manage"])
}

async fn get_company(
    mut state: RequestState,
    Path(id): Path<u64>,
) -> ServiceResult<Json<CompanyDto>> {
    state.session_require_permission(permissions::COMPANIES_MANAGE)?;

    let company = state.db.get_company_by_id(id).await?;
    if let Some(company) = company {
        return Ok(Json(CompanyDto::from(&company)));
    }

    Err(ServiceError::NotFound)
}

fn get_company_docs(op: TransformOperation) -> TransformOperation {
    op.description("Get a company by id.")
        .tag("companies")
        .response::<200, Json<CompanyDto>>()
        .response_with::<404, (), _>(|res| res.description("The requested company does not exist!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "companies:manage"])
}

async fn create_company(
    mut state: RequestState,
    form: Json<SaveCompanyDto>,
) -> ServiceResult<Json<CompanyDto>> {
    state.session_require_permission(permissions::COMPANIES_MANAGE)?;

    let form = form.0;
    super::validate_required_str("name", &form.name, super::MAX_NAME_LENGTH)?;

    let company = models::Company {
        id: 0,
        name: form.name,
    };

    let company = state.db.store_company(company).await?;
    Ok(Json(CompanyDto::from(&company)))
}

fn create_company_docs(op: TransformOperation) -> TransformOperation {
    op.description("Create a new company.")
        .tag("companies")
        .response::<200, Json<CompanyDto>>()
        .response_with::<400, (), _>(|res| res.description("Invalid input!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "companies:manage"])
}

async fn update_company(
    mut state: RequestState,
    Path(id): Path<u64>,
    form: Json<SaveCompanyDto>,
) -> ServiceResult<Json<CompanyDto>> {
    state.session_require_permission(permissions::COMPANIES_MANAGE)?;

    let form = form.0;
    super::validate_required_str("name", &form.name, super::MAX_NAME_LENGTH)?;

    let company = state.db.get_company_by_id(id).await?;
    if let Some(mut company) = company {
        company.name = form.name;

        let company = state.db.store_company(company).await?;
        return Ok(Json(CompanyDto::from(&company)));
    }

    Err(ServiceError::NotFound)
}

fn update_company_docs(op: TransformOperation) -> TransformOperation {
    op.description("Update an existing company.")
        .tag("companies")
        .response::<200, Json<CompanyDto>>()
        .response_with::<400, (), _>(|res| res.description("Invalid input!"))
        .response_with::<404, (), _>(|res| res.description("The requested company does not exist!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "companies:manage"])
}

async fn delete_company(
    mut state: RequestState,
    Path(id): Path<u64>,
) -> ServiceResult<StatusCode> {
    state.session_require_permission(permissions::COMPANIES_MANAGE)?;

    state.db.delete_company(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn delete_company_docs(op: TransformOperation) -> TransformOperation {
    op.description("Delete a company by id.")
        .tag("companies")
        .response_with::<204, (), _>(|res| res.description("The company was deleted!"))
        .response_with::<404, (), _>(|res| res.description("The requested company does not exist!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "companies:manage"])
}
