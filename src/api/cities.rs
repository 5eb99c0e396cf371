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
            "/cities",
            get_with(list_cities, list_cities_docs).post_with(create_city, create_city_docs),
        )
        .api_route(
            "/city/:id",
            get_with(get_city, get_city_docs)
                .put_with(update_city, update_city_docs)
                .delete_with(delete_city, delete_city_docs),
        )
        .with_state(app_state)
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct CityDto {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub image_url: String,
}

impl From<&models::City> for CityDto {
    fn from(value: &models::City) -> Self {
        Self {
            id: value.id,
            name: value.name.to_owned(),
            description: value.description.to_owned(),
            image_url: value.image_url.to_owned(),
        }
    }
}

#[derive(Debug, PartialEq, Deserialize, JsonSchema)]
pub struct SaveCityDto {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
}

fn sort_cities(cities: &mut [models::City], query: &TableQuery) -> ServiceResult<()> {
    match query.sort.as_deref() {
        None | Some("id") => cities.sort_by_key(|city| city.id),
        Some("name") => cities.sort_by(|a, b| a.name.cmp(&b.name)),
        Some(other) => {
            return Err(ServiceError::BadRequest(
                "sort",
                format!("unknown column '{}'", other),
            ))
        }
    }
    if query.order == Some(SortOrder::Desc) {
        cities.reverse();
    }
    Ok(())
}

async fn list_cities(
    mut state: RequestState,
    Query(query): Query<TableQuery>,
) -> ServiceResult<Json<PageDto<CityDto>>> {
    state.session_require_permission(permissions::CITIES_MANAGE)?;

    let mut cities = state.db.get_all_cities().await?;
    if let Some(ref filter) = query.filter {
        let needle = filter.to_lowercase();
        cities.retain(|city| city.name.to_lowercase().contains(&needle));
    }
    sort_cities(&mut cities, &query)?;

    let rows = cities.iter().map(CityDto::from).collect();
    Ok(Json(pagination::paginate(rows, &query)))
}

fn list_cities_docs(op: TransformOperation) -> TransformOperation {
    op.description("List cities as a paginated table.")
        .tag("cities")
        .response::<200, Json<PageDto<CityDto>>>()
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "cities:manage"])
}

async fn get_city(mut state: RequestState, Path(id): Path<u64>) -> ServiceResult<Json<CityDto>> {
    state.session_require_permission(permissions::CITIES_MANAGE)?;

    let city = state.db.get_city_by_id(id).await?;
    if let Some(city) = city {
        return Ok(Json(CityDto::from(&city)));
    }

    Err(ServiceError::NotFound)
}

fn get_city_docs(op: TransformOperation) -> TransformOperation {
    op.description("Get a city by id.")
        .tag("cities")
        .response::<200, Json<CityDto>>()
        .response_with::<404, (), _>(|res| res.description("The requested city does not exist!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "cities:manage"])
}

async fn create_city(
    mut state: RequestState,
    form: Json<SaveCityDto>,
) -> ServiceResult<Json<CityDto>> {
    state.session_require_permission(permissions::CITIES_MANAGE)?;

    let form = form.0;
    super::validate_required_str("name", &form.name, super::MAX_NAME_LENGTH)?;
    super::validate_str("description", &form.description, super::MAX_TEXT_LENGTH)?;
    super::validate_str("image_url", &form.image_url, super::MAX_URL_LENGTH)?;

    let city = models::City {
        id: 0,
        name: form.name,
        description: form.description,
        image_url: form.image_url,
    };

    let city = state.db.store_city(city).await?;
    Ok(Json(CityDto::from(&city)))
}

fn create_city_docs(op: TransformOperation) -> TransformOperation {
    op.description("Create a new city.")
        .tag("cities")
        .response::<200, Json<CityDto>>()
        .response_with::<400, (), _>(|res| res.description("Invalid input!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "cities:manage"])
}

async fn update_city(
    mut state: RequestState,
    Path(id): Path<u64>,
    form: Json<SaveCityDto>,
) -> ServiceResult<Json<CityDto>> {
    state.session_require_permission(permissions::CITIES_MANAGE)?;

    let form = form.0;
    super::validate_required_str("name", &form.name, super::MAX_NAME_LENGTH)?;
    super::validate_str("description", &form.description, super::MAX_TEXT_LENGTH)?;
    super::validate_str("image_url", &form.image_url, super::MAX_URL_LENGTH)?;

    let city = state.db.get_city_by_id(id).await?;
    if let Some(mut city) = city {
        city.name = form.name;
        city.description = form.description;
        city.image_url = form.image_url;

        let city = state.db.store_city(city).await?;
        return Ok(Json(CityDto::from(&city)));
    }

    Err(ServiceError::NotFound)
}

fn update_city_docs(op: TransformOperation) -> TransformOperation {
    op.description("Update an existing city.")
        .tag("cities")
        .response::<200, Json<CityDto>>()
        .response_with::<400, (), _>(|res| res.description("Invalid input!"))
        .response_with::<404, (), _>(|res| res.description("The requested city does not exist!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "cities:manage"])
}

async fn delete_city(mut state: RequestState, Path(id): Path<u64>) -> ServiceResult<StatusCode> {
    state.session_require_permission(permissions::CITIES_MANAGE)?;

    state.db.delete_city(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn delete_city_docs(op: TransformOperation) -> TransformOperation {
    op.description("Delete a city by id.")
        .tag("cities")
        .response_with::<204, (), _>(|res| res.description("The city was deleted!"))
        .response_with::<404, (), _>(|res| res.description("The requested city does not exist!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "cities:manage"])
}
