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
            "/coins",
            get_with(list_coins, list_coins_docs).post_with(create_coin, create_coin_docs),
        )
        .api_route(
            "/coin/:id",
            get_with(get_coin, get_coin_docs)
                .put_with(update_coin, update_coin_docs)
                .delete_with(delete_coin, delete_coin_docs),
        )
        .with_state(app_state)
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct CoinDto {
    pub id: u64,
    pub description: String,
    /// Tier value in cents.
    pub value: i32,
}

impl From<&models::Coin> for CoinDto {
    fn from(value: &models::Coin) -> Self {
        Self {
            id: value.id,
            description: value.description.to_owned(),
            value: value.value,
        }
    }
}

#[derive(Debug, PartialEq, Deserialize, JsonSchema)]
pub struct SaveCoinDto {
    #[serde(default)]
    pub description: String,
    pub value: i32,
}

fn validate_coin(form: &SaveCoinDto) -> ServiceResult<()> {
    super::validate_str("description", &form.description, super::MAX_TEXT_LENGTH)?;
    if form.value < 0 {
        return Err(ServiceError::BadRequest(
            "value",
            "must not be negative".to_string(),
        ));
    }
    Ok(())
}

fn sort_coins(coins: &mut [models::Coin], query: &TableQuery) -> ServiceResult<()> {
    match query.sort.as_deref() {
        None | Some("id") => coins.sort_by_key(|coin| coin.id),
        Some("description") => coins.sort_by(|a, b| a.description.cmp(&b.description)),
        Some("value") => coins.sort_by_key(|coin| coin.value),
        Some(other) => {
            return Err(ServiceError::BadRequest(
                "sort",
                format!("unknown column '{}'", other),
            ))
        }
    }
    if query.order == Some(SortOrder::Desc) {
        coins.reverse();
    }
    Ok(())
}

async fn list_coins(
    mut state: RequestState,
    Query(query): Query<TableQuery>,
) -> ServiceResult<Json<PageDto<CoinDto>>> {
    state.session_require_permission(permissions::COINS_MANAGE)?;

    let mut coins = state.db.get_all_coins().await?;
    if let Some(ref filter) = query.filter {
        let needle = filter.to_lowercase();
        coins.retain(|coin| coin.description.to_lowercase().contains(&needle));
    }
    sort_coins(&mut coins, &query)?;

    let rows = coins.iter().map(CoinDto::from).collect();
    Ok(Json(pagination::paginate(rows, &query)))
}

fn list_coins_docs(op: TransformOperation) -> TransformOperation {
    op.description("List pricing tiers as a paginated table.")
        .tag("coins")
        .response::<200, Json<PageDto<CoinDto>>>()
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "coins:manage"])
}

async fn get_coin(mut state: RequestState, Path(id): Path<u64>) -> ServiceResult<Json<CoinDto>> {
    state.session_require_permission(permissions::COINS_MANAGE)?;

    let coin = state.db.get_coin_by_id(id).await?;
    if let Some(coin) = coin {
        return Ok(Json(CoinDto::from(&coin)));
    }

    Err(ServiceError::NotFound)
}

fn get_coin_docs(op: TransformOperation) -> TransformOperation {
    op.description("Get a pricing tier by id.")
        .tag("coins")
        .response::<200, Json<CoinDto>>()
        .response_with::<404, (), _>(|res| res.description("The requested coin does not exist!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "coins:manage"])
}

async fn create_coin(
    mut state: RequestState,
    form: Json<SaveCoinDto>,
) -> ServiceResult<Json<CoinDto>> {
    state.session_require_permission(permissions::COINS_MANAGE)?;

    let form = form.0;
    validate_coin(&form)?;

    let coin = models::Coin {
        id: 0,
        description: form.description,
        value: form.value,
    };

    let coin = state.db.store_coin(coin).await?;
    Ok(Json(CoinDto::from(&coin)))
}

fn create_coin_docs(op: TransformOperation) -> TransformOperation {
    op.description("Create a new pricing tier.")
        .tag("coins")
        .response::<200, Json<CoinDto>>()
        .response_with::<400, (), _>(|res| res.description("Invalid input!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "coins:manage"])
}

async fn update_coin(
    mut state: RequestState,
    Path(id): Path<u64>,
    form: Json<SaveCoinDto>,
) -> ServiceResult<Json<CoinDto>> {
    state.session_require_permission(permissions::COINS_MANAGE)?;

    let form = form.0;
    validate_coin(&form)?;

    let coin = state.db.get_coin_by_id(id).await?;
    if let Some(mut coin) = coin {
        coin.description = form.description;
        coin.value = form.value;

        let coin = state.db.store_coin(coin).await?;
        return Ok(Json(CoinDto::from(&coin)));
    }

    Err(ServiceError::NotFound)
}

fn update_coin_docs(op: TransformOperation) -> TransformOperation {
    op.description("Update an existing pricing tier.")
        .tag("coins")
        .response::<200, Json<CoinDto>>()
        .response_with::<400, (), _>(|res| res.description("Invalid input!"))
        .response_with::<404, (), _>(|res| res.description("The requested coin does not exist!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "coins:manage"])
}

async fn delete_coin(mut state: RequestState, Path(id): Path<u64>) -> ServiceResult<StatusCode> {
    state.session_require_permission(permissions::COINS_MANAGE)?;

    state.db.delete_coin(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn delete_coin_docs(op: TransformOperation) -> TransformOperation {
    op.description("Delete a pricing tier by id.")
        .tag("coins")
        .response_with::<204, (), _>(|res| res.description("The coin was deleted!"))
        .response_with::<404, (), _>(|res| res.description("The requested coin does not exist!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "coins:manage"])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_value_is_rejected() {
        let form = SaveCoinDto {
            description: "Small tier".to_string(),
            value: -1,
        };
        assert!(validate_coin(&form).is_err());
    }
}
