use aide::axum::routing::get_with;
use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::database::{AppState, DatabaseConnection};
use crate::error::{ServiceError, ServiceResult};
use crate::models;
use crate::pagination::{self, PageDto, SortOrder, TableQuery};
use crate::permissions;
use crate::request_state::RequestState;

pub fn router(app_state: AppState) -> ApiRouter {
    ApiRouter::new()
        .api_route(
            "/coupons",
            get_with(list_coupons, list_coupons_docs).post_with(create_coupon, create_coupon_docs),
        )
        .api_route(
            "/coupon/:id",
            get_with(get_coupon, get_coupon_docs)
                .put_with(update_coupon, update_coupon_docs)
                .delete_with(delete_coupon, delete_coupon_docs),
        )
        .with_state(app_state)
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DiscountTypeDto {
    FixedAmount,
    Percentage,
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct CouponDto {
    pub id: u64,
    pub code: String,
    pub used: i32,
    pub usage_limit: i32,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub discount_type: DiscountTypeDto,
    pub discount_value: i32,
}

impl From<&models::Coupon> for CouponDto {
    fn from(value: &models::Coupon) -> Self {
        let (discount_type, discount_value) = match value.discount {
            models::Discount::FixedAmount(amount) => (DiscountTypeDto::FixedAmount, amount),
            models::Discount::Percentage(percentage) => (DiscountTypeDto::Percentage, percentage),
        };

        Self {
            id: value.id,
            code: value.code.to_owned(),
            used: value.used,
            usage_limit: value.usage_limit,
            valid_from: value.valid_from,
            valid_until: value.valid_until,
            discount_type,
            discount_value,
        }
    }
}

/// Exactly one of `amount` and `percentage` must be supplied.
#[derive(Debug, PartialEq, Deserialize, JsonSchema)]
pub struct SaveCouponDto {
    pub code: String,
    #[serde(default)]
    pub usage_limit: Option<i32>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    /// Fixed discount in cents.
    pub amount: Option<i32>,
    /// Discount in percent, 0 to 100.
    pub percentage: Option<i32>,
}

fn parse_discount(
    amount: Option<i32>,
    percentage: Option<i32>,
) -> ServiceResult<models::Discount> {
    match (amount, percentage) {
        (Some(amount), None) => {
            if amount < 0 {
                return Err(ServiceError::BadRequest(
                    "amount",
                    "must not be negative".to_string(),
                ));
            }
            Ok(models::Discount::FixedAmount(amount))
        }
        (None, Some(percentage)) => {
            if !(0..=100).contains(&percentage) {
                return Err(ServiceError::BadRequest(
                    "percentage",
                    "must be between 0 and 100".to_string(),
                ));
            }
            Ok(models::Discount::Percentage(percentage))
        }
        (Some(_), Some(_)) => Err(ServiceError::BadRequest(
            "discount",
            "supply either 'amount' or 'percentage', not both".to_string(),
        )),
        (None, None) => Err(ServiceError::BadRequest(
            "discount",
            "either 'amount' or 'percentage' is required".to_string(),
        )),
    }
}

fn validate_coupon(form: &SaveCouponDto) -> ServiceResult<()> {
    super::validate_required_str("code", &form.code, super::MAX_NAME_LENGTH)?;
    if let Some(limit) = form.usage_limit {
        if limit < 1 {
            return Err(ServiceError::BadRequest(
                "usage_limit",
                "must be at least 1".to_string(),
            ));
        }
    }
    if let (Some(from), Some(until)) = (form.valid_from, form.valid_until) {
        if until < from {
            return Err(ServiceError::BadRequest(
                "valid_until",
                "must not be before valid_from".to_string(),
            ));
        }
    }
    Ok(())
}

/// The coupon code must stay unique, ignoring the row that is being
/// saved itself.
async fn check_code_unused(
    db: &mut DatabaseConnection,
    code: &str,
    id: u64,
) -> ServiceResult<()> {
    if let Some(existing) = db.get_coupon_by_code(code).await? {
        if existing.id != id {
            return Err(ServiceError::BadRequest(
                "code",
                "a coupon with this code already exists".to_string(),
            ));
        }
    }
    Ok(())
}

fn sort_coupons(coupons: &mut [models::Coupon], query: &TableQuery) -> ServiceResult<()> {
    match query.sort.as_deref() {
        None | Some("id") => coupons.sort_by_key(|coupon| coupon.id),
        Some("code") => coupons.sort_by(|a, b| a.code.cmp(&b.code)),
        Some("used") => coupons.sort_by_key(|coupon| coupon.used),
        Some(other) => {
            return Err(ServiceError::BadRequest(
                "sort",
                format!("unknown column '{}'", other),
            ))
        }
    }
    if query.order == Some(SortOrder::Desc) {
        coupons.reverse();
    }
    Ok(())
}

async fn list_coupons(
    mut state: RequestState,
    Query(query): Query<TableQuery>,
) -> ServiceResult<Json<PageDto<CouponDto>>> {
    state.session_require_permission(permissions::COUPONS_MANAGE)?;

    let mut coupons = state.db.get_all_coupons().await?;
    if let Some(ref filter) = query.filter {
        let needle = filter.to_lowercase();
        coupons.retain(|coupon| coupon.code.to_lowercase().contains(&needle));
    }
    sort_coupons(&mut coupons, &query)?;

    let rows = coupons.iter().map(CouponDto::from).collect();
    Ok(Json(pagination::paginate(rows, &query)))
}

fn list_coupons_docs(op: TransformOperation) -> TransformOperation {
    op.description("List coupons as a paginated table.")
        .tag("coupons")
        .response::<200, Json<PageDto<CouponDto>>>()
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "coupons:manage"])
}

async fn get_coupon(
    mut state: RequestState,
    Path(id): Path<u64>,
) -> ServiceResult<Json<CouponDto>> {
    state.session_require_permission(permissions::COUPONS_MANAGE)?;

    let coupon = state.db.get_coupon_by_id(id).await?;
    if let Some(coupon) = coupon {
        return Ok(Json(CouponDto::from(&coupon)));
    }

    Err(ServiceError::NotFound)
}

fn get_coupon_docs(op: TransformOperation) -> TransformOperation {
    op.description("Get a coupon by id.")
        .tag("coupons")
        .response::<200, Json<CouponDto>>()
        .response_with::<404, (), _>(|res| res.description("The requested coupon does not exist!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "coupons:manage"])
}

async fn create_coupon(
    mut state: RequestState,
    form: Json<SaveCouponDto>,
) -> ServiceResult<Json<CouponDto>> {
    state.session_require_permission(permissions::COUPONS_MANAGE)?;

    let form = form.0;
    validate_coupon(&form)?;
    let discount = parse_discount(form.amount, form.percentage)?;

    check_code_unused(&mut state.db, &form.code, 0).await?;

    let coupon = models::Coupon {
        id: 0,
        code: form.code,
        used: 0,
        usage_limit: form.usage_limit.unwrap_or(1),
        valid_from: form.valid_from,
        valid_until: form.valid_until,
        discount,
    };

    let coupon = state.db.store_coupon(coupon).await?;
    Ok(Json(CouponDto::from(&coupon)))
}

fn create_coupon_docs(op: TransformOperation) -> TransformOperation {
    op.description("Create a new coupon. The discount is either a fixed amount or a percentage.")
        .tag("coupons")
        .response::<200, Json<CouponDto>>()
        .response_with::<400, (), _>(|res| res.description("Invalid input!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "coupons:manage"])
}

async fn update_coupon(
    mut state: RequestState,
    Path(id): Path<u64>,
    form: Json<SaveCouponDto>,
) -> ServiceResult<Json<CouponDto>> {
    state.session_require_permission(permissions::COUPONS_MANAGE)?;

    let form = form.0;
    validate_coupon(&form)?;
    let discount = parse_discount(form.amount, form.percentage)?;

    let coupon = state.db.get_coupon_by_id(id).await?;
    if let Some(mut coupon) = coupon {
        check_code_unused(&mut state.db, &form.code, id).await?;

        coupon.code = form.code;
        if let Some(limit) = form.usage_limit {
            coupon.usage_limit = limit;
        }
        coupon.valid_from = form.valid_from;
        coupon.valid_until = form.valid_until;
        coupon.discount = discount;

        let coupon = state.db.store_coupon(coupon).await?;
        return Ok(Json(CouponDto::from(&coupon)));
    }

    Err(ServiceError::NotFound)
}

fn update_coupon_docs(op: TransformOperation) -> TransformOperation {
    op.description("Update an existing coupon.")
        .tag("coupons")
        .response::<200, Json<CouponDto>>()
        .response_with::<400, (), _>(|res| res.description("Invalid input!"))
        .response_with::<404, (), _>(|res| res.description("The requested coupon does not exist!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "coupons:manage"])
}

async fn delete_coupon(mut state: RequestState, Path(id): Path<u64>) -> ServiceResult<StatusCode> {
    state.session_require_permission(permissions::COUPONS_MANAGE)?;

    state.db.delete_coupon(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn delete_coupon_docs(op: TransformOperation) -> TransformOperation {
    op.description("Delete a coupon by id.")
        .tag("coupons")
        .response_with::<204, (), _>(|res| res.description("The coupon was deleted!"))
        .response_with::<404, (), _>(|res| res.description("The requested coupon does not exist!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "coupons:manage"])
}

#[cfg(test)]
mod tests {
    use sqlx::PgPool;

    use super::*;

    fn coupon(code: &str) -> models::Coupon {
        models::Coupon {
            id: 0,
            code: code.to_string(),
            used: 0,
            usage_limit: 1,
            valid_from: None,
            valid_until: None,
            discount: models::Discount::FixedAmount(500),
        }
    }

    #[sqlx::test]
    async fn coupon_codes_stay_unique(pool: PgPool) {
        let app_state = AppState::from_pool(pool).await;
        let mut db = DatabaseConnection {
            connection: app_state.pool.acquire().await.unwrap(),
        };

        let first = db.store_coupon(coupon("WELCOME")).await.unwrap();
        let second = db.store_coupon(coupon("SUMMER")).await.unwrap();

        // a new coupon must not reuse an existing code
        assert!(matches!(
            check_code_unused(&mut db, "WELCOME", 0).await,
            Err(ServiceError::BadRequest("code", _))
        ));
        // an update may keep its own code
        assert!(check_code_unused(&mut db, "WELCOME", first.id).await.is_ok());
        // but must not take another row's code
        assert!(matches!(
            check_code_unused(&mut db, "WELCOME", second.id).await,
            Err(ServiceError::BadRequest("code", _))
        ));
        assert!(check_code_unused(&mut db, "WINTER", 0).await.is_ok());
    }

    #[test]
    fn order_without_sort_reverses_the_id_order() {
        let mut coupons = vec![coupon("A"), coupon("B"), coupon("C")];
        for (index, coupon) in coupons.iter_mut().enumerate() {
            coupon.id = index as u64 + 1;
        }

        let query = TableQuery {
            order: Some(SortOrder::Desc),
            ..TableQuery::default()
        };
        sort_coupons(&mut coupons, &query).unwrap();
        let ids = coupons.iter().map(|coupon| coupon.id).collect::<Vec<_>>();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn unknown_sort_column_is_rejected() {
        let query = TableQuery {
            sort: Some("discount".to_string()),
            ..TableQuery::default()
        };
        let mut coupons = vec![coupon("A")];
        assert!(matches!(
            sort_coupons(&mut coupons, &query),
            Err(ServiceError::BadRequest("sort", _))
        ));
    }

    #[test]
    fn discount_is_fixed_xor_percentage() {
        assert_eq!(
            parse_discount(Some(500), None).unwrap(),
            models::Discount::FixedAmount(500)
        );
        assert_eq!(
            parse_discount(None, Some(15)).unwrap(),
            models::Discount::Percentage(15)
        );
        assert!(parse_discount(Some(500), Some(15)).is_err());
        assert!(parse_discount(None, None).is_err());
    }

    #[test]
    fn discount_bounds() {
        assert!(parse_discount(Some(-1), None).is_err());
        assert!(parse_discount(None, Some(101)).is_err());
        assert!(parse_discount(None, Some(0)).is_ok());
        assert!(parse_discount(None, Some(100)).is_ok());
    }

    #[test]
    fn validity_window_must_be_ordered() {
        let form = SaveCouponDto {
            code: "WELCOME".to_string(),
            usage_limit: Some(10),
            valid_from: Some("2024-03-02T00:00:00Z".parse().unwrap()),
            valid_until: Some("2024-03-01T00:00:00Z".parse().unwrap()),
            amount: Some(500),
            percentage: None,
        };
        assert!(validate_coupon(&form).is_err());
    }
}
