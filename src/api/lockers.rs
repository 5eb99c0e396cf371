use aide::axum::routing::{get_with, post_with};
use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::extract::Path;
use axum::Json;
use chrono::{DateTime, Utc};
use log::error;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::database::{AppState, DatabaseConnection};
use crate::dcm::{CreateDcmToken, DcmToken};
use crate::error::{ServiceError, ServiceResult};
use crate::permissions;
use crate::request_state::RequestState;

pub fn router(app_state: AppState) -> ApiRouter {
    ApiRouter::new()
        .api_route(
            "/locker/:serie/tokens",
            post_with(mint_token, mint_token_docs),
        )
        .api_route(
            "/locker/:serie/token/:token1",
            get_with(get_token, get_token_docs),
        )
        .with_state(app_state)
}

#[derive(Debug, PartialEq, Deserialize, JsonSchema)]
pub struct MintTokenDto {
    /// Target locker size, required.
    pub size_id: Option<u64>,
    pub box_id: Option<u64>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub max_uses: Option<u32>,
    pub confirmed: Option<bool>,
    pub mode: Option<String>,
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct MintedTokenDto {
    pub token1: String,
}

/// Validate the mint request. Runs before any call to the locker
/// controller, a missing size id never reaches the network.
fn build_create_request(form: MintTokenDto) -> ServiceResult<CreateDcmToken> {
    let Some(size_id) = form.size_id else {
        return Err(ServiceError::BadRequest(
            "size_id",
            "is required".to_string(),
        ));
    };
    if let (Some(start), Some(end)) = (form.start_at, form.end_at) {
        if end < start {
            return Err(ServiceError::BadRequest(
                "end_at",
                "must not be before start_at".to_string(),
            ));
        }
    }
    if let Some(ref mode) = form.mode {
        super::validate_required_str("mode", mode, super::MAX_NAME_LENGTH)?;
    }

    Ok(CreateDcmToken {
        id_size: size_id,
        id_box: form.box_id,
        start_at: form.start_at,
        end_at: form.end_at,
        max_uses: form.max_uses,
        confirmed: form.confirmed,
        mode: form.mode,
    })
}

/// Record upstream failures in the error log before re-raising them.
async fn log_upstream_error(db: &mut DatabaseConnection, err: ServiceError) -> ServiceError {
    if matches!(
        err,
        ServiceError::Upstream { .. } | ServiceError::UpstreamSchema(_)
    ) {
        if let Err(log_err) = db.store_error_log(&err.to_string()).await {
            error!("could not store error log: {log_err}");
        }
    }
    err
}

async fn mint_token(
    mut state: RequestState,
    Path(serie): Path<u64>,
    form: Json<MintTokenDto>,
) -> ServiceResult<Json<MintedTokenDto>> {
    state.session_require_permission(permissions::LOCKERS_MANAGE)?;

    let request = build_create_request(form.0)?;
    match state.dcm.create_token(serie, &request).await {
        Ok(token1) => Ok(Json(MintedTokenDto { token1 })),
        Err(err) => Err(log_upstream_error(&mut state.db, err).await),
    }
}

fn mint_token_docs(op: TransformOperation) -> TransformOperation {
    op.description("Mint an access token for a locker compartment via the locker controller.")
        .tag("lockers")
        .response::<200, Json<MintedTokenDto>>()
        .response_with::<400, (), _>(|res| res.description("Invalid input!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .response_with::<502, (), _>(|res| res.description("The locker controller failed!"))
        .security_requirement_scopes("SessionToken", ["admin", "lockers:manage"])
}

async fn get_token(
    mut state: RequestState,
    Path((serie, token1)): Path<(u64, String)>,
) -> ServiceResult<Json<DcmToken>> {
    state.session_require_permission(permissions::LOCKERS_MANAGE)?;

    match state.dcm.get_token(serie, &token1).await {
        Ok(token) => Ok(Json(token)),
        Err(err) => Err(log_upstream_error(&mut state.db, err).await),
    }
}

fn get_token_docs(op: TransformOperation) -> TransformOperation {
    op.description("Inspect a locker access token via the locker controller.")
        .tag("lockers")
        .response::<200, Json<DcmToken>>()
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .response_with::<502, (), _>(|res| res.description("The locker controller failed!"))
        .security_requirement_scopes("SessionToken", ["admin", "lockers:manage"])
}

#[cfg(test)]
mod tests {
    use sqlx::PgPool;

    use super::*;

    #[sqlx::test]
    async fn controller_failures_are_recorded(pool: PgPool) {
        let app_state = AppState::from_pool(pool).await;
        let mut db = DatabaseConnection {
            connection: app_state.pool.acquire().await.unwrap(),
        };

        let err = log_upstream_error(
            &mut db,
            ServiceError::Upstream {
                status: 500,
                body: "controller down".to_string(),
            },
        )
        .await;
        assert!(matches!(err, ServiceError::Upstream { status: 500, .. }));

        let err = log_upstream_error(
            &mut db,
            ServiceError::UpstreamSchema("missing field `token1`".to_string()),
        )
        .await;
        assert!(matches!(err, ServiceError::UpstreamSchema(_)));

        // validation errors stay out of the log
        let err = log_upstream_error(
            &mut db,
            ServiceError::BadRequest("size_id", "is required".to_string()),
        )
        .await;
        assert!(matches!(err, ServiceError::BadRequest(..)));

        let logs = db.get_all_error_logs().await.unwrap();
        assert_eq!(logs.len(), 2);
        assert!(logs.iter().any(|log| log.text.contains("controller down")));
        assert!(logs.iter().any(|log| log.text.contains("token1")));
        assert!(logs.iter().all(|log| !log.text.contains("size_id")));
    }

    fn form() -> MintTokenDto {
        MintTokenDto {
            size_id: Some(3),
            box_id: None,
            start_at: None,
            end_at: None,
            max_uses: None,
            confirmed: None,
            mode: None,
        }
    }

    #[test]
    fn missing_size_id_is_rejected() {
        let request = build_create_request(MintTokenDto {
            size_id: None,
            ..form()
        });
        assert!(matches!(
            request,
            Err(ServiceError::BadRequest("size_id", _))
        ));
    }

    #[test]
    fn valid_request_is_passed_through() {
        let request = build_create_request(form()).unwrap();
        assert_eq!(request.id_size, 3);
        assert_eq!(request.id_box, None);
    }

    #[test]
    fn inverted_window_is_rejected() {
        let request = build_create_request(MintTokenDto {
            start_at: Some("2024-03-02T00:00:00Z".parse().unwrap()),
            end_at: Some("2024-03-01T00:00:00Z".parse().unwrap()),
            ..form()
        });
        assert!(request.is_err());
    }
}
