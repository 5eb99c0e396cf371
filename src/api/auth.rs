use std::ops::Add;

use aide::axum::routing::{delete_with, get_with, post_with};
use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use aide::OperationOutput;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{Duration, Utc};
use headers::{HeaderMap, HeaderValue};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::database::AppState;
use crate::error::{ServiceError, ServiceResult};
use crate::request_state::RequestState;
use crate::SESSION_COOKIE_NAME;

use super::accounts::AccountDto;
use super::password_hash_verify;

pub fn router(app_state: AppState) -> ApiRouter {
    ApiRouter::new()
        .api_route(
            "/auth/password",
            post_with(auth_password_based, auth_password_based_docs),
        )
        .api_route(
            "/auth/account",
            get_with(auth_get_account, auth_get_account_docs),
        )
        .api_route("/auth", delete_with(auth_delete, auth_delete_docs))
        .with_state(app_state)
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct AuthTokenDto {
    pub token: String,
}

impl OperationOutput for AuthTokenDto {
    type Inner = AuthTokenDto;
}
impl IntoResponse for AuthTokenDto {
    fn into_response(self) -> axum::response::Response {
        let cookie = HeaderValue::from_str(
            format!(
                "{}={}; Path=/api/v1; HttpOnly; SameSite=None",
                SESSION_COOKIE_NAME, self.token
            )
            .as_str(),
        )
        .unwrap();

        let mut header = HeaderMap::new();
        header.insert(header::SET_COOKIE, cookie);
        (StatusCode::OK, header, Json(self)).into_response()
    }
}

#[derive(Debug, PartialEq, Deserialize, JsonSchema)]
pub struct AuthPasswordBasedDto {
    pub email: String,
    pub password: String,
}

async fn auth_password_based(
    mut state: RequestState,
    form: Json<AuthPasswordBasedDto>,
) -> ServiceResult<AuthTokenDto> {
    let form = form.0;
    let account = state.db.get_account_by_email(&form.email).await?;

    if let Some(account) = account {
        if password_hash_verify(&account.password_hash, &form.password)? {
            let token = state
                .db
                .create_session_token(account.id, Utc::now().add(Duration::minutes(30)))
                .await?;

            return Ok(AuthTokenDto { token });
        }
    }

    Err(ServiceError::Unauthorized("Invalid email or password"))
}

fn auth_password_based_docs(op: TransformOperation) -> TransformOperation {
    op.description("Login with email and password.")
        .tag("auth")
        .response::<200, Json<AuthTokenDto>>()
        .response_with::<401, (), _>(|res| res.description("Invalid email or password!"))
}

async fn auth_delete(mut state: RequestState) -> ServiceResult<StatusCode> {
    if let Some(session) = state.session {
        state.db.delete_session_token(session.token).await?;
    }

    Ok(StatusCode::NO_CONTENT)
}

fn auth_delete_docs(op: TransformOperation) -> TransformOperation {
    op.description("Logout the current session.")
        .tag("auth")
        .response_with::<204, (), _>(|res| res.description("Logout was successfull!"))
}

pub async fn auth_get_account(state: RequestState) -> ServiceResult<Json<AccountDto>> {
    let account = state.session_account()?;
    Ok(Json(AccountDto::from(account)))
}

fn auth_get_account_docs(op: TransformOperation) -> TransformOperation {
    op.description("Get the account of the current session.")
        .tag("auth")
        .response::<200, Json<AccountDto>>()
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .security_requirement_scopes("SessionToken", ["admin", "self"])
}
