use aide::OperationInput;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    RequestPartsExt,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};

use crate::{
    database::{AppState, DatabaseConnection},
    dcm::DcmClient,
    error::{ServiceError, ServiceResult},
    models, permissions,
};

/// Per request context: one pooled database connection, the locker
/// controller client and the session of the caller, if a valid bearer
/// token was sent.
pub struct RequestState {
    pub db: DatabaseConnection,
    pub dcm: DcmClient,
    pub session: Option<models::Session>,
}

impl RequestState {
    /// The logged in account, `Unauthorized` without a session.
    pub fn session_account(&self) -> ServiceResult<&models::Account> {
        match self.session {
            Some(ref session) => Ok(&session.account),
            None => Err(ServiceError::Unauthorized("Missing login!")),
        }
    }

    /// Fail closed unless the caller holds the required permission
    /// string or the admin sentinel.
    pub fn session_require_permission(&self, required: &str) -> ServiceResult<()> {
        let account = self.session_account()?;
        if permissions::is_allowed(account.permissions(), required) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden("Missing permissions!"))
        }
    }

    pub fn session_require_admin(&self) -> ServiceResult<()> {
        self.session_require_permission(permissions::ADMIN)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestState
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        let connection = state
            .pool
            .acquire()
            .await
            .map_err(|err| ServiceError::InternalServerError(err.to_string()))?;
        let mut db = DatabaseConnection { connection };

        let session = if let Ok(TypedHeader(Authorization(bearer))) =
            parts.extract::<TypedHeader<Authorization<Bearer>>>().await
        {
            let session_token = bearer.token().to_owned();
            db.get_session_by_session_token(session_token).await?
        } else {
            None
        };

        Ok(Self {
            db,
            dcm: state.dcm.clone(),
            session,
        })
    }
}

impl OperationInput for RequestState {}
