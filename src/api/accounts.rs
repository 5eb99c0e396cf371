use aide::axum::routing::get_with;
use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::Json;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::database::{AppState, DatabaseConnection};
use crate::error::{ServiceError, ServiceResult};
use crate::models;
use crate::pagination::{self, PageDto, SortOrder, TableQuery};
use crate::permissions;
use crate::request_state::RequestState;

use super::roles::RoleDto;

pub fn router(app_state: AppState) -> ApiRouter {
    ApiRouter::new()
        .api_route(
            "/accounts",
            get_with(list_accounts, list_accounts_docs)
                .post_with(create_account, create_account_docs),
        )
        .api_route(
            "/account/:id",
            get_with(get_account, get_account_docs)
                .put_with(update_account, update_account_docs)
                .delete_with(delete_account, delete_account_docs),
        )
        .with_state(app_state)
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct AccountDto {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub role: Option<RoleDto>,
}

impl From<&models::Account> for AccountDto {
    fn from(value: &models::Account) -> Self {
        Self {
            id: value.id,
            name: value.name.to_owned(),
            email: value.email.to_owned(),
            role: value.role.as_ref().map(RoleDto::from),
        }
    }
}

#[derive(Debug, PartialEq, Deserialize, JsonSchema)]
pub struct SaveAccountDto {
    pub name: String,
    pub email: String,
    pub role_id: Option<u64>,
    /// Required on create, keeps the current password when omitted on
    /// update.
    pub password: Option<String>,
}

async fn validate_account(state: &mut RequestState, form: &SaveAccountDto) -> ServiceResult<()> {
    super::validate_required_str("name", &form.name, super::MAX_NAME_LENGTH)?;
    super::validate_required_str("email", &form.email, super::MAX_NAME_LENGTH)?;
    if !form.email.contains('@') {
        return Err(ServiceError::BadRequest(
            "email",
            "must be a valid email address".to_string(),
        ));
    }
    if let Some(ref password) = form.password {
        super::validate_required_str("password", password, super::MAX_NAME_LENGTH)?;
    }
    if let Some(role_id) = form.role_id {
        if state.db.get_role_by_id(role_id).await?.is_none() {
            return Err(ServiceError::BadRequest(
                "role_id",
                format!("role {} does not exist", role_id),
            ));
        }
    }
    Ok(())
}

async fn resolve_role(
    state: &mut RequestState,
    role_id: Option<u64>,
) -> ServiceResult<Option<models::Role>> {
    match role_id {
        Some(role_id) => Ok(state.db.get_role_by_id(role_id).await?),
        None => Ok(None),
    }
}

/// The email address must stay unique, ignoring the row that is being
/// saved itself.
async fn check_email_unused(
    db: &mut DatabaseConnection,
    email: &str,
    id: u64,
) -> ServiceResult<()> {
    if let Some(existing) = db.get_account_by_email(email).await? {
        if existing.id != id {
            return Err(ServiceError::BadRequest(
                "email",
                "an account with this email already exists".to_string(),
            ));
        }
    }
    Ok(())
}

fn sort_accounts(accounts: &mut [models::Account], query: &TableQuery) -> ServiceResult<()> {
    match query.sort.as_deref() {
        None | Some("id") => accounts.sort_by_key(|account| account.id),
        Some("name") => accounts.sort_by(|a, b| a.name.cmp(&b.name)),
        Some("email") => accounts.sort_by(|a, b| a.email.cmp(&b.email)),
        Some(other) => {
            return Err(ServiceError::BadRequest(
                "sort",
                format!("unknown column '{}'", other),
            ))
        }
    }
    if query.order == Some(SortOrder::Desc) {
        accounts.reverse();
    }
    Ok(())
}

async fn list_accounts(
    mut state: RequestState,
    Query(query): Query<TableQuery>,
) -> ServiceResult<Json<PageDto<AccountDto>>> {
    state.session_require_permission(permissions::ACCOUNTS_MANAGE)?;

    let mut accounts = state.db.get_all_accounts().await?;
    if let Some(ref filter) = query.filter {
        let needle = filter.to_lowercase();
        accounts.retain(|account| {
            account.name.to_lowercase().contains(&needle)
                || account.email.to_lowercase().contains(&needle)
        });
    }
    sort_accounts(&mut accounts, &query)?;

    let rows = accounts.iter().map(AccountDto::from).collect();
    Ok(Json(pagination::paginate(rows, &query)))
}

fn list_accounts_docs(op: TransformOperation) -> TransformOperation {
    op.description("List admin accounts as a paginated table.")
        .tag("accounts")
        .response::<200, Json<PageDto<AccountDto>>>()
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "accounts:manage"])
}

async fn get_account(
    mut state: RequestState,
    Path(id): Path<u64>,
) -> ServiceResult<Json<AccountDto>> {
    state.session_require_permission(permissions::ACCOUNTS_MANAGE)?;

    let account = state.db.get_account_by_id(id).await?;
    if let Some(account) = account {
        return Ok(Json(AccountDto::from(&account)));
    }

    Err(ServiceError::NotFound)
}

fn get_account_docs(op: TransformOperation) -> TransformOperation {
    op.description("Get an admin account by id.")
        .tag("accounts")
        .response::<200, Json<AccountDto>>()
        .response_with::<404, (), _>(|res| res.description("The requested account does not exist!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "accounts:manage"])
}

async fn create_account(
    mut state: RequestState,
    form: Json<SaveAccountDto>,
) -> ServiceResult<Json<AccountDto>> {
    state.session_require_permission(permissions::ACCOUNTS_MANAGE)?;

    let form = form.0;
    validate_account(&mut state, &form).await?;

    let Some(ref password) = form.password else {
        return Err(ServiceError::BadRequest(
            "password",
            "is required when creating an account".to_string(),
        ));
    };

    check_email_unused(&mut state.db, &form.email, 0).await?;

    let role = resolve_role(&mut state, form.role_id).await?;
    let account = models::Account {
        id: 0,
        name: form.name,
        email: form.email,
        role,
        password_hash: super::password_hash_create(password)?,
    };

    let account = state.db.store_account(account).await?;
    Ok(Json(AccountDto::from(&account)))
}

fn create_account_docs(op: TransformOperation) -> TransformOperation {
    op.description("Create a new admin account.")
        .tag("accounts")
        .response::<200, Json<AccountDto>>()
        .response_with::<400, (), _>(|res| res.description("Invalid input!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "accounts:manage"])
}

async fn update_account(
    mut state: RequestState,
    Path(id): Path<u64>,
    form: Json<SaveAccountDto>,
) -> ServiceResult<Json<AccountDto>> {
    state.session_require_permission(permissions::ACCOUNTS_MANAGE)?;

    let form = form.0;
    validate_account(&mut state, &form).await?;

    let account = state.db.get_account_by_id(id).await?;
    if let Some(mut account) = account {
        check_email_unused(&mut state.db, &form.email, id).await?;

        account.name = form.name;
        account.email = form.email;
        account.role = resolve_role(&mut state, form.role_id).await?;
        if let Some(ref password) = form.password {
            account.password_hash = super::password_hash_create(password)?;
        }

        let account = state.db.store_account(account).await?;
        return Ok(Json(AccountDto::from(&account)));
    }

    Err(ServiceError::NotFound)
}

fn update_account_docs(op: TransformOperation) -> TransformOperation {
    op.description("Update an existing admin account.")
        .tag("accounts")
        .response::<200, Json<AccountDto>>()
        .response_with::<400, (), _>(|res| res.description("Invalid input!"))
        .response_with::<404, (), _>(|res| res.description("The requested account does not exist!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "accounts:manage"])
}

async fn delete_account(
    mut state: RequestState,
    Path(id): Path<u64>,
) -> ServiceResult<StatusCode> {
    state.session_require_permission(permissions::ACCOUNTS_MANAGE)?;

    state.db.delete_account(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn delete_account_docs(op: TransformOperation) -> TransformOperation {
    op.description("Delete an admin account by id.")
        .tag("accounts")
        .response_with::<204, (), _>(|res| res.description("The account was deleted!"))
        .response_with::<404, (), _>(|res| res.description("The requested account does not exist!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin", "accounts:manage"])
}

#[cfg(test)]
mod tests {
    use sqlx::PgPool;

    use super::*;

    fn account(email: &str) -> models::Account {
        models::Account {
            id: 0,
            name: "John Doe".to_string(),
            email: email.to_string(),
            role: None,
            password_hash: vec![13u8; 32],
        }
    }

    #[sqlx::test]
    async fn account_emails_stay_unique(pool: PgPool) {
        let app_state = AppState::from_pool(pool).await;
        let mut db = DatabaseConnection {
            connection: app_state.pool.acquire().await.unwrap(),
        };

        let first = db
            .store_account(account("john.doe@example.org"))
            .await
            .unwrap();
        let second = db
            .store_account(account("jane.doe@example.org"))
            .await
            .unwrap();

        // a new account must not reuse an existing address
        assert!(matches!(
            check_email_unused(&mut db, "john.doe@example.org", 0).await,
            Err(ServiceError::BadRequest("email", _))
        ));
        // an update may keep its own address
        assert!(check_email_unused(&mut db, "john.doe@example.org", first.id)
            .await
            .is_ok());
        // but must not take another row's address
        assert!(matches!(
            check_email_unused(&mut db, "john.doe@example.org", second.id).await,
            Err(ServiceError::BadRequest("email", _))
        ));
        assert!(check_email_unused(&mut db, "max@example.org", 0)
            .await
            .is_ok());
    }
}
