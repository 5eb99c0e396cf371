pub mod accounts;
pub mod auth;
pub mod cities;
pub mod coins;
pub mod companies;
pub mod coupons;
pub mod error_logs;
pub mod lockers;
pub mod roles;
pub mod sizes;

use aide::axum::ApiRouter;

use crate::database::AppState;
use crate::error::{ServiceError, ServiceResult};

pub const MAX_NAME_LENGTH: usize = 120;
pub const MAX_TEXT_LENGTH: usize = 1024;
pub const MAX_URL_LENGTH: usize = 2048;

pub fn router(app_state: AppState) -> ApiRouter {
    ApiRouter::new()
        .merge(auth::router(app_state.clone()))
        .merge(accounts::router(app_state.clone()))
        .merge(cities::router(app_state.clone()))
        .merge(coins::router(app_state.clone()))
        .merge(sizes::router(app_state.clone()))
        .merge(coupons::router(app_state.clone()))
        .merge(companies::router(app_state.clone()))
        .merge(roles::router(app_state.clone()))
        .merge(error_logs::router(app_state.clone()))
        .merge(lockers::router(app_state))
}

pub fn password_hash_create(password: &str) -> ServiceResult<Vec<u8>> {
    let salt: [u8; 16] = rand::random();
    let hash = argon2rs::verifier::Encoded::default2i(password.as_bytes(), &salt, b"", b"");
    Ok(hash.to_u8())
}

pub fn password_hash_verify(hash: &[u8], password: &str) -> ServiceResult<bool> {
    if let Ok(hash) = argon2rs::verifier::Encoded::from_u8(hash) {
        return Ok(hash.verify(password.as_bytes()));
    }
    Ok(false)
}

/// Reject strings above the given length ceiling.
pub fn validate_str(field: &'static str, value: &str, max: usize) -> ServiceResult<()> {
    if value.chars().count() > max {
        return Err(ServiceError::BadRequest(
            field,
            format!("must not be longer than {} characters", max),
        ));
    }
    Ok(())
}

/// Like `validate_str` but the value must not be empty.
pub fn validate_required_str(field: &'static str, value: &str, max: usize) -> ServiceResult<()> {
    if value.trim().is_empty() {
        return Err(ServiceError::BadRequest(field, "must not be empty".to_string()));
    }
    validate_str(field, value, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_roundtrip() {
        let hash = password_hash_create("secret").unwrap();
        assert!(password_hash_verify(&hash, "secret").unwrap());
        assert!(!password_hash_verify(&hash, "wrong").unwrap());
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!password_hash_verify(b"not a hash", "secret").unwrap());
    }

    #[test]
    fn string_validation() {
        assert!(validate_str("name", "Centro", MAX_NAME_LENGTH).is_ok());
        assert!(validate_str("name", &"x".repeat(MAX_NAME_LENGTH + 1), MAX_NAME_LENGTH).is_err());
        assert!(validate_required_str("name", "", MAX_NAME_LENGTH).is_err());
        assert!(validate_required_str("name", "  ", MAX_NAME_LENGTH).is_err());
    }
}
