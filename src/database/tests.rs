use std::ops::Add;

use chrono::{Duration, Utc};
use sqlx::PgPool;

use crate::error::ServiceError;
use crate::models::{Account, City, Company, Coupon, Discount, Role};

use super::{AppState, DatabaseConnection};

async fn connect(pool: PgPool) -> DatabaseConnection {
    let _ = env_logger::try_init();
    let app_state = AppState::from_pool(pool).await;
    DatabaseConnection {
        connection: app_state.pool.acquire().await.unwrap(),
    }
}

#[sqlx::test]
async fn test_city_crud(pool: PgPool) {
    let mut db = connect(pool).await;

    let city = City {
        id: 0,
        name: "Centro".to_string(),
        description: String::new(),
        image_url: String::new(),
    };
    let city = db.store_city(city).await.unwrap();
    assert!(city.id != 0);

    // the list reflects the new row
    let cities = db.get_all_cities().await.unwrap();
    assert!(cities.iter().any(|c| c.id == city.id));

    let mut city = db.get_city_by_id(city.id).await.unwrap().unwrap();
    assert_eq!(city.name, "Centro");

    city.description = "Historic center".to_string();
    let city = db.store_city(city).await.unwrap();
    assert_eq!(
        db.get_city_by_id(city.id).await.unwrap().unwrap(),
        city
    );

    db.delete_city(city.id).await.unwrap();
    assert_eq!(db.get_city_by_id(city.id).await.unwrap(), None);
    assert_eq!(
        db.delete_city(city.id).await,
        Err(ServiceError::NotFound)
    );
}

#[sqlx::test]
async fn test_coupon_crud(pool: PgPool) {
    let mut db = connect(pool).await;

    let coupon = Coupon {
        id: 0,
        code: "WELCOME".to_string(),
        used: 0,
        usage_limit: 10,
        valid_from: None,
        valid_until: None,
        discount: Discount::FixedAmount(500),
    };
    let coupon = db.store_coupon(coupon).await.unwrap();
    assert!(coupon.id != 0);

    // the discount type survives the roundtrip
    let stored = db.get_coupon_by_id(coupon.id).await.unwrap().unwrap();
    assert_eq!(stored.discount, Discount::FixedAmount(500));

    let mut stored = db.get_coupon_by_code("WELCOME").await.unwrap().unwrap();
    assert_eq!(stored.id, coupon.id);

    stored.discount = Discount::Percentage(15);
    stored.used = 3;
    let stored = db.store_coupon(stored).await.unwrap();
    let reloaded = db.get_coupon_by_id(stored.id).await.unwrap().unwrap();
    assert_eq!(reloaded.discount, Discount::Percentage(15));
    assert_eq!(reloaded.used, 3);

    db.delete_coupon(stored.id).await.unwrap();
    assert_eq!(db.get_coupon_by_id(stored.id).await.unwrap(), None);
    assert_eq!(db.get_coupon_by_code("WELCOME").await.unwrap(), None);
}

#[sqlx::test]
async fn test_role_and_account_crud(pool: PgPool) {
    let mut db = connect(pool).await;

    let company = db
        .store_company(Company {
            id: 0,
            name: "PickPack GmbH".to_string(),
        })
        .await
        .unwrap();

    let role = db
        .store_role(Role {
            id: 0,
            name: "manager".to_string(),
            company_id: Some(company.id),
        })
        .await
        .unwrap();
    assert!(role.id != 0);

    let account = Account {
        id: 0,
        name: "John Doe".to_string(),
        email: "john.doe@example.org".to_string(),
        role: Some(role.clone()),
        password_hash: vec![13u8; 32],
    };
    let account = db.store_account(account).await.unwrap();
    assert!(account.id != 0);
    assert_eq!(account.role, Some(role.clone()));

    // permissions are derived from the role name
    assert!(crate::permissions::is_allowed(
        account.permissions(),
        crate::permissions::CITIES_MANAGE
    ));
    assert!(!crate::permissions::is_allowed(
        account.permissions(),
        crate::permissions::ROLES_MANAGE
    ));

    let by_email = db
        .get_account_by_email("john.doe@example.org")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_email, account);

    // deleting the role clears the reference but keeps the account
    db.delete_role(role.id).await.unwrap();
    let account = db.get_account_by_id(account.id).await.unwrap().unwrap();
    assert_eq!(account.role, None);

    db.delete_account(account.id).await.unwrap();
    assert_eq!(db.get_account_by_id(account.id).await.unwrap(), None);
}

#[sqlx::test]
async fn test_session_crud(pool: PgPool) {
    let mut db = connect(pool).await;

    let account = db
        .store_account(Account {
            id: 0,
            name: "John Doe".to_string(),
            email: "john.doe@example.org".to_string(),
            role: None,
            password_hash: vec![13u8; 32],
        })
        .await
        .unwrap();

    let token = db
        .create_session_token(account.id, Utc::now().add(Duration::minutes(30)))
        .await
        .unwrap();
    let session = db
        .get_session_by_session_token(token.clone())
        .await
        .unwrap()
        .expect("there is a session for the token");

    assert_eq!(session.account, account);
    assert_eq!(session.token, token);

    db.delete_session_token(token.clone()).await.unwrap();
    assert_eq!(db.get_session_by_session_token(token).await.unwrap(), None);

    // an expired session is not returned and its row is purged
    let token = db
        .create_session_token(account.id, Utc::now() - Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(db.get_session_by_session_token(token).await.unwrap(), None);
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sessions")
        .fetch_one(&mut *db.connection)
        .await
        .unwrap();
    assert_eq!(count, 0);

    // deleting the account invalidates its sessions
    let token = db
        .create_session_token(account.id, Utc::now().add(Duration::minutes(30)))
        .await
        .unwrap();
    db.delete_account(account.id).await.unwrap();
    assert_eq!(db.get_session_by_session_token(token).await.unwrap(), None);
}

#[sqlx::test]
async fn test_error_log_crud(pool: PgPool) {
    let mut db = connect(pool).await;

    let first = db.store_error_log("first failure").await.unwrap();
    let second = db.store_error_log("second failure").await.unwrap();
    assert!(second.id > first.id);

    // newest first
    let logs = db.get_all_error_logs().await.unwrap();
    assert_eq!(logs[0].id, second.id);
    assert_eq!(logs[1].id, first.id);

    let stored = db.get_error_log_by_id(first.id).await.unwrap().unwrap();
    assert_eq!(stored.text, "first failure");

    db.delete_error_log(first.id).await.unwrap();
    assert_eq!(db.get_error_log_by_id(first.id).await.unwrap(), None);
    assert_eq!(
        db.delete_error_log(first.id).await,
        Err(ServiceError::NotFound)
    );
}
