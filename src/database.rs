use base64::engine::general_purpose;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::migrate::Migrator;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, Pool, Postgres};

use crate::dcm::DcmClient;
use crate::error::{ServiceError, ServiceResult};
use crate::models;

mod migration;
#[cfg(test)]
mod tests;

#[derive(Clone)]
pub struct AppState {
    pub pool: Pool<Postgres>,
    pub dcm: DcmClient,
}

impl AppState {
    pub async fn connect(url: &str) -> AppState {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .expect("connect to database");

        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: Pool<Postgres>) -> AppState {
        let migrator = Migrator::new(migration::postgresql_migrations())
            .await
            .expect("load migrations");
        migrator.run(&pool).await.expect("run migrations");

        AppState {
            pool,
            dcm: DcmClient::new(),
        }
    }
}

pub struct DatabaseConnection {
    pub connection: PoolConnection<Postgres>,
}

#[derive(FromRow)]
struct CityRow {
    id: i64,
    name: String,
    description: String,
    image_url: String,
}

impl From<CityRow> for models::City {
    fn from(row: CityRow) -> Self {
        models::City {
            id: row.id as u64,
            name: row.name,
            description: row.description,
            image_url: row.image_url,
        }
    }
}

#[derive(FromRow)]
struct CoinRow {
    id: i64,
    description: String,
    value: i32,
}

impl From<CoinRow> for models::Coin {
    fn from(row: CoinRow) -> Self {
        models::Coin {
            id: row.id as u64,
            description: row.description,
            value: row.value,
        }
    }
}

#[derive(FromRow)]
struct LockerSizeRow {
    id: i64,
    name: String,
    image_url: String,
}

impl From<LockerSizeRow> for models::LockerSize {
    fn from(row: LockerSizeRow) -> Self {
        models::LockerSize {
            id: row.id as u64,
            name: row.name,
            image_url: row.image_url,
        }
    }
}

#[derive(FromRow)]
struct CouponRow {
    id: i64,
    code: String,
    used: i32,
    usage_limit: i32,
    valid_from: Option<DateTime<Utc>>,
    valid_until: Option<DateTime<Utc>>,
    discount_type: String,
    discount_value: i32,
}

impl TryFrom<CouponRow> for models::Coupon {
    type Error = ServiceError;

    fn try_from(row: CouponRow) -> ServiceResult<Self> {
        let discount = match row.discount_type.as_str() {
            "fixed_amount" => models::Discount::FixedAmount(row.discount_value),
            "percentage" => models::Discount::Percentage(row.discount_value),
            other => {
                return Err(ServiceError::InternalServerError(format!(
                    "unknown discount type '{}' in coupon {}",
                    other, row.id
                )))
            }
        };

        Ok(models::Coupon {
            id: row.id as u64,
            code: row.code,
            used: row.used,
            usage_limit: row.usage_limit,
            valid_from: row.valid_from,
            valid_until: row.valid_until,
            discount,
        })
    }
}

fn discount_columns(discount: models::Discount) -> (&'static str, i32) {
    match discount {
        models::Discount::FixedAmount(value) => ("fixed_amount", value),
        models::Discount::Percentage(value) => ("percentage", value),
    }
}

#[derive(FromRow)]
struct CompanyRow {
    id: i64,
    name: String,
}

impl From<CompanyRow> for models::Company {
    fn from(row: CompanyRow) -> Self {
        models::Company {
            id: row.id as u64,
            name: row.name,
        }
    }
}

#[derive(FromRow)]
struct RoleRow {
    id: i64,
    name: String,
    company_id: Option<i64>,
}

impl From<RoleRow> for models::Role {
    fn from(row: RoleRow) -> Self {
        models::Role {
            id: row.id as u64,
            name: row.name,
            company_id: row.company_id.map(|id| id as u64),
        }
    }
}

#[derive(FromRow)]
struct ErrorLogRow {
    id: i64,
    text: String,
    timestamp: DateTime<Utc>,
}

impl From<ErrorLogRow> for models::ErrorLog {
    fn from(row: ErrorLogRow) -> Self {
        models::ErrorLog {
            id: row.id as u64,
            text: row.text,
            timestamp: row.timestamp,
        }
    }
}

#[derive(FromRow)]
struct AccountRow {
    id: i64,
    name: String,
    email: String,
    password_hash: Vec<u8>,
    role_id: Option<i64>,
    role_name: Option<String>,
    role_company_id: Option<i64>,
}

impl From<AccountRow> for models::Account {
    fn from(row: AccountRow) -> Self {
        let role = match (row.role_id, row.role_name) {
            (Some(id), Some(name)) => Some(models::Role {
                id: id as u64,
                name,
                company_id: row.role_company_id.map(|id| id as u64),
            }),
            _ => None,
        };

        models::Account {
            id: row.id as u64,
            name: row.name,
            email: row.email,
            role,
            password_hash: row.password_hash,
        }
    }
}

const ACCOUNT_SELECT: &str = r#"
    SELECT a.id, a.name, a.email, a.password_hash,
           r.id AS role_id, r.name AS role_name, r.company_id AS role_company_id
    FROM accounts a
    LEFT JOIN roles r ON r.id = a.role_id
"#;

#[derive(FromRow)]
struct SessionRow {
    account_id: i64,
    token: String,
    valid_until: DateTime<Utc>,
}

impl DatabaseConnection {
    pub async fn get_all_cities(&mut self) -> ServiceResult<Vec<models::City>> {
        let rows = sqlx::query_as::<_, CityRow>(
            "SELECT id, name, description, image_url FROM cities ORDER BY id",
        )
        .fetch_all(&mut *self.connection)
        .await?;

        Ok(rows.into_iter().map(models::City::from).collect())
    }

    pub async fn get_city_by_id(&mut self, id: u64) -> ServiceResult<Option<models::City>> {
        let row = sqlx::query_as::<_, CityRow>(
            "SELECT id, name, description, image_url FROM cities WHERE id = $1",
        )
        .bind(id as i64)
        .fetch_optional(&mut *self.connection)
        .await?;

        Ok(row.map(models::City::from))
    }

    pub async fn store_city(&mut self, mut city: models::City) -> ServiceResult<models::City> {
        if city.id == 0 {
            let (id,): (i64,) = sqlx::query_as(
                "INSERT INTO cities (name, description, image_url) VALUES ($1, $2, $3) RETURNING id",
            )
            .bind(&city.name)
            .bind(&city.description)
            .bind(&city.image_url)
            .fetch_one(&mut *self.connection)
            .await?;
            city.id = id as u64;
        } else {
            let result = sqlx::query(
                "UPDATE cities SET name = $2, description = $3, image_url = $4 WHERE id = $1",
            )
            .bind(city.id as i64)
            .bind(&city.name)
            .bind(&city.description)
            .bind(&city.image_url)
            .execute(&mut *self.connection)
            .await?;
            if result.rows_affected() == 0 {
                return Err(ServiceError::NotFound);
            }
        }

        Ok(city)
    }

    pub async fn delete_city(&mut self, id: u64) -> ServiceResult<()> {
        let result = sqlx::query("DELETE FROM cities WHERE id = $1")
            .bind(id as i64)
            .execute(&mut *self.connection)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound);
        }
        Ok(())
    }

    pub async fn get_all_coins(&mut self) -> ServiceResult<Vec<models::Coin>> {
        let rows =
            sqlx::query_as::<_, CoinRow>("SELECT id, description, value FROM coins ORDER BY id")
                .fetch_all(&mut *self.connection)
                .await?;

        Ok(rows.into_iter().map(models::Coin::from).collect())
    }

    pub async fn get_coin_by_id(&mut self, id: u64) -> ServiceResult<Option<models::Coin>> {
        let row =
            sqlx::query_as::<_, CoinRow>("SELECT id, description, value FROM coins WHERE id = $1")
                .bind(id as i64)
                .fetch_optional(&mut *self.connection)
                .await?;

        Ok(row.map(models::Coin::from))
    }

    pub async fn store_coin(&mut self, mut coin: models::Coin) -> ServiceResult<models::Coin> {
        if coin.id == 0 {
            let (id,): (i64,) =
                sqlx::query_as("INSERT INTO coins (description, value) VALUES ($1, $2) RETURNING id")
                    .bind(&coin.description)
                    .bind(coin.value)
                    .fetch_one(&mut *self.connection)
                    .await?;
            coin.id = id as u64;
        } else {
            let result = sqlx::query("UPDATE coins SET description = $2, value = $3 WHERE id = $1")
                .bind(coin.id as i64)
                .bind(&coin.description)
                .bind(coin.value)
                .execute(&mut *self.connection)
                .await?;
            if result.rows_affected() == 0 {
                return Err(ServiceError::NotFound);
            }
        }

        Ok(coin)
    }

    pub async fn delete_coin(&mut self, id: u64) -> ServiceResult<()> {
        let result = sqlx::query("DELETE FROM coins WHERE id = $1")
            .bind(id as i64)
            .execute(&mut *self.connection)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound);
        }
        Ok(())
    }

    pub async fn get_all_locker_sizes(&mut self) -> ServiceResult<Vec<models::LockerSize>> {
        let rows = sqlx::query_as::<_, LockerSizeRow>(
            "SELECT id, name, image_url FROM locker_sizes ORDER BY id",
        )
        .fetch_all(&mut *self.connection)
        .await?;

        Ok(rows.into_iter().map(models::LockerSize::from).collect())
    }

    pub async fn get_locker_size_by_id(
        &mut self,
        id: u64,
    ) -> ServiceResult<Option<models::LockerSize>> {
        let row = sqlx::query_as::<_, LockerSizeRow>(
            "SELECT id, name, image_url FROM locker_sizes WHERE id = $1",
        )
        .bind(id as i64)
        .fetch_optional(&mut *self.connection)
        .await?;

        Ok(row.map(models::LockerSize::from))
    }

    pub async fn store_locker_size(
        &mut self,
        mut size: models::LockerSize,
    ) -> ServiceResult<models::LockerSize> {
        if size.id == 0 {
            let (id,): (i64,) = sqlx::query_as(
                "INSERT INTO locker_sizes (name, image_url) VALUES ($1, $2) RETURNING id",
            )
            .bind(&size.name)
            .bind(&size.image_url)
            .fetch_one(&mut *self.connection)
            .await?;
            size.id = id as u64;
        } else {
            let result =
                sqlx::query("UPDATE locker_sizes SET name = $2, image_url = $3 WHERE id = $1")
                    .bind(size.id as i64)
                    .bind(&size.name)
                    .bind(&size.image_url)
                    .execute(&mut *self.connection)
                    .await?;
            if result.rows_affected() == 0 {
                return Err(ServiceError::NotFound);
            }
        }

        Ok(size)
    }

    pub async fn delete_locker_size(&mut self, id: u64) -> ServiceResult<()> {
        let result = sqlx::query("DELETE FROM locker_sizes WHERE id = $1")
            .bind(id as i64)
            .execute(&mut *self.connection)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound);
        }
        Ok(())
    }

    pub async fn get_all_coupons(&mut self) -> ServiceResult<Vec<models::Coupon>> {
        let rows = sqlx::query_as::<_, CouponRow>(
            "SELECT id, code, used, usage_limit, valid_from, valid_until, discount_type, discount_value FROM coupons ORDER BY id",
        )
        .fetch_all(&mut *self.connection)
        .await?;

        rows.into_iter().map(models::Coupon::try_from).collect()
    }

    pub async fn get_coupon_by_id(&mut self, id: u64) -> ServiceResult<Option<models::Coupon>> {
        let row = sqlx::query_as::<_, CouponRow>(
            "SELECT id, code, used, usage_limit, valid_from, valid_until, discount_type, discount_value FROM coupons WHERE id = $1",
        )
        .bind(id as i64)
        .fetch_optional(&mut *self.connection)
        .await?;

        row.map(models::Coupon::try_from).transpose()
    }

    pub async fn get_coupon_by_code(
        &mut self,
        code: &str,
    ) -> ServiceResult<Option<models::Coupon>> {
        let row = sqlx::query_as::<_, CouponRow>(
            "SELECT id, code, used, usage_limit, valid_from, valid_until, discount_type, discount_value FROM coupons WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&mut *self.connection)
        .await?;

        row.map(models::Coupon::try_from).transpose()
    }

    pub async fn store_coupon(
        &mut self,
        mut coupon: models::Coupon,
    ) -> ServiceResult<models::Coupon> {
        let (discount_type, discount_value) = discount_columns(coupon.discount);

        if coupon.id == 0 {
            let (id,): (i64,) = sqlx::query_as(
                "INSERT INTO coupons (code, used, usage_limit, valid_from, valid_until, discount_type, discount_value) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
            )
            .bind(&coupon.code)
            .bind(coupon.used)
            .bind(coupon.usage_limit)
            .bind(coupon.valid_from)
            .bind(coupon.valid_until)
            .bind(discount_type)
            .bind(discount_value)
            .fetch_one(&mut *self.connection)
            .await?;
            coupon.id = id as u64;
        } else {
            let result = sqlx::query(
                "UPDATE coupons SET code = $2, used = $3, usage_limit = $4, valid_from = $5, valid_until = $6, discount_type = $7, discount_value = $8 WHERE id = $1",
            )
            .bind(coupon.id as i64)
            .bind(&coupon.code)
            .bind(coupon.used)
            .bind(coupon.usage_limit)
            .bind(coupon.valid_from)
            .bind(coupon.valid_until)
            .bind(discount_type)
            .bind(discount_value)
            .execute(&mut *self.connection)
            .await?;
            if result.rows_affected() == 0 {
                return Err(ServiceError::NotFound);
            }
        }

        Ok(coupon)
    }

    pub async fn delete_coupon(&mut self, id: u64) -> ServiceResult<()> {
        let result = sqlx::query("DELETE FROM coupons WHERE id = $1")
            .bind(id as i64)
            .execute(&mut *self.connection)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound);
        }
        Ok(())
    }

    pub async fn get_all_companies(&mut self) -> ServiceResult<Vec<models::Company>> {
        let rows = sqlx::query_as::<_, CompanyRow>("SELECT id, name FROM companies ORDER BY id")
            .fetch_all(&mut *self.connection)
            .await?;

        Ok(rows.into_iter().map(models::Company::from).collect())
    }

    pub async fn get_company_by_id(&mut self, id: u64) -> ServiceResult<Option<models::Company>> {
        let row = sqlx::query_as::<_, CompanyRow>("SELECT id, name FROM companies WHERE id = $1")
            .bind(id as i64)
            .fetch_optional(&mut *self.connection)
            .await?;

        Ok(row.map(models::Company::from))
    }

    pub async fn store_company(
        &mut self,
        mut company: models::Company,
    ) -> ServiceResult<models::Company> {
        if company.id == 0 {
            let (id,): (i64,) =
                sqlx::query_as("INSERT INTO companies (name) VALUES ($1) RETURNING id")
                    .bind(&company.name)
                    .fetch_one(&mut *self.connection)
                    .await?;
            company.id = id as u64;
        } else {
            let result = sqlx::query("UPDATE companies SET name = $2 WHERE id = $1")
                .bind(company.id as i64)
                .bind(&company.name)
                .execute(&mut *self.connection)
                .await?;
            if result.rows_affected() == 0 {
                return Err(ServiceError::NotFound);
            }
        }

        Ok(company)
    }

    pub async fn delete_company(&mut self, id: u64) -> ServiceResult<()> {
        let result = sqlx::query("DELETE FROM companies WHERE id = $1")
            .bind(id as i64)
            .execute(&mut *self.connection)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound);
        }
        Ok(())
    }

    pub async fn get_all_roles(&mut self) -> ServiceResult<Vec<models::Role>> {
        let rows = sqlx::query_as::<_, RoleRow>("SELECT id, name, company_id FROM roles ORDER BY id")
            .fetch_all(&mut *self.connection)
            .await?;

        Ok(rows.into_iter().map(models::Role::from).collect())
    }

    pub async fn get_role_by_id(&mut self, id: u64) -> ServiceResult<Option<models::Role>> {
        let row = sqlx::query_as::<_, RoleRow>("SELECT id, name, company_id FROM roles WHERE id = $1")
            .bind(id as i64)
            .fetch_optional(&mut *self.connection)
            .await?;

        Ok(row.map(models::Role::from))
    }

    pub async fn store_role(&mut self, mut role: models::Role) -> ServiceResult<models::Role> {
        if role.id == 0 {
            let (id,): (i64,) =
                sqlx::query_as("INSERT INTO roles (name, company_id) VALUES ($1, $2) RETURNING id")
                    .bind(&role.name)
                    .bind(role.company_id.map(|id| id as i64))
                    .fetch_one(&mut *self.connection)
                    .await?;
            role.id = id as u64;
        } else {
            let result = sqlx::query("UPDATE roles SET name = $2, company_id = $3 WHERE id = $1")
                .bind(role.id as i64)
                .bind(&role.name)
                .bind(role.company_id.map(|id| id as i64))
                .execute(&mut *self.connection)
                .await?;
            if result.rows_affected() == 0 {
                return Err(ServiceError::NotFound);
            }
        }

        Ok(role)
    }

    pub async fn delete_role(&mut self, id: u64) -> ServiceResult<()> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id as i64)
            .execute(&mut *self.connection)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound);
        }
        Ok(())
    }

    pub async fn get_all_error_logs(&mut self) -> ServiceResult<Vec<models::ErrorLog>> {
        let rows = sqlx::query_as::<_, ErrorLogRow>(
            "SELECT id, text, timestamp FROM error_logs ORDER BY id DESC",
        )
        .fetch_all(&mut *self.connection)
        .await?;

        Ok(rows.into_iter().map(models::ErrorLog::from).collect())
    }

    pub async fn get_error_log_by_id(
        &mut self,
        id: u64,
    ) -> ServiceResult<Option<models::ErrorLog>> {
        let row = sqlx::query_as::<_, ErrorLogRow>(
            "SELECT id, text, timestamp FROM error_logs WHERE id = $1",
        )
        .bind(id as i64)
        .fetch_optional(&mut *self.connection)
        .await?;

        Ok(row.map(models::ErrorLog::from))
    }

    pub async fn store_error_log(&mut self, text: &str) -> ServiceResult<models::ErrorLog> {
        let row = sqlx::query_as::<_, ErrorLogRow>(
            "INSERT INTO error_logs (text) VALUES ($1) RETURNING id, text, timestamp",
        )
        .bind(text)
        .fetch_one(&mut *self.connection)
        .await?;

        Ok(models::ErrorLog::from(row))
    }

    pub async fn delete_error_log(&mut self, id: u64) -> ServiceResult<()> {
        let result = sqlx::query("DELETE FROM error_logs WHERE id = $1")
            .bind(id as i64)
            .execute(&mut *self.connection)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound);
        }
        Ok(())
    }

    pub async fn get_all_accounts(&mut self) -> ServiceResult<Vec<models::Account>> {
        let query = format!("{} ORDER BY a.id", ACCOUNT_SELECT);
        let rows = sqlx::query_as::<_, AccountRow>(&query)
            .fetch_all(&mut *self.connection)
            .await?;

        Ok(rows.into_iter().map(models::Account::from).collect())
    }

    pub async fn get_account_by_id(&mut self, id: u64) -> ServiceResult<Option<models::Account>> {
        let query = format!("{} WHERE a.id = $1", ACCOUNT_SELECT);
        let row = sqlx::query_as::<_, AccountRow>(&query)
            .bind(id as i64)
            .fetch_optional(&mut *self.connection)
            .await?;

        Ok(row.map(models::Account::from))
    }

    pub async fn get_account_by_email(
        &mut self,
        email: &str,
    ) -> ServiceResult<Option<models::Account>> {
        let query = format!("{} WHERE a.email = $1", ACCOUNT_SELECT);
        let row = sqlx::query_as::<_, AccountRow>(&query)
            .bind(email)
            .fetch_optional(&mut *self.connection)
            .await?;

        Ok(row.map(models::Account::from))
    }

    pub async fn store_account(
        &mut self,
        mut account: models::Account,
    ) -> ServiceResult<models::Account> {
        let role_id = account.role.as_ref().map(|role| role.id as i64);

        if account.id == 0 {
            let (id,): (i64,) = sqlx::query_as(
                "INSERT INTO accounts (name, email, role_id, password_hash) VALUES ($1, $2, $3, $4) RETURNING id",
            )
            .bind(&account.name)
            .bind(&account.email)
            .bind(role_id)
            .bind(&account.password_hash)
            .fetch_one(&mut *self.connection)
            .await?;
            account.id = id as u64;
        } else {
            let result = sqlx::query(
                "UPDATE accounts SET name = $2, email = $3, role_id = $4, password_hash = $5 WHERE id = $1",
            )
            .bind(account.id as i64)
            .bind(&account.name)
            .bind(&account.email)
            .bind(role_id)
            .bind(&account.password_hash)
            .execute(&mut *self.connection)
            .await?;
            if result.rows_affected() == 0 {
                return Err(ServiceError::NotFound);
            }
        }

        // resolve the stored role reference
        self.get_account_by_id(account.id)
            .await?
            .ok_or(ServiceError::NotFound)
    }

    pub async fn delete_account(&mut self, id: u64) -> ServiceResult<()> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id as i64)
            .execute(&mut *self.connection)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound);
        }
        Ok(())
    }

    pub async fn create_session_token(
        &mut self,
        account_id: u64,
        valid_until: DateTime<Utc>,
    ) -> ServiceResult<String> {
        let mut raw = [0u8; 32];
        rand::thread_rng().fill(&mut raw);
        let token = general_purpose::URL_SAFE_NO_PAD.encode(raw);

        sqlx::query("INSERT INTO sessions (token, account_id, valid_until) VALUES ($1, $2, $3)")
            .bind(&token)
            .bind(account_id as i64)
            .bind(valid_until)
            .execute(&mut *self.connection)
            .await?;

        Ok(token)
    }

    pub async fn get_session_by_session_token(
        &mut self,
        token: String,
    ) -> ServiceResult<Option<models::Session>> {
        // expired rows are purged on lookup, the table stays bounded
        sqlx::query("DELETE FROM sessions WHERE valid_until <= NOW()")
            .execute(&mut *self.connection)
            .await?;

        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT account_id, token, valid_until FROM sessions WHERE token = $1 AND valid_until > NOW()",
        )
        .bind(&token)
        .fetch_optional(&mut *self.connection)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let account = self.get_account_by_id(row.account_id as u64).await?;
        Ok(account.map(|account| models::Session {
            account,
            token: row.token,
            valid_until: row.valid_until,
        }))
    }

    pub async fn delete_session_token(&mut self, token: String) -> ServiceResult<()> {
        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(&token)
            .execute(&mut *self.connection)
            .await?;
        Ok(())
    }
}
