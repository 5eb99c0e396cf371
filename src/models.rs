use chrono::{DateTime, Utc};

/// A city in which lockers are operated.
#[derive(Debug, PartialEq, Clone)]
pub struct City {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub image_url: String,
}

/// A pricing tier. The value is stored in cents.
#[derive(Debug, PartialEq, Clone)]
pub struct Coin {
    pub id: u64,
    pub description: String,
    pub value: i32,
}

/// A physical locker compartment size.
#[derive(Debug, PartialEq, Clone)]
pub struct LockerSize {
    pub id: u64,
    pub name: String,
    pub image_url: String,
}

/// A coupon discount is either a fixed amount in cents or a percentage,
/// never both.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Discount {
    FixedAmount(i32),
    Percentage(i32),
}

#[derive(Debug, PartialEq, Clone)]
pub struct Coupon {
    pub id: u64,
    pub code: String,
    pub used: i32,
    pub usage_limit: i32,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub discount: Discount,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Company {
    pub id: u64,
    pub name: String,
}

/// A role groups admin accounts of a company. Its permission set is not
/// stored per row but derived from the role name, see `crate::permissions`.
#[derive(Debug, PartialEq, Clone)]
pub struct Role {
    pub id: u64,
    pub name: String,
    pub company_id: Option<u64>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ErrorLog {
    pub id: u64,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// An admin panel user.
#[derive(Debug, PartialEq, Clone)]
pub struct Account {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub role: Option<Role>,
    pub password_hash: Vec<u8>,
}

impl Account {
    /// Permission strings granted to this account via its role.
    pub fn permissions(&self) -> &'static [&'static str] {
        match self.role {
            Some(ref role) => crate::permissions::permissions_for_role(&role.name),
            None => &[],
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Session {
    pub account: Account,
    pub token: String,
    pub valid_until: DateTime<Utc>,
}
