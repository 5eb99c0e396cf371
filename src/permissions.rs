//! Permission strings and the role mapping.
//!
//! Every mutating or admin-only endpoint names one of the permission
//! strings below. An account is granted a set of permissions through the
//! name of its role; the `ADMIN` sentinel implies every permission.

/// Sentinel permission that implies every other permission.
pub const ADMIN: &str = "admin";

pub const CITIES_MANAGE: &str = "cities:manage";
pub const COINS_MANAGE: &str = "coins:manage";
pub const SIZES_MANAGE: &str = "sizes:manage";
pub const COUPONS_MANAGE: &str = "coupons:manage";
pub const COMPANIES_MANAGE: &str = "companies:manage";
pub const ROLES_MANAGE: &str = "roles:manage";
pub const LOGS_VIEW: &str = "logs:view";
pub const LOCKERS_MANAGE: &str = "lockers:manage";
pub const ACCOUNTS_MANAGE: &str = "accounts:manage";

const MANAGER_PERMISSIONS: &[&str] = &[
    CITIES_MANAGE,
    COINS_MANAGE,
    SIZES_MANAGE,
    COUPONS_MANAGE,
    LOCKERS_MANAGE,
    LOGS_VIEW,
];

const SUPPORT_PERMISSIONS: &[&str] = &[COUPONS_MANAGE, LOGS_VIEW];

/// Static mapping from role name to granted permission strings.
///
/// Unknown role names grant nothing.
pub fn permissions_for_role(role_name: &str) -> &'static [&'static str] {
    match role_name {
        "admin" => &[ADMIN],
        "manager" => MANAGER_PERMISSIONS,
        "support" => SUPPORT_PERMISSIONS,
        _ => &[],
    }
}

/// Pure membership check. The `admin` sentinel implies everything,
/// there is no further hierarchy.
pub fn is_allowed(granted: &[&str], required: &str) -> bool {
    granted.contains(&ADMIN) || granted.contains(&required)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_sentinel_implies_everything() {
        let granted = permissions_for_role("admin");
        assert!(is_allowed(granted, CITIES_MANAGE));
        assert!(is_allowed(granted, ROLES_MANAGE));
        assert!(is_allowed(granted, ADMIN));
    }

    #[test]
    fn membership_check_fails_closed() {
        let granted = permissions_for_role("support");
        assert!(is_allowed(granted, COUPONS_MANAGE));
        assert!(is_allowed(granted, LOGS_VIEW));
        assert!(!is_allowed(granted, CITIES_MANAGE));
        assert!(!is_allowed(granted, ADMIN));
    }

    #[test]
    fn unknown_role_grants_nothing() {
        let granted = permissions_for_role("intern");
        assert!(granted.is_empty());
        assert!(!is_allowed(granted, LOGS_VIEW));
    }
}
