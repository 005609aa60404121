//! Database access layer (MySQL)
//!
//! Free async functions over `&MySqlPool` for reads and
//! `&mut MySqlConnection` for steps that run inside a caller's transaction.

pub mod catalog;
pub mod commissions;
pub mod coupons;
pub mod employees;
pub mod locations;
pub mod orders;
pub mod settings;
pub mod supplier_payments;
pub mod users;
pub mod verifications;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Whether an error is a UNIQUE index violation
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(e) if e.is_unique_violation())
}

/// `?, ?, ?` for an IN list of `n` binds
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_list_placeholders() {
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
    }

    #[test]
    fn row_not_found_is_not_a_unique_violation() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }
}
