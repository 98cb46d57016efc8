//! Cross-table uniqueness probe.
//!
//! # Invariants
//! - Only `(table, column)` pairs from [`UNIQUE_CHECKS`] are ever queried.
//! - Blank values are unique by definition; optional fields stay empty.

use super::{row_exists, RepoError, RepoResult};
use crate::validation::is_blank;
use rusqlite::Connection;

/// Tables and the columns whose values must not repeat.
pub const UNIQUE_CHECKS: &[(&str, &[&str])] = &[
    ("users", &["id", "user_name", "phone_number", "email"]),
    (
        "service_providers",
        &["id", "user_name", "phone_number", "email"],
    ),
    ("projects", &["id", "project_link"]),
    ("feedbacks", &["id"]),
    ("languages", &["code", "name"]),
    ("payment_gateways", &["name"]),
    ("subscription_transactions", &["id", "nonce", "out_trade_no"]),
    (
        "sp_subscription_transactions",
        &["id", "nonce", "out_trade_no"],
    ),
    ("sp_payroll_transactions", &["id"]),
    ("deleted_users", &["id"]),
    ("deleted_service_providers", &["id"]),
];

pub trait UniquenessRepository {
    fn is_unique(&self, table: &str, column: &str, value: &str) -> RepoResult<bool>;
}

pub struct SqliteUniquenessRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUniquenessRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl UniquenessRepository for SqliteUniquenessRepository<'_> {
    fn is_unique(&self, table: &str, column: &str, value: &str) -> RepoResult<bool> {
        let allowed = UNIQUE_CHECKS
            .iter()
            .find(|(name, _)| *name == table)
            .map(|(_, columns)| *columns)
            .ok_or_else(|| RepoError::InvalidColumn(format!("{table}.{column}")))?;
        if !allowed.contains(&column) {
            return Err(RepoError::InvalidColumn(format!("{table}.{column}")));
        }

        if is_blank(value) {
            return Ok(true);
        }

        Ok(!row_exists(self.conn, table, column, value)?)
    }
}
