//! User and user-password persistence.
//!
//! # Responsibility
//! - Store user profiles and their hashed credentials.
//! - Serve keyed lookups, paginated listings and searches.
//!
//! # Invariants
//! - Ids are minted here as `UR-<7 random><row count + 1>`.
//! - `update_user` never rewrites `created_at`.
//! - A password row is removed together with its user.

use super::{
    count_rows, list_page, mint_id, query_one, query_rows, search_page, text, update_column,
    MatchMode, Page, RepoError, RepoResult, SearchTable,
};
use crate::model::account::{User, UserPassword};
use crate::util::now_epoch_ms;
use crate::validation::{is_blank, localize_phone_key};
use rusqlite::types::Value;
use rusqlite::{params, Connection, Row};

pub const USER_ID_PREFIX: &str = "UR-";
const USER_ID_RANDOM_CHARS: usize = 7;

const USER_SELECT_SQL: &str = "SELECT
    id,
    first_name,
    last_name,
    user_name,
    phone_number,
    email,
    created_at,
    updated_at
FROM users";

/// Columns accepted by user searches.
pub const USER_SEARCH_COLUMNS: &[&str] = &[
    "id",
    "first_name",
    "last_name",
    "user_name",
    "phone_number",
    "email",
];

/// Columns accepted by single-value updates.
pub const USER_UPDATE_COLUMNS: &[&str] =
    &["first_name", "last_name", "user_name", "phone_number", "email"];

const USER_TABLE: SearchTable = SearchTable {
    table: "users",
    select_sql: USER_SELECT_SQL,
    order_by: "first_name ASC, id ASC",
    searchable: USER_SEARCH_COLUMNS,
};

/// Repository interface for user profiles.
pub trait UserRepository {
    /// Mints an id, stamps both timestamps and returns the stored row.
    fn create_user(&self, user: &User) -> RepoResult<User>;
    /// Matches id, user name, email or phone number.
    fn find_user(&self, identifier: &str) -> RepoResult<Option<User>>;
    fn find_users(&self, page: u32) -> RepoResult<Page<User>>;
    fn search_users(&self, key: &str, columns: &[&str], page: u32) -> RepoResult<Page<User>>;
    fn search_users_by_prefix(
        &self,
        key: &str,
        columns: &[&str],
        page: u32,
    ) -> RepoResult<Page<User>>;
    fn all_users(&self) -> RepoResult<Vec<User>>;
    fn total_users(&self) -> RepoResult<i64>;
    /// Counts users created within `[start_ms, end_ms]`.
    fn count_users_created_between(&self, start_ms: i64, end_ms: i64) -> RepoResult<i64>;
    fn update_user(&self, user: &User) -> RepoResult<User>;
    fn update_user_value(&self, id: &str, column: &str, value: &str) -> RepoResult<()>;
    fn delete_user(&self, id: &str) -> RepoResult<()>;
}

/// Repository interface for user credentials.
pub trait UserPasswordRepository {
    fn create_user_password(&self, password: &UserPassword) -> RepoResult<()>;
    fn find_user_password(&self, user_id: &str) -> RepoResult<Option<UserPassword>>;
    fn update_user_password(&self, password: &UserPassword) -> RepoResult<()>;
    fn delete_user_password(&self, user_id: &str) -> RepoResult<()>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, user: &User) -> RepoResult<User> {
        let mut stored = user.clone();
        stored.id = mint_id(self.conn, "users", USER_ID_PREFIX, USER_ID_RANDOM_CHARS)?;
        stored.created_at = now_epoch_ms();
        stored.updated_at = stored.created_at;

        self.conn.execute(
            "INSERT INTO users (
                id,
                first_name,
                last_name,
                user_name,
                phone_number,
                email,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                stored.id.as_str(),
                stored.first_name.as_str(),
                stored.last_name.as_str(),
                stored.user_name.as_str(),
                stored.phone_number.as_str(),
                stored.email.as_str(),
                stored.created_at,
                stored.updated_at,
            ],
        )?;

        Ok(stored)
    }

    fn find_user(&self, identifier: &str) -> RepoResult<Option<User>> {
        if is_blank(identifier) {
            return Ok(None);
        }
        query_one(
            self.conn,
            &format!(
                "{USER_SELECT_SQL}
                 WHERE id = ?1 OR user_name = ?1 OR email = ?1 OR phone_number = ?2
                 LIMIT 1"
            ),
            vec![text(identifier), text(&localize_phone_key(identifier))],
            parse_user_row,
        )
    }

    fn find_users(&self, page: u32) -> RepoResult<Page<User>> {
        list_page(self.conn, &USER_TABLE, None, page, parse_user_row)
    }

    fn search_users(&self, key: &str, columns: &[&str], page: u32) -> RepoResult<Page<User>> {
        search_page(
            self.conn,
            &USER_TABLE,
            key,
            MatchMode::Exact,
            columns,
            None,
            page,
            parse_user_row,
        )
    }

    fn search_users_by_prefix(
        &self,
        key: &str,
        columns: &[&str],
        page: u32,
    ) -> RepoResult<Page<User>> {
        search_page(
            self.conn,
            &USER_TABLE,
            key,
            MatchMode::Prefix,
            columns,
            None,
            page,
            parse_user_row,
        )
    }

    fn all_users(&self) -> RepoResult<Vec<User>> {
        query_rows(
            self.conn,
            &format!("{USER_SELECT_SQL} ORDER BY first_name ASC, id ASC"),
            Vec::new(),
            parse_user_row,
        )
    }

    fn total_users(&self) -> RepoResult<i64> {
        count_rows(self.conn, "users")
    }

    fn count_users_created_between(&self, start_ms: i64, end_ms: i64) -> RepoResult<i64> {
        let total = self.conn.query_row(
            "SELECT COUNT(*) FROM users WHERE created_at BETWEEN ?1 AND ?2;",
            params![start_ms, end_ms],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    fn update_user(&self, user: &User) -> RepoResult<User> {
        let updated_at = now_epoch_ms();
        let changed = self.conn.execute(
            "UPDATE users
             SET
                first_name = ?1,
                last_name = ?2,
                user_name = ?3,
                phone_number = ?4,
                email = ?5,
                updated_at = ?6
             WHERE id = ?7;",
            params![
                user.first_name.as_str(),
                user.last_name.as_str(),
                user.user_name.as_str(),
                user.phone_number.as_str(),
                user.email.as_str(),
                updated_at,
                user.id.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(user.id.clone()));
        }

        self.find_user(&user.id)?
            .ok_or_else(|| RepoError::NotFound(user.id.clone()))
    }

    fn update_user_value(&self, id: &str, column: &str, value: &str) -> RepoResult<()> {
        update_column(
            self.conn,
            "users",
            "id",
            id,
            USER_UPDATE_COLUMNS,
            column,
            Value::Text(value.to_string()),
            true,
        )
    }

    fn delete_user(&self, id: &str) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM users WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

/// SQLite-backed user credential repository.
pub struct SqliteUserPasswordRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserPasswordRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl UserPasswordRepository for SqliteUserPasswordRepository<'_> {
    fn create_user_password(&self, password: &UserPassword) -> RepoResult<()> {
        let now = now_epoch_ms();
        self.conn.execute(
            "INSERT INTO user_passwords (user_id, password, salt, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                password.user_id.as_str(),
                password.password.as_str(),
                password.salt.as_str(),
                now,
                now,
            ],
        )?;
        Ok(())
    }

    fn find_user_password(&self, user_id: &str) -> RepoResult<Option<UserPassword>> {
        query_one(
            self.conn,
            "SELECT user_id, password, salt, created_at, updated_at
             FROM user_passwords WHERE user_id = ?1",
            vec![text(user_id)],
            |row| {
                Ok(UserPassword {
                    user_id: row.get(0)?,
                    password: row.get(1)?,
                    salt: row.get(2)?,
                    created_at: row.get(3)?,
                    updated_at: row.get(4)?,
                })
            },
        )
    }

    fn update_user_password(&self, password: &UserPassword) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE user_passwords SET password = ?1, salt = ?2, updated_at = ?3 WHERE user_id = ?4;",
            params![
                password.password.as_str(),
                password.salt.as_str(),
                now_epoch_ms(),
                password.user_id.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(password.user_id.clone()));
        }
        Ok(())
    }

    fn delete_user_password(&self, user_id: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM user_passwords WHERE user_id = ?1;", [user_id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(user_id.to_string()));
        }
        Ok(())
    }
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    Ok(User {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        user_name: row.get(3)?,
        phone_number: row.get(4)?,
        email: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}
