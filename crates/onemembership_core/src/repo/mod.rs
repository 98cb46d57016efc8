//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define one data-access contract per entity.
//! - Isolate SQLite query details from service orchestration.
//! - Mint entity ids and keep them unique.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.
//! - Column names interpolated into SQL always come from a per-table allowlist.
//! - Paginated queries are zero-based and return [`PAGE_SIZE`] rows per page.

use crate::db::{DbError, PAGE_SIZE};
use crate::util::random_string;
use crate::validation::localize_phone_key;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod common_repo;
pub mod deleted_repo;
pub mod feedback_repo;
pub mod language_repo;
pub mod plan_repo;
pub mod preference_repo;
pub mod project_repo;
pub mod provider_repo;
pub mod subscription_repo;
pub mod transaction_repo;
pub mod user_repo;

const MAX_ID_ATTEMPTS: usize = 16;

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Lookup key did not match any row.
    NotFound(String),
    /// Persisted row cannot be converted back into a domain record.
    InvalidData(String),
    /// Caller named a column that is not on the table allowlist.
    InvalidColumn(String),
    /// No unused id could be minted for the table.
    IdExhausted(&'static str),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(key) => write!(f, "record not found: {key}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::InvalidColumn(column) => write!(f, "column is not updatable: {column}"),
            Self::IdExhausted(table) => write!(f, "unable to mint a unique id for {table}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// One page of a listing plus the total number of pages.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_count: u32,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            page_count: 0,
        }
    }
}

/// How a search key is compared against each column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Column equals the key. Phone columns accept local `0...` keys.
    Exact,
    /// Column starts with the key, case-insensitive for ASCII.
    Prefix,
}

/// Static description of a searchable table.
pub(crate) struct SearchTable {
    pub table: &'static str,
    pub select_sql: &'static str,
    pub order_by: &'static str,
    pub searchable: &'static [&'static str],
}

/// Runs an OR-combined search over `columns` and returns one page.
///
/// `filter` adds an AND-ed `column = value` condition.
pub(crate) fn search_page<T>(
    conn: &Connection,
    source: &SearchTable,
    key: &str,
    mode: MatchMode,
    columns: &[&str],
    filter: Option<(&'static str, Value)>,
    page: u32,
    parse: impl Fn(&Row<'_>) -> RepoResult<T>,
) -> RepoResult<Page<T>> {
    if columns.is_empty() {
        return Ok(Page::empty());
    }

    let mut clauses = Vec::with_capacity(columns.len());
    let mut binds: Vec<Value> = Vec::with_capacity(columns.len() + 3);
    for column in columns {
        ensure_column(source.searchable, column)?;
        match mode {
            MatchMode::Exact => {
                clauses.push(format!("{column} = ?"));
                let value = if *column == "phone_number" {
                    localize_phone_key(key)
                } else {
                    key.to_string()
                };
                binds.push(Value::Text(value));
            }
            MatchMode::Prefix => {
                clauses.push(format!("{column} LIKE ? ESCAPE '\\'"));
                binds.push(Value::Text(format!("{}%", escape_like(key))));
            }
        }
    }

    let mut where_sql = format!("({})", clauses.join(" OR "));
    if let Some((column, value)) = filter {
        where_sql.push_str(&format!(" AND {column} = ?"));
        binds.push(value);
    }

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {} WHERE {where_sql}", source.table),
        params_from_iter(binds.iter()),
        |row| row.get(0),
    )?;

    binds.push(Value::Integer(i64::from(PAGE_SIZE)));
    binds.push(Value::Integer(page_offset(page)));
    let sql = format!(
        "{} WHERE {where_sql} ORDER BY {} LIMIT ? OFFSET ?",
        source.select_sql, source.order_by
    );
    let items = query_rows(conn, &sql, binds, parse)?;

    Ok(Page {
        items,
        page_count: page_count(total),
    })
}

/// Lists one page of a table with an optional equality filter.
pub(crate) fn list_page<T>(
    conn: &Connection,
    source: &SearchTable,
    filter: Option<(&'static str, Value)>,
    page: u32,
    parse: impl Fn(&Row<'_>) -> RepoResult<T>,
) -> RepoResult<Page<T>> {
    let (where_sql, mut binds) = match filter {
        Some((column, value)) => (format!(" WHERE {column} = ?"), vec![value]),
        None => (String::new(), Vec::new()),
    };

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {}{where_sql}", source.table),
        params_from_iter(binds.iter()),
        |row| row.get(0),
    )?;

    binds.push(Value::Integer(i64::from(PAGE_SIZE)));
    binds.push(Value::Integer(page_offset(page)));
    let sql = format!(
        "{}{where_sql} ORDER BY {} LIMIT ? OFFSET ?",
        source.select_sql, source.order_by
    );
    let items = query_rows(conn, &sql, binds, parse)?;

    Ok(Page {
        items,
        page_count: page_count(total),
    })
}

/// Executes `sql` and parses every returned row.
pub(crate) fn query_rows<T>(
    conn: &Connection,
    sql: &str,
    binds: Vec<Value>,
    parse: impl Fn(&Row<'_>) -> RepoResult<T>,
) -> RepoResult<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(binds))?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse(row)?);
    }
    Ok(items)
}

/// Executes `sql` and parses the first row, if any.
pub(crate) fn query_one<T>(
    conn: &Connection,
    sql: &str,
    binds: Vec<Value>,
    parse: impl Fn(&Row<'_>) -> RepoResult<T>,
) -> RepoResult<Option<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(binds))?;
    match rows.next()? {
        Some(row) => Ok(Some(parse(row)?)),
        None => Ok(None),
    }
}

/// Updates one allowlisted column of the row keyed by `key_column = key`.
pub(crate) fn update_column(
    conn: &Connection,
    table: &'static str,
    key_column: &'static str,
    key: &str,
    updatable: &'static [&'static str],
    column: &str,
    value: Value,
    touch_updated_at: bool,
) -> RepoResult<()> {
    ensure_column(updatable, column)?;
    let touch = if touch_updated_at {
        ", updated_at = ?"
    } else {
        ""
    };
    let mut binds = vec![value];
    if touch_updated_at {
        binds.push(Value::Integer(crate::util::now_epoch_ms()));
    }
    binds.push(Value::Text(key.to_string()));

    let changed = conn.execute(
        &format!("UPDATE {table} SET {column} = ?{touch} WHERE {key_column} = ?"),
        params_from_iter(binds),
    )?;
    if changed == 0 {
        return Err(RepoError::NotFound(key.to_string()));
    }
    Ok(())
}

/// Mints `<prefix><random><row count + 1>`, retrying until the id is unused.
pub(crate) fn mint_id(
    conn: &Connection,
    table: &'static str,
    prefix: &str,
    random_len: usize,
) -> RepoResult<String> {
    let total = count_rows(conn, table)?;
    for _ in 0..MAX_ID_ATTEMPTS {
        let candidate = format!("{prefix}{}{}", random_string(random_len), total + 1);
        if !row_exists(conn, table, "id", &candidate)? {
            return Ok(candidate);
        }
    }
    Err(RepoError::IdExhausted(table))
}

pub(crate) fn count_rows(conn: &Connection, table: &'static str) -> RepoResult<i64> {
    let total = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get::<_, i64>(0)
    })?;
    Ok(total)
}

pub(crate) fn row_exists(
    conn: &Connection,
    table: &str,
    column: &str,
    value: &str,
) -> RepoResult<bool> {
    let found = conn
        .query_row(
            &format!("SELECT 1 FROM {table} WHERE {column} = ?1 LIMIT 1"),
            [value],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

pub(crate) fn ensure_column(allowed: &[&str], column: &str) -> RepoResult<()> {
    if allowed.contains(&column) {
        Ok(())
    } else {
        Err(RepoError::InvalidColumn(column.to_string()))
    }
}

pub(crate) fn page_count(total: i64) -> u32 {
    let size = i64::from(PAGE_SIZE);
    u32::try_from((total.max(0) + size - 1) / size).unwrap_or(u32::MAX)
}

fn page_offset(page: u32) -> i64 {
    i64::from(page) * i64::from(PAGE_SIZE)
}

fn escape_like(key: &str) -> String {
    let mut escaped = String::with_capacity(key.len());
    for ch in key.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn int_to_bool(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

pub(crate) fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::{escape_like, page_count};

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(page_count(0), 0);
        assert_eq!(page_count(1), 1);
        assert_eq!(page_count(30), 1);
        assert_eq!(page_count(31), 2);
    }

    #[test]
    fn escape_like_escapes_wildcards() {
        assert_eq!(escape_like("a_b%c\\"), "a\\_b\\%c\\\\");
    }
}
