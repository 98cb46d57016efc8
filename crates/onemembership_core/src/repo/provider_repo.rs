//! Service provider, credential and wallet persistence.
//!
//! # Responsibility
//! - Store provider profiles, hashed credentials and earnings wallets.
//! - Serve keyed lookups, paginated listings and searches.
//!
//! # Invariants
//! - Ids are minted here as `SP-<7 random><row count + 1>`.
//! - `update_service_provider` never rewrites `created_at`.
//! - Password and wallet rows are removed together with their provider.

use super::{
    count_rows, list_page, mint_id, query_one, query_rows, search_page, text, update_column,
    MatchMode, Page, RepoError, RepoResult, SearchTable,
};
use crate::model::account::{ServiceProvider, SpPassword, SpWallet};
use crate::util::now_epoch_ms;
use crate::validation::{is_blank, localize_phone_key};
use rusqlite::types::Value;
use rusqlite::{params, Connection, Row};

pub const PROVIDER_ID_PREFIX: &str = "SP-";
const PROVIDER_ID_RANDOM_CHARS: usize = 7;

const PROVIDER_SELECT_SQL: &str = "SELECT
    id,
    first_name,
    last_name,
    user_name,
    phone_number,
    email,
    created_at,
    updated_at
FROM service_providers";

const WALLET_SELECT_SQL: &str = "SELECT
    provider_id,
    running_amount,
    pending_amount,
    linked_account,
    linked_account_provider,
    created_at,
    updated_at
FROM sp_wallets";

/// Wallet columns accepted by single-value updates.
pub const WALLET_UPDATE_COLUMNS: &[&str] = &[
    "running_amount",
    "pending_amount",
    "linked_account",
    "linked_account_provider",
];

/// Columns accepted by provider searches.
pub const PROVIDER_SEARCH_COLUMNS: &[&str] = &[
    "id",
    "first_name",
    "last_name",
    "user_name",
    "phone_number",
    "email",
];

/// Columns accepted by single-value updates.
pub const PROVIDER_UPDATE_COLUMNS: &[&str] =
    &["first_name", "last_name", "user_name", "phone_number", "email"];

const PROVIDER_TABLE: SearchTable = SearchTable {
    table: "service_providers",
    select_sql: PROVIDER_SELECT_SQL,
    order_by: "first_name ASC, id ASC",
    searchable: PROVIDER_SEARCH_COLUMNS,
};

/// Repository interface for service provider profiles.
pub trait ServiceProviderRepository {
    /// Mints an id, stamps both timestamps and returns the stored row.
    fn create_service_provider(&self, provider: &ServiceProvider) -> RepoResult<ServiceProvider>;
    /// Matches id, user name, email or phone number.
    fn find_service_provider(&self, identifier: &str) -> RepoResult<Option<ServiceProvider>>;
    fn find_service_providers(&self, page: u32) -> RepoResult<Page<ServiceProvider>>;
    fn search_service_providers(
        &self,
        key: &str,
        columns: &[&str],
        page: u32,
    ) -> RepoResult<Page<ServiceProvider>>;
    fn search_service_providers_by_prefix(
        &self,
        key: &str,
        columns: &[&str],
        page: u32,
    ) -> RepoResult<Page<ServiceProvider>>;
    fn all_service_providers(&self) -> RepoResult<Vec<ServiceProvider>>;
    fn total_service_providers(&self) -> RepoResult<i64>;
    /// Counts providers created within `[start_ms, end_ms]`.
    fn count_service_providers_created_between(
        &self,
        start_ms: i64,
        end_ms: i64,
    ) -> RepoResult<i64>;
    fn update_service_provider(&self, provider: &ServiceProvider) -> RepoResult<ServiceProvider>;
    fn update_service_provider_value(&self, id: &str, column: &str, value: &str)
        -> RepoResult<()>;
    fn delete_service_provider(&self, id: &str) -> RepoResult<()>;
}

/// Repository interface for service provider credentials.
pub trait SpPasswordRepository {
    fn create_sp_password(&self, password: &SpPassword) -> RepoResult<()>;
    fn find_sp_password(&self, provider_id: &str) -> RepoResult<Option<SpPassword>>;
    fn update_sp_password(&self, password: &SpPassword) -> RepoResult<()>;
    fn delete_sp_password(&self, provider_id: &str) -> RepoResult<()>;
}

/// Repository interface for provider wallets.
pub trait SpWalletRepository {
    fn create_sp_wallet(&self, wallet: &SpWallet) -> RepoResult<SpWallet>;
    fn find_sp_wallet(&self, provider_id: &str) -> RepoResult<Option<SpWallet>>;
    fn update_sp_wallet(&self, wallet: &SpWallet) -> RepoResult<SpWallet>;
    fn update_sp_wallet_value(&self, provider_id: &str, column: &str, value: Value)
        -> RepoResult<()>;
    fn delete_sp_wallet(&self, provider_id: &str) -> RepoResult<()>;
}

/// SQLite-backed service provider repository.
pub struct SqliteServiceProviderRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteServiceProviderRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ServiceProviderRepository for SqliteServiceProviderRepository<'_> {
    fn create_service_provider(&self, provider: &ServiceProvider) -> RepoResult<ServiceProvider> {
        let mut stored = provider.clone();
        stored.id = mint_id(
            self.conn,
            "service_providers",
            PROVIDER_ID_PREFIX,
            PROVIDER_ID_RANDOM_CHARS,
        )?;
        stored.created_at = now_epoch_ms();
        stored.updated_at = stored.created_at;

        self.conn.execute(
            "INSERT INTO service_providers (
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

    fn find_service_provider(&self, identifier: &str) -> RepoResult<Option<ServiceProvider>> {
        if is_blank(identifier) {
            return Ok(None);
        }
        query_one(
            self.conn,
            &format!(
                "{PROVIDER_SELECT_SQL}
                 WHERE id = ?1 OR user_name = ?1 OR email = ?1 OR phone_number = ?2
                 LIMIT 1"
            ),
            vec![text(identifier), text(&localize_phone_key(identifier))],
            parse_service_provider_row,
        )
    }

    fn find_service_providers(&self, page: u32) -> RepoResult<Page<ServiceProvider>> {
        list_page(self.conn, &PROVIDER_TABLE, None, page, parse_service_provider_row)
    }

    fn search_service_providers(
        &self,
        key: &str,
        columns: &[&str],
        page: u32,
    ) -> RepoResult<Page<ServiceProvider>> {
        search_page(
            self.conn,
            &PROVIDER_TABLE,
            key,
            MatchMode::Exact,
            columns,
            None,
            page,
            parse_service_provider_row,
        )
    }

    fn search_service_providers_by_prefix(
        &self,
        key: &str,
        columns: &[&str],
        page: u32,
    ) -> RepoResult<Page<ServiceProvider>> {
        search_page(
            self.conn,
            &PROVIDER_TABLE,
            key,
            MatchMode::Prefix,
            columns,
            None,
            page,
            parse_service_provider_row,
        )
    }

    fn all_service_providers(&self) -> RepoResult<Vec<ServiceProvider>> {
        query_rows(
            self.conn,
            &format!("{PROVIDER_SELECT_SQL} ORDER BY first_name ASC, id ASC"),
            Vec::new(),
            parse_service_provider_row,
        )
    }

    fn total_service_providers(&self) -> RepoResult<i64> {
        count_rows(self.conn, "service_providers")
    }

    fn count_service_providers_created_between(
        &self,
        start_ms: i64,
        end_ms: i64,
    ) -> RepoResult<i64> {
        let total = self.conn.query_row(
            "SELECT COUNT(*) FROM service_providers WHERE created_at BETWEEN ?1 AND ?2;",
            params![start_ms, end_ms],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    fn update_service_provider(&self, provider: &ServiceProvider) -> RepoResult<ServiceProvider> {
        let updated_at = now_epoch_ms();
        let changed = self.conn.execute(
            "UPDATE service_providers
             SET
                first_name = ?1,
                last_name = ?2,
                user_name = ?3,
                phone_number = ?4,
                email = ?5,
                updated_at = ?6
             WHERE id = ?7;",
            params![
                provider.first_name.as_str(),
                provider.last_name.as_str(),
                provider.user_name.as_str(),
                provider.phone_number.as_str(),
                provider.email.as_str(),
                updated_at,
                provider.id.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(provider.id.clone()));
        }

        self.find_service_provider(&provider.id)?
            .ok_or_else(|| RepoError::NotFound(provider.id.clone()))
    }

    fn update_service_provider_value(
        &self,
        id: &str,
        column: &str,
        value: &str,
    ) -> RepoResult<()> {
        update_column(
            self.conn,
            "service_providers",
            "id",
            id,
            PROVIDER_UPDATE_COLUMNS,
            column,
            Value::Text(value.to_string()),
            true,
        )
    }

    fn delete_service_provider(&self, id: &str) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM service_providers WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

/// SQLite-backed service provider credential repository.
pub struct SqliteSpPasswordRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSpPasswordRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl SpPasswordRepository for SqliteSpPasswordRepository<'_> {
    fn create_sp_password(&self, password: &SpPassword) -> RepoResult<()> {
        let now = now_epoch_ms();
        self.conn.execute(
            "INSERT INTO sp_passwords (provider_id, password, salt, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                password.provider_id.as_str(),
                password.password.as_str(),
                password.salt.as_str(),
                now,
                now,
            ],
        )?;
        Ok(())
    }

    fn find_sp_password(&self, provider_id: &str) -> RepoResult<Option<SpPassword>> {
        query_one(
            self.conn,
            "SELECT provider_id, password, salt, created_at, updated_at
             FROM sp_passwords WHERE provider_id = ?1",
            vec![text(provider_id)],
            |row| {
                Ok(SpPassword {
                    provider_id: row.get(0)?,
                    password: row.get(1)?,
                    salt: row.get(2)?,
                    created_at: row.get(3)?,
                    updated_at: row.get(4)?,
                })
            },
        )
    }

    fn update_sp_password(&self, password: &SpPassword) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE sp_passwords
             SET password = ?1, salt = ?2, updated_at = ?3
             WHERE provider_id = ?4;",
            params![
                password.password.as_str(),
                password.salt.as_str(),
                now_epoch_ms(),
                password.provider_id.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(password.provider_id.clone()));
        }
        Ok(())
    }

    fn delete_sp_password(&self, provider_id: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM sp_passwords WHERE provider_id = ?1;", [provider_id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(provider_id.to_string()));
        }
        Ok(())
    }
}

pub struct SqliteSpWalletRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSpWalletRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl SpWalletRepository for SqliteSpWalletRepository<'_> {
    fn create_sp_wallet(&self, wallet: &SpWallet) -> RepoResult<SpWallet> {
        let mut stored = wallet.clone();
        stored.created_at = now_epoch_ms();
        stored.updated_at = stored.created_at;

        self.conn.execute(
            "INSERT INTO sp_wallets (
                provider_id,
                running_amount,
                pending_amount,
                linked_account,
                linked_account_provider,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                stored.provider_id.as_str(),
                stored.running_amount,
                stored.pending_amount,
                stored.linked_account.as_str(),
                stored.linked_account_provider.as_str(),
                stored.created_at,
                stored.updated_at,
            ],
        )?;

        Ok(stored)
    }

    fn find_sp_wallet(&self, provider_id: &str) -> RepoResult<Option<SpWallet>> {
        query_one(
            self.conn,
            &format!("{WALLET_SELECT_SQL} WHERE provider_id = ?1"),
            vec![text(provider_id)],
            parse_wallet_row,
        )
    }

    fn update_sp_wallet(&self, wallet: &SpWallet) -> RepoResult<SpWallet> {
        let changed = self.conn.execute(
            "UPDATE sp_wallets
             SET
                running_amount = ?1,
                pending_amount = ?2,
                linked_account = ?3,
                linked_account_provider = ?4,
                updated_at = ?5
             WHERE provider_id = ?6;",
            params![
                wallet.running_amount,
                wallet.pending_amount,
                wallet.linked_account.as_str(),
                wallet.linked_account_provider.as_str(),
                now_epoch_ms(),
                wallet.provider_id.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(wallet.provider_id.clone()));
        }

        self.find_sp_wallet(&wallet.provider_id)?
            .ok_or_else(|| RepoError::NotFound(wallet.provider_id.clone()))
    }

    fn update_sp_wallet_value(
        &self,
        provider_id: &str,
        column: &str,
        value: Value,
    ) -> RepoResult<()> {
        update_column(
            self.conn,
            "sp_wallets",
            "provider_id",
            provider_id,
            WALLET_UPDATE_COLUMNS,
            column,
            value,
            true,
        )
    }

    fn delete_sp_wallet(&self, provider_id: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM sp_wallets WHERE provider_id = ?1;",
            [provider_id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(provider_id.to_string()));
        }
        Ok(())
    }
}

fn parse_wallet_row(row: &Row<'_>) -> RepoResult<SpWallet> {
    Ok(SpWallet {
        provider_id: row.get(0)?,
        running_amount: row.get(1)?,
        pending_amount: row.get(2)?,
        linked_account: row.get(3)?,
        linked_account_provider: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn parse_service_provider_row(row: &Row<'_>) -> RepoResult<ServiceProvider> {
    Ok(ServiceProvider {
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
