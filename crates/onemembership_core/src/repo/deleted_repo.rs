//! Trash persistence for removed accounts and their transactions.
//!
//! # Responsibility
//! - Copy account rows into trash tables before the live rows are deleted.
//! - Bulk-copy owned transactions with the owner id replaced by the trashed id.
//!
//! # Invariants
//! - Trash ids are minted as `DUR_`/`DSP_` + 7 random + row count.
//! - The trashed owner id is `<trash id>_<original id>`.

use super::{
    mint_id, query_one, query_rows, search_page, text, MatchMode, Page, RepoResult, SearchTable,
};
use crate::model::account::{ServiceProvider, User};
use crate::model::deleted::{
    DeletedServiceProvider, DeletedSpPayrollTransaction, DeletedSpSubscriptionTransaction,
    DeletedSubscriptionTransaction, DeletedUser,
};
use crate::util::now_epoch_ms;
use crate::validation::{is_blank, localize_phone_key};
use rusqlite::{params, Connection, Row};

pub const DELETED_USER_ID_PREFIX: &str = "DUR_";
pub const DELETED_PROVIDER_ID_PREFIX: &str = "DSP_";
const DELETED_ID_RANDOM_CHARS: usize = 7;

const DELETED_USER_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    first_name,
    last_name,
    user_name,
    phone_number,
    email,
    created_at
FROM deleted_users";

const DELETED_PROVIDER_SELECT_SQL: &str = "SELECT
    id,
    provider_id,
    first_name,
    last_name,
    user_name,
    phone_number,
    email,
    created_at
FROM deleted_service_providers";

pub const DELETED_USER_SEARCH_COLUMNS: &[&str] = &[
    "id",
    "user_id",
    "first_name",
    "last_name",
    "user_name",
    "phone_number",
    "email",
];

pub const DELETED_PROVIDER_SEARCH_COLUMNS: &[&str] = &[
    "id",
    "provider_id",
    "first_name",
    "last_name",
    "user_name",
    "phone_number",
    "email",
];

const DELETED_USER_TABLE: SearchTable = SearchTable {
    table: "deleted_users",
    select_sql: DELETED_USER_SELECT_SQL,
    order_by: "first_name ASC, id ASC",
    searchable: DELETED_USER_SEARCH_COLUMNS,
};

const DELETED_PROVIDER_TABLE: SearchTable = SearchTable {
    table: "deleted_service_providers",
    select_sql: DELETED_PROVIDER_SELECT_SQL,
    order_by: "first_name ASC, id ASC",
    searchable: DELETED_PROVIDER_SEARCH_COLUMNS,
};

pub trait DeletedAccountRepository {
    fn trash_user(&self, user: &User) -> RepoResult<DeletedUser>;
    /// Matches trash id, trashed user id, user name, email or phone number.
    fn find_deleted_user(&self, identifier: &str) -> RepoResult<Option<DeletedUser>>;
    fn search_deleted_users(
        &self,
        key: &str,
        mode: MatchMode,
        columns: &[&str],
        page: u32,
    ) -> RepoResult<Page<DeletedUser>>;

    fn trash_service_provider(&self, provider: &ServiceProvider)
        -> RepoResult<DeletedServiceProvider>;
    fn find_deleted_service_provider(
        &self,
        identifier: &str,
    ) -> RepoResult<Option<DeletedServiceProvider>>;
    fn search_deleted_service_providers(
        &self,
        key: &str,
        mode: MatchMode,
        columns: &[&str],
        page: u32,
    ) -> RepoResult<Page<DeletedServiceProvider>>;
}

pub trait DeletedTransactionRepository {
    /// Copies every live transaction of `user_id`, owned by `trashed_user_id`.
    fn trash_subscription_transactions(
        &self,
        user_id: &str,
        trashed_user_id: &str,
    ) -> RepoResult<usize>;
    fn trash_sp_subscription_transactions(
        &self,
        provider_id: &str,
        trashed_provider_id: &str,
    ) -> RepoResult<usize>;
    fn trash_sp_payroll_transactions(
        &self,
        provider_id: &str,
        trashed_provider_id: &str,
    ) -> RepoResult<usize>;

    fn find_deleted_subscription_transaction(
        &self,
        id: &str,
    ) -> RepoResult<Option<DeletedSubscriptionTransaction>>;
    fn find_deleted_subscription_transactions(
        &self,
        trashed_user_id: &str,
    ) -> RepoResult<Vec<DeletedSubscriptionTransaction>>;
    fn find_deleted_sp_subscription_transaction(
        &self,
        id: &str,
    ) -> RepoResult<Option<DeletedSpSubscriptionTransaction>>;
    fn find_deleted_sp_subscription_transactions(
        &self,
        trashed_provider_id: &str,
    ) -> RepoResult<Vec<DeletedSpSubscriptionTransaction>>;
    fn find_deleted_sp_payroll_transaction(
        &self,
        id: &str,
    ) -> RepoResult<Option<DeletedSpPayrollTransaction>>;
    fn find_deleted_sp_payroll_transactions(
        &self,
        trashed_provider_id: &str,
    ) -> RepoResult<Vec<DeletedSpPayrollTransaction>>;
}

pub struct SqliteDeletedAccountRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDeletedAccountRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl DeletedAccountRepository for SqliteDeletedAccountRepository<'_> {
    fn trash_user(&self, user: &User) -> RepoResult<DeletedUser> {
        let id = mint_id(
            self.conn,
            "deleted_users",
            DELETED_USER_ID_PREFIX,
            DELETED_ID_RANDOM_CHARS,
        )?;
        let deleted = DeletedUser {
            user_id: format!("{id}_{}", user.id),
            id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            user_name: user.user_name.clone(),
            phone_number: user.phone_number.clone(),
            email: user.email.clone(),
            created_at: now_epoch_ms(),
        };

        self.conn.execute(
            "INSERT INTO deleted_users (
                id,
                user_id,
                first_name,
                last_name,
                user_name,
                phone_number,
                email,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                deleted.id.as_str(),
                deleted.user_id.as_str(),
                deleted.first_name.as_str(),
                deleted.last_name.as_str(),
                deleted.user_name.as_str(),
                deleted.phone_number.as_str(),
                deleted.email.as_str(),
                deleted.created_at,
            ],
        )?;

        Ok(deleted)
    }

    fn find_deleted_user(&self, identifier: &str) -> RepoResult<Option<DeletedUser>> {
        if is_blank(identifier) {
            return Ok(None);
        }
        query_one(
            self.conn,
            &format!(
                "{DELETED_USER_SELECT_SQL}
                 WHERE id = ?1 OR user_id = ?1 OR user_name = ?1 OR email = ?1
                    OR phone_number = ?2
                 LIMIT 1"
            ),
            vec![text(identifier), text(&localize_phone_key(identifier))],
            parse_deleted_user_row,
        )
    }

    fn search_deleted_users(
        &self,
        key: &str,
        mode: MatchMode,
        columns: &[&str],
        page: u32,
    ) -> RepoResult<Page<DeletedUser>> {
        search_page(
            self.conn,
            &DELETED_USER_TABLE,
            key,
            mode,
            columns,
            None,
            page,
            parse_deleted_user_row,
        )
    }

    fn trash_service_provider(
        &self,
        provider: &ServiceProvider,
    ) -> RepoResult<DeletedServiceProvider> {
        let id = mint_id(
            self.conn,
            "deleted_service_providers",
            DELETED_PROVIDER_ID_PREFIX,
            DELETED_ID_RANDOM_CHARS,
        )?;
        let deleted = DeletedServiceProvider {
            provider_id: format!("{id}_{}", provider.id),
            id,
            first_name: provider.first_name.clone(),
            last_name: provider.last_name.clone(),
            user_name: provider.user_name.clone(),
            phone_number: provider.phone_number.clone(),
            email: provider.email.clone(),
            created_at: now_epoch_ms(),
        };

        self.conn.execute(
            "INSERT INTO deleted_service_providers (
                id,
                provider_id,
                first_name,
                last_name,
                user_name,
                phone_number,
                email,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                deleted.id.as_str(),
                deleted.provider_id.as_str(),
                deleted.first_name.as_str(),
                deleted.last_name.as_str(),
                deleted.user_name.as_str(),
                deleted.phone_number.as_str(),
                deleted.email.as_str(),
                deleted.created_at,
            ],
        )?;

        Ok(deleted)
    }

    fn find_deleted_service_provider(
        &self,
        identifier: &str,
    ) -> RepoResult<Option<DeletedServiceProvider>> {
        if is_blank(identifier) {
            return Ok(None);
        }
        query_one(
            self.conn,
            &format!(
                "{DELETED_PROVIDER_SELECT_SQL}
                 WHERE id = ?1 OR provider_id = ?1 OR user_name = ?1 OR email = ?1
                    OR phone_number = ?2
                 LIMIT 1"
            ),
            vec![text(identifier), text(&localize_phone_key(identifier))],
            parse_deleted_provider_row,
        )
    }

    fn search_deleted_service_providers(
        &self,
        key: &str,
        mode: MatchMode,
        columns: &[&str],
        page: u32,
    ) -> RepoResult<Page<DeletedServiceProvider>> {
        search_page(
            self.conn,
            &DELETED_PROVIDER_TABLE,
            key,
            mode,
            columns,
            None,
            page,
            parse_deleted_provider_row,
        )
    }
}

pub struct SqliteDeletedTransactionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDeletedTransactionRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl DeletedTransactionRepository for SqliteDeletedTransactionRepository<'_> {
    fn trash_subscription_transactions(
        &self,
        user_id: &str,
        trashed_user_id: &str,
    ) -> RepoResult<usize> {
        let copied = self.conn.execute(
            "INSERT INTO deleted_subscription_transactions (
                id,
                user_id,
                plan_id,
                app_id,
                receiver_name,
                subject,
                received_amount,
                transaction_fee,
                currency_type,
                timeout_express,
                nonce,
                out_trade_no,
                trade_no,
                status,
                initiated_from,
                created_at
            )
            SELECT
                id,
                ?2,
                plan_id,
                app_id,
                receiver_name,
                subject,
                received_amount,
                transaction_fee,
                currency_type,
                timeout_express,
                nonce,
                out_trade_no,
                trade_no,
                status,
                initiated_from,
                ?3
            FROM subscription_transactions
            WHERE user_id = ?1;",
            params![user_id, trashed_user_id, now_epoch_ms()],
        )?;
        Ok(copied)
    }

    fn trash_sp_subscription_transactions(
        &self,
        provider_id: &str,
        trashed_provider_id: &str,
    ) -> RepoResult<usize> {
        let copied = self.conn.execute(
            "INSERT INTO deleted_sp_subscription_transactions (
                id,
                provider_id,
                plan_id,
                app_id,
                receiver_name,
                subject,
                received_amount,
                transaction_fee,
                currency_type,
                timeout_express,
                nonce,
                out_trade_no,
                trade_no,
                status,
                created_at
            )
            SELECT
                id,
                ?2,
                plan_id,
                app_id,
                receiver_name,
                subject,
                received_amount,
                transaction_fee,
                currency_type,
                timeout_express,
                nonce,
                out_trade_no,
                trade_no,
                status,
                ?3
            FROM sp_subscription_transactions
            WHERE provider_id = ?1;",
            params![provider_id, trashed_provider_id, now_epoch_ms()],
        )?;
        Ok(copied)
    }

    fn trash_sp_payroll_transactions(
        &self,
        provider_id: &str,
        trashed_provider_id: &str,
    ) -> RepoResult<usize> {
        let copied = self.conn.execute(
            "INSERT INTO deleted_sp_payroll_transactions (
                id,
                provider_id,
                payed_amount,
                linked_account,
                linked_account_provider,
                status,
                created_at
            )
            SELECT
                id,
                ?2,
                payed_amount,
                linked_account,
                linked_account_provider,
                status,
                ?3
            FROM sp_payroll_transactions
            WHERE provider_id = ?1;",
            params![provider_id, trashed_provider_id, now_epoch_ms()],
        )?;
        Ok(copied)
    }

    fn find_deleted_subscription_transaction(
        &self,
        id: &str,
    ) -> RepoResult<Option<DeletedSubscriptionTransaction>> {
        query_one(
            self.conn,
            &format!("{DELETED_TRANSACTION_SELECT_SQL} WHERE id = ?1"),
            vec![text(id)],
            parse_deleted_transaction_row,
        )
    }

    fn find_deleted_subscription_transactions(
        &self,
        trashed_user_id: &str,
    ) -> RepoResult<Vec<DeletedSubscriptionTransaction>> {
        query_rows(
            self.conn,
            &format!("{DELETED_TRANSACTION_SELECT_SQL} WHERE user_id = ?1 ORDER BY id ASC"),
            vec![text(trashed_user_id)],
            parse_deleted_transaction_row,
        )
    }

    fn find_deleted_sp_subscription_transaction(
        &self,
        id: &str,
    ) -> RepoResult<Option<DeletedSpSubscriptionTransaction>> {
        query_one(
            self.conn,
            &format!("{DELETED_SP_TRANSACTION_SELECT_SQL} WHERE id = ?1"),
            vec![text(id)],
            parse_deleted_sp_transaction_row,
        )
    }

    fn find_deleted_sp_subscription_transactions(
        &self,
        trashed_provider_id: &str,
    ) -> RepoResult<Vec<DeletedSpSubscriptionTransaction>> {
        query_rows(
            self.conn,
            &format!("{DELETED_SP_TRANSACTION_SELECT_SQL} WHERE provider_id = ?1 ORDER BY id ASC"),
            vec![text(trashed_provider_id)],
            parse_deleted_sp_transaction_row,
        )
    }

    fn find_deleted_sp_payroll_transaction(
        &self,
        id: &str,
    ) -> RepoResult<Option<DeletedSpPayrollTransaction>> {
        query_one(
            self.conn,
            &format!("{DELETED_PAYROLL_SELECT_SQL} WHERE id = ?1"),
            vec![text(id)],
            parse_deleted_payroll_row,
        )
    }

    fn find_deleted_sp_payroll_transactions(
        &self,
        trashed_provider_id: &str,
    ) -> RepoResult<Vec<DeletedSpPayrollTransaction>> {
        query_rows(
            self.conn,
            &format!("{DELETED_PAYROLL_SELECT_SQL} WHERE provider_id = ?1 ORDER BY id ASC"),
            vec![text(trashed_provider_id)],
            parse_deleted_payroll_row,
        )
    }
}

const DELETED_TRANSACTION_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    plan_id,
    app_id,
    receiver_name,
    subject,
    received_amount,
    transaction_fee,
    currency_type,
    timeout_express,
    nonce,
    out_trade_no,
    trade_no,
    status,
    initiated_from,
    created_at
FROM deleted_subscription_transactions";

const DELETED_SP_TRANSACTION_SELECT_SQL: &str = "SELECT
    id,
    provider_id,
    plan_id,
    app_id,
    receiver_name,
    subject,
    received_amount,
    transaction_fee,
    currency_type,
    timeout_express,
    nonce,
    out_trade_no,
    trade_no,
    status,
    created_at
FROM deleted_sp_subscription_transactions";

const DELETED_PAYROLL_SELECT_SQL: &str = "SELECT
    id,
    provider_id,
    payed_amount,
    linked_account,
    linked_account_provider,
    status,
    created_at
FROM deleted_sp_payroll_transactions";

fn parse_deleted_user_row(row: &Row<'_>) -> RepoResult<DeletedUser> {
    Ok(DeletedUser {
        id: row.get(0)?,
        user_id: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        user_name: row.get(4)?,
        phone_number: row.get(5)?,
        email: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn parse_deleted_provider_row(row: &Row<'_>) -> RepoResult<DeletedServiceProvider> {
    Ok(DeletedServiceProvider {
        id: row.get(0)?,
        provider_id: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        user_name: row.get(4)?,
        phone_number: row.get(5)?,
        email: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn parse_deleted_transaction_row(row: &Row<'_>) -> RepoResult<DeletedSubscriptionTransaction> {
    Ok(DeletedSubscriptionTransaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        plan_id: row.get(2)?,
        app_id: row.get(3)?,
        receiver_name: row.get(4)?,
        subject: row.get(5)?,
        received_amount: row.get(6)?,
        transaction_fee: row.get(7)?,
        currency_type: row.get(8)?,
        timeout_express: row.get(9)?,
        nonce: row.get(10)?,
        out_trade_no: row.get(11)?,
        trade_no: row.get(12)?,
        status: row.get(13)?,
        initiated_from: row.get(14)?,
        created_at: row.get(15)?,
    })
}

fn parse_deleted_sp_transaction_row(
    row: &Row<'_>,
) -> RepoResult<DeletedSpSubscriptionTransaction> {
    Ok(DeletedSpSubscriptionTransaction {
        id: row.get(0)?,
        provider_id: row.get(1)?,
        plan_id: row.get(2)?,
        app_id: row.get(3)?,
        receiver_name: row.get(4)?,
        subject: row.get(5)?,
        received_amount: row.get(6)?,
        transaction_fee: row.get(7)?,
        currency_type: row.get(8)?,
        timeout_express: row.get(9)?,
        nonce: row.get(10)?,
        out_trade_no: row.get(11)?,
        trade_no: row.get(12)?,
        status: row.get(13)?,
        created_at: row.get(14)?,
    })
}

fn parse_deleted_payroll_row(row: &Row<'_>) -> RepoResult<DeletedSpPayrollTransaction> {
    Ok(DeletedSpPayrollTransaction {
        id: row.get(0)?,
        provider_id: row.get(1)?,
        payed_amount: row.get(2)?,
        linked_account: row.get(3)?,
        linked_account_provider: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
    })
}
