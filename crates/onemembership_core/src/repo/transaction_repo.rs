//! Payment gateway and transaction persistence.
//!
//! # Invariants
//! - `nonce` and `out_trade_no` are unique per transaction table.
//! - Subscription transaction ids use `SBT-` with 7 random characters for
//!   users and 20 for service providers; payroll ids use `PRT-` with 20.

use super::{mint_id, query_one, query_rows, text, RepoError, RepoResult};
use crate::model::transaction::{
    PaymentGateway, SpPayrollTransaction, SpSubscriptionTransaction, SubscriptionTransaction,
    TransactionStatus,
};
use crate::util::now_epoch_ms;
use rusqlite::{params, Connection, Row};

pub const TRANSACTION_ID_PREFIX: &str = "SBT-";
pub const PAYROLL_ID_PREFIX: &str = "PRT-";
const TRANSACTION_ID_RANDOM_CHARS: usize = 7;
const SP_TRANSACTION_ID_RANDOM_CHARS: usize = 20;
const PAYROLL_ID_RANDOM_CHARS: usize = 20;

const GATEWAY_SELECT_SQL: &str = "SELECT id, name, created_at FROM payment_gateways";

const TRANSACTION_SELECT_SQL: &str = "SELECT
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
    created_at,
    updated_at
FROM subscription_transactions";

const SP_TRANSACTION_SELECT_SQL: &str = "SELECT
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
    created_at,
    updated_at
FROM sp_subscription_transactions";

const PAYROLL_SELECT_SQL: &str = "SELECT
    id,
    provider_id,
    payed_amount,
    linked_account,
    linked_account_provider,
    status,
    created_at,
    updated_at
FROM sp_payroll_transactions";

pub trait PaymentGatewayRepository {
    fn create_gateway(&self, gateway: &PaymentGateway) -> RepoResult<PaymentGateway>;
    /// Matches the numeric id or the gateway name.
    fn find_gateway(&self, identifier: &str) -> RepoResult<Option<PaymentGateway>>;
    fn all_gateways(&self) -> RepoResult<Vec<PaymentGateway>>;
    fn update_gateway(&self, gateway: &PaymentGateway) -> RepoResult<()>;
    fn delete_gateway(&self, id: i64) -> RepoResult<()>;
}

pub trait SubscriptionTransactionRepository {
    fn create_transaction(
        &self,
        transaction: &SubscriptionTransaction,
    ) -> RepoResult<SubscriptionTransaction>;
    fn find_transaction(&self, id: &str) -> RepoResult<Option<SubscriptionTransaction>>;
    /// Matches user, plan or gateway app id.
    fn find_transactions(&self, identifier: &str) -> RepoResult<Vec<SubscriptionTransaction>>;
    fn update_transaction(&self, transaction: &SubscriptionTransaction) -> RepoResult<()>;
    fn delete_transaction(&self, id: &str) -> RepoResult<()>;
    fn delete_transactions(&self, identifier: &str) -> RepoResult<usize>;
}

pub trait SpSubscriptionTransactionRepository {
    fn create_sp_transaction(
        &self,
        transaction: &SpSubscriptionTransaction,
    ) -> RepoResult<SpSubscriptionTransaction>;
    fn find_sp_transaction(&self, id: &str) -> RepoResult<Option<SpSubscriptionTransaction>>;
    /// Matches provider, plan or gateway app id.
    fn find_sp_transactions(&self, identifier: &str)
        -> RepoResult<Vec<SpSubscriptionTransaction>>;
    fn update_sp_transaction(&self, transaction: &SpSubscriptionTransaction) -> RepoResult<()>;
    fn delete_sp_transaction(&self, id: &str) -> RepoResult<()>;
    fn delete_sp_transactions(&self, identifier: &str) -> RepoResult<usize>;
}

pub trait SpPayrollTransactionRepository {
    fn create_payroll(&self, payroll: &SpPayrollTransaction) -> RepoResult<SpPayrollTransaction>;
    fn find_payroll(&self, id: &str) -> RepoResult<Option<SpPayrollTransaction>>;
    fn find_payrolls_by_provider(&self, provider_id: &str)
        -> RepoResult<Vec<SpPayrollTransaction>>;
    fn update_payroll(&self, payroll: &SpPayrollTransaction) -> RepoResult<()>;
    fn delete_payroll(&self, id: &str) -> RepoResult<()>;
    fn delete_payrolls_by_provider(&self, provider_id: &str) -> RepoResult<usize>;
}

pub struct SqlitePaymentGatewayRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePaymentGatewayRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl PaymentGatewayRepository for SqlitePaymentGatewayRepository<'_> {
    fn create_gateway(&self, gateway: &PaymentGateway) -> RepoResult<PaymentGateway> {
        let created_at = now_epoch_ms();
        self.conn.execute(
            "INSERT INTO payment_gateways (name, created_at) VALUES (?1, ?2);",
            params![gateway.name.as_str(), created_at],
        )?;
        Ok(PaymentGateway {
            id: self.conn.last_insert_rowid(),
            name: gateway.name.clone(),
            created_at,
        })
    }

    fn find_gateway(&self, identifier: &str) -> RepoResult<Option<PaymentGateway>> {
        query_one(
            self.conn,
            &format!("{GATEWAY_SELECT_SQL} WHERE CAST(id AS TEXT) = ?1 OR name = ?1 LIMIT 1"),
            vec![text(identifier)],
            parse_gateway_row,
        )
    }

    fn all_gateways(&self) -> RepoResult<Vec<PaymentGateway>> {
        query_rows(
            self.conn,
            &format!("{GATEWAY_SELECT_SQL} ORDER BY id ASC"),
            Vec::new(),
            parse_gateway_row,
        )
    }

    fn update_gateway(&self, gateway: &PaymentGateway) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE payment_gateways SET name = ?1 WHERE id = ?2;",
            params![gateway.name.as_str(), gateway.id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(gateway.id.to_string()));
        }
        Ok(())
    }

    fn delete_gateway(&self, id: i64) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM payment_gateways WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

pub struct SqliteSubscriptionTransactionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSubscriptionTransactionRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl SubscriptionTransactionRepository for SqliteSubscriptionTransactionRepository<'_> {
    fn create_transaction(
        &self,
        transaction: &SubscriptionTransaction,
    ) -> RepoResult<SubscriptionTransaction> {
        let mut stored = transaction.clone();
        stored.id = mint_id(
            self.conn,
            "subscription_transactions",
            TRANSACTION_ID_PREFIX,
            TRANSACTION_ID_RANDOM_CHARS,
        )?;
        stored.created_at = now_epoch_ms();
        stored.updated_at = stored.created_at;

        self.conn.execute(
            "INSERT INTO subscription_transactions (
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
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17);",
            params![
                stored.id.as_str(),
                stored.user_id.as_str(),
                stored.plan_id.as_str(),
                stored.app_id.as_str(),
                stored.receiver_name.as_str(),
                stored.subject.as_str(),
                stored.received_amount,
                stored.transaction_fee,
                stored.currency_type.as_str(),
                stored.timeout_express,
                stored.nonce.as_str(),
                stored.out_trade_no.as_str(),
                stored.trade_no.as_str(),
                stored.status.as_str(),
                stored.initiated_from.as_str(),
                stored.created_at,
                stored.updated_at,
            ],
        )?;

        Ok(stored)
    }

    fn find_transaction(&self, id: &str) -> RepoResult<Option<SubscriptionTransaction>> {
        query_one(
            self.conn,
            &format!("{TRANSACTION_SELECT_SQL} WHERE id = ?1"),
            vec![text(id)],
            parse_transaction_row,
        )
    }

    fn find_transactions(&self, identifier: &str) -> RepoResult<Vec<SubscriptionTransaction>> {
        query_rows(
            self.conn,
            &format!(
                "{TRANSACTION_SELECT_SQL}
                 WHERE user_id = ?1 OR plan_id = ?1 OR app_id = ?1
                 ORDER BY created_at DESC, id ASC"
            ),
            vec![text(identifier)],
            parse_transaction_row,
        )
    }

    fn update_transaction(&self, transaction: &SubscriptionTransaction) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE subscription_transactions
             SET
                receiver_name = ?1,
                subject = ?2,
                received_amount = ?3,
                transaction_fee = ?4,
                currency_type = ?5,
                timeout_express = ?6,
                trade_no = ?7,
                status = ?8,
                updated_at = ?9
             WHERE id = ?10;",
            params![
                transaction.receiver_name.as_str(),
                transaction.subject.as_str(),
                transaction.received_amount,
                transaction.transaction_fee,
                transaction.currency_type.as_str(),
                transaction.timeout_express,
                transaction.trade_no.as_str(),
                transaction.status.as_str(),
                now_epoch_ms(),
                transaction.id.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(transaction.id.clone()));
        }
        Ok(())
    }

    fn delete_transaction(&self, id: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM subscription_transactions WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn delete_transactions(&self, identifier: &str) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "DELETE FROM subscription_transactions
             WHERE user_id = ?1 OR plan_id = ?1 OR app_id = ?1;",
            [identifier],
        )?;
        Ok(changed)
    }
}

pub struct SqliteSpSubscriptionTransactionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSpSubscriptionTransactionRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl SpSubscriptionTransactionRepository for SqliteSpSubscriptionTransactionRepository<'_> {
    fn create_sp_transaction(
        &self,
        transaction: &SpSubscriptionTransaction,
    ) -> RepoResult<SpSubscriptionTransaction> {
        let mut stored = transaction.clone();
        stored.id = mint_id(
            self.conn,
            "sp_subscription_transactions",
            TRANSACTION_ID_PREFIX,
            SP_TRANSACTION_ID_RANDOM_CHARS,
        )?;
        stored.created_at = now_epoch_ms();
        stored.updated_at = stored.created_at;

        self.conn.execute(
            "INSERT INTO sp_subscription_transactions (
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
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16);",
            params![
                stored.id.as_str(),
                stored.provider_id.as_str(),
                stored.plan_id.as_str(),
                stored.app_id.as_str(),
                stored.receiver_name.as_str(),
                stored.subject.as_str(),
                stored.received_amount,
                stored.transaction_fee,
                stored.currency_type.as_str(),
                stored.timeout_express,
                stored.nonce.as_str(),
                stored.out_trade_no.as_str(),
                stored.trade_no.as_str(),
                stored.status.as_str(),
                stored.created_at,
                stored.updated_at,
            ],
        )?;

        Ok(stored)
    }

    fn find_sp_transaction(&self, id: &str) -> RepoResult<Option<SpSubscriptionTransaction>> {
        query_one(
            self.conn,
            &format!("{SP_TRANSACTION_SELECT_SQL} WHERE id = ?1"),
            vec![text(id)],
            parse_sp_transaction_row,
        )
    }

    fn find_sp_transactions(
        &self,
        identifier: &str,
    ) -> RepoResult<Vec<SpSubscriptionTransaction>> {
        query_rows(
            self.conn,
            &format!(
                "{SP_TRANSACTION_SELECT_SQL}
                 WHERE provider_id = ?1 OR plan_id = ?1 OR app_id = ?1
                 ORDER BY created_at DESC, id ASC"
            ),
            vec![text(identifier)],
            parse_sp_transaction_row,
        )
    }

    fn update_sp_transaction(&self, transaction: &SpSubscriptionTransaction) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE sp_subscription_transactions
             SET
                receiver_name = ?1,
                subject = ?2,
                received_amount = ?3,
                transaction_fee = ?4,
                currency_type = ?5,
                timeout_express = ?6,
                trade_no = ?7,
                status = ?8,
                updated_at = ?9
             WHERE id = ?10;",
            params![
                transaction.receiver_name.as_str(),
                transaction.subject.as_str(),
                transaction.received_amount,
                transaction.transaction_fee,
                transaction.currency_type.as_str(),
                transaction.timeout_express,
                transaction.trade_no.as_str(),
                transaction.status.as_str(),
                now_epoch_ms(),
                transaction.id.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(transaction.id.clone()));
        }
        Ok(())
    }

    fn delete_sp_transaction(&self, id: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM sp_subscription_transactions WHERE id = ?1;",
            [id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn delete_sp_transactions(&self, identifier: &str) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "DELETE FROM sp_subscription_transactions
             WHERE provider_id = ?1 OR plan_id = ?1 OR app_id = ?1;",
            [identifier],
        )?;
        Ok(changed)
    }
}

pub struct SqliteSpPayrollTransactionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSpPayrollTransactionRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl SpPayrollTransactionRepository for SqliteSpPayrollTransactionRepository<'_> {
    fn create_payroll(&self, payroll: &SpPayrollTransaction) -> RepoResult<SpPayrollTransaction> {
        let mut stored = payroll.clone();
        stored.id = mint_id(
            self.conn,
            "sp_payroll_transactions",
            PAYROLL_ID_PREFIX,
            PAYROLL_ID_RANDOM_CHARS,
        )?;
        stored.created_at = now_epoch_ms();
        stored.updated_at = stored.created_at;

        self.conn.execute(
            "INSERT INTO sp_payroll_transactions (
                id,
                provider_id,
                payed_amount,
                linked_account,
                linked_account_provider,
                status,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                stored.id.as_str(),
                stored.provider_id.as_str(),
                stored.payed_amount,
                stored.linked_account.as_str(),
                stored.linked_account_provider.as_str(),
                stored.status.as_str(),
                stored.created_at,
                stored.updated_at,
            ],
        )?;

        Ok(stored)
    }

    fn find_payroll(&self, id: &str) -> RepoResult<Option<SpPayrollTransaction>> {
        query_one(
            self.conn,
            &format!("{PAYROLL_SELECT_SQL} WHERE id = ?1"),
            vec![text(id)],
            parse_payroll_row,
        )
    }

    fn find_payrolls_by_provider(
        &self,
        provider_id: &str,
    ) -> RepoResult<Vec<SpPayrollTransaction>> {
        query_rows(
            self.conn,
            &format!("{PAYROLL_SELECT_SQL} WHERE provider_id = ?1 ORDER BY created_at DESC, id ASC"),
            vec![text(provider_id)],
            parse_payroll_row,
        )
    }

    fn update_payroll(&self, payroll: &SpPayrollTransaction) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE sp_payroll_transactions
             SET
                payed_amount = ?1,
                linked_account = ?2,
                linked_account_provider = ?3,
                status = ?4,
                updated_at = ?5
             WHERE id = ?6;",
            params![
                payroll.payed_amount,
                payroll.linked_account.as_str(),
                payroll.linked_account_provider.as_str(),
                payroll.status.as_str(),
                now_epoch_ms(),
                payroll.id.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(payroll.id.clone()));
        }
        Ok(())
    }

    fn delete_payroll(&self, id: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM sp_payroll_transactions WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn delete_payrolls_by_provider(&self, provider_id: &str) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "DELETE FROM sp_payroll_transactions WHERE provider_id = ?1;",
            [provider_id],
        )?;
        Ok(changed)
    }
}

fn parse_status(raw: String, column: &str) -> RepoResult<TransactionStatus> {
    TransactionStatus::parse(&raw)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid {column} `{raw}`")))
}

fn parse_gateway_row(row: &Row<'_>) -> RepoResult<PaymentGateway> {
    Ok(PaymentGateway {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
    })
}

fn parse_transaction_row(row: &Row<'_>) -> RepoResult<SubscriptionTransaction> {
    Ok(SubscriptionTransaction {
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
        status: parse_status(row.get(13)?, "subscription_transactions.status")?,
        initiated_from: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

fn parse_sp_transaction_row(row: &Row<'_>) -> RepoResult<SpSubscriptionTransaction> {
    Ok(SpSubscriptionTransaction {
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
        status: parse_status(row.get(13)?, "sp_subscription_transactions.status")?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

fn parse_payroll_row(row: &Row<'_>) -> RepoResult<SpPayrollTransaction> {
    Ok(SpPayrollTransaction {
        id: row.get(0)?,
        provider_id: row.get(1)?,
        payed_amount: row.get(2)?,
        linked_account: row.get(3)?,
        linked_account_provider: row.get(4)?,
        status: parse_status(row.get(5)?, "sp_payroll_transactions.status")?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}
