//! Payment gateways, payment transactions, payouts and Telebirr checkout.
//!
//! # Invariants
//! - A nonce or out trade number is never reused across member and provider
//!   payments.
//! - A checkout url is only returned once its pending transaction is stored.

use super::common_service::CommonService;
use super::{log_failure, map_repo_error, ServiceError, ServiceResult};
use crate::logging::TRANSACTION_LOG;
use crate::model::transaction::{
    InitiatedFrom, PaymentGateway, SpPayrollTransaction, SpSubscriptionTransaction,
    SubscriptionTransaction, TransactionStatus,
};
use crate::payment::telebirr::{mint_nonce, out_trade_no, TIMEOUT_EXPRESS};
use crate::payment::{
    PaymentError, PaymentTransport, TelebirrClient, UreqTransport, WebPayOrder,
};
use crate::repo::transaction_repo::{
    PaymentGatewayRepository, SpPayrollTransactionRepository, SpSubscriptionTransactionRepository,
    SqlitePaymentGatewayRepository, SqliteSpPayrollTransactionRepository,
    SqliteSpSubscriptionTransactionRepository, SqliteSubscriptionTransactionRepository,
    SubscriptionTransactionRepository,
};
use crate::util::now_epoch_secs;
use crate::validation::{char_len, is_blank, ErrMap};
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;

const MODULE: &str = "transaction";

pub const MAX_GATEWAY_NAME_CHARS: usize = 1000;
/// Attempts at minting an unused nonce before giving up.
pub const MAX_NONCE_ATTEMPTS: usize = 5;

const TRANSACTION_TABLES: &[&str] = &[
    "subscription_transactions",
    "sp_subscription_transactions",
];

static SUBJECT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_]+[ \t\r\n\f0-9A-Za-z_]*$").expect("valid subject regex")
});

/// A member checkout request.
#[derive(Debug, Clone, PartialEq)]
pub struct WebPayment<'a> {
    pub user_id: &'a str,
    pub plan_id: &'a str,
    pub receiver_name: &'a str,
    pub subject: &'a str,
    pub currency_type: &'a str,
    pub initiated_from: InitiatedFrom,
    /// Amount credited to the provider, before the gateway fee.
    pub received_amount: f64,
}

pub struct TransactionService<'conn, T = UreqTransport> {
    gateways: SqlitePaymentGatewayRepository<'conn>,
    transactions: SqliteSubscriptionTransactionRepository<'conn>,
    sp_transactions: SqliteSpSubscriptionTransactionRepository<'conn>,
    payrolls: SqliteSpPayrollTransactionRepository<'conn>,
    common: CommonService<'conn>,
    telebirr: Option<TelebirrClient<T>>,
    nonce_source: fn() -> String,
}

impl<'conn> TransactionService<'conn, UreqTransport> {
    /// Service without a payment gateway; checkout requests fail.
    pub fn new(conn: &'conn Connection) -> Self {
        Self::build(conn, None)
    }
}

impl<'conn, T: PaymentTransport> TransactionService<'conn, T> {
    pub fn with_telebirr(conn: &'conn Connection, telebirr: TelebirrClient<T>) -> Self {
        Self::build(conn, Some(telebirr))
    }

    fn build(conn: &'conn Connection, telebirr: Option<TelebirrClient<T>>) -> Self {
        Self {
            gateways: SqlitePaymentGatewayRepository::new(conn),
            transactions: SqliteSubscriptionTransactionRepository::new(conn),
            sp_transactions: SqliteSpSubscriptionTransactionRepository::new(conn),
            payrolls: SqliteSpPayrollTransactionRepository::new(conn),
            common: CommonService::new(conn),
            telebirr,
            nonce_source: mint_nonce,
        }
    }

    /// Replaces the checkout nonce generator.
    pub fn with_nonce_source(mut self, nonce_source: fn() -> String) -> Self {
        self.nonce_source = nonce_source;
        self
    }

    pub fn add_payment_gateway(&self, gateway: &PaymentGateway) -> ServiceResult<PaymentGateway> {
        let stored = self.gateways.create_gateway(gateway).map_err(|err| {
            log_failure(
                MODULE,
                "payment_gateway_add",
                "unable to add new payment gateway",
                &err,
            )
        })?;
        info!(
            target: TRANSACTION_LOG,
            "event=payment_gateway_add module={} status=ok id={} name={}",
            MODULE,
            stored.id,
            stored.name
        );
        Ok(stored)
    }

    /// Checks the gateway name; uniqueness only applies to new or renamed
    /// gateways.
    pub fn validate_payment_gateway(&self, gateway: &PaymentGateway) -> ErrMap {
        let mut errors = ErrMap::new();
        if is_blank(&gateway.name) {
            errors.insert("name", "gateway name can not be empty");
            return errors;
        }
        if char_len(&gateway.name) > MAX_GATEWAY_NAME_CHARS {
            errors.insert(
                "name",
                "gateway name should not be longer than 1000 characters",
            );
            return errors;
        }

        let renamed = if gateway.id == 0 {
            true
        } else {
            match self.gateways.find_gateway(&gateway.id.to_string()) {
                Ok(Some(previous)) => previous.name != gateway.name,
                _ => false,
            }
        };
        if renamed && !self.common.is_unique("name", &gateway.name, "payment_gateways") {
            errors.insert("name", "gateway name already exists");
        }
        errors
    }

    /// Finds a gateway by numeric id or name.
    pub fn find_payment_gateway(&self, identifier: &str) -> ServiceResult<PaymentGateway> {
        if is_blank(identifier) {
            return Err(ServiceError::not_found("no payment gateway found"));
        }
        match self.gateways.find_gateway(identifier) {
            Ok(Some(gateway)) => Ok(gateway),
            Ok(None) => Err(ServiceError::not_found("no payment gateway found")),
            Err(err) => Err(log_failure(
                MODULE,
                "payment_gateway_find",
                "no payment gateway found",
                &err,
            )),
        }
    }

    pub fn all_payment_gateways(&self) -> Vec<PaymentGateway> {
        self.gateways.all_gateways().unwrap_or_else(|err| {
            log_failure(
                MODULE,
                "payment_gateway_all",
                "unable to list payment gateways",
                &err,
            );
            Vec::new()
        })
    }

    pub fn update_payment_gateway(&self, gateway: &PaymentGateway) -> ServiceResult<()> {
        self.gateways.update_gateway(gateway).map_err(|err| {
            map_repo_error(
                MODULE,
                "payment_gateway_update",
                "no payment gateway found",
                "unable to update payment gateway",
                err,
            )
        })?;
        info!(
            target: TRANSACTION_LOG,
            "event=payment_gateway_update module={} status=ok id={}", MODULE, gateway.id
        );
        Ok(())
    }

    pub fn delete_payment_gateway(&self, identifier: &str) -> ServiceResult<PaymentGateway> {
        let gateway = self.find_payment_gateway(identifier)?;
        self.gateways.delete_gateway(gateway.id).map_err(|err| {
            map_repo_error(
                MODULE,
                "payment_gateway_delete",
                "no payment gateway found",
                "unable to delete payment gateway",
                err,
            )
        })?;
        info!(
            target: TRANSACTION_LOG,
            "event=payment_gateway_delete module={} status=ok id={}", MODULE, gateway.id
        );
        Ok(gateway)
    }

    pub fn add_subscription_transaction(
        &self,
        transaction: &SubscriptionTransaction,
    ) -> ServiceResult<SubscriptionTransaction> {
        let stored = self
            .transactions
            .create_transaction(transaction)
            .map_err(|err| {
                log_failure(
                    MODULE,
                    "subscription_transaction_add",
                    "unable to add new subscription transaction",
                    &err,
                )
            })?;
        info!(
            target: TRANSACTION_LOG,
            "event=subscription_transaction_add module={} status=ok id={} user_id={} out_trade_no={}",
            MODULE,
            stored.id,
            stored.user_id,
            stored.out_trade_no
        );
        Ok(stored)
    }

    pub fn validate_subscription_transaction(
        &self,
        transaction: &SubscriptionTransaction,
    ) -> ErrMap {
        let mut errors = ErrMap::new();
        self.check_trade_ids(&transaction.nonce, &transaction.out_trade_no, &mut errors);
        errors
    }

    fn check_trade_ids(&self, nonce: &str, out_trade_no: &str, errors: &mut ErrMap) {
        let unused = |column: &str, value: &str| {
            TRANSACTION_TABLES
                .iter()
                .all(|table| self.common.is_unique(column, value, table))
        };
        if !unused("nonce", nonce) {
            errors.insert("nonce", "subscription transaction nonce should be unique");
        }
        if !unused("out_trade_no", out_trade_no) {
            errors.insert(
                "out_trade_no",
                "subscription transaction out trade number should be unique",
            );
        }
    }

    pub fn find_subscription_transaction(
        &self,
        id: &str,
    ) -> ServiceResult<SubscriptionTransaction> {
        if is_blank(id) {
            return Err(ServiceError::not_found("no subscription transaction found"));
        }
        match self.transactions.find_transaction(id) {
            Ok(Some(transaction)) => Ok(transaction),
            Ok(None) => Err(ServiceError::not_found("no subscription transaction found")),
            Err(err) => Err(log_failure(
                MODULE,
                "subscription_transaction_find",
                "no subscription transaction found",
                &err,
            )),
        }
    }

    /// Lists transactions whose user, plan or app id is `identifier`.
    pub fn find_multiple_subscription_transactions(
        &self,
        identifier: &str,
    ) -> Vec<SubscriptionTransaction> {
        if is_blank(identifier) {
            return Vec::new();
        }
        self.transactions
            .find_transactions(identifier)
            .unwrap_or_else(|err| {
                log_failure(
                    MODULE,
                    "subscription_transaction_find_multiple",
                    "no subscription transaction found",
                    &err,
                );
                Vec::new()
            })
    }

    pub fn update_subscription_transaction(
        &self,
        transaction: &SubscriptionTransaction,
    ) -> ServiceResult<()> {
        self.transactions
            .update_transaction(transaction)
            .map_err(|err| {
                map_repo_error(
                    MODULE,
                    "subscription_transaction_update",
                    "no subscription transaction found",
                    "unable to update subscription transaction",
                    err,
                )
            })?;
        info!(
            target: TRANSACTION_LOG,
            "event=subscription_transaction_update module={} status=ok id={} status_value={}",
            MODULE,
            transaction.id,
            transaction.status.as_str()
        );
        Ok(())
    }

    pub fn delete_subscription_transaction(
        &self,
        id: &str,
    ) -> ServiceResult<SubscriptionTransaction> {
        let transaction = self.find_subscription_transaction(id)?;
        self.transactions
            .delete_transaction(&transaction.id)
            .map_err(|err| {
                map_repo_error(
                    MODULE,
                    "subscription_transaction_delete",
                    "no subscription transaction found",
                    "unable to delete subscription transaction",
                    err,
                )
            })?;
        info!(
            target: TRANSACTION_LOG,
            "event=subscription_transaction_delete module={} status=ok id={}",
            MODULE,
            transaction.id
        );
        Ok(transaction)
    }

    pub fn delete_multiple_subscription_transactions(
        &self,
        identifier: &str,
    ) -> Vec<SubscriptionTransaction> {
        let transactions = self.find_multiple_subscription_transactions(identifier);
        if transactions.is_empty() {
            return transactions;
        }
        match self.transactions.delete_transactions(identifier) {
            Ok(deleted) => {
                info!(
                    target: TRANSACTION_LOG,
                    "event=subscription_transaction_delete_multiple module={} status=ok deleted={}",
                    MODULE,
                    deleted
                );
                transactions
            }
            Err(err) => {
                log_failure(
                    MODULE,
                    "subscription_transaction_delete_multiple",
                    "unable to delete subscription transactions",
                    &err,
                );
                Vec::new()
            }
        }
    }

    pub fn add_sp_subscription_transaction(
        &self,
        transaction: &SpSubscriptionTransaction,
    ) -> ServiceResult<SpSubscriptionTransaction> {
        let stored = self
            .sp_transactions
            .create_sp_transaction(transaction)
            .map_err(|err| {
                log_failure(
                    MODULE,
                    "sp_subscription_transaction_add",
                    "unable to add new subscription transaction",
                    &err,
                )
            })?;
        info!(
            target: TRANSACTION_LOG,
            "event=sp_subscription_transaction_add module={} status=ok id={} provider_id={}",
            MODULE,
            stored.id,
            stored.provider_id
        );
        Ok(stored)
    }

    /// Same trade id checks as member payments, plus a plain-word subject.
    pub fn validate_sp_subscription_transaction(
        &self,
        transaction: &SpSubscriptionTransaction,
    ) -> ErrMap {
        let mut errors = ErrMap::new();
        if !SUBJECT_RE.is_match(&transaction.subject) {
            errors.insert(
                "subject",
                "subscription transaction subject should not contain any special characters",
            );
        }
        self.check_trade_ids(&transaction.nonce, &transaction.out_trade_no, &mut errors);
        errors
    }

    pub fn find_sp_subscription_transaction(
        &self,
        id: &str,
    ) -> ServiceResult<SpSubscriptionTransaction> {
        if is_blank(id) {
            return Err(ServiceError::not_found("no subscription transaction found"));
        }
        match self.sp_transactions.find_sp_transaction(id) {
            Ok(Some(transaction)) => Ok(transaction),
            Ok(None) => Err(ServiceError::not_found("no subscription transaction found")),
            Err(err) => Err(log_failure(
                MODULE,
                "sp_subscription_transaction_find",
                "no subscription transaction found",
                &err,
            )),
        }
    }

    /// Lists transactions whose provider, plan or app id is `identifier`.
    pub fn find_multiple_sp_subscription_transactions(
        &self,
        identifier: &str,
    ) -> Vec<SpSubscriptionTransaction> {
        if is_blank(identifier) {
            return Vec::new();
        }
        self.sp_transactions
            .find_sp_transactions(identifier)
            .unwrap_or_else(|err| {
                log_failure(
                    MODULE,
                    "sp_subscription_transaction_find_multiple",
                    "no subscription transaction found",
                    &err,
                );
                Vec::new()
            })
    }

    pub fn update_sp_subscription_transaction(
        &self,
        transaction: &SpSubscriptionTransaction,
    ) -> ServiceResult<()> {
        self.sp_transactions
            .update_sp_transaction(transaction)
            .map_err(|err| {
                map_repo_error(
                    MODULE,
                    "sp_subscription_transaction_update",
                    "no subscription transaction found",
                    "unable to update subscription transaction",
                    err,
                )
            })?;
        info!(
            target: TRANSACTION_LOG,
            "event=sp_subscription_transaction_update module={} status=ok id={}",
            MODULE,
            transaction.id
        );
        Ok(())
    }

    pub fn delete_sp_subscription_transaction(
        &self,
        id: &str,
    ) -> ServiceResult<SpSubscriptionTransaction> {
        let transaction = self.find_sp_subscription_transaction(id)?;
        self.sp_transactions
            .delete_sp_transaction(&transaction.id)
            .map_err(|err| {
                map_repo_error(
                    MODULE,
                    "sp_subscription_transaction_delete",
                    "no subscription transaction found",
                    "unable to delete subscription transaction",
                    err,
                )
            })?;
        info!(
            target: TRANSACTION_LOG,
            "event=sp_subscription_transaction_delete module={} status=ok id={}",
            MODULE,
            transaction.id
        );
        Ok(transaction)
    }

    pub fn delete_multiple_sp_subscription_transactions(
        &self,
        identifier: &str,
    ) -> Vec<SpSubscriptionTransaction> {
        let transactions = self.find_multiple_sp_subscription_transactions(identifier);
        if transactions.is_empty() {
            return transactions;
        }
        match self.sp_transactions.delete_sp_transactions(identifier) {
            Ok(deleted) => {
                info!(
                    target: TRANSACTION_LOG,
                    "event=sp_subscription_transaction_delete_multiple module={} status=ok deleted={}",
                    MODULE,
                    deleted
                );
                transactions
            }
            Err(err) => {
                log_failure(
                    MODULE,
                    "sp_subscription_transaction_delete_multiple",
                    "unable to delete subscription transactions",
                    &err,
                );
                Vec::new()
            }
        }
    }

    pub fn add_sp_payroll_transaction(
        &self,
        payroll: &SpPayrollTransaction,
    ) -> ServiceResult<SpPayrollTransaction> {
        let stored = self.payrolls.create_payroll(payroll).map_err(|err| {
            log_failure(
                MODULE,
                "sp_payroll_add",
                "unable to add new payroll transaction",
                &err,
            )
        })?;
        info!(
            target: TRANSACTION_LOG,
            "event=sp_payroll_add module={} status=ok id={} provider_id={} payed_amount={:.2}",
            MODULE,
            stored.id,
            stored.provider_id,
            stored.payed_amount
        );
        Ok(stored)
    }

    pub fn find_sp_payroll_transaction(&self, id: &str) -> ServiceResult<SpPayrollTransaction> {
        if is_blank(id) {
            return Err(ServiceError::not_found("no payroll transaction found"));
        }
        match self.payrolls.find_payroll(id) {
            Ok(Some(payroll)) => Ok(payroll),
            Ok(None) => Err(ServiceError::not_found("no payroll transaction found")),
            Err(err) => Err(log_failure(
                MODULE,
                "sp_payroll_find",
                "no payroll transaction found",
                &err,
            )),
        }
    }

    pub fn find_multiple_sp_payroll_transactions(
        &self,
        provider_id: &str,
    ) -> Vec<SpPayrollTransaction> {
        if is_blank(provider_id) {
            return Vec::new();
        }
        self.payrolls
            .find_payrolls_by_provider(provider_id)
            .unwrap_or_else(|err| {
                log_failure(
                    MODULE,
                    "sp_payroll_find_multiple",
                    "no payroll transaction found",
                    &err,
                );
                Vec::new()
            })
    }

    pub fn update_sp_payroll_transaction(
        &self,
        payroll: &SpPayrollTransaction,
    ) -> ServiceResult<()> {
        self.payrolls.update_payroll(payroll).map_err(|err| {
            map_repo_error(
                MODULE,
                "sp_payroll_update",
                "no payroll transaction found",
                "unable to update payroll transaction",
                err,
            )
        })?;
        info!(
            target: TRANSACTION_LOG,
            "event=sp_payroll_update module={} status=ok id={}", MODULE, payroll.id
        );
        Ok(())
    }

    pub fn delete_sp_payroll_transaction(&self, id: &str) -> ServiceResult<SpPayrollTransaction> {
        let payroll = self.find_sp_payroll_transaction(id)?;
        self.payrolls.delete_payroll(&payroll.id).map_err(|err| {
            map_repo_error(
                MODULE,
                "sp_payroll_delete",
                "no payroll transaction found",
                "unable to delete payroll transaction",
                err,
            )
        })?;
        info!(
            target: TRANSACTION_LOG,
            "event=sp_payroll_delete module={} status=ok id={}", MODULE, payroll.id
        );
        Ok(payroll)
    }

    pub fn delete_multiple_sp_payroll_transactions(
        &self,
        provider_id: &str,
    ) -> Vec<SpPayrollTransaction> {
        let payrolls = self.find_multiple_sp_payroll_transactions(provider_id);
        if payrolls.is_empty() {
            return payrolls;
        }
        match self.payrolls.delete_payrolls_by_provider(provider_id) {
            Ok(deleted) => {
                info!(
                    target: TRANSACTION_LOG,
                    "event=sp_payroll_delete_multiple module={} status=ok provider_id={} deleted={}",
                    MODULE,
                    provider_id,
                    deleted
                );
                payrolls
            }
            Err(err) => {
                log_failure(
                    MODULE,
                    "sp_payroll_delete_multiple",
                    "unable to delete payroll transactions",
                    &err,
                );
                Vec::new()
            }
        }
    }

    /// Opens a Telebirr H5 checkout for `payment` and returns its url.
    ///
    /// The pending transaction is stored only after the gateway accepts the
    /// request.
    pub fn telebirr_h5_web_url(&self, payment: &WebPayment<'_>) -> ServiceResult<String> {
        let Some(telebirr) = self.telebirr.as_ref() else {
            return Err(payment_failure(PaymentError::Config(
                "telebirr account not configured".to_string(),
            )));
        };
        info!(
            target: TRANSACTION_LOG,
            "event=telebirr_web_url module={} status=start user_id={} plan_id={}",
            MODULE,
            payment.user_id,
            payment.plan_id
        );

        let transaction_fee = telebirr.transaction_fee();
        let mut transaction = None;
        for _ in 0..MAX_NONCE_ATTEMPTS {
            let nonce = (self.nonce_source)();
            let candidate = SubscriptionTransaction {
                id: String::new(),
                user_id: payment.user_id.to_string(),
                plan_id: payment.plan_id.to_string(),
                app_id: telebirr.account().app_id.clone(),
                receiver_name: payment.receiver_name.to_string(),
                subject: payment.subject.to_string(),
                received_amount: payment.received_amount,
                transaction_fee,
                currency_type: payment.currency_type.to_string(),
                timeout_express: TIMEOUT_EXPRESS,
                out_trade_no: out_trade_no(&nonce),
                nonce,
                trade_no: String::new(),
                status: TransactionStatus::Pending,
                initiated_from: payment.initiated_from.as_str().to_string(),
                created_at: 0,
                updated_at: 0,
            };
            if self.validate_subscription_transaction(&candidate).is_empty() {
                transaction = Some(candidate);
                break;
            }
        }
        let Some(transaction) = transaction else {
            return Err(payment_failure(PaymentError::UniqueIdExhausted));
        };

        let request = telebirr.web_pay_request(&WebPayOrder {
            nonce: &transaction.nonce,
            receiver_name: payment.receiver_name,
            subject: payment.subject,
            total_amount: payment.received_amount + transaction_fee,
            timestamp: now_epoch_secs(),
        });
        let url = telebirr.request_web_url(&request).map_err(payment_failure)?;

        let stored = self.add_subscription_transaction(&transaction)?;
        info!(
            target: TRANSACTION_LOG,
            "event=telebirr_web_url module={} status=ok transaction_id={} out_trade_no={}",
            MODULE,
            stored.id,
            stored.out_trade_no
        );
        Ok(url)
    }
}

fn payment_failure(err: PaymentError) -> ServiceError {
    let message = match &err {
        PaymentError::Config(_) => "payment gateway not configured",
        PaymentError::UniqueIdExhausted => "unable to generate unique transaction id",
        PaymentError::Key(_) | PaymentError::Encode(_) | PaymentError::Encrypt(_) => {
            "unable to construct valid request"
        }
        PaymentError::Transport(_) | PaymentError::Decode(_) | PaymentError::Rejected { .. } => {
            "unable to generate web url"
        }
    };
    log_failure(MODULE, "telebirr_web_url", message, &err)
}

#[cfg(test)]
mod tests {
    use super::{payment_failure, SUBJECT_RE};
    use crate::payment::PaymentError;
    use crate::service::ServiceError;

    #[test]
    fn subject_must_be_plain_words() {
        assert!(SUBJECT_RE.is_match("Gold plan"));
        assert!(SUBJECT_RE.is_match("plan_2"));
        assert!(!SUBJECT_RE.is_match(" leading space"));
        assert!(!SUBJECT_RE.is_match("gold!"));
        assert!(!SUBJECT_RE.is_match("ወርሃዊ"));
        assert!(!SUBJECT_RE.is_match("Gold ወርሃዊ"));
    }

    #[test]
    fn gateway_rejection_maps_to_generic_message() {
        let err = payment_failure(PaymentError::Rejected {
            code: "7".to_string(),
            message: "bad sign".to_string(),
        });
        assert_eq!(err, ServiceError::failed("unable to generate web url"));
    }
}
