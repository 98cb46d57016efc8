//! Trash retention for removed accounts and their transactions.
//!
//! # Invariants
//! - Trashed owner ids are `<trash id>_<original id>`, so a trashed account
//!   never collides with a live one.
//! - Trash rows are only ever appended here.

use super::{log_failure, merge_search_pages, ServiceError, ServiceResult};
use crate::logging::DELETED_LOG;
use crate::model::account::{ServiceProvider, User};
use crate::model::deleted::{
    DeletedServiceProvider, DeletedSpPayrollTransaction, DeletedSpSubscriptionTransaction,
    DeletedSubscriptionTransaction, DeletedUser,
};
use crate::repo::deleted_repo::{
    DeletedAccountRepository, DeletedTransactionRepository, SqliteDeletedAccountRepository,
    SqliteDeletedTransactionRepository,
};
use crate::repo::{MatchMode, Page};
use crate::validation::is_blank;
use log::info;
use rusqlite::Connection;

const MODULE: &str = "deleted";

const EXACT_SEARCH_COLUMNS: &[&str] = &["id", "user_name", "phone_number", "email"];
const DEFAULT_PREFIX_COLUMNS: &[&str] = &["first_name"];

pub struct DeletedService<'conn> {
    accounts: SqliteDeletedAccountRepository<'conn>,
    transactions: SqliteDeletedTransactionRepository<'conn>,
}

impl<'conn> DeletedService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            accounts: SqliteDeletedAccountRepository::new(conn),
            transactions: SqliteDeletedTransactionRepository::new(conn),
        }
    }

    pub fn add_user_to_trash(&self, user: &User) -> ServiceResult<DeletedUser> {
        info!(
            target: DELETED_LOG,
            "event=user_trash module={} status=start user_id={}", MODULE, user.id
        );
        let deleted = self.accounts.trash_user(user).map_err(|err| {
            log_failure(MODULE, "user_trash", "unable to add user to trash", &err)
        })?;
        info!(
            target: DELETED_LOG,
            "event=user_trash module={} status=ok trash_id={} user_id={}",
            MODULE,
            deleted.id,
            deleted.user_id
        );
        Ok(deleted)
    }

    pub fn add_service_provider_to_trash(
        &self,
        provider: &ServiceProvider,
    ) -> ServiceResult<DeletedServiceProvider> {
        info!(
            target: DELETED_LOG,
            "event=service_provider_trash module={} status=start provider_id={}",
            MODULE,
            provider.id
        );
        let deleted = self.accounts.trash_service_provider(provider).map_err(|err| {
            log_failure(
                MODULE,
                "service_provider_trash",
                "unable to add service provider to trash",
                &err,
            )
        })?;
        info!(
            target: DELETED_LOG,
            "event=service_provider_trash module={} status=ok trash_id={} provider_id={}",
            MODULE,
            deleted.id,
            deleted.provider_id
        );
        Ok(deleted)
    }

    /// Copies the user's transactions into the trash under `trashed_user_id`.
    pub fn add_subscription_transactions_to_trash(
        &self,
        user_id: &str,
        trashed_user_id: &str,
    ) -> ServiceResult<usize> {
        let copied = self
            .transactions
            .trash_subscription_transactions(user_id, trashed_user_id)
            .map_err(|err| {
                log_failure(
                    MODULE,
                    "subscription_transaction_trash",
                    "unable to add subscription transactions to trash",
                    &err,
                )
            })?;
        info!(
            target: DELETED_LOG,
            "event=subscription_transaction_trash module={} status=ok user_id={} copied={}",
            MODULE,
            user_id,
            copied
        );
        Ok(copied)
    }

    pub fn add_sp_subscription_transactions_to_trash(
        &self,
        provider_id: &str,
        trashed_provider_id: &str,
    ) -> ServiceResult<usize> {
        let copied = self
            .transactions
            .trash_sp_subscription_transactions(provider_id, trashed_provider_id)
            .map_err(|err| {
                log_failure(
                    MODULE,
                    "sp_subscription_transaction_trash",
                    "unable to add service provider subscription transactions to trash",
                    &err,
                )
            })?;
        info!(
            target: DELETED_LOG,
            "event=sp_subscription_transaction_trash module={} status=ok provider_id={} copied={}",
            MODULE,
            provider_id,
            copied
        );
        Ok(copied)
    }

    pub fn add_sp_payroll_transactions_to_trash(
        &self,
        provider_id: &str,
        trashed_provider_id: &str,
    ) -> ServiceResult<usize> {
        let copied = self
            .transactions
            .trash_sp_payroll_transactions(provider_id, trashed_provider_id)
            .map_err(|err| {
                log_failure(
                    MODULE,
                    "sp_payroll_transaction_trash",
                    "unable to add payroll transactions to trash",
                    &err,
                )
            })?;
        info!(
            target: DELETED_LOG,
            "event=sp_payroll_transaction_trash module={} status=ok provider_id={} copied={}",
            MODULE,
            provider_id,
            copied
        );
        Ok(copied)
    }

    pub fn find_deleted_user(&self, identifier: &str) -> ServiceResult<DeletedUser> {
        match self.accounts.find_deleted_user(identifier) {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(ServiceError::not_found("no deleted user found")),
            Err(err) => Err(log_failure(
                MODULE,
                "deleted_user_find",
                "no deleted user found",
                &err,
            )),
        }
    }

    /// Exact match on id, user name, phone and email, merged with a prefix
    /// match on first name plus `extra` columns.
    pub fn search_deleted_users(
        &self,
        key: &str,
        page: u32,
        extra: &[&str],
    ) -> Page<DeletedUser> {
        if is_blank(key) {
            return Page::empty();
        }
        let prefix_columns = prefix_columns(extra);
        let exact = self
            .accounts
            .search_deleted_users(key, MatchMode::Exact, EXACT_SEARCH_COLUMNS, page)
            .unwrap_or_else(|err| {
                log_failure(MODULE, "deleted_user_search", "search failed", &err);
                Page::empty()
            });
        let prefix = self
            .accounts
            .search_deleted_users(key, MatchMode::Prefix, &prefix_columns, page)
            .unwrap_or_else(|err| {
                log_failure(MODULE, "deleted_user_search", "search failed", &err);
                Page::empty()
            });
        merge_search_pages(exact, prefix, |user| user.id.as_str())
    }

    pub fn find_deleted_service_provider(
        &self,
        identifier: &str,
    ) -> ServiceResult<DeletedServiceProvider> {
        match self.accounts.find_deleted_service_provider(identifier) {
            Ok(Some(provider)) => Ok(provider),
            Ok(None) => Err(ServiceError::not_found(
                "no deleted service provider found",
            )),
            Err(err) => Err(log_failure(
                MODULE,
                "deleted_service_provider_find",
                "no deleted service provider found",
                &err,
            )),
        }
    }

    pub fn search_deleted_service_providers(
        &self,
        key: &str,
        page: u32,
        extra: &[&str],
    ) -> Page<DeletedServiceProvider> {
        if is_blank(key) {
            return Page::empty();
        }
        let prefix_columns = prefix_columns(extra);
        let exact = self
            .accounts
            .search_deleted_service_providers(key, MatchMode::Exact, EXACT_SEARCH_COLUMNS, page)
            .unwrap_or_else(|err| {
                log_failure(MODULE, "deleted_service_provider_search", "search failed", &err);
                Page::empty()
            });
        let prefix = self
            .accounts
            .search_deleted_service_providers(key, MatchMode::Prefix, &prefix_columns, page)
            .unwrap_or_else(|err| {
                log_failure(MODULE, "deleted_service_provider_search", "search failed", &err);
                Page::empty()
            });
        merge_search_pages(exact, prefix, |provider| provider.id.as_str())
    }

    pub fn find_deleted_subscription_transaction(
        &self,
        id: &str,
    ) -> ServiceResult<DeletedSubscriptionTransaction> {
        match self.transactions.find_deleted_subscription_transaction(id) {
            Ok(Some(transaction)) => Ok(transaction),
            Ok(None) => Err(ServiceError::not_found("no deleted transaction found")),
            Err(err) => Err(log_failure(
                MODULE,
                "deleted_subscription_transaction_find",
                "no deleted transaction found",
                &err,
            )),
        }
    }

    /// Lists trashed transactions owned by a trashed user id.
    pub fn find_deleted_subscription_transactions(
        &self,
        trashed_user_id: &str,
    ) -> Vec<DeletedSubscriptionTransaction> {
        self.transactions
            .find_deleted_subscription_transactions(trashed_user_id)
            .unwrap_or_else(|err| {
                log_failure(
                    MODULE,
                    "deleted_subscription_transaction_all",
                    "no deleted transaction found",
                    &err,
                );
                Vec::new()
            })
    }

    pub fn find_deleted_sp_subscription_transaction(
        &self,
        id: &str,
    ) -> ServiceResult<DeletedSpSubscriptionTransaction> {
        match self.transactions.find_deleted_sp_subscription_transaction(id) {
            Ok(Some(transaction)) => Ok(transaction),
            Ok(None) => Err(ServiceError::not_found("no deleted transaction found")),
            Err(err) => Err(log_failure(
                MODULE,
                "deleted_sp_subscription_transaction_find",
                "no deleted transaction found",
                &err,
            )),
        }
    }

    pub fn find_deleted_sp_subscription_transactions(
        &self,
        trashed_provider_id: &str,
    ) -> Vec<DeletedSpSubscriptionTransaction> {
        self.transactions
            .find_deleted_sp_subscription_transactions(trashed_provider_id)
            .unwrap_or_else(|err| {
                log_failure(
                    MODULE,
                    "deleted_sp_subscription_transaction_all",
                    "no deleted transaction found",
                    &err,
                );
                Vec::new()
            })
    }

    pub fn find_deleted_sp_payroll_transaction(
        &self,
        id: &str,
    ) -> ServiceResult<DeletedSpPayrollTransaction> {
        match self.transactions.find_deleted_sp_payroll_transaction(id) {
            Ok(Some(transaction)) => Ok(transaction),
            Ok(None) => Err(ServiceError::not_found("no deleted transaction found")),
            Err(err) => Err(log_failure(
                MODULE,
                "deleted_sp_payroll_transaction_find",
                "no deleted transaction found",
                &err,
            )),
        }
    }

    pub fn find_deleted_sp_payroll_transactions(
        &self,
        trashed_provider_id: &str,
    ) -> Vec<DeletedSpPayrollTransaction> {
        self.transactions
            .find_deleted_sp_payroll_transactions(trashed_provider_id)
            .unwrap_or_else(|err| {
                log_failure(
                    MODULE,
                    "deleted_sp_payroll_transaction_all",
                    "no deleted transaction found",
                    &err,
                );
                Vec::new()
            })
    }
}

fn prefix_columns<'a>(extra: &[&'a str]) -> Vec<&'a str> {
    let mut columns: Vec<&'a str> = DEFAULT_PREFIX_COLUMNS.to_vec();
    columns.extend_from_slice(extra);
    columns
}
