//! Service provider accounts, credentials and wallets.
//!
//! # Responsibility
//! - Validate and persist provider profiles.
//! - Hash, store and check provider passwords.
//! - Keep each provider's earnings wallet.
//! - Retire providers into the trash together with their transactions.

use super::common_service::{canonical_choice, valid_linked_account_providers, CommonService};
use super::deleted_service::DeletedService;
use super::feedback_service::FeedbackService;
use super::password::{hash_password_with_params, new_salt, verify_password, HashParams};
use super::preference_service::PreferenceService;
use super::profile::{validate_profile, Baseline, StoredProfile};
use super::{log_failure, map_repo_error, merge_search_pages, ServiceError, ServiceResult};
use crate::logging::SERVICE_PROVIDER_LOG;
use crate::model::account::{ServiceProvider, SpPassword, SpWallet};
use crate::repo::provider_repo::{
    ServiceProviderRepository, SpPasswordRepository, SpWalletRepository,
    SqliteServiceProviderRepository, SqliteSpPasswordRepository, SqliteSpWalletRepository,
};
use crate::repo::Page;
use crate::validation::{char_len, check_password, is_blank, ErrMap, ProfileInput};
use log::{info, warn};
use rusqlite::types::Value;
use rusqlite::Connection;

const MODULE: &str = "service_provider";

pub const MAX_LINKED_ACCOUNT_CHARS: usize = 255;

const EXACT_SEARCH_COLUMNS: &[&str] = &["id", "user_name", "phone_number", "email"];

pub struct ServiceProviderService<'conn> {
    providers: SqliteServiceProviderRepository<'conn>,
    passwords: SqliteSpPasswordRepository<'conn>,
    wallets: SqliteSpWalletRepository<'conn>,
    common: CommonService<'conn>,
    deleted: DeletedService<'conn>,
    preferences: PreferenceService<'conn>,
    feedbacks: FeedbackService<'conn>,
    hash_params: HashParams,
}

impl<'conn> ServiceProviderService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            providers: SqliteServiceProviderRepository::new(conn),
            passwords: SqliteSpPasswordRepository::new(conn),
            wallets: SqliteSpWalletRepository::new(conn),
            common: CommonService::new(conn),
            deleted: DeletedService::new(conn),
            preferences: PreferenceService::new(conn),
            feedbacks: FeedbackService::new(conn),
            hash_params: HashParams::default(),
        }
    }

    /// Overrides the argon2 cost used for new password hashes.
    pub fn with_hash_params(mut self, params: HashParams) -> Self {
        self.hash_params = params;
        self
    }

    /// Persists a provider profile that already passed validation.
    pub fn add_service_provider(
        &self,
        provider: &ServiceProvider,
    ) -> ServiceResult<ServiceProvider> {
        info!(
            target: SERVICE_PROVIDER_LOG,
            "event=service_provider_add module={} status=start user_name={}",
            MODULE,
            provider.user_name
        );
        let stored = self
            .providers
            .create_service_provider(provider)
            .map_err(|err| {
                log_failure(
                    MODULE,
                    "service_provider_add",
                    "unable to add new service provider",
                    &err,
                )
            })?;
        info!(
            target: SERVICE_PROVIDER_LOG,
            "event=service_provider_add module={} status=ok id={}", MODULE, stored.id
        );
        Ok(stored)
    }

    /// Validates `provider`, normalizing its phone number and user name in place.
    ///
    /// Uniqueness is checked for every field on create (empty id) and only for
    /// changed fields on update.
    pub fn validate_service_provider_profile(&self, provider: &mut ServiceProvider) -> ErrMap {
        let previous = if is_blank(&provider.id) {
            None
        } else {
            self.providers.find_service_provider(&provider.id).unwrap_or_else(|err| {
                warn!(
                    target: SERVICE_PROVIDER_LOG,
                    "event=service_provider_validate module={} status=error id={} error={}",
                    MODULE,
                    provider.id,
                    err
                );
                None
            })
        };
        let baseline = match (&previous, is_blank(&provider.id)) {
            (_, true) => Baseline::New,
            (Some(stored), false) => Baseline::Stored(StoredProfile {
                user_name: &stored.user_name,
                email: &stored.email,
                phone_number: &stored.phone_number,
            }),
            (None, false) => Baseline::Missing,
        };

        let mut errors = ErrMap::new();
        let normalized = validate_profile(
            &self.common,
            "service_providers",
            ProfileInput {
                first_name: &provider.first_name,
                last_name: &provider.last_name,
                user_name: &provider.user_name,
                phone_number: &provider.phone_number,
                email: &provider.email,
            },
            baseline,
            &mut errors,
        );
        provider.user_name = normalized.user_name;
        provider.phone_number = normalized.phone_number;
        errors
    }

    /// Finds a provider by id, user name, email or phone number.
    pub fn find_service_provider(&self, identifier: &str) -> ServiceResult<ServiceProvider> {
        if is_blank(identifier) {
            return Err(ServiceError::not_found("no service provider found"));
        }
        match self.providers.find_service_provider(identifier) {
            Ok(Some(provider)) => Ok(provider),
            Ok(None) => Err(ServiceError::not_found("no service provider found")),
            Err(err) => Err(log_failure(
                MODULE,
                "service_provider_find",
                "no service provider found",
                &err,
            )),
        }
    }

    pub fn all_service_providers(&self) -> Vec<ServiceProvider> {
        self.providers.all_service_providers().unwrap_or_else(|err| {
            log_failure(MODULE, "service_provider_all", "unable to list service providers", &err);
            Vec::new()
        })
    }

    pub fn all_service_providers_with_pagination(&self, page: u32) -> Page<ServiceProvider> {
        self.providers.find_service_providers(page).unwrap_or_else(|err| {
            log_failure(MODULE, "service_provider_all", "unable to list service providers", &err);
            Page::empty()
        })
    }

    /// Exact match on id, user name, phone and email, merged with a prefix
    /// match on first name plus `extra` columns.
    pub fn search_service_providers(
        &self,
        key: &str,
        page: u32,
        extra: &[&str],
    ) -> Page<ServiceProvider> {
        info!(
            target: SERVICE_PROVIDER_LOG,
            "event=service_provider_search module={} status=start page={}", MODULE, page
        );
        if is_blank(key) {
            return Page::empty();
        }
        let mut prefix_columns = vec!["first_name"];
        prefix_columns.extend_from_slice(extra);

        let exact = self
            .providers
            .search_service_providers(key, EXACT_SEARCH_COLUMNS, page)
            .unwrap_or_else(|err| {
                log_failure(MODULE, "service_provider_search", "search failed", &err);
                Page::empty()
            });
        let prefix = self
            .providers
            .search_service_providers_by_prefix(key, &prefix_columns, page)
            .unwrap_or_else(|err| {
                log_failure(MODULE, "service_provider_search", "search failed", &err);
                Page::empty()
            });
        merge_search_pages(exact, prefix, |provider| provider.id.as_str())
    }

    pub fn total_service_providers(&self) -> i64 {
        self.providers.total_service_providers().unwrap_or_else(|err| {
            log_failure(
                MODULE,
                "service_provider_total",
                "unable to count service providers",
                &err,
            );
            0
        })
    }

    /// Counts providers created within `[start_ms, end_ms]`.
    pub fn service_providers_created_between(&self, start_ms: i64, end_ms: i64) -> i64 {
        self.providers
            .count_service_providers_created_between(start_ms, end_ms)
            .unwrap_or_else(|err| {
                log_failure(
                    MODULE,
                    "service_provider_count",
                    "unable to count service providers",
                    &err,
                );
                0
            })
    }

    pub fn update_service_provider(
        &self,
        provider: &ServiceProvider,
    ) -> ServiceResult<ServiceProvider> {
        let updated = self.providers.update_service_provider(provider).map_err(|err| {
            map_repo_error(
                MODULE,
                "service_provider_update",
                "no service provider found",
                "unable to update service provider",
                err,
            )
        })?;
        info!(
            target: SERVICE_PROVIDER_LOG,
            "event=service_provider_update module={} status=ok id={}", MODULE, updated.id
        );
        Ok(updated)
    }

    pub fn update_service_provider_single_value(
        &self,
        provider_id: &str,
        column: &str,
        value: &str,
    ) -> ServiceResult<()> {
        self.providers
            .update_service_provider_value(provider_id, column, value)
            .map_err(|err| {
                map_repo_error(
                    MODULE,
                    "service_provider_update_value",
                    "no service provider found",
                    "unable to update service provider",
                    err,
                )
            })?;
        info!(
            target: SERVICE_PROVIDER_LOG,
            "event=service_provider_update_value module={} status=ok id={} column={}",
            MODULE,
            provider_id,
            column
        );
        Ok(())
    }

    /// Trashes and removes a provider.
    ///
    /// The trash copy and the transaction copies are best effort: their
    /// failures are logged and do not stop the delete.
    pub fn delete_service_provider(&self, provider_id: &str) -> ServiceResult<ServiceProvider> {
        let provider = self.find_service_provider(provider_id)?;

        if let Ok(trashed) = self.deleted.add_service_provider_to_trash(&provider) {
            let _ = self
                .deleted
                .add_sp_subscription_transactions_to_trash(&provider.id, &trashed.provider_id);
            let _ = self
                .deleted
                .add_sp_payroll_transactions_to_trash(&provider.id, &trashed.provider_id);
        }

        info!(
            target: SERVICE_PROVIDER_LOG,
            "event=service_provider_delete module={} status=start id={}", MODULE, provider.id
        );
        self.providers.delete_service_provider(&provider.id).map_err(|err| {
            map_repo_error(
                MODULE,
                "service_provider_delete",
                "no service provider found",
                "unable to delete service provider",
                err,
            )
        })?;

        let _ = self.preferences.delete_client_preference(&provider.id);
        let _ = self.feedbacks.set_feedback_client_id_null(&provider.id);

        info!(
            target: SERVICE_PROVIDER_LOG,
            "event=service_provider_delete module={} status=ok id={}", MODULE, provider.id
        );
        Ok(provider)
    }

    /// Checks `password` against `confirmation`, then salts and hashes it in
    /// place.
    pub fn verify_sp_password(
        &self,
        password: &mut SpPassword,
        confirmation: &str,
    ) -> ServiceResult<()> {
        if let Err(message) = check_password(&password.password, confirmation) {
            let mut errors = ErrMap::new();
            errors.insert("password", message);
            return Err(errors.into());
        }
        let salt = new_salt();
        let hash = hash_password_with_params(&password.password, &salt, self.hash_params)
            .map_err(|err| {
                log_failure(MODULE, "sp_password_hash", "unable to hash password", &err)
            })?;
        password.salt = salt;
        password.password = hash;
        Ok(())
    }

    pub fn add_sp_password(&self, password: &SpPassword) -> ServiceResult<()> {
        self.passwords.create_sp_password(password).map_err(|err| {
            log_failure(
                MODULE,
                "sp_password_add",
                "unable to add new password",
                &err,
            )
        })?;
        info!(
            target: SERVICE_PROVIDER_LOG,
            "event=sp_password_add module={} status=ok provider_id={}", MODULE, password.provider_id
        );
        Ok(())
    }

    pub fn find_sp_password(&self, provider_id: &str) -> ServiceResult<SpPassword> {
        if is_blank(provider_id) {
            return Err(ServiceError::not_found("password not found"));
        }
        match self.passwords.find_sp_password(provider_id) {
            Ok(Some(password)) => Ok(password),
            Ok(None) => Err(ServiceError::not_found("password not found")),
            Err(err) => Err(log_failure(
                MODULE,
                "sp_password_find",
                "password not found",
                &err,
            )),
        }
    }

    pub fn update_sp_password(&self, password: &SpPassword) -> ServiceResult<()> {
        self.passwords.update_sp_password(password).map_err(|err| {
            map_repo_error(
                MODULE,
                "sp_password_update",
                "password not found",
                "unable to update password",
                err,
            )
        })?;
        info!(
            target: SERVICE_PROVIDER_LOG,
            "event=sp_password_update module={} status=ok provider_id={}",
            MODULE,
            password.provider_id
        );
        Ok(())
    }

    pub fn delete_sp_password(&self, provider_id: &str) -> ServiceResult<SpPassword> {
        let password = self.find_sp_password(provider_id)?;
        self.passwords.delete_sp_password(provider_id).map_err(|err| {
            map_repo_error(
                MODULE,
                "sp_password_delete",
                "password not found",
                "unable to delete password",
                err,
            )
        })?;
        info!(
            target: SERVICE_PROVIDER_LOG,
            "event=sp_password_delete module={} status=ok provider_id={}", MODULE, provider_id
        );
        Ok(password)
    }

    /// Returns whether `candidate` matches the stored password of `provider_id`.
    pub fn check_sp_password(&self, provider_id: &str, candidate: &str) -> bool {
        let Ok(stored) = self.find_sp_password(provider_id) else {
            return false;
        };
        verify_password(&stored.password, candidate, &stored.salt).unwrap_or_else(|err| {
            log_failure(MODULE, "sp_password_check", "unable to check password", &err);
            false
        })
    }

    pub fn add_sp_wallet(&self, wallet: &SpWallet) -> ServiceResult<SpWallet> {
        let stored = self.wallets.create_sp_wallet(wallet).map_err(|err| {
            log_failure(
                MODULE,
                "sp_wallet_add",
                "unable to add new service provider wallet",
                &err,
            )
        })?;
        info!(
            target: SERVICE_PROVIDER_LOG,
            "event=sp_wallet_add module={} status=ok provider_id={}", MODULE, stored.provider_id
        );
        Ok(stored)
    }

    /// Checks the payout account and amounts, normalizing the account
    /// provider to its canonical spelling.
    pub fn validate_sp_wallet(&self, wallet: &mut SpWallet) -> ErrMap {
        let mut errors = ErrMap::new();
        if char_len(&wallet.linked_account) > MAX_LINKED_ACCOUNT_CHARS {
            errors.insert(
                "linked_account",
                "service provider account should not be longer than 255 characters",
            );
        }
        match canonical_choice(
            &wallet.linked_account_provider,
            valid_linked_account_providers(),
        ) {
            Some(canonical) => wallet.linked_account_provider = canonical.to_string(),
            None => errors.insert(
                "linked_account_provider",
                "invalid account provider selected",
            ),
        }
        if wallet.running_amount < 0.0 || !wallet.running_amount.is_finite() {
            errors.insert("running_amount", "running amount can not be negative");
        }
        if wallet.pending_amount < 0.0 || !wallet.pending_amount.is_finite() {
            errors.insert("pending_amount", "pending amount can not be negative");
        }
        errors
    }

    pub fn find_sp_wallet(&self, provider_id: &str) -> ServiceResult<SpWallet> {
        if is_blank(provider_id) {
            return Err(ServiceError::not_found("no service provider wallet found"));
        }
        match self.wallets.find_sp_wallet(provider_id) {
            Ok(Some(wallet)) => Ok(wallet),
            Ok(None) => Err(ServiceError::not_found("no service provider wallet found")),
            Err(err) => Err(log_failure(
                MODULE,
                "sp_wallet_find",
                "no service provider wallet found",
                &err,
            )),
        }
    }

    pub fn update_sp_wallet(&self, wallet: &SpWallet) -> ServiceResult<SpWallet> {
        let updated = self.wallets.update_sp_wallet(wallet).map_err(|err| {
            map_repo_error(
                MODULE,
                "sp_wallet_update",
                "no service provider wallet found",
                "unable to update service provider wallet",
                err,
            )
        })?;
        info!(
            target: SERVICE_PROVIDER_LOG,
            "event=sp_wallet_update module={} status=ok provider_id={}",
            MODULE,
            updated.provider_id
        );
        Ok(updated)
    }

    pub fn update_sp_wallet_single_value(
        &self,
        provider_id: &str,
        column: &str,
        value: Value,
    ) -> ServiceResult<()> {
        self.wallets
            .update_sp_wallet_value(provider_id, column, value)
            .map_err(|err| {
                map_repo_error(
                    MODULE,
                    "sp_wallet_update_value",
                    "no service provider wallet found",
                    "unable to update service provider wallet",
                    err,
                )
            })?;
        info!(
            target: SERVICE_PROVIDER_LOG,
            "event=sp_wallet_update_value module={} status=ok provider_id={} column={}",
            MODULE,
            provider_id,
            column
        );
        Ok(())
    }

    pub fn delete_sp_wallet(&self, provider_id: &str) -> ServiceResult<SpWallet> {
        let wallet = self.find_sp_wallet(provider_id)?;
        self.wallets.delete_sp_wallet(provider_id).map_err(|err| {
            map_repo_error(
                MODULE,
                "sp_wallet_delete",
                "no service provider wallet found",
                "unable to delete service provider wallet",
                err,
            )
        })?;
        info!(
            target: SERVICE_PROVIDER_LOG,
            "event=sp_wallet_delete module={} status=ok provider_id={}", MODULE, provider_id
        );
        Ok(wallet)
    }
}
