//! User accounts and credentials.
//!
//! # Responsibility
//! - Validate and persist user profiles.
//! - Hash, store and check user passwords.
//! - Retire users into the trash together with their transactions.
//!
//! # Invariants
//! - A deleted user leaves a trash row, keeps its feedback (detached) and
//!   loses its preference.

use super::common_service::CommonService;
use super::deleted_service::DeletedService;
use super::feedback_service::FeedbackService;
use super::password::{hash_password_with_params, new_salt, verify_password, HashParams};
use super::preference_service::PreferenceService;
use super::profile::{validate_profile, Baseline, StoredProfile};
use super::{log_failure, map_repo_error, merge_search_pages, ServiceError, ServiceResult};
use crate::logging::USER_LOG;
use crate::model::account::{User, UserPassword};
use crate::repo::user_repo::{
    SqliteUserPasswordRepository, SqliteUserRepository, UserPasswordRepository, UserRepository,
};
use crate::repo::Page;
use crate::validation::{check_password, is_blank, ErrMap, ProfileInput};
use log::{info, warn};
use rusqlite::Connection;

const MODULE: &str = "user";

const EXACT_SEARCH_COLUMNS: &[&str] = &["id", "user_name", "phone_number", "email"];

pub struct UserService<'conn> {
    users: SqliteUserRepository<'conn>,
    passwords: SqliteUserPasswordRepository<'conn>,
    common: CommonService<'conn>,
    deleted: DeletedService<'conn>,
    preferences: PreferenceService<'conn>,
    feedbacks: FeedbackService<'conn>,
    hash_params: HashParams,
}

impl<'conn> UserService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            users: SqliteUserRepository::new(conn),
            passwords: SqliteUserPasswordRepository::new(conn),
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

    /// Persists a user profile that already passed validation.
    pub fn add_user(&self, user: &User) -> ServiceResult<User> {
        info!(
            target: USER_LOG,
            "event=user_add module={} status=start user_name={}", MODULE, user.user_name
        );
        let stored = self
            .users
            .create_user(user)
            .map_err(|err| log_failure(MODULE, "user_add", "unable to add new user", &err))?;
        info!(
            target: USER_LOG,
            "event=user_add module={} status=ok id={}", MODULE, stored.id
        );
        Ok(stored)
    }

    /// Validates `user`, normalizing its phone number and user name in place.
    ///
    /// Uniqueness is checked for every field on create (empty id) and only for
    /// changed fields on update.
    pub fn validate_user_profile(&self, user: &mut User) -> ErrMap {
        let previous = if is_blank(&user.id) {
            None
        } else {
            self.users.find_user(&user.id).unwrap_or_else(|err| {
                warn!(
                    target: USER_LOG,
                    "event=user_validate module={} status=error id={} error={}",
                    MODULE,
                    user.id,
                    err
                );
                None
            })
        };
        let baseline = match (&previous, is_blank(&user.id)) {
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
            "users",
            ProfileInput {
                first_name: &user.first_name,
                last_name: &user.last_name,
                user_name: &user.user_name,
                phone_number: &user.phone_number,
                email: &user.email,
            },
            baseline,
            &mut errors,
        );
        user.user_name = normalized.user_name;
        user.phone_number = normalized.phone_number;
        errors
    }

    /// Finds a user by id, user name, email or phone number.
    pub fn find_user(&self, identifier: &str) -> ServiceResult<User> {
        if is_blank(identifier) {
            return Err(ServiceError::not_found("no user found"));
        }
        match self.users.find_user(identifier) {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(ServiceError::not_found("no user found")),
            Err(err) => Err(log_failure(MODULE, "user_find", "no user found", &err)),
        }
    }

    pub fn all_users(&self) -> Vec<User> {
        self.users.all_users().unwrap_or_else(|err| {
            log_failure(MODULE, "user_all", "unable to list users", &err);
            Vec::new()
        })
    }

    pub fn all_users_with_pagination(&self, page: u32) -> Page<User> {
        self.users.find_users(page).unwrap_or_else(|err| {
            log_failure(MODULE, "user_all", "unable to list users", &err);
            Page::empty()
        })
    }

    /// Exact match on id, user name, phone and email, merged with a prefix
    /// match on first name plus `extra` columns.
    pub fn search_users(&self, key: &str, page: u32, extra: &[&str]) -> Page<User> {
        info!(
            target: USER_LOG,
            "event=user_search module={} status=start page={}", MODULE, page
        );
        if is_blank(key) {
            return Page::empty();
        }
        let mut prefix_columns = vec!["first_name"];
        prefix_columns.extend_from_slice(extra);

        let exact = self
            .users
            .search_users(key, EXACT_SEARCH_COLUMNS, page)
            .unwrap_or_else(|err| {
                log_failure(MODULE, "user_search", "search failed", &err);
                Page::empty()
            });
        let prefix = self
            .users
            .search_users_by_prefix(key, &prefix_columns, page)
            .unwrap_or_else(|err| {
                log_failure(MODULE, "user_search", "search failed", &err);
                Page::empty()
            });
        merge_search_pages(exact, prefix, |user| user.id.as_str())
    }

    pub fn total_users(&self) -> i64 {
        self.users.total_users().unwrap_or_else(|err| {
            log_failure(MODULE, "user_total", "unable to count users", &err);
            0
        })
    }

    /// Counts users created within `[start_ms, end_ms]`.
    pub fn users_created_between(&self, start_ms: i64, end_ms: i64) -> i64 {
        self.users
            .count_users_created_between(start_ms, end_ms)
            .unwrap_or_else(|err| {
                log_failure(MODULE, "user_count", "unable to count users", &err);
                0
            })
    }

    pub fn update_user(&self, user: &User) -> ServiceResult<User> {
        let updated = self.users.update_user(user).map_err(|err| {
            map_repo_error(
                MODULE,
                "user_update",
                "no user found",
                "unable to update user",
                err,
            )
        })?;
        info!(
            target: USER_LOG,
            "event=user_update module={} status=ok id={}", MODULE, updated.id
        );
        Ok(updated)
    }

    pub fn update_user_single_value(
        &self,
        user_id: &str,
        column: &str,
        value: &str,
    ) -> ServiceResult<()> {
        self.users
            .update_user_value(user_id, column, value)
            .map_err(|err| {
                map_repo_error(
                    MODULE,
                    "user_update_value",
                    "no user found",
                    "unable to update user",
                    err,
                )
            })?;
        info!(
            target: USER_LOG,
            "event=user_update_value module={} status=ok id={} column={}", MODULE, user_id, column
        );
        Ok(())
    }

    /// Trashes and removes a user.
    ///
    /// The trash copy and the transaction copies are best effort: their
    /// failures are logged and do not stop the delete.
    pub fn delete_user(&self, user_id: &str) -> ServiceResult<User> {
        let user = self.find_user(user_id)?;

        if let Ok(trashed) = self.deleted.add_user_to_trash(&user) {
            let _ = self
                .deleted
                .add_subscription_transactions_to_trash(&user.id, &trashed.user_id);
        }

        info!(
            target: USER_LOG,
            "event=user_delete module={} status=start id={}", MODULE, user.id
        );
        self.users.delete_user(&user.id).map_err(|err| {
            map_repo_error(
                MODULE,
                "user_delete",
                "no user found",
                "unable to delete user",
                err,
            )
        })?;

        let _ = self.preferences.delete_client_preference(&user.id);
        let _ = self.feedbacks.set_feedback_client_id_null(&user.id);

        info!(
            target: USER_LOG,
            "event=user_delete module={} status=ok id={}", MODULE, user.id
        );
        Ok(user)
    }

    /// Checks `password` against `confirmation`, then salts and hashes it in
    /// place.
    pub fn verify_user_password(
        &self,
        password: &mut UserPassword,
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
                log_failure(MODULE, "user_password_hash", "unable to hash password", &err)
            })?;
        password.salt = salt;
        password.password = hash;
        Ok(())
    }

    pub fn add_user_password(&self, password: &UserPassword) -> ServiceResult<()> {
        self.passwords.create_user_password(password).map_err(|err| {
            log_failure(
                MODULE,
                "user_password_add",
                "unable to add new password",
                &err,
            )
        })?;
        info!(
            target: USER_LOG,
            "event=user_password_add module={} status=ok user_id={}", MODULE, password.user_id
        );
        Ok(())
    }

    pub fn find_user_password(&self, user_id: &str) -> ServiceResult<UserPassword> {
        if is_blank(user_id) {
            return Err(ServiceError::not_found("password not found"));
        }
        match self.passwords.find_user_password(user_id) {
            Ok(Some(password)) => Ok(password),
            Ok(None) => Err(ServiceError::not_found("password not found")),
            Err(err) => Err(log_failure(
                MODULE,
                "user_password_find",
                "password not found",
                &err,
            )),
        }
    }

    pub fn update_user_password(&self, password: &UserPassword) -> ServiceResult<()> {
        self.passwords.update_user_password(password).map_err(|err| {
            map_repo_error(
                MODULE,
                "user_password_update",
                "password not found",
                "unable to update password",
                err,
            )
        })?;
        info!(
            target: USER_LOG,
            "event=user_password_update module={} status=ok user_id={}",
            MODULE,
            password.user_id
        );
        Ok(())
    }

    pub fn delete_user_password(&self, user_id: &str) -> ServiceResult<UserPassword> {
        let password = self.find_user_password(user_id)?;
        self.passwords.delete_user_password(user_id).map_err(|err| {
            map_repo_error(
                MODULE,
                "user_password_delete",
                "password not found",
                "unable to delete password",
                err,
            )
        })?;
        info!(
            target: USER_LOG,
            "event=user_password_delete module={} status=ok user_id={}", MODULE, user_id
        );
        Ok(password)
    }

    /// Returns whether `candidate` matches the stored password of `user_id`.
    pub fn check_user_password(&self, user_id: &str, candidate: &str) -> bool {
        let Ok(stored) = self.find_user_password(user_id) else {
            return false;
        };
        verify_password(&stored.password, candidate, &stored.salt).unwrap_or_else(|err| {
            log_failure(MODULE, "user_password_check", "unable to check password", &err);
            false
        })
    }
}
