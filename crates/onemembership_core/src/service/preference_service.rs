//! Client preferences.

use super::{log_failure, map_repo_error, ServiceError, ServiceResult};
use crate::logging::SERVER_LOG;
use crate::model::account::ClientPreference;
use crate::model::DEFAULT_LANGUAGE;
use crate::repo::language_repo::{LanguageRepository, SqliteLanguageRepository};
use crate::repo::preference_repo::{PreferenceRepository, SqlitePreferenceRepository};
use crate::validation::{is_blank, ErrMap};
use log::info;
use rusqlite::Connection;

const MODULE: &str = "preference";

pub struct PreferenceService<'conn> {
    preferences: SqlitePreferenceRepository<'conn>,
    languages: SqliteLanguageRepository<'conn>,
}

impl<'conn> PreferenceService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            preferences: SqlitePreferenceRepository::new(conn),
            languages: SqliteLanguageRepository::new(conn),
        }
    }

    pub fn add_client_preference(&self, preference: &ClientPreference) -> ServiceResult<()> {
        info!(
            target: SERVER_LOG,
            "event=preference_add module={} status=start client_id={}",
            MODULE,
            preference.client_id
        );
        self.preferences
            .create_preference(preference)
            .map_err(|err| {
                log_failure(
                    MODULE,
                    "preference_add",
                    "unable to add new client preference",
                    &err,
                )
            })?;
        info!(
            target: SERVER_LOG,
            "event=preference_add module={} status=ok client_id={} language={}",
            MODULE,
            preference.client_id,
            preference.language
        );
        Ok(())
    }

    /// Resolves the preferred language to its code.
    ///
    /// A blank language falls back to the default; a language name is
    /// rewritten to its code.
    pub fn validate_client_preference(&self, preference: &mut ClientPreference) -> ErrMap {
        let mut errors = ErrMap::new();
        if is_blank(&preference.language) {
            preference.language = DEFAULT_LANGUAGE.to_string();
            return errors;
        }
        match self.languages.find_language(preference.language.trim()) {
            Ok(Some(language)) => preference.language = language.code,
            Ok(None) => errors.insert("language", "preferred language not found"),
            Err(err) => {
                log_failure(MODULE, "preference_validate", "language lookup failed", &err);
                errors.insert("language", "preferred language not found");
            }
        }
        errors
    }

    pub fn find_client_preference(&self, client_id: &str) -> ServiceResult<ClientPreference> {
        if is_blank(client_id) {
            return Err(ServiceError::not_found("client preference not found"));
        }
        match self.preferences.find_preference(client_id) {
            Ok(Some(preference)) => Ok(preference),
            Ok(None) => Err(ServiceError::not_found("client preference not found")),
            Err(err) => Err(log_failure(
                MODULE,
                "preference_find",
                "client preference not found",
                &err,
            )),
        }
    }

    pub fn update_client_preference(&self, preference: &ClientPreference) -> ServiceResult<()> {
        self.preferences
            .update_preference(preference)
            .map_err(|err| {
                map_repo_error(
                    MODULE,
                    "preference_update",
                    "client preference not found",
                    "unable to update client preference",
                    err,
                )
            })?;
        info!(
            target: SERVER_LOG,
            "event=preference_update module={} status=ok client_id={} language={}",
            MODULE,
            preference.client_id,
            preference.language
        );
        Ok(())
    }

    pub fn update_client_preference_single_value(
        &self,
        client_id: &str,
        column: &str,
        value: &str,
    ) -> ServiceResult<()> {
        self.preferences
            .update_preference_value(client_id, column, value)
            .map_err(|err| {
                map_repo_error(
                    MODULE,
                    "preference_update_value",
                    "client preference not found",
                    "unable to update client preference",
                    err,
                )
            })?;
        info!(
            target: SERVER_LOG,
            "event=preference_update_value module={} status=ok client_id={} column={}",
            MODULE,
            client_id,
            column
        );
        Ok(())
    }

    pub fn delete_client_preference(&self, client_id: &str) -> ServiceResult<ClientPreference> {
        let preference = self.find_client_preference(client_id)?;
        self.preferences.delete_preference(client_id).map_err(|err| {
            map_repo_error(
                MODULE,
                "preference_delete",
                "client preference not found",
                "unable to delete client preference",
                err,
            )
        })?;
        info!(
            target: SERVER_LOG,
            "event=preference_delete module={} status=ok client_id={}", MODULE, client_id
        );
        Ok(preference)
    }
}
