//! Shared lookups: uniqueness checks, languages and translated entries.
//!
//! # Responsibility
//! - Answer uniqueness probes for the other services.
//! - Resolve interface strings in the client's language.
//! - Expose the fixed vocabularies (chat types, currencies, payout providers).

use super::{log_failure, map_repo_error, ServiceError, ServiceResult};
use crate::logging::SERVER_LOG;
use crate::model::language::{Language, LanguageEntry};
use crate::model::{VALID_CHAT_TYPES, VALID_CURRENCY_TYPES, VALID_LINKED_ACCOUNT_PROVIDERS};
use crate::repo::common_repo::{SqliteUniquenessRepository, UniquenessRepository};
use crate::repo::language_repo::{
    LanguageEntryRepository, LanguageRepository, SqliteLanguageEntryRepository,
    SqliteLanguageRepository,
};
use crate::util::strip_emoji;
use crate::validation::{is_blank, ErrMap};
use log::{info, warn};
use rusqlite::Connection;

const MODULE: &str = "common";

/// Languages inserted on first start when absent.
const DEFAULT_LANGUAGES: &[(&str, &str, &str, i64)] = &[("en", "English", "🇬🇧", 1)];

pub struct CommonService<'conn> {
    uniqueness: SqliteUniquenessRepository<'conn>,
    languages: SqliteLanguageRepository<'conn>,
    entries: SqliteLanguageEntryRepository<'conn>,
}

impl<'conn> CommonService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            uniqueness: SqliteUniquenessRepository::new(conn),
            languages: SqliteLanguageRepository::new(conn),
            entries: SqliteLanguageEntryRepository::new(conn),
        }
    }

    /// Returns whether `value` is unused in `table.column`.
    ///
    /// Blank values are unique. Unknown tables or columns, and storage
    /// failures, report `false`.
    pub fn is_unique(&self, column: &str, value: &str, table: &str) -> bool {
        match self.uniqueness.is_unique(table, column, value) {
            Ok(unique) => unique,
            Err(err) => {
                log_failure(MODULE, "is_unique", "unable to check uniqueness", &err);
                false
            }
        }
    }

    /// Registers a language after checking its code and name are free.
    pub fn add_language(&self, language: &Language) -> ServiceResult<()> {
        let mut errors = ErrMap::new();
        if is_blank(&language.code) {
            errors.insert("code", "language code can not be empty");
        } else if !self.is_unique("code", &language.code, "languages") {
            errors.insert("code", "language code already exists");
        }
        if is_blank(&language.name) {
            errors.insert("name", "language name can not be empty");
        } else if !self.is_unique("name", &language.name, "languages") {
            errors.insert("name", "language name already exists");
        }
        errors.into_result()?;

        self.languages
            .create_language(language)
            .map_err(|err| log_failure(MODULE, "language_add", "unable to add language", &err))?;
        info!(
            target: SERVER_LOG,
            "event=language_add module={} status=ok code={}", MODULE, language.code
        );
        Ok(())
    }

    /// Finds a language by code or display name.
    pub fn find_language(&self, identifier: &str) -> ServiceResult<Language> {
        match self.languages.find_language(identifier) {
            Ok(Some(language)) => Ok(language),
            Ok(None) => Err(ServiceError::not_found("no language found")),
            Err(err) => Err(log_failure(
                MODULE,
                "language_find",
                "no language found",
                &err,
            )),
        }
    }

    pub fn all_languages(&self) -> Vec<Language> {
        self.languages.all_languages().unwrap_or_else(|err| {
            log_failure(MODULE, "language_all", "unable to list languages", &err);
            Vec::new()
        })
    }

    pub fn update_language(&self, code: &str, language: &Language) -> ServiceResult<()> {
        self.languages.update_language(code, language).map_err(|err| {
            map_repo_error(
                MODULE,
                "language_update",
                "no language found",
                "unable to update language",
                err,
            )
        })
    }

    pub fn delete_language(&self, code: &str) -> ServiceResult<()> {
        self.languages.delete_language(code).map_err(|err| {
            map_repo_error(
                MODULE,
                "language_delete",
                "no language found",
                "unable to delete language",
                err,
            )
        })
    }

    /// Inserts every default language that is not stored yet.
    ///
    /// Returns the number of languages inserted.
    pub fn seed_default_languages(&self) -> ServiceResult<usize> {
        let mut inserted = 0;
        for (code, name, flag, display_order) in DEFAULT_LANGUAGES {
            let exists = self.languages.find_language(code).map_err(|err| {
                log_failure(MODULE, "language_seed", "unable to seed languages", &err)
            })?;
            if exists.is_some() {
                continue;
            }
            self.languages
                .create_language(&Language {
                    code: (*code).to_string(),
                    name: (*name).to_string(),
                    flag: (*flag).to_string(),
                    display_order: *display_order,
                })
                .map_err(|err| {
                    log_failure(MODULE, "language_seed", "unable to seed languages", &err)
                })?;
            inserted += 1;
        }
        info!(
            target: SERVER_LOG,
            "event=language_seed module={} status=ok inserted={}", MODULE, inserted
        );
        Ok(inserted)
    }

    pub fn add_language_entry(&self, entry: &LanguageEntry) -> ServiceResult<i64> {
        let mut errors = ErrMap::new();
        if is_blank(&entry.identifier) {
            errors.insert("identifier", "identifier can not be empty");
        }
        if self.find_language(&entry.code).is_err() {
            errors.insert("code", "invalid language selected");
        }
        errors.into_result()?;

        let mut stored = entry.clone();
        stored.identifier = strip_emoji(&entry.identifier);
        self.entries.create_entry(&stored).map_err(|err| {
            log_failure(
                MODULE,
                "language_entry_add",
                "unable to add language entry",
                &err,
            )
        })
    }

    /// Resolves `identifier` in language `code`.
    ///
    /// Emoji are stripped from the identifier before lookup. Falls back to the
    /// identifier as given when no translation is stored.
    pub fn find_language_entry(&self, identifier: &str, code: &str) -> String {
        let key = strip_emoji(identifier);
        match self.entries.find_entry(&key, code) {
            Ok(Some(entry)) => entry.value,
            Ok(None) => identifier.to_string(),
            Err(err) => {
                warn!(
                    target: SERVER_LOG,
                    "event=language_entry_find module={} status=error identifier={} code={} error={}",
                    MODULE,
                    key,
                    code,
                    err
                );
                identifier.to_string()
            }
        }
    }

    /// Lists every translation stored for `identifier`.
    pub fn find_language_entries(&self, identifier: &str) -> Vec<LanguageEntry> {
        self.entries
            .find_entries(&strip_emoji(identifier))
            .unwrap_or_else(|err| {
                log_failure(
                    MODULE,
                    "language_entry_all",
                    "unable to list language entries",
                    &err,
                );
                Vec::new()
            })
    }

    pub fn update_language_entry(
        &self,
        identifier: &str,
        code: &str,
        value: &str,
    ) -> ServiceResult<()> {
        self.entries
            .update_entry_value(&strip_emoji(identifier), code, value)
            .map_err(|err| {
                map_repo_error(
                    MODULE,
                    "language_entry_update",
                    "no language entry found",
                    "unable to update language entry",
                    err,
                )
            })
    }

    pub fn delete_language_entry(&self, identifier: &str, code: &str) -> ServiceResult<()> {
        self.entries
            .delete_entry(&strip_emoji(identifier), code)
            .map_err(|err| {
                map_repo_error(
                    MODULE,
                    "language_entry_delete",
                    "no language entry found",
                    "unable to delete language entry",
                    err,
                )
            })
    }
}

pub fn valid_chat_types() -> &'static [&'static str] {
    VALID_CHAT_TYPES
}

pub fn valid_currency_types() -> &'static [&'static str] {
    VALID_CURRENCY_TYPES
}

pub fn valid_linked_account_providers() -> &'static [&'static str] {
    VALID_LINKED_ACCOUNT_PROVIDERS
}

/// Returns the canonical spelling of `value` if it is in `valid`, ignoring case.
pub(crate) fn canonical_choice(value: &str, valid: &[&'static str]) -> Option<&'static str> {
    valid
        .iter()
        .copied()
        .find(|choice| choice.eq_ignore_ascii_case(value.trim()))
}

#[cfg(test)]
mod tests {
    use super::{canonical_choice, valid_currency_types, valid_linked_account_providers};

    #[test]
    fn canonical_choice_ignores_case_and_whitespace() {
        assert_eq!(canonical_choice(" etb ", valid_currency_types()), Some("ETB"));
        assert_eq!(
            canonical_choice("telebirr", valid_linked_account_providers()),
            Some("Telebirr")
        );
        assert_eq!(canonical_choice("usd", valid_currency_types()), None);
    }
}
