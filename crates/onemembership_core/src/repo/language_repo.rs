//! Language and translated-entry persistence.
//!
//! # Invariants
//! - `languages.code` and `languages.name` are unique.
//! - `(identifier, code)` names at most one entry.

use super::{query_one, query_rows, text, RepoError, RepoResult};
use crate::model::language::{Language, LanguageEntry};
use rusqlite::{params, Connection, Row};

const LANGUAGE_SELECT_SQL: &str = "SELECT code, name, flag, display_order FROM languages";
const ENTRY_SELECT_SQL: &str = "SELECT id, identifier, code, value FROM language_entries";

pub trait LanguageRepository {
    fn create_language(&self, language: &Language) -> RepoResult<()>;
    /// Matches either the code or the display name.
    fn find_language(&self, identifier: &str) -> RepoResult<Option<Language>>;
    fn all_languages(&self) -> RepoResult<Vec<Language>>;
    /// Rewrites the language stored under `code`.
    fn update_language(&self, code: &str, language: &Language) -> RepoResult<()>;
    fn delete_language(&self, code: &str) -> RepoResult<()>;
}

pub trait LanguageEntryRepository {
    fn create_entry(&self, entry: &LanguageEntry) -> RepoResult<i64>;
    fn find_entry(&self, identifier: &str, code: &str) -> RepoResult<Option<LanguageEntry>>;
    fn find_entries(&self, identifier: &str) -> RepoResult<Vec<LanguageEntry>>;
    fn update_entry_value(&self, identifier: &str, code: &str, value: &str) -> RepoResult<()>;
    fn delete_entry(&self, identifier: &str, code: &str) -> RepoResult<()>;
}

pub struct SqliteLanguageRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLanguageRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl LanguageRepository for SqliteLanguageRepository<'_> {
    fn create_language(&self, language: &Language) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO languages (code, name, flag, display_order) VALUES (?1, ?2, ?3, ?4);",
            params![
                language.code.as_str(),
                language.name.as_str(),
                language.flag.as_str(),
                language.display_order,
            ],
        )?;
        Ok(())
    }

    fn find_language(&self, identifier: &str) -> RepoResult<Option<Language>> {
        query_one(
            self.conn,
            &format!("{LANGUAGE_SELECT_SQL} WHERE code = ?1 OR name = ?1 LIMIT 1"),
            vec![text(identifier)],
            parse_language_row,
        )
    }

    fn all_languages(&self) -> RepoResult<Vec<Language>> {
        query_rows(
            self.conn,
            &format!("{LANGUAGE_SELECT_SQL} ORDER BY display_order ASC, code ASC"),
            Vec::new(),
            parse_language_row,
        )
    }

    fn update_language(&self, code: &str, language: &Language) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE languages
             SET code = ?1, name = ?2, flag = ?3, display_order = ?4
             WHERE code = ?5;",
            params![
                language.code.as_str(),
                language.name.as_str(),
                language.flag.as_str(),
                language.display_order,
                code,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(code.to_string()));
        }
        Ok(())
    }

    fn delete_language(&self, code: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM languages WHERE code = ?1;", [code])?;
        if changed == 0 {
            return Err(RepoError::NotFound(code.to_string()));
        }
        Ok(())
    }
}

pub struct SqliteLanguageEntryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLanguageEntryRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl LanguageEntryRepository for SqliteLanguageEntryRepository<'_> {
    fn create_entry(&self, entry: &LanguageEntry) -> RepoResult<i64> {
        self.conn.execute(
            "INSERT INTO language_entries (identifier, code, value) VALUES (?1, ?2, ?3);",
            params![
                entry.identifier.as_str(),
                entry.code.as_str(),
                entry.value.as_str()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn find_entry(&self, identifier: &str, code: &str) -> RepoResult<Option<LanguageEntry>> {
        query_one(
            self.conn,
            &format!("{ENTRY_SELECT_SQL} WHERE identifier = ?1 AND code = ?2"),
            vec![text(identifier), text(code)],
            parse_entry_row,
        )
    }

    fn find_entries(&self, identifier: &str) -> RepoResult<Vec<LanguageEntry>> {
        query_rows(
            self.conn,
            &format!("{ENTRY_SELECT_SQL} WHERE identifier = ?1 ORDER BY code ASC"),
            vec![text(identifier)],
            parse_entry_row,
        )
    }

    fn update_entry_value(&self, identifier: &str, code: &str, value: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE language_entries SET value = ?1 WHERE identifier = ?2 AND code = ?3;",
            params![value, identifier, code],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!("{identifier}/{code}")));
        }
        Ok(())
    }

    fn delete_entry(&self, identifier: &str, code: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM language_entries WHERE identifier = ?1 AND code = ?2;",
            params![identifier, code],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!("{identifier}/{code}")));
        }
        Ok(())
    }
}

fn parse_language_row(row: &Row<'_>) -> RepoResult<Language> {
    Ok(Language {
        code: row.get(0)?,
        name: row.get(1)?,
        flag: row.get(2)?,
        display_order: row.get(3)?,
    })
}

fn parse_entry_row(row: &Row<'_>) -> RepoResult<LanguageEntry> {
    Ok(LanguageEntry {
        id: row.get(0)?,
        identifier: row.get(1)?,
        code: row.get(2)?,
        value: row.get(3)?,
    })
}
