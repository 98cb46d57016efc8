//! Client preference persistence.

use super::{query_one, text, update_column, RepoError, RepoResult};
use crate::model::account::ClientPreference;
use rusqlite::types::Value;
use rusqlite::{params, Connection};

pub const PREFERENCE_UPDATE_COLUMNS: &[&str] = &["language"];

pub trait PreferenceRepository {
    fn create_preference(&self, preference: &ClientPreference) -> RepoResult<()>;
    fn find_preference(&self, client_id: &str) -> RepoResult<Option<ClientPreference>>;
    fn update_preference(&self, preference: &ClientPreference) -> RepoResult<()>;
    fn update_preference_value(&self, client_id: &str, column: &str, value: &str)
        -> RepoResult<()>;
    fn delete_preference(&self, client_id: &str) -> RepoResult<()>;
}

pub struct SqlitePreferenceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePreferenceRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl PreferenceRepository for SqlitePreferenceRepository<'_> {
    fn create_preference(&self, preference: &ClientPreference) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO client_preferences (client_id, language) VALUES (?1, ?2);",
            params![preference.client_id.as_str(), preference.language.as_str()],
        )?;
        Ok(())
    }

    fn find_preference(&self, client_id: &str) -> RepoResult<Option<ClientPreference>> {
        query_one(
            self.conn,
            "SELECT client_id, language FROM client_preferences WHERE client_id = ?1",
            vec![text(client_id)],
            |row| {
                Ok(ClientPreference {
                    client_id: row.get(0)?,
                    language: row.get(1)?,
                })
            },
        )
    }

    fn update_preference(&self, preference: &ClientPreference) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE client_preferences SET language = ?1 WHERE client_id = ?2;",
            params![preference.language.as_str(), preference.client_id.as_str()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(preference.client_id.clone()));
        }
        Ok(())
    }

    fn update_preference_value(
        &self,
        client_id: &str,
        column: &str,
        value: &str,
    ) -> RepoResult<()> {
        update_column(
            self.conn,
            "client_preferences",
            "client_id",
            client_id,
            PREFERENCE_UPDATE_COLUMNS,
            column,
            Value::Text(value.to_string()),
            false,
        )
    }

    fn delete_preference(&self, client_id: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM client_preferences WHERE client_id = ?1;",
            [client_id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(client_id.to_string()));
        }
        Ok(())
    }
}
