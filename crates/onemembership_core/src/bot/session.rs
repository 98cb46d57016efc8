//! Expiring key-value session storage for chat-bot conversations.
//!
//! # Invariants
//! - A key past its expiry reads as absent, purged or not.
//! - `set` replaces both value and expiry.

use crate::logging::BOT_LOG;
use crate::repo::RepoResult;
use crate::util::now_epoch_ms;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Builds the per-chat key for a session field.
pub fn session_key(chat_id: i64, field: &str) -> String {
    format!("{chat_id}:{field}")
}

fn expiry_from(ttl: Option<Duration>) -> Option<i64> {
    ttl.map(|ttl| {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        now_epoch_ms().saturating_add(ttl_ms)
    })
}

fn is_live(expires_at: Option<i64>, now_ms: i64) -> bool {
    expires_at.map_or(true, |expires_at| expires_at > now_ms)
}

pub trait SessionStore {
    /// Stores `value` under `key`; `None` ttl never expires.
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> RepoResult<()>;
    fn get(&self, key: &str) -> RepoResult<Option<String>>;
    /// Removes `key`, returning whether a live value was present.
    fn remove(&self, key: &str) -> RepoResult<bool>;
    /// Drops expired entries and returns how many were dropped.
    fn purge_expired(&self) -> RepoResult<usize>;
}

pub struct SqliteSessionStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSessionStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl SessionStore for SqliteSessionStore<'_> {
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO bot_sessions (session_key, value, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(session_key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at;",
            params![key, value, expiry_from(ttl)],
        )?;
        Ok(())
    }

    fn get(&self, key: &str) -> RepoResult<Option<String>> {
        let row = self
            .conn
            .query_row(
                "SELECT value, expires_at FROM bot_sessions WHERE session_key = ?1;",
                [key],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<i64>>(1)?)),
            )
            .optional()?;
        let now_ms = now_epoch_ms();
        Ok(row.and_then(|(value, expires_at)| is_live(expires_at, now_ms).then_some(value)))
    }

    fn remove(&self, key: &str) -> RepoResult<bool> {
        let live = self.get(key)?.is_some();
        self.conn
            .execute("DELETE FROM bot_sessions WHERE session_key = ?1;", [key])?;
        Ok(live)
    }

    fn purge_expired(&self) -> RepoResult<usize> {
        let purged = self.conn.execute(
            "DELETE FROM bot_sessions WHERE expires_at IS NOT NULL AND expires_at <= ?1;",
            [now_epoch_ms()],
        )?;
        debug!(
            target: BOT_LOG,
            "event=session_purge module=bot status=ok purged={}", purged
        );
        Ok(purged)
    }
}

type Entries = HashMap<String, (String, Option<i64>)>;

/// Process-local store for a single bot instance.
#[derive(Default)]
pub struct MemorySessionStore {
    entries: Mutex<Entries>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<R>(&self, f: impl FnOnce(&mut Entries) -> R) -> R {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut entries)
    }
}

impl SessionStore for MemorySessionStore {
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> RepoResult<()> {
        let expires_at = expiry_from(ttl);
        self.with_entries(|entries| {
            entries.insert(key.to_string(), (value.to_string(), expires_at));
        });
        Ok(())
    }

    fn get(&self, key: &str) -> RepoResult<Option<String>> {
        let now_ms = now_epoch_ms();
        Ok(self.with_entries(|entries| {
            entries
                .get(key)
                .filter(|(_, expires_at)| is_live(*expires_at, now_ms))
                .map(|(value, _)| value.clone())
        }))
    }

    fn remove(&self, key: &str) -> RepoResult<bool> {
        let now_ms = now_epoch_ms();
        Ok(self.with_entries(|entries| {
            entries
                .remove(key)
                .is_some_and(|(_, expires_at)| is_live(expires_at, now_ms))
        }))
    }

    fn purge_expired(&self) -> RepoResult<usize> {
        let now_ms = now_epoch_ms();
        Ok(self.with_entries(|entries| {
            let before = entries.len();
            entries.retain(|_, (_, expires_at)| is_live(*expires_at, now_ms));
            before - entries.len()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::{is_live, session_key, MemorySessionStore, SessionStore};
    use std::time::Duration;

    #[test]
    fn session_key_scopes_field_by_chat() {
        assert_eq!(session_key(-1001, "step"), "-1001:step");
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        assert!(is_live(None, 10));
        assert!(is_live(Some(11), 10));
        assert!(!is_live(Some(10), 10));
    }

    #[test]
    fn memory_store_hides_and_purges_expired_keys() {
        let store = MemorySessionStore::new();
        store.set("a", "1", None).unwrap();
        store.set("b", "2", Some(Duration::ZERO)).unwrap();

        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(store.get("b").unwrap(), None);
        assert!(!store.remove("b").unwrap());

        store.set("c", "3", Some(Duration::ZERO)).unwrap();
        assert_eq!(store.purge_expired().unwrap(), 1);
        assert!(store.remove("a").unwrap());
        assert_eq!(store.get("a").unwrap(), None);
    }
}
