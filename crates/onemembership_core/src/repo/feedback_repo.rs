//! Feedback persistence.
//!
//! # Invariants
//! - Ids are minted as `FB-<7 random><row count + 1>`.
//! - Feedback outlives its author: deleting a client only nulls `client_id`.

use super::{
    bool_to_int, int_to_bool, list_page, mint_id, query_one, query_rows, search_page, text,
    MatchMode, Page, RepoError, RepoResult, SearchTable,
};
use crate::model::account::{Feedback, FeedbackStatus};
use crate::util::now_epoch_ms;
use rusqlite::types::Value;
use rusqlite::{params, Connection, Row};

pub const FEEDBACK_ID_PREFIX: &str = "FB-";
const FEEDBACK_ID_RANDOM_CHARS: usize = 7;

const FEEDBACK_SELECT_SQL: &str = "SELECT id, client_id, comment, seen, created_at FROM feedbacks";

pub const FEEDBACK_SEARCH_COLUMNS: &[&str] = &["id", "client_id", "comment"];

const FEEDBACK_TABLE: SearchTable = SearchTable {
    table: "feedbacks",
    select_sql: FEEDBACK_SELECT_SQL,
    order_by: "created_at DESC, id ASC",
    searchable: FEEDBACK_SEARCH_COLUMNS,
};

pub trait FeedbackRepository {
    fn create_feedback(&self, feedback: &Feedback) -> RepoResult<Feedback>;
    fn find_feedback(&self, id: &str) -> RepoResult<Option<Feedback>>;
    fn find_feedbacks_by_client(&self, client_id: &str) -> RepoResult<Vec<Feedback>>;
    fn find_feedbacks(&self, status: FeedbackStatus, page: u32) -> RepoResult<Page<Feedback>>;
    fn search_feedbacks(
        &self,
        key: &str,
        mode: MatchMode,
        columns: &[&str],
        status: FeedbackStatus,
        page: u32,
    ) -> RepoResult<Page<Feedback>>;
    fn set_feedback_seen(&self, id: &str, seen: bool) -> RepoResult<()>;
    /// Detaches every feedback of `client_id`; returns the number of rows touched.
    fn clear_feedback_client(&self, client_id: &str) -> RepoResult<usize>;
    fn delete_feedback(&self, id: &str) -> RepoResult<()>;
    fn delete_feedbacks_by_client(&self, client_id: &str) -> RepoResult<usize>;
}

pub struct SqliteFeedbackRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteFeedbackRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl FeedbackRepository for SqliteFeedbackRepository<'_> {
    fn create_feedback(&self, feedback: &Feedback) -> RepoResult<Feedback> {
        let mut stored = feedback.clone();
        stored.id = mint_id(
            self.conn,
            "feedbacks",
            FEEDBACK_ID_PREFIX,
            FEEDBACK_ID_RANDOM_CHARS,
        )?;
        stored.created_at = now_epoch_ms();

        self.conn.execute(
            "INSERT INTO feedbacks (id, client_id, comment, seen, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                stored.id.as_str(),
                stored.client_id.as_deref(),
                stored.comment.as_str(),
                bool_to_int(stored.seen),
                stored.created_at,
            ],
        )?;

        Ok(stored)
    }

    fn find_feedback(&self, id: &str) -> RepoResult<Option<Feedback>> {
        query_one(
            self.conn,
            &format!("{FEEDBACK_SELECT_SQL} WHERE id = ?1"),
            vec![text(id)],
            parse_feedback_row,
        )
    }

    fn find_feedbacks_by_client(&self, client_id: &str) -> RepoResult<Vec<Feedback>> {
        query_rows(
            self.conn,
            &format!("{FEEDBACK_SELECT_SQL} WHERE client_id = ?1 ORDER BY created_at DESC, id ASC"),
            vec![text(client_id)],
            parse_feedback_row,
        )
    }

    fn find_feedbacks(&self, status: FeedbackStatus, page: u32) -> RepoResult<Page<Feedback>> {
        list_page(
            self.conn,
            &FEEDBACK_TABLE,
            seen_filter(status),
            page,
            parse_feedback_row,
        )
    }

    fn search_feedbacks(
        &self,
        key: &str,
        mode: MatchMode,
        columns: &[&str],
        status: FeedbackStatus,
        page: u32,
    ) -> RepoResult<Page<Feedback>> {
        search_page(
            self.conn,
            &FEEDBACK_TABLE,
            key,
            mode,
            columns,
            seen_filter(status),
            page,
            parse_feedback_row,
        )
    }

    fn set_feedback_seen(&self, id: &str, seen: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE feedbacks SET seen = ?1 WHERE id = ?2;",
            params![bool_to_int(seen), id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn clear_feedback_client(&self, client_id: &str) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "UPDATE feedbacks SET client_id = NULL WHERE client_id = ?1;",
            [client_id],
        )?;
        Ok(changed)
    }

    fn delete_feedback(&self, id: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM feedbacks WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn delete_feedbacks_by_client(&self, client_id: &str) -> RepoResult<usize> {
        let changed = self
            .conn
            .execute("DELETE FROM feedbacks WHERE client_id = ?1;", [client_id])?;
        Ok(changed)
    }
}

fn seen_filter(status: FeedbackStatus) -> Option<(&'static str, Value)> {
    status
        .seen_flag()
        .map(|seen| ("seen", Value::Integer(bool_to_int(seen))))
}

fn parse_feedback_row(row: &Row<'_>) -> RepoResult<Feedback> {
    let seen: i64 = row.get(3)?;
    Ok(Feedback {
        id: row.get(0)?,
        client_id: row.get(1)?,
        comment: row.get(2)?,
        seen: int_to_bool(seen, "feedbacks.seen")?,
        created_at: row.get(4)?,
    })
}
