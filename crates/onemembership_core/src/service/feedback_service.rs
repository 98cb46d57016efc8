//! Client feedback.
//!
//! # Invariants
//! - Feedback outlives its author: deleting a client only detaches it.

use super::{log_failure, map_repo_error, merge_search_pages, ServiceError, ServiceResult};
use crate::logging::SERVER_LOG;
use crate::model::account::{Feedback, FeedbackStatus};
use crate::repo::feedback_repo::{FeedbackRepository, SqliteFeedbackRepository};
use crate::repo::provider_repo::{ServiceProviderRepository, SqliteServiceProviderRepository};
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::repo::{MatchMode, Page};
use crate::validation::{char_len, is_blank, ErrMap};
use log::info;
use rusqlite::Connection;

const MODULE: &str = "feedback";

pub const MAX_COMMENT_CHARS: usize = 1000;

const EXACT_SEARCH_COLUMNS: &[&str] = &["id", "client_id"];

pub struct FeedbackService<'conn> {
    feedbacks: SqliteFeedbackRepository<'conn>,
    users: SqliteUserRepository<'conn>,
    providers: SqliteServiceProviderRepository<'conn>,
}

impl<'conn> FeedbackService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            feedbacks: SqliteFeedbackRepository::new(conn),
            users: SqliteUserRepository::new(conn),
            providers: SqliteServiceProviderRepository::new(conn),
        }
    }

    pub fn add_feedback(&self, feedback: &Feedback) -> ServiceResult<Feedback> {
        let stored = self.feedbacks.create_feedback(feedback).map_err(|err| {
            log_failure(MODULE, "feedback_add", "unable to add new feedback", &err)
        })?;
        info!(
            target: SERVER_LOG,
            "event=feedback_add module={} status=ok id={}", MODULE, stored.id
        );
        Ok(stored)
    }

    /// Checks the comment and that the author is a known user or provider.
    pub fn validate_feedback(&self, feedback: &Feedback) -> ErrMap {
        let mut errors = ErrMap::new();
        if is_blank(&feedback.comment) {
            errors.insert("comment", "comment can not be empty");
        } else if char_len(&feedback.comment) > MAX_COMMENT_CHARS {
            errors.insert("comment", "comment can not exceed 1000 characters");
        }

        let client_exists = match feedback.client_id.as_deref() {
            Some(client_id) if !is_blank(client_id) => self.client_exists(client_id),
            _ => false,
        };
        if !client_exists {
            errors.insert("client_id", "no client found for the provided client id");
        }
        errors
    }

    fn client_exists(&self, client_id: &str) -> bool {
        let user = self.users.find_user(client_id).unwrap_or_else(|err| {
            log_failure(MODULE, "feedback_validate", "client lookup failed", &err);
            None
        });
        if user.is_some() {
            return true;
        }
        self.providers
            .find_service_provider(client_id)
            .unwrap_or_else(|err| {
                log_failure(MODULE, "feedback_validate", "client lookup failed", &err);
                None
            })
            .is_some()
    }

    pub fn find_feedback(&self, id: &str) -> ServiceResult<Feedback> {
        if is_blank(id) {
            return Err(ServiceError::not_found("no feedback found"));
        }
        match self.feedbacks.find_feedback(id) {
            Ok(Some(feedback)) => Ok(feedback),
            Ok(None) => Err(ServiceError::not_found("no feedback found")),
            Err(err) => Err(log_failure(
                MODULE,
                "feedback_find",
                "no feedback found",
                &err,
            )),
        }
    }

    pub fn find_multiple_feedbacks(&self, client_id: &str) -> Vec<Feedback> {
        self.feedbacks
            .find_feedbacks_by_client(client_id)
            .unwrap_or_else(|err| {
                log_failure(MODULE, "feedback_find_multiple", "no feedback found", &err);
                Vec::new()
            })
    }

    pub fn all_feedbacks(&self, status: FeedbackStatus, page: u32) -> Page<Feedback> {
        self.feedbacks
            .find_feedbacks(status, page)
            .unwrap_or_else(|err| {
                log_failure(MODULE, "feedback_all", "no feedback found", &err);
                Page::empty()
            })
    }

    /// Exact match on id and client id, merged with a prefix match on the
    /// comment plus `extra` columns.
    pub fn search_feedbacks(
        &self,
        key: &str,
        status: FeedbackStatus,
        page: u32,
        extra: &[&str],
    ) -> Page<Feedback> {
        if is_blank(key) {
            return Page::empty();
        }
        let mut prefix_columns = vec!["comment"];
        prefix_columns.extend_from_slice(extra);

        let exact = self
            .feedbacks
            .search_feedbacks(key, MatchMode::Exact, EXACT_SEARCH_COLUMNS, status, page)
            .unwrap_or_else(|err| {
                log_failure(MODULE, "feedback_search", "search failed", &err);
                Page::empty()
            });
        let prefix = self
            .feedbacks
            .search_feedbacks(key, MatchMode::Prefix, &prefix_columns, status, page)
            .unwrap_or_else(|err| {
                log_failure(MODULE, "feedback_search", "search failed", &err);
                Page::empty()
            });
        merge_search_pages(exact, prefix, |feedback| feedback.id.as_str())
    }

    /// Marks an unseen feedback as seen. Fails on feedback already seen.
    pub fn mark_as_seen(&self, id: &str) -> ServiceResult<()> {
        let feedback = self
            .find_feedback(id)
            .map_err(|_| ServiceError::not_found("feedback not found"))?;
        if feedback.seen {
            return Err(ServiceError::failed("unable to perform operation"));
        }
        self.feedbacks.set_feedback_seen(id, true).map_err(|err| {
            map_repo_error(
                MODULE,
                "feedback_mark_seen",
                "feedback not found",
                "unable to update feedback",
                err,
            )
        })?;
        info!(
            target: SERVER_LOG,
            "event=feedback_mark_seen module={} status=ok id={}", MODULE, id
        );
        Ok(())
    }

    /// Detaches every feedback written by `client_id`.
    pub fn set_feedback_client_id_null(&self, client_id: &str) -> ServiceResult<usize> {
        let cleared = self
            .feedbacks
            .clear_feedback_client(client_id)
            .map_err(|err| {
                log_failure(
                    MODULE,
                    "feedback_clear_client",
                    "unable to erase feedbacks client id",
                    &err,
                )
            })?;
        info!(
            target: SERVER_LOG,
            "event=feedback_clear_client module={} status=ok client_id={} cleared={}",
            MODULE,
            client_id,
            cleared
        );
        Ok(cleared)
    }

    pub fn delete_feedback(&self, id: &str) -> ServiceResult<Feedback> {
        let feedback = self.find_feedback(id)?;
        self.feedbacks.delete_feedback(id).map_err(|err| {
            map_repo_error(
                MODULE,
                "feedback_delete",
                "no feedback found",
                "unable to delete feedback",
                err,
            )
        })?;
        info!(
            target: SERVER_LOG,
            "event=feedback_delete module={} status=ok id={}", MODULE, id
        );
        Ok(feedback)
    }

    pub fn delete_multiple_feedbacks(&self, client_id: &str) -> Vec<Feedback> {
        let feedbacks = self.find_multiple_feedbacks(client_id);
        match self.feedbacks.delete_feedbacks_by_client(client_id) {
            Ok(deleted) => {
                info!(
                    target: SERVER_LOG,
                    "event=feedback_delete_multiple module={} status=ok client_id={} deleted={}",
                    MODULE,
                    client_id,
                    deleted
                );
                feedbacks
            }
            Err(err) => {
                log_failure(
                    MODULE,
                    "feedback_delete_multiple",
                    "unable to delete feedbacks",
                    &err,
                );
                Vec::new()
            }
        }
    }
}
