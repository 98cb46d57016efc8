//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Validate input and collect per-field failures.
//! - Log every mutation to its channel and every failure to the error channel.
//!
//! # Invariants
//! - Callers only ever see generic failure messages; causes stay in the logs.
//! - Services never bypass repository persistence contracts.

use crate::logging::{sanitize_message, ERROR_LOG};
use crate::repo::{Page, RepoError};
use crate::validation::ErrMap;
use log::error;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod common_service;
pub mod deleted_service;
pub mod feedback_service;
pub mod password;
pub mod plan_service;
pub mod preference_service;
mod profile;
pub mod project_service;
pub mod provider_service;
pub mod subscription_service;
pub mod transaction_service;
pub mod user_service;

const MAX_LOGGED_ERROR_CHARS: usize = 300;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Failure surfaced to service callers.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// Input rejected; one message per offending field.
    Validation(ErrMap),
    /// Lookup matched nothing, e.g. `no user found`.
    NotFound(String),
    /// Operation failed, e.g. `unable to add new user`.
    Failed(String),
}

impl ServiceError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Returns the validation map, if this is a validation failure.
    pub fn field_errors(&self) -> Option<&ErrMap> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(errors) => write!(f, "{errors}"),
            Self::NotFound(message) => write!(f, "{message}"),
            Self::Failed(message) => write!(f, "{message}"),
        }
    }
}

impl Error for ServiceError {}

impl From<ErrMap> for ServiceError {
    fn from(value: ErrMap) -> Self {
        Self::Validation(value)
    }
}

/// Logs `cause` to the error channel and returns a generic failure.
pub(crate) fn log_failure(
    module: &str,
    event: &str,
    message: &str,
    cause: &dyn Display,
) -> ServiceError {
    error!(
        target: ERROR_LOG,
        "event={} module={} status=error error={}",
        event,
        module,
        sanitize_message(&cause.to_string(), MAX_LOGGED_ERROR_CHARS)
    );
    ServiceError::Failed(message.to_string())
}

/// Maps a repository error: `NotFound` keeps `not_found`, the rest become `failed`.
pub(crate) fn map_repo_error(
    module: &str,
    event: &str,
    not_found: &str,
    failed: &str,
    err: RepoError,
) -> ServiceError {
    match err {
        RepoError::NotFound(_) => ServiceError::NotFound(not_found.to_string()),
        other => log_failure(module, event, failed, &other),
    }
}

/// Merges an exact-match page with a prefix-match page.
///
/// Rows keep first-seen order and are deduplicated by `id`. The page count is
/// the larger of the two.
pub(crate) fn merge_search_pages<T>(
    exact: Page<T>,
    prefix: Page<T>,
    id: impl Fn(&T) -> &str,
) -> Page<T> {
    let page_count = exact.page_count.max(prefix.page_count);
    let mut seen = HashSet::new();
    let mut items = Vec::with_capacity(exact.items.len() + prefix.items.len());
    for item in exact.items.into_iter().chain(prefix.items) {
        if seen.insert(id(&item).to_string()) {
            items.push(item);
        }
    }
    Page { items, page_count }
}

#[cfg(test)]
mod tests {
    use super::merge_search_pages;
    use crate::repo::Page;

    #[test]
    fn merge_search_pages_dedupes_and_keeps_max_page_count() {
        let exact = Page {
            items: vec!["a", "b"],
            page_count: 1,
        };
        let prefix = Page {
            items: vec!["b", "c"],
            page_count: 3,
        };

        let merged = merge_search_pages(exact, prefix, |item| *item);

        assert_eq!(merged.items, vec!["a", "b", "c"]);
        assert_eq!(merged.page_count, 3);
    }
}
