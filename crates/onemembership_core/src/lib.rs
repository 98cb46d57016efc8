//! Membership backend core: accounts, catalog, subscriptions, payments and
//! bot sessions over a migrated SQLite store.
//!
//! Services in [`service`] are the entry points; they validate input, call the
//! repositories in [`repo`] and log to the channels defined in [`logging`].

pub mod bot;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod payment;
pub mod repo;
pub mod service;
pub mod util;
pub mod validation;

pub use config::{load_config_dir, AppConfig, ConfigError};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::account::{ServiceProvider, User};
pub use payment::{PaymentError, PaymentTransport, TelebirrClient, UreqTransport};
pub use repo::{Page, RepoError, RepoResult};
pub use service::subscription_service::SubscriptionService;
pub use service::transaction_service::{TransactionService, WebPayment};
pub use service::user_service::UserService;
pub use service::{ServiceError, ServiceResult};
pub use validation::ErrMap;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_matches_manifest() {
        assert_eq!(core_version(), env!("CARGO_PKG_VERSION"));
        assert!(!core_version().is_empty());
    }
}
