//! Domain records for the membership backend.
//!
//! # Responsibility
//! - Define the entities persisted by repositories and returned by services.
//! - Hold the fixed status vocabularies shared across modules.
//!
//! # Invariants
//! - Timestamps are unix epoch milliseconds.
//! - Entity ids are minted by repositories on create, never by callers.
//! - Subscriptions and transactions are snapshots: they copy the fields they
//!   need instead of referencing live rows.

pub mod account;
pub mod catalog;
pub mod deleted;
pub mod language;
pub mod subscription;
pub mod transaction;

/// Language code used when a client has no explicit preference.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Chat kinds a project or plan can be linked to.
pub const VALID_CHAT_TYPES: &[&str] = &["CHANNEL", "GROUP"];

/// Currencies accepted for plan prices and transactions.
pub const VALID_CURRENCY_TYPES: &[&str] = &["ETB"];

/// Payout account providers a wallet can be linked to.
pub const VALID_LINKED_ACCOUNT_PROVIDERS: &[&str] = &["CBE", "Telebirr"];
