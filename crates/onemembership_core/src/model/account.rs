//! Account records: users, service providers and their satellites.
//!
//! # Invariants
//! - `phone_number` is either empty or in `+<digits>` form after validation.
//! - `user_name` is either empty or lowercase after validation.
//! - Password rows never hold the plain password once persisted.

use serde::{Deserialize, Serialize};

/// End user who subscribes to plans.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Minted as `UR-<random><sequence>` on create. Empty for unsaved users.
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub user_name: String,
    pub phone_number: String,
    pub email: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        phone_number: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            phone_number: phone_number.into(),
            ..Self::default()
        }
    }
}

/// Account that owns projects and subscription plans.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceProvider {
    /// Minted as `SP-<random><sequence>` on create.
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub user_name: String,
    pub phone_number: String,
    pub email: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ServiceProvider {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        phone_number: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            phone_number: phone_number.into(),
            ..Self::default()
        }
    }
}

/// Hashed credential for a user.
///
/// `password` holds the plain text only between construction and
/// verification; afterwards it is an argon2 PHC string over `password + salt`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPassword {
    pub user_id: String,
    pub password: String,
    pub salt: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Hashed credential for a service provider. Same rules as [`UserPassword`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpPassword {
    pub provider_id: String,
    pub password: String,
    pub salt: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Earnings ledger of a service provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpWallet {
    pub provider_id: String,
    /// Amount accumulating from received subscription payments.
    pub running_amount: f64,
    /// Amount requested for withdrawal and not yet paid out.
    pub pending_amount: f64,
    /// Payout account number registered by the provider.
    pub linked_account: String,
    /// Institution holding `linked_account`, e.g. `CBE`.
    pub linked_account_provider: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Per-client settings. A client is either a user or a service provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientPreference {
    pub client_id: String,
    /// Language code; see [`crate::model::DEFAULT_LANGUAGE`].
    pub language: String,
}

impl ClientPreference {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            language: super::DEFAULT_LANGUAGE.to_string(),
        }
    }
}

/// Free-text comment left by a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    /// Minted as `FB-<random><sequence>` on create.
    pub id: String,
    /// `None` once the authoring client has been deleted.
    pub client_id: Option<String>,
    pub comment: String,
    pub seen: bool,
    pub created_at: i64,
}

impl Feedback {
    pub fn new(client_id: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            comment: comment.into(),
            ..Self::default()
        }
    }
}

/// Feedback listing filter on the `seen` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedbackStatus {
    Seen,
    Unseen,
    Any,
}

impl FeedbackStatus {
    /// Parses the `Seen`/`Unseen` labels; anything else selects every row.
    pub fn parse(value: &str) -> Self {
        match value {
            "Seen" => Self::Seen,
            "Unseen" => Self::Unseen,
            _ => Self::Any,
        }
    }

    pub(crate) fn seen_flag(self) -> Option<bool> {
        match self {
            Self::Seen => Some(true),
            Self::Unseen => Some(false),
            Self::Any => None,
        }
    }
}
