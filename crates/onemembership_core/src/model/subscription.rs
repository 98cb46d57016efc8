//! Subscription snapshots.
//!
//! A subscription copies subscriber, provider, project and plan fields at the
//! time of purchase so later edits or deletions do not rewrite history.

use serde::{Deserialize, Serialize};

/// A user's active or past membership of one plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    /// Minted as `SUB-<random><sequence>` on create.
    pub id: String,

    pub subscriber_id: String,
    pub subscriber_first_name: String,
    pub subscriber_last_name: String,
    pub subscriber_user_name: String,
    pub subscriber_phone_number: String,
    pub subscriber_email: String,

    pub provider_id: String,
    pub provider_first_name: String,
    pub provider_last_name: String,
    pub provider_user_name: String,
    pub provider_phone_number: String,
    pub provider_email: String,

    pub project_id: String,
    pub project_name: String,
    pub project_description: String,
    pub project_link: String,

    pub subscription_plan_id: String,
    pub subscription_plan_name: String,
    pub subscription_plan_benefits: String,
    pub subscription_plan_duration: i64,
    pub subscription_plan_price: f64,
    pub subscription_plan_is_recurring: bool,
    pub subscription_plan_currency: String,

    pub created_at: i64,
    pub updated_at: i64,
    pub expires_at: i64,
}

/// A service provider's platform subscription. One per provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpSubscription {
    pub provider_id: String,

    pub subscription_plan_id: String,
    pub subscription_plan_name: String,
    pub subscription_plan_duration: i64,
    pub subscription_plan_price: f64,
    pub subscription_plan_currency: String,

    pub created_at: i64,
    pub updated_at: i64,
    pub expires_at: i64,
}
