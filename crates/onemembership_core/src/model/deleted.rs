//! Trash records retained after their live counterparts are removed.
//!
//! # Invariants
//! - A trashed owner id is prefixed with the trash row id:
//!   `<trash id>_<original id>`.
//! - Trash rows are append-only from the service layer.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedUser {
    /// Minted as `DUR_<random><sequence>`.
    pub id: String,
    /// `<id>_<original user id>`.
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub user_name: String,
    pub phone_number: String,
    pub email: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedServiceProvider {
    /// Minted as `DSP_<random><sequence>`.
    pub id: String,
    /// `<id>_<original provider id>`.
    pub provider_id: String,
    pub first_name: String,
    pub last_name: String,
    pub user_name: String,
    pub phone_number: String,
    pub email: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletedSubscriptionTransaction {
    pub id: String,
    pub user_id: String,
    pub plan_id: String,
    pub app_id: String,
    pub receiver_name: String,
    pub subject: String,
    pub received_amount: f64,
    pub transaction_fee: f64,
    pub currency_type: String,
    pub timeout_express: i64,
    pub nonce: String,
    pub out_trade_no: String,
    pub trade_no: String,
    pub status: String,
    pub initiated_from: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletedSpSubscriptionTransaction {
    pub id: String,
    pub provider_id: String,
    pub plan_id: String,
    pub app_id: String,
    pub receiver_name: String,
    pub subject: String,
    pub received_amount: f64,
    pub transaction_fee: f64,
    pub currency_type: String,
    pub timeout_express: i64,
    pub nonce: String,
    pub out_trade_no: String,
    pub trade_no: String,
    pub status: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletedSpPayrollTransaction {
    pub id: String,
    pub provider_id: String,
    pub payed_amount: f64,
    pub linked_account: String,
    pub linked_account_provider: String,
    pub status: String,
    pub created_at: i64,
}
