//! Payment records: gateways, subscription payments and provider payouts.
//!
//! # Invariants
//! - `nonce` and `out_trade_no` are unique per transaction table.
//! - `total charged = received_amount + transaction_fee`.

use serde::{Deserialize, Serialize};

/// Settlement state shared by payment and payroll transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Pending,
    Complete,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Complete => "Complete",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Pending" => Some(Self::Pending),
            "Complete" => Some(Self::Complete),
            _ => None,
        }
    }
}

/// Interface a payment request was started from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitiatedFrom {
    TelegramBot,
    Web,
}

impl InitiatedFrom {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TelegramBot => "telegram_bot",
            Self::Web => "web",
        }
    }
}

/// Registered payment provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentGateway {
    /// Assigned by storage on create.
    pub id: i64,
    pub name: String,
    pub created_at: i64,
}

impl PaymentGateway {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            created_at: 0,
        }
    }
}

/// Payment by a user for a subscription plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionTransaction {
    /// Minted as `SBT-<random><sequence>` on create.
    pub id: String,
    pub user_id: String,
    pub plan_id: String,
    /// Gateway application id the payment went through.
    pub app_id: String,
    pub receiver_name: String,
    pub subject: String,
    /// Amount credited to the service provider.
    pub received_amount: f64,
    /// Gateway fee added on top of `received_amount`.
    pub transaction_fee: f64,
    pub currency_type: String,
    /// Minutes the gateway keeps the order open.
    pub timeout_express: i64,
    pub nonce: String,
    pub out_trade_no: String,
    /// Gateway-side trade number, filled on settlement.
    pub trade_no: String,
    pub status: TransactionStatus,
    pub initiated_from: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Payment by a service provider for a platform plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpSubscriptionTransaction {
    /// Minted as `SBT-<random><sequence>` with a longer random part.
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
    pub status: TransactionStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Payout from a provider wallet to its linked account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpPayrollTransaction {
    /// Minted as `PRT-<random><sequence>` on create.
    pub id: String,
    pub provider_id: String,
    pub payed_amount: f64,
    pub linked_account: String,
    pub linked_account_provider: String,
    pub status: TransactionStatus,
    pub created_at: i64,
    pub updated_at: i64,
}
