//! Catalog records: projects, subscription plans and their chat links.
//!
//! # Responsibility
//! - Describe what a service provider sells and where members are admitted.
//!
//! # Invariants
//! - `project_link` is globally unique when non-empty.
//! - Plan names are unique within one project.
//! - A `(project_id, chat_id)` or `(plan_id, chat_id)` pair is linked at most once.

use serde::{Deserialize, Serialize};

/// Project lifecycle. Projects are drafted step by step through the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectStatus {
    /// Name registered, remaining fields pending.
    DraftName,
    Complete,
}

impl ProjectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DraftName => "Draft_Name",
            Self::Complete => "Complete",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Draft_Name" => Some(Self::DraftName),
            "Complete" => Some(Self::Complete),
            _ => None,
        }
    }
}

/// Membership offering owned by a service provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Minted as `Pr-<random><sequence>` on create.
    pub id: String,
    pub provider_id: String,
    pub name: String,
    pub description: String,
    /// Short public handle, lowercase word characters only.
    pub project_link: String,
    pub status: ProjectStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Project {
    pub fn new(provider_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            provider_id: provider_id.into(),
            name: name.into(),
            description: String::new(),
            project_link: String::new(),
            status: ProjectStatus::DraftName,
            created_at: 0,
            updated_at: 0,
        }
    }
}

/// Chat (channel or group) that belongs to a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectChatLink {
    pub project_id: String,
    pub chat_id: i64,
    /// One of [`crate::model::VALID_CHAT_TYPES`].
    #[serde(rename = "type")]
    pub kind: String,
}

/// Plan lifecycle. Each draft state names the last field captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanStatus {
    DraftName,
    DraftBenefits,
    DraftRecurring,
    DraftDuration,
    Complete,
}

impl PlanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DraftName => "Draft_Name",
            // Persisted label, spelling included.
            Self::DraftBenefits => "Draft_Benfits",
            Self::DraftRecurring => "Draft_Recurring",
            Self::DraftDuration => "Draft_Duration",
            Self::Complete => "Complete",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Draft_Name" => Some(Self::DraftName),
            "Draft_Benfits" => Some(Self::DraftBenefits),
            "Draft_Recurring" => Some(Self::DraftRecurring),
            "Draft_Duration" => Some(Self::DraftDuration),
            "Complete" => Some(Self::Complete),
            _ => None,
        }
    }
}

/// Priced, timed benefit bundle tied to a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    /// Minted as `SBP-<random><sequence>` on create.
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub benefits: String,
    /// Length of one subscription period in days.
    pub duration: i64,
    pub price: f64,
    pub currency: String,
    pub is_recurring: bool,
    pub status: PlanStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl SubscriptionPlan {
    pub fn new(project_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            project_id: project_id.into(),
            name: name.into(),
            benefits: String::new(),
            duration: 0,
            price: 0.0,
            currency: String::new(),
            is_recurring: false,
            status: PlanStatus::DraftName,
            created_at: 0,
            updated_at: 0,
        }
    }
}

/// Plan sold by the platform to service providers themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpSubscriptionPlan {
    pub id: String,
    pub name: String,
    /// Days.
    pub duration: i64,
    pub price: f64,
    pub currency: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Chat a plan grants access to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanChatLink {
    pub plan_id: String,
    pub chat_id: i64,
}

/// Invite issued to a subscribed user for one of the plan chats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserChatLink {
    pub user_id: String,
    pub plan_id: String,
    pub chat_id: i64,
    pub invite_link: String,
    pub created_at: i64,
}

/// Selector for chat-link bulk lookups and deletions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatLinkKey {
    /// Owning project (project chat links only).
    Project(String),
    /// Owning plan.
    Plan(String),
    /// Owning user (user chat links only).
    User(String),
    /// Linked chat.
    Chat(i64),
}
