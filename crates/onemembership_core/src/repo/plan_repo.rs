//! Subscription plan, platform plan and plan chat-link persistence.
//!
//! # Invariants
//! - Plan ids are minted as `SBP-<7 random><row count + 1>` per table.
//! - Plans cascade away with their project; chat links with their plan.

use super::{
    bool_to_int, int_to_bool, mint_id, query_one, query_rows, text, RepoError, RepoResult,
};
use crate::model::catalog::{
    ChatLinkKey, PlanChatLink, PlanStatus, SpSubscriptionPlan, SubscriptionPlan, UserChatLink,
};
use crate::util::now_epoch_ms;
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub const PLAN_ID_PREFIX: &str = "SBP-";
const PLAN_ID_RANDOM_CHARS: usize = 7;

const PLAN_SELECT_SQL: &str = "SELECT
    id,
    project_id,
    name,
    benefits,
    duration,
    price,
    currency,
    is_recurring,
    status,
    created_at,
    updated_at
FROM subscription_plans";

const SP_PLAN_SELECT_SQL: &str = "SELECT
    id,
    name,
    duration,
    price,
    currency,
    created_at,
    updated_at
FROM sp_subscription_plans";

const PLAN_CHAT_LINK_SELECT_SQL: &str = "SELECT plan_id, chat_id FROM plan_chat_links";
const USER_CHAT_LINK_SELECT_SQL: &str =
    "SELECT user_id, plan_id, chat_id, invite_link, created_at FROM user_chat_links";

pub trait SubscriptionPlanRepository {
    fn create_plan(&self, plan: &SubscriptionPlan) -> RepoResult<SubscriptionPlan>;
    fn find_plan(&self, id: &str) -> RepoResult<Option<SubscriptionPlan>>;
    fn find_plans_by_project(&self, project_id: &str) -> RepoResult<Vec<SubscriptionPlan>>;
    /// Returns whether another plan of `project_id` already uses `name`.
    fn plan_name_taken(
        &self,
        project_id: &str,
        name: &str,
        excluding_id: Option<&str>,
    ) -> RepoResult<bool>;
    fn update_plan(&self, plan: &SubscriptionPlan) -> RepoResult<SubscriptionPlan>;
    fn delete_plan(&self, id: &str) -> RepoResult<()>;
    fn delete_plans_by_project(&self, project_id: &str) -> RepoResult<usize>;
}

pub trait SpSubscriptionPlanRepository {
    fn create_sp_plan(&self, plan: &SpSubscriptionPlan) -> RepoResult<SpSubscriptionPlan>;
    fn find_sp_plan(&self, id: &str) -> RepoResult<Option<SpSubscriptionPlan>>;
    fn all_sp_plans(&self) -> RepoResult<Vec<SpSubscriptionPlan>>;
    fn sp_plan_name_taken(&self, name: &str, excluding_id: Option<&str>) -> RepoResult<bool>;
    fn update_sp_plan(&self, plan: &SpSubscriptionPlan) -> RepoResult<SpSubscriptionPlan>;
    fn delete_sp_plan(&self, id: &str) -> RepoResult<()>;
}

pub trait PlanChatLinkRepository {
    fn create_plan_chat_link(&self, link: &PlanChatLink) -> RepoResult<()>;
    fn find_plan_chat_link(&self, plan_id: &str, chat_id: i64)
        -> RepoResult<Option<PlanChatLink>>;
    /// Accepts [`ChatLinkKey::Plan`] and [`ChatLinkKey::Chat`].
    fn find_plan_chat_links(&self, key: &ChatLinkKey) -> RepoResult<Vec<PlanChatLink>>;
    fn delete_plan_chat_link(&self, plan_id: &str, chat_id: i64) -> RepoResult<()>;
    fn delete_plan_chat_links(&self, key: &ChatLinkKey) -> RepoResult<usize>;
}

pub trait UserChatLinkRepository {
    fn create_user_chat_link(&self, link: &UserChatLink) -> RepoResult<UserChatLink>;
    fn find_user_chat_link(
        &self,
        user_id: &str,
        plan_id: &str,
        chat_id: i64,
    ) -> RepoResult<Option<UserChatLink>>;
    /// Accepts [`ChatLinkKey::User`], [`ChatLinkKey::Plan`] and [`ChatLinkKey::Chat`].
    fn find_user_chat_links(&self, key: &ChatLinkKey) -> RepoResult<Vec<UserChatLink>>;
    fn delete_user_chat_link(&self, user_id: &str, plan_id: &str, chat_id: i64)
        -> RepoResult<()>;
    fn delete_user_chat_links(&self, key: &ChatLinkKey) -> RepoResult<usize>;
}

pub struct SqliteSubscriptionPlanRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSubscriptionPlanRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl SubscriptionPlanRepository for SqliteSubscriptionPlanRepository<'_> {
    fn create_plan(&self, plan: &SubscriptionPlan) -> RepoResult<SubscriptionPlan> {
        let mut stored = plan.clone();
        stored.id = mint_id(
            self.conn,
            "subscription_plans",
            PLAN_ID_PREFIX,
            PLAN_ID_RANDOM_CHARS,
        )?;
        stored.created_at = now_epoch_ms();
        stored.updated_at = stored.created_at;

        self.conn.execute(
            "INSERT INTO subscription_plans (
                id,
                project_id,
                name,
                benefits,
                duration,
                price,
                currency,
                is_recurring,
                status,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
            params![
                stored.id.as_str(),
                stored.project_id.as_str(),
                stored.name.as_str(),
                stored.benefits.as_str(),
                stored.duration,
                stored.price,
                stored.currency.as_str(),
                bool_to_int(stored.is_recurring),
                stored.status.as_str(),
                stored.created_at,
                stored.updated_at,
            ],
        )?;

        Ok(stored)
    }

    fn find_plan(&self, id: &str) -> RepoResult<Option<SubscriptionPlan>> {
        query_one(
            self.conn,
            &format!("{PLAN_SELECT_SQL} WHERE id = ?1"),
            vec![text(id)],
            parse_plan_row,
        )
    }

    fn find_plans_by_project(&self, project_id: &str) -> RepoResult<Vec<SubscriptionPlan>> {
        query_rows(
            self.conn,
            &format!("{PLAN_SELECT_SQL} WHERE project_id = ?1 ORDER BY created_at ASC, id ASC"),
            vec![text(project_id)],
            parse_plan_row,
        )
    }

    fn plan_name_taken(
        &self,
        project_id: &str,
        name: &str,
        excluding_id: Option<&str>,
    ) -> RepoResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM subscription_plans
                 WHERE project_id = ?1 AND name = ?2 AND (?3 IS NULL OR id <> ?3)
                 LIMIT 1;",
                params![project_id, name, excluding_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn update_plan(&self, plan: &SubscriptionPlan) -> RepoResult<SubscriptionPlan> {
        let changed = self.conn.execute(
            "UPDATE subscription_plans
             SET
                name = ?1,
                benefits = ?2,
                duration = ?3,
                price = ?4,
                currency = ?5,
                is_recurring = ?6,
                status = ?7,
                updated_at = ?8
             WHERE id = ?9;",
            params![
                plan.name.as_str(),
                plan.benefits.as_str(),
                plan.duration,
                plan.price,
                plan.currency.as_str(),
                bool_to_int(plan.is_recurring),
                plan.status.as_str(),
                now_epoch_ms(),
                plan.id.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(plan.id.clone()));
        }

        self.find_plan(&plan.id)?
            .ok_or_else(|| RepoError::NotFound(plan.id.clone()))
    }

    fn delete_plan(&self, id: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM subscription_plans WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn delete_plans_by_project(&self, project_id: &str) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "DELETE FROM subscription_plans WHERE project_id = ?1;",
            [project_id],
        )?;
        Ok(changed)
    }
}

pub struct SqliteSpSubscriptionPlanRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSpSubscriptionPlanRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl SpSubscriptionPlanRepository for SqliteSpSubscriptionPlanRepository<'_> {
    fn create_sp_plan(&self, plan: &SpSubscriptionPlan) -> RepoResult<SpSubscriptionPlan> {
        let mut stored = plan.clone();
        stored.id = mint_id(
            self.conn,
            "sp_subscription_plans",
            PLAN_ID_PREFIX,
            PLAN_ID_RANDOM_CHARS,
        )?;
        stored.created_at = now_epoch_ms();
        stored.updated_at = stored.created_at;

        self.conn.execute(
            "INSERT INTO sp_subscription_plans (
                id,
                name,
                duration,
                price,
                currency,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                stored.id.as_str(),
                stored.name.as_str(),
                stored.duration,
                stored.price,
                stored.currency.as_str(),
                stored.created_at,
                stored.updated_at,
            ],
        )?;

        Ok(stored)
    }

    fn find_sp_plan(&self, id: &str) -> RepoResult<Option<SpSubscriptionPlan>> {
        query_one(
            self.conn,
            &format!("{SP_PLAN_SELECT_SQL} WHERE id = ?1"),
            vec![text(id)],
            parse_sp_plan_row,
        )
    }

    fn all_sp_plans(&self) -> RepoResult<Vec<SpSubscriptionPlan>> {
        query_rows(
            self.conn,
            &format!("{SP_PLAN_SELECT_SQL} ORDER BY price ASC, name ASC"),
            Vec::new(),
            parse_sp_plan_row,
        )
    }

    fn sp_plan_name_taken(&self, name: &str, excluding_id: Option<&str>) -> RepoResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM sp_subscription_plans
                 WHERE name = ?1 AND (?2 IS NULL OR id <> ?2)
                 LIMIT 1;",
                params![name, excluding_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn update_sp_plan(&self, plan: &SpSubscriptionPlan) -> RepoResult<SpSubscriptionPlan> {
        let changed = self.conn.execute(
            "UPDATE sp_subscription_plans
             SET name = ?1, duration = ?2, price = ?3, currency = ?4, updated_at = ?5
             WHERE id = ?6;",
            params![
                plan.name.as_str(),
                plan.duration,
                plan.price,
                plan.currency.as_str(),
                now_epoch_ms(),
                plan.id.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(plan.id.clone()));
        }

        self.find_sp_plan(&plan.id)?
            .ok_or_else(|| RepoError::NotFound(plan.id.clone()))
    }

    fn delete_sp_plan(&self, id: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM sp_subscription_plans WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

pub struct SqlitePlanChatLinkRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePlanChatLinkRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl PlanChatLinkRepository for SqlitePlanChatLinkRepository<'_> {
    fn create_plan_chat_link(&self, link: &PlanChatLink) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO plan_chat_links (plan_id, chat_id) VALUES (?1, ?2);",
            params![link.plan_id.as_str(), link.chat_id],
        )?;
        Ok(())
    }

    fn find_plan_chat_link(
        &self,
        plan_id: &str,
        chat_id: i64,
    ) -> RepoResult<Option<PlanChatLink>> {
        query_one(
            self.conn,
            &format!("{PLAN_CHAT_LINK_SELECT_SQL} WHERE plan_id = ?1 AND chat_id = ?2"),
            vec![text(plan_id), Value::Integer(chat_id)],
            parse_plan_chat_link_row,
        )
    }

    fn find_plan_chat_links(&self, key: &ChatLinkKey) -> RepoResult<Vec<PlanChatLink>> {
        let (column, value) = plan_chat_link_filter(key)?;
        query_rows(
            self.conn,
            &format!("{PLAN_CHAT_LINK_SELECT_SQL} WHERE {column} = ?1 ORDER BY plan_id, chat_id"),
            vec![value],
            parse_plan_chat_link_row,
        )
    }

    fn delete_plan_chat_link(&self, plan_id: &str, chat_id: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM plan_chat_links WHERE plan_id = ?1 AND chat_id = ?2;",
            params![plan_id, chat_id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!("{plan_id}/{chat_id}")));
        }
        Ok(())
    }

    fn delete_plan_chat_links(&self, key: &ChatLinkKey) -> RepoResult<usize> {
        let (column, value) = plan_chat_link_filter(key)?;
        let changed = self.conn.execute(
            &format!("DELETE FROM plan_chat_links WHERE {column} = ?1;"),
            [value],
        )?;
        Ok(changed)
    }
}

pub struct SqliteUserChatLinkRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserChatLinkRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl UserChatLinkRepository for SqliteUserChatLinkRepository<'_> {
    fn create_user_chat_link(&self, link: &UserChatLink) -> RepoResult<UserChatLink> {
        let mut stored = link.clone();
        stored.created_at = now_epoch_ms();
        self.conn.execute(
            "INSERT INTO user_chat_links (user_id, plan_id, chat_id, invite_link, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                stored.user_id.as_str(),
                stored.plan_id.as_str(),
                stored.chat_id,
                stored.invite_link.as_str(),
                stored.created_at,
            ],
        )?;
        Ok(stored)
    }

    fn find_user_chat_link(
        &self,
        user_id: &str,
        plan_id: &str,
        chat_id: i64,
    ) -> RepoResult<Option<UserChatLink>> {
        query_one(
            self.conn,
            &format!(
                "{USER_CHAT_LINK_SELECT_SQL} WHERE user_id = ?1 AND plan_id = ?2 AND chat_id = ?3"
            ),
            vec![text(user_id), text(plan_id), Value::Integer(chat_id)],
            parse_user_chat_link_row,
        )
    }

    fn find_user_chat_links(&self, key: &ChatLinkKey) -> RepoResult<Vec<UserChatLink>> {
        let (column, value) = user_chat_link_filter(key)?;
        query_rows(
            self.conn,
            &format!(
                "{USER_CHAT_LINK_SELECT_SQL} WHERE {column} = ?1 ORDER BY created_at ASC, chat_id"
            ),
            vec![value],
            parse_user_chat_link_row,
        )
    }

    fn delete_user_chat_link(&self, user_id: &str, plan_id: &str, chat_id: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM user_chat_links WHERE user_id = ?1 AND plan_id = ?2 AND chat_id = ?3;",
            params![user_id, plan_id, chat_id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!("{user_id}/{plan_id}/{chat_id}")));
        }
        Ok(())
    }

    fn delete_user_chat_links(&self, key: &ChatLinkKey) -> RepoResult<usize> {
        let (column, value) = user_chat_link_filter(key)?;
        let changed = self.conn.execute(
            &format!("DELETE FROM user_chat_links WHERE {column} = ?1;"),
            [value],
        )?;
        Ok(changed)
    }
}

fn plan_chat_link_filter(key: &ChatLinkKey) -> RepoResult<(&'static str, Value)> {
    match key {
        ChatLinkKey::Plan(id) => Ok(("plan_id", text(id))),
        ChatLinkKey::Chat(chat_id) => Ok(("chat_id", Value::Integer(*chat_id))),
        ChatLinkKey::Project(_) => Err(RepoError::InvalidColumn("project_id".to_string())),
        ChatLinkKey::User(_) => Err(RepoError::InvalidColumn("user_id".to_string())),
    }
}

fn user_chat_link_filter(key: &ChatLinkKey) -> RepoResult<(&'static str, Value)> {
    match key {
        ChatLinkKey::User(id) => Ok(("user_id", text(id))),
        ChatLinkKey::Plan(id) => Ok(("plan_id", text(id))),
        ChatLinkKey::Chat(chat_id) => Ok(("chat_id", Value::Integer(*chat_id))),
        ChatLinkKey::Project(_) => Err(RepoError::InvalidColumn("project_id".to_string())),
    }
}

fn parse_plan_row(row: &Row<'_>) -> RepoResult<SubscriptionPlan> {
    let is_recurring: i64 = row.get(7)?;
    let status_raw: String = row.get(8)?;
    let status = PlanStatus::parse(&status_raw).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid subscription_plans.status `{status_raw}`"))
    })?;

    Ok(SubscriptionPlan {
        id: row.get(0)?,
        project_id: row.get(1)?,
        name: row.get(2)?,
        benefits: row.get(3)?,
        duration: row.get(4)?,
        price: row.get(5)?,
        currency: row.get(6)?,
        is_recurring: int_to_bool(is_recurring, "subscription_plans.is_recurring")?,
        status,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn parse_sp_plan_row(row: &Row<'_>) -> RepoResult<SpSubscriptionPlan> {
    Ok(SpSubscriptionPlan {
        id: row.get(0)?,
        name: row.get(1)?,
        duration: row.get(2)?,
        price: row.get(3)?,
        currency: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn parse_plan_chat_link_row(row: &Row<'_>) -> RepoResult<PlanChatLink> {
    Ok(PlanChatLink {
        plan_id: row.get(0)?,
        chat_id: row.get(1)?,
    })
}

fn parse_user_chat_link_row(row: &Row<'_>) -> RepoResult<UserChatLink> {
    Ok(UserChatLink {
        user_id: row.get(0)?,
        plan_id: row.get(1)?,
        chat_id: row.get(2)?,
        invite_link: row.get(3)?,
        created_at: row.get(4)?,
    })
}
