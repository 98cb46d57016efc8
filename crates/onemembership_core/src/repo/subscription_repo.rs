//! Subscription snapshot persistence.
//!
//! # Responsibility
//! - Assemble subscription snapshots from live user, plan, project and
//!   provider rows.
//! - Store user and provider subscriptions.
//!
//! # Invariants
//! - Ids are minted as `SUB-<7 random><row count + 1>`.
//! - Stored snapshots never reference live rows through foreign keys, except
//!   the provider subscription which is keyed by its provider.

use super::{bool_to_int, int_to_bool, mint_id, query_one, query_rows, text, RepoError, RepoResult};
use crate::model::subscription::{SpSubscription, Subscription};
use crate::util::{add_days, now_epoch_ms};
use rusqlite::{params, Connection, Row};

pub const SUBSCRIPTION_ID_PREFIX: &str = "SUB-";
const SUBSCRIPTION_ID_RANDOM_CHARS: usize = 7;

const SUBSCRIPTION_SELECT_SQL: &str = "SELECT
    id,
    subscriber_id,
    subscriber_first_name,
    subscriber_last_name,
    subscriber_user_name,
    subscriber_phone_number,
    subscriber_email,
    provider_id,
    provider_first_name,
    provider_last_name,
    provider_user_name,
    provider_phone_number,
    provider_email,
    project_id,
    project_name,
    project_description,
    project_link,
    subscription_plan_id,
    subscription_plan_name,
    subscription_plan_benefits,
    subscription_plan_duration,
    subscription_plan_price,
    subscription_plan_is_recurring,
    subscription_plan_currency,
    created_at,
    updated_at,
    expires_at
FROM subscriptions";

const CONSTRUCT_SQL: &str = "SELECT
    u.id,
    u.first_name,
    u.last_name,
    u.user_name,
    u.phone_number,
    u.email,
    sp.id,
    sp.first_name,
    sp.last_name,
    sp.user_name,
    sp.phone_number,
    sp.email,
    p.id,
    p.name,
    p.description,
    p.project_link,
    pl.id,
    pl.name,
    pl.benefits,
    pl.duration,
    pl.price,
    pl.is_recurring,
    pl.currency
FROM subscription_plans pl
JOIN projects p ON p.id = pl.project_id
JOIN service_providers sp ON sp.id = p.provider_id
JOIN users u ON u.id = ?1
WHERE pl.id = ?2";

const SP_SUBSCRIPTION_SELECT_SQL: &str = "SELECT
    provider_id,
    subscription_plan_id,
    subscription_plan_name,
    subscription_plan_duration,
    subscription_plan_price,
    subscription_plan_currency,
    created_at,
    updated_at,
    expires_at
FROM sp_subscriptions";

const SUBSCRIPTION_OWNER_WHERE: &str = "subscriber_id = ?1
    OR provider_id = ?1
    OR project_id = ?1
    OR subscription_plan_id = ?1";

pub trait SubscriptionRepository {
    /// Builds an unsaved snapshot with `expires_at = now + plan duration`.
    ///
    /// Returns `None` when the subscriber or any link of the plan chain is missing.
    fn construct_subscription(
        &self,
        subscriber_id: &str,
        plan_id: &str,
    ) -> RepoResult<Option<Subscription>>;
    fn create_subscription(&self, subscription: &Subscription) -> RepoResult<Subscription>;
    fn find_subscription(&self, id: &str) -> RepoResult<Option<Subscription>>;
    /// Matches subscriber, provider, project or plan id.
    fn find_subscriptions(&self, identifier: &str) -> RepoResult<Vec<Subscription>>;
    fn update_subscription(&self, subscription: &Subscription) -> RepoResult<Subscription>;
    fn delete_subscription(&self, id: &str) -> RepoResult<()>;
    fn delete_subscriptions(&self, identifier: &str) -> RepoResult<usize>;
}

pub trait SpSubscriptionRepository {
    fn create_sp_subscription(&self, subscription: &SpSubscription)
        -> RepoResult<SpSubscription>;
    fn find_sp_subscription(&self, provider_id: &str) -> RepoResult<Option<SpSubscription>>;
    fn find_sp_subscriptions_by_plan(&self, plan_id: &str) -> RepoResult<Vec<SpSubscription>>;
    fn update_sp_subscription(&self, subscription: &SpSubscription)
        -> RepoResult<SpSubscription>;
    fn delete_sp_subscription(&self, provider_id: &str) -> RepoResult<()>;
    fn delete_sp_subscriptions_by_plan(&self, plan_id: &str) -> RepoResult<usize>;
}

pub struct SqliteSubscriptionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSubscriptionRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl SubscriptionRepository for SqliteSubscriptionRepository<'_> {
    fn construct_subscription(
        &self,
        subscriber_id: &str,
        plan_id: &str,
    ) -> RepoResult<Option<Subscription>> {
        query_one(
            self.conn,
            CONSTRUCT_SQL,
            vec![text(subscriber_id), text(plan_id)],
            |row| {
                let is_recurring: i64 = row.get(21)?;
                let duration: i64 = row.get(19)?;
                let now = now_epoch_ms();
                Ok(Subscription {
                    id: String::new(),
                    subscriber_id: row.get(0)?,
                    subscriber_first_name: row.get(1)?,
                    subscriber_last_name: row.get(2)?,
                    subscriber_user_name: row.get(3)?,
                    subscriber_phone_number: row.get(4)?,
                    subscriber_email: row.get(5)?,
                    provider_id: row.get(6)?,
                    provider_first_name: row.get(7)?,
                    provider_last_name: row.get(8)?,
                    provider_user_name: row.get(9)?,
                    provider_phone_number: row.get(10)?,
                    provider_email: row.get(11)?,
                    project_id: row.get(12)?,
                    project_name: row.get(13)?,
                    project_description: row.get(14)?,
                    project_link: row.get(15)?,
                    subscription_plan_id: row.get(16)?,
                    subscription_plan_name: row.get(17)?,
                    subscription_plan_benefits: row.get(18)?,
                    subscription_plan_duration: duration,
                    subscription_plan_price: row.get(20)?,
                    subscription_plan_is_recurring: int_to_bool(
                        is_recurring,
                        "subscription_plans.is_recurring",
                    )?,
                    subscription_plan_currency: row.get(22)?,
                    created_at: now,
                    updated_at: now,
                    expires_at: add_days(now, duration),
                })
            },
        )
    }

    fn create_subscription(&self, subscription: &Subscription) -> RepoResult<Subscription> {
        let mut stored = subscription.clone();
        stored.id = mint_id(
            self.conn,
            "subscriptions",
            SUBSCRIPTION_ID_PREFIX,
            SUBSCRIPTION_ID_RANDOM_CHARS,
        )?;
        stored.created_at = now_epoch_ms();
        stored.updated_at = stored.created_at;

        self.conn.execute(
            "INSERT INTO subscriptions (
                id,
                subscriber_id,
                subscriber_first_name,
                subscriber_last_name,
                subscriber_user_name,
                subscriber_phone_number,
                subscriber_email,
                provider_id,
                provider_first_name,
                provider_last_name,
                provider_user_name,
                provider_phone_number,
                provider_email,
                project_id,
                project_name,
                project_description,
                project_link,
                subscription_plan_id,
                subscription_plan_name,
                subscription_plan_benefits,
                subscription_plan_duration,
                subscription_plan_price,
                subscription_plan_is_recurring,
                subscription_plan_currency,
                created_at,
                updated_at,
                expires_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27
            );",
            params![
                stored.id.as_str(),
                stored.subscriber_id.as_str(),
                stored.subscriber_first_name.as_str(),
                stored.subscriber_last_name.as_str(),
                stored.subscriber_user_name.as_str(),
                stored.subscriber_phone_number.as_str(),
                stored.subscriber_email.as_str(),
                stored.provider_id.as_str(),
                stored.provider_first_name.as_str(),
                stored.provider_last_name.as_str(),
                stored.provider_user_name.as_str(),
                stored.provider_phone_number.as_str(),
                stored.provider_email.as_str(),
                stored.project_id.as_str(),
                stored.project_name.as_str(),
                stored.project_description.as_str(),
                stored.project_link.as_str(),
                stored.subscription_plan_id.as_str(),
                stored.subscription_plan_name.as_str(),
                stored.subscription_plan_benefits.as_str(),
                stored.subscription_plan_duration,
                stored.subscription_plan_price,
                bool_to_int(stored.subscription_plan_is_recurring),
                stored.subscription_plan_currency.as_str(),
                stored.created_at,
                stored.updated_at,
                stored.expires_at,
            ],
        )?;

        Ok(stored)
    }

    fn find_subscription(&self, id: &str) -> RepoResult<Option<Subscription>> {
        query_one(
            self.conn,
            &format!("{SUBSCRIPTION_SELECT_SQL} WHERE id = ?1"),
            vec![text(id)],
            parse_subscription_row,
        )
    }

    fn find_subscriptions(&self, identifier: &str) -> RepoResult<Vec<Subscription>> {
        query_rows(
            self.conn,
            &format!(
                "{SUBSCRIPTION_SELECT_SQL} WHERE {SUBSCRIPTION_OWNER_WHERE}
                 ORDER BY created_at DESC, id ASC"
            ),
            vec![text(identifier)],
            parse_subscription_row,
        )
    }

    fn update_subscription(&self, subscription: &Subscription) -> RepoResult<Subscription> {
        let changed = self.conn.execute(
            "UPDATE subscriptions
             SET
                subscriber_first_name = ?1,
                subscriber_last_name = ?2,
                subscriber_user_name = ?3,
                subscriber_phone_number = ?4,
                subscriber_email = ?5,
                subscription_plan_name = ?6,
                subscription_plan_benefits = ?7,
                subscription_plan_duration = ?8,
                subscription_plan_price = ?9,
                subscription_plan_is_recurring = ?10,
                subscription_plan_currency = ?11,
                expires_at = ?12,
                updated_at = ?13
             WHERE id = ?14;",
            params![
                subscription.subscriber_first_name.as_str(),
                subscription.subscriber_last_name.as_str(),
                subscription.subscriber_user_name.as_str(),
                subscription.subscriber_phone_number.as_str(),
                subscription.subscriber_email.as_str(),
                subscription.subscription_plan_name.as_str(),
                subscription.subscription_plan_benefits.as_str(),
                subscription.subscription_plan_duration,
                subscription.subscription_plan_price,
                bool_to_int(subscription.subscription_plan_is_recurring),
                subscription.subscription_plan_currency.as_str(),
                subscription.expires_at,
                now_epoch_ms(),
                subscription.id.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(subscription.id.clone()));
        }

        self.find_subscription(&subscription.id)?
            .ok_or_else(|| RepoError::NotFound(subscription.id.clone()))
    }

    fn delete_subscription(&self, id: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM subscriptions WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn delete_subscriptions(&self, identifier: &str) -> RepoResult<usize> {
        let changed = self.conn.execute(
            &format!("DELETE FROM subscriptions WHERE {SUBSCRIPTION_OWNER_WHERE};"),
            [identifier],
        )?;
        Ok(changed)
    }
}

pub struct SqliteSpSubscriptionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSpSubscriptionRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl SpSubscriptionRepository for SqliteSpSubscriptionRepository<'_> {
    fn create_sp_subscription(
        &self,
        subscription: &SpSubscription,
    ) -> RepoResult<SpSubscription> {
        let mut stored = subscription.clone();
        stored.created_at = now_epoch_ms();
        stored.updated_at = stored.created_at;

        self.conn.execute(
            "INSERT INTO sp_subscriptions (
                provider_id,
                subscription_plan_id,
                subscription_plan_name,
                subscription_plan_duration,
                subscription_plan_price,
                subscription_plan_currency,
                created_at,
                updated_at,
                expires_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                stored.provider_id.as_str(),
                stored.subscription_plan_id.as_str(),
                stored.subscription_plan_name.as_str(),
                stored.subscription_plan_duration,
                stored.subscription_plan_price,
                stored.subscription_plan_currency.as_str(),
                stored.created_at,
                stored.updated_at,
                stored.expires_at,
            ],
        )?;

        Ok(stored)
    }

    fn find_sp_subscription(&self, provider_id: &str) -> RepoResult<Option<SpSubscription>> {
        query_one(
            self.conn,
            &format!("{SP_SUBSCRIPTION_SELECT_SQL} WHERE provider_id = ?1"),
            vec![text(provider_id)],
            parse_sp_subscription_row,
        )
    }

    fn find_sp_subscriptions_by_plan(&self, plan_id: &str) -> RepoResult<Vec<SpSubscription>> {
        query_rows(
            self.conn,
            &format!(
                "{SP_SUBSCRIPTION_SELECT_SQL} WHERE subscription_plan_id = ?1
                 ORDER BY created_at DESC, provider_id ASC"
            ),
            vec![text(plan_id)],
            parse_sp_subscription_row,
        )
    }

    fn update_sp_subscription(
        &self,
        subscription: &SpSubscription,
    ) -> RepoResult<SpSubscription> {
        let changed = self.conn.execute(
            "UPDATE sp_subscriptions
             SET
                subscription_plan_id = ?1,
                subscription_plan_name = ?2,
                subscription_plan_duration = ?3,
                subscription_plan_price = ?4,
                subscription_plan_currency = ?5,
                expires_at = ?6,
                updated_at = ?7
             WHERE provider_id = ?8;",
            params![
                subscription.subscription_plan_id.as_str(),
                subscription.subscription_plan_name.as_str(),
                subscription.subscription_plan_duration,
                subscription.subscription_plan_price,
                subscription.subscription_plan_currency.as_str(),
                subscription.expires_at,
                now_epoch_ms(),
                subscription.provider_id.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(subscription.provider_id.clone()));
        }

        self.find_sp_subscription(&subscription.provider_id)?
            .ok_or_else(|| RepoError::NotFound(subscription.provider_id.clone()))
    }

    fn delete_sp_subscription(&self, provider_id: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM sp_subscriptions WHERE provider_id = ?1;",
            [provider_id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(provider_id.to_string()));
        }
        Ok(())
    }

    fn delete_sp_subscriptions_by_plan(&self, plan_id: &str) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "DELETE FROM sp_subscriptions WHERE subscription_plan_id = ?1;",
            [plan_id],
        )?;
        Ok(changed)
    }
}

fn parse_subscription_row(row: &Row<'_>) -> RepoResult<Subscription> {
    let is_recurring: i64 = row.get(22)?;
    Ok(Subscription {
        id: row.get(0)?,
        subscriber_id: row.get(1)?,
        subscriber_first_name: row.get(2)?,
        subscriber_last_name: row.get(3)?,
        subscriber_user_name: row.get(4)?,
        subscriber_phone_number: row.get(5)?,
        subscriber_email: row.get(6)?,
        provider_id: row.get(7)?,
        provider_first_name: row.get(8)?,
        provider_last_name: row.get(9)?,
        provider_user_name: row.get(10)?,
        provider_phone_number: row.get(11)?,
        provider_email: row.get(12)?,
        project_id: row.get(13)?,
        project_name: row.get(14)?,
        project_description: row.get(15)?,
        project_link: row.get(16)?,
        subscription_plan_id: row.get(17)?,
        subscription_plan_name: row.get(18)?,
        subscription_plan_benefits: row.get(19)?,
        subscription_plan_duration: row.get(20)?,
        subscription_plan_price: row.get(21)?,
        subscription_plan_is_recurring: int_to_bool(
            is_recurring,
            "subscriptions.subscription_plan_is_recurring",
        )?,
        subscription_plan_currency: row.get(23)?,
        created_at: row.get(24)?,
        updated_at: row.get(25)?,
        expires_at: row.get(26)?,
    })
}

fn parse_sp_subscription_row(row: &Row<'_>) -> RepoResult<SpSubscription> {
    Ok(SpSubscription {
        provider_id: row.get(0)?,
        subscription_plan_id: row.get(1)?,
        subscription_plan_name: row.get(2)?,
        subscription_plan_duration: row.get(3)?,
        subscription_plan_price: row.get(4)?,
        subscription_plan_currency: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        expires_at: row.get(8)?,
    })
}
