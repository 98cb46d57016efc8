//! Subscription plans, platform plans and plan chat access.
//!
//! # Responsibility
//! - Validate and persist plans sold by providers and by the platform.
//! - Track which chats a plan grants and which invites users received.
//!
//! # Invariants
//! - Prices are stored rounded to two decimals.
//! - Currencies are stored in their canonical uppercase spelling.

use super::common_service::{canonical_choice, valid_currency_types};
use super::{log_failure, map_repo_error, ServiceError, ServiceResult};
use crate::logging::SUBSCRIPTION_PLAN_LOG;
use crate::model::catalog::{
    ChatLinkKey, PlanChatLink, SpSubscriptionPlan, SubscriptionPlan, UserChatLink,
};
use crate::repo::plan_repo::{
    PlanChatLinkRepository, SpSubscriptionPlanRepository, SqlitePlanChatLinkRepository,
    SqliteSpSubscriptionPlanRepository, SqliteSubscriptionPlanRepository,
    SqliteUserChatLinkRepository, SubscriptionPlanRepository, UserChatLinkRepository,
};
use crate::repo::RepoResult;
use crate::util::round2;
use crate::validation::{char_len, is_blank, ErrMap};
use log::info;
use rusqlite::Connection;

const MODULE: &str = "subscription_plan";

pub const MAX_PLAN_NAME_CHARS: usize = 255;
pub const MAX_PLAN_BENEFITS_CHARS: usize = 2000;
pub const MIN_PLAN_DURATION_DAYS: i64 = 1;
pub const MAX_PLAN_DURATION_DAYS: i64 = 1_000_000;

pub struct SubscriptionPlanService<'conn> {
    plans: SqliteSubscriptionPlanRepository<'conn>,
    sp_plans: SqliteSpSubscriptionPlanRepository<'conn>,
    plan_chat_links: SqlitePlanChatLinkRepository<'conn>,
    user_chat_links: SqliteUserChatLinkRepository<'conn>,
}

impl<'conn> SubscriptionPlanService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            plans: SqliteSubscriptionPlanRepository::new(conn),
            sp_plans: SqliteSpSubscriptionPlanRepository::new(conn),
            plan_chat_links: SqlitePlanChatLinkRepository::new(conn),
            user_chat_links: SqliteUserChatLinkRepository::new(conn),
        }
    }

    pub fn add_subscription_plan(
        &self,
        plan: &SubscriptionPlan,
    ) -> ServiceResult<SubscriptionPlan> {
        info!(
            target: SUBSCRIPTION_PLAN_LOG,
            "event=plan_add module={} status=start project_id={}", MODULE, plan.project_id
        );
        let stored = self.plans.create_plan(plan).map_err(|err| {
            log_failure(
                MODULE,
                "plan_add",
                "unable to add new subscription plan",
                &err,
            )
        })?;
        info!(
            target: SUBSCRIPTION_PLAN_LOG,
            "event=plan_add module={} status=ok id={}", MODULE, stored.id
        );
        Ok(stored)
    }

    /// Validates `plan`, rounding its price and normalizing its currency in
    /// place.
    pub fn validate_subscription_plan(&self, plan: &mut SubscriptionPlan) -> ErrMap {
        let mut errors = ErrMap::new();
        let excluding = (!is_blank(&plan.id)).then_some(plan.id.as_str());
        let name_taken = self
            .plans
            .plan_name_taken(&plan.project_id, &plan.name, excluding);
        check_plan_name(
            &plan.name,
            name_taken,
            "subscription plan name already exists in the current project",
            &mut errors,
        );

        if char_len(&plan.benefits) > MAX_PLAN_BENEFITS_CHARS {
            errors.insert(
                "benfits",
                "subscription plan benfits should not be longer than 2000 characters",
            );
        }

        check_plan_terms(
            plan.duration,
            &mut plan.price,
            &mut plan.currency,
            &mut errors,
        );
        errors
    }

    pub fn find_subscription_plan(&self, id: &str) -> ServiceResult<SubscriptionPlan> {
        if is_blank(id) {
            return Err(ServiceError::not_found("no subscription plan found"));
        }
        match self.plans.find_plan(id) {
            Ok(Some(plan)) => Ok(plan),
            Ok(None) => Err(ServiceError::not_found("no subscription plan found")),
            Err(err) => Err(log_failure(
                MODULE,
                "plan_find",
                "no subscription plan found",
                &err,
            )),
        }
    }

    pub fn find_multiple_subscription_plans(&self, project_id: &str) -> Vec<SubscriptionPlan> {
        self.plans
            .find_plans_by_project(project_id)
            .unwrap_or_else(|err| {
                log_failure(
                    MODULE,
                    "plan_find_multiple",
                    "no subscription plan found",
                    &err,
                );
                Vec::new()
            })
    }

    pub fn update_subscription_plan(
        &self,
        plan: &SubscriptionPlan,
    ) -> ServiceResult<SubscriptionPlan> {
        let updated = self.plans.update_plan(plan).map_err(|err| {
            map_repo_error(
                MODULE,
                "plan_update",
                "no subscription plan found",
                "unable to update subscription plan",
                err,
            )
        })?;
        info!(
            target: SUBSCRIPTION_PLAN_LOG,
            "event=plan_update module={} status=ok id={}", MODULE, updated.id
        );
        Ok(updated)
    }

    pub fn delete_subscription_plan(&self, id: &str) -> ServiceResult<SubscriptionPlan> {
        let plan = self.find_subscription_plan(id)?;
        self.plans.delete_plan(&plan.id).map_err(|err| {
            map_repo_error(
                MODULE,
                "plan_delete",
                "no subscription plan found",
                "unable to delete subscription plan",
                err,
            )
        })?;
        info!(
            target: SUBSCRIPTION_PLAN_LOG,
            "event=plan_delete module={} status=ok id={}", MODULE, plan.id
        );
        Ok(plan)
    }

    pub fn delete_multiple_subscription_plans(&self, project_id: &str) -> Vec<SubscriptionPlan> {
        let plans = self.find_multiple_subscription_plans(project_id);
        match self.plans.delete_plans_by_project(project_id) {
            Ok(deleted) => {
                info!(
                    target: SUBSCRIPTION_PLAN_LOG,
                    "event=plan_delete_multiple module={} status=ok project_id={} deleted={}",
                    MODULE,
                    project_id,
                    deleted
                );
                plans
            }
            Err(err) => {
                log_failure(
                    MODULE,
                    "plan_delete_multiple",
                    "unable to delete subscription plans",
                    &err,
                );
                Vec::new()
            }
        }
    }

    pub fn add_sp_subscription_plan(
        &self,
        plan: &SpSubscriptionPlan,
    ) -> ServiceResult<SpSubscriptionPlan> {
        let stored = self.sp_plans.create_sp_plan(plan).map_err(|err| {
            log_failure(
                MODULE,
                "sp_plan_add",
                "unable to add new subscription plan",
                &err,
            )
        })?;
        info!(
            target: SUBSCRIPTION_PLAN_LOG,
            "event=sp_plan_add module={} status=ok id={}", MODULE, stored.id
        );
        Ok(stored)
    }

    /// Same rules as [`Self::validate_subscription_plan`] without benefits;
    /// names are unique across platform plans.
    pub fn validate_sp_subscription_plan(&self, plan: &mut SpSubscriptionPlan) -> ErrMap {
        let mut errors = ErrMap::new();
        let excluding = (!is_blank(&plan.id)).then_some(plan.id.as_str());
        let name_taken = self.sp_plans.sp_plan_name_taken(&plan.name, excluding);
        check_plan_name(
            &plan.name,
            name_taken,
            "subscription plan name already exists",
            &mut errors,
        );
        check_plan_terms(
            plan.duration,
            &mut plan.price,
            &mut plan.currency,
            &mut errors,
        );
        errors
    }

    pub fn find_sp_subscription_plan(&self, id: &str) -> ServiceResult<SpSubscriptionPlan> {
        if is_blank(id) {
            return Err(ServiceError::not_found("no subscription plan found"));
        }
        match self.sp_plans.find_sp_plan(id) {
            Ok(Some(plan)) => Ok(plan),
            Ok(None) => Err(ServiceError::not_found("no subscription plan found")),
            Err(err) => Err(log_failure(
                MODULE,
                "sp_plan_find",
                "no subscription plan found",
                &err,
            )),
        }
    }

    pub fn all_sp_subscription_plans(&self) -> Vec<SpSubscriptionPlan> {
        self.sp_plans.all_sp_plans().unwrap_or_else(|err| {
            log_failure(MODULE, "sp_plan_all", "no subscription plan found", &err);
            Vec::new()
        })
    }

    pub fn update_sp_subscription_plan(
        &self,
        plan: &SpSubscriptionPlan,
    ) -> ServiceResult<SpSubscriptionPlan> {
        let updated = self.sp_plans.update_sp_plan(plan).map_err(|err| {
            map_repo_error(
                MODULE,
                "sp_plan_update",
                "no subscription plan found",
                "unable to update subscription plan",
                err,
            )
        })?;
        info!(
            target: SUBSCRIPTION_PLAN_LOG,
            "event=sp_plan_update module={} status=ok id={}", MODULE, updated.id
        );
        Ok(updated)
    }

    pub fn delete_sp_subscription_plan(&self, id: &str) -> ServiceResult<SpSubscriptionPlan> {
        let plan = self.find_sp_subscription_plan(id)?;
        self.sp_plans.delete_sp_plan(&plan.id).map_err(|err| {
            map_repo_error(
                MODULE,
                "sp_plan_delete",
                "no subscription plan found",
                "unable to delete subscription plan",
                err,
            )
        })?;
        info!(
            target: SUBSCRIPTION_PLAN_LOG,
            "event=sp_plan_delete module={} status=ok id={}", MODULE, plan.id
        );
        Ok(plan)
    }

    pub fn add_plan_chat_link(&self, link: &PlanChatLink) -> ServiceResult<()> {
        self.plan_chat_links
            .create_plan_chat_link(link)
            .map_err(|err| {
                log_failure(
                    MODULE,
                    "plan_chat_link_add",
                    "unable to add new subscription plan to chat link",
                    &err,
                )
            })?;
        info!(
            target: SUBSCRIPTION_PLAN_LOG,
            "event=plan_chat_link_add module={} status=ok plan_id={} chat_id={}",
            MODULE,
            link.plan_id,
            link.chat_id
        );
        Ok(())
    }

    pub fn validate_plan_chat_link(&self, link: &PlanChatLink) -> ErrMap {
        let mut errors = ErrMap::new();
        if link.chat_id == 0 {
            errors.insert("chat_id", "invalid chat id used");
        } else if self.find_plan_chat_link(&link.plan_id, link.chat_id).is_ok() {
            errors.insert("chat_id", "chat already linked to the subscription plan");
        }
        if self.find_subscription_plan(&link.plan_id).is_err() {
            errors.insert("plan_id", "no subscription plan found");
        }
        errors
    }

    pub fn find_plan_chat_link(&self, plan_id: &str, chat_id: i64) -> ServiceResult<PlanChatLink> {
        match self.plan_chat_links.find_plan_chat_link(plan_id, chat_id) {
            Ok(Some(link)) => Ok(link),
            Ok(None) => Err(ServiceError::not_found(
                "no subscription plan to chat link found",
            )),
            Err(err) => Err(log_failure(
                MODULE,
                "plan_chat_link_find",
                "no subscription plan to chat link found",
                &err,
            )),
        }
    }

    /// Lists chat links of a plan ([`ChatLinkKey::Plan`]) or of a chat
    /// ([`ChatLinkKey::Chat`]).
    pub fn find_multiple_plan_chat_links(&self, key: &ChatLinkKey) -> Vec<PlanChatLink> {
        self.plan_chat_links
            .find_plan_chat_links(key)
            .unwrap_or_else(|err| {
                log_failure(
                    MODULE,
                    "plan_chat_link_find_multiple",
                    "no subscription plan to chat link found",
                    &err,
                );
                Vec::new()
            })
    }

    pub fn delete_plan_chat_link(
        &self,
        plan_id: &str,
        chat_id: i64,
    ) -> ServiceResult<PlanChatLink> {
        let link = self.find_plan_chat_link(plan_id, chat_id)?;
        self.plan_chat_links
            .delete_plan_chat_link(plan_id, chat_id)
            .map_err(|err| {
                map_repo_error(
                    MODULE,
                    "plan_chat_link_delete",
                    "no subscription plan to chat link found",
                    "unable to delete subscription plan to chat link",
                    err,
                )
            })?;
        info!(
            target: SUBSCRIPTION_PLAN_LOG,
            "event=plan_chat_link_delete module={} status=ok plan_id={} chat_id={}",
            MODULE,
            plan_id,
            chat_id
        );
        Ok(link)
    }

    pub fn delete_multiple_plan_chat_links(&self, key: &ChatLinkKey) -> Vec<PlanChatLink> {
        let links = self.find_multiple_plan_chat_links(key);
        match self.plan_chat_links.delete_plan_chat_links(key) {
            Ok(deleted) => {
                info!(
                    target: SUBSCRIPTION_PLAN_LOG,
                    "event=plan_chat_link_delete_multiple module={} status=ok deleted={}",
                    MODULE,
                    deleted
                );
                links
            }
            Err(err) => {
                log_failure(
                    MODULE,
                    "plan_chat_link_delete_multiple",
                    "unable to delete subscription plan to chat links",
                    &err,
                );
                Vec::new()
            }
        }
    }

    /// Records an invite issued to a subscriber; stamps `created_at`.
    pub fn add_user_chat_link(&self, link: &UserChatLink) -> ServiceResult<UserChatLink> {
        let stored = self
            .user_chat_links
            .create_user_chat_link(link)
            .map_err(|err| {
                log_failure(
                    MODULE,
                    "user_chat_link_add",
                    "unable to add new user to chat link",
                    &err,
                )
            })?;
        info!(
            target: SUBSCRIPTION_PLAN_LOG,
            "event=user_chat_link_add module={} status=ok user_id={} plan_id={} chat_id={}",
            MODULE,
            stored.user_id,
            stored.plan_id,
            stored.chat_id
        );
        Ok(stored)
    }

    pub fn find_user_chat_link(
        &self,
        user_id: &str,
        plan_id: &str,
        chat_id: i64,
    ) -> ServiceResult<UserChatLink> {
        match self
            .user_chat_links
            .find_user_chat_link(user_id, plan_id, chat_id)
        {
            Ok(Some(link)) => Ok(link),
            Ok(None) => Err(ServiceError::not_found("no user to chat link found")),
            Err(err) => Err(log_failure(
                MODULE,
                "user_chat_link_find",
                "no user to chat link found",
                &err,
            )),
        }
    }

    /// Lists invites by user, plan or chat.
    pub fn find_multiple_user_chat_links(&self, key: &ChatLinkKey) -> Vec<UserChatLink> {
        self.user_chat_links
            .find_user_chat_links(key)
            .unwrap_or_else(|err| {
                log_failure(
                    MODULE,
                    "user_chat_link_find_multiple",
                    "no user to chat link found",
                    &err,
                );
                Vec::new()
            })
    }

    pub fn delete_user_chat_link(
        &self,
        user_id: &str,
        plan_id: &str,
        chat_id: i64,
    ) -> ServiceResult<UserChatLink> {
        let link = self.find_user_chat_link(user_id, plan_id, chat_id)?;
        self.user_chat_links
            .delete_user_chat_link(user_id, plan_id, chat_id)
            .map_err(|err| {
                map_repo_error(
                    MODULE,
                    "user_chat_link_delete",
                    "no user to chat link found",
                    "unable to delete user to chat link",
                    err,
                )
            })?;
        info!(
            target: SUBSCRIPTION_PLAN_LOG,
            "event=user_chat_link_delete module={} status=ok user_id={} plan_id={} chat_id={}",
            MODULE,
            user_id,
            plan_id,
            chat_id
        );
        Ok(link)
    }

    pub fn delete_multiple_user_chat_links(&self, key: &ChatLinkKey) -> Vec<UserChatLink> {
        let links = self.find_multiple_user_chat_links(key);
        match self.user_chat_links.delete_user_chat_links(key) {
            Ok(deleted) => {
                info!(
                    target: SUBSCRIPTION_PLAN_LOG,
                    "event=user_chat_link_delete_multiple module={} status=ok deleted={}",
                    MODULE,
                    deleted
                );
                links
            }
            Err(err) => {
                log_failure(
                    MODULE,
                    "user_chat_link_delete_multiple",
                    "unable to delete user to chat links",
                    &err,
                );
                Vec::new()
            }
        }
    }
}

fn check_plan_name(
    name: &str,
    name_taken: RepoResult<bool>,
    taken_message: &str,
    errors: &mut ErrMap,
) {
    if is_blank(name) {
        errors.insert("name", "subscription plan name can not be empty");
        return;
    }
    if char_len(name) > MAX_PLAN_NAME_CHARS {
        errors.insert(
            "name",
            "subscription plan name should not be longer than 255 characters",
        );
        return;
    }
    match name_taken {
        Ok(false) => {}
        Ok(true) => errors.insert("name", taken_message),
        Err(err) => {
            log_failure(MODULE, "plan_validate", "name lookup failed", &err);
            errors.insert("name", taken_message);
        }
    }
}

/// Checks duration, price and currency shared by every plan kind.
fn check_plan_terms(duration: i64, price: &mut f64, currency: &mut String, errors: &mut ErrMap) {
    if !(MIN_PLAN_DURATION_DAYS..=MAX_PLAN_DURATION_DAYS).contains(&duration) {
        errors.insert("duration", "invalid subscription plan duration used");
    }

    if *price < 0.0 || !price.is_finite() {
        errors.insert("price", "invalid subscription plan price used");
    } else {
        *price = round2(*price);
    }

    match canonical_choice(currency, valid_currency_types()) {
        Some(canonical) => *currency = canonical.to_string(),
        None => errors.insert("currency", "invalid currency type selected"),
    }
}

#[cfg(test)]
mod tests {
    use super::check_plan_terms;
    use crate::validation::ErrMap;

    #[test]
    fn plan_terms_round_price_and_normalize_currency() {
        let mut errors = ErrMap::new();
        let mut price = 99.999;
        let mut currency = "etb".to_string();

        check_plan_terms(30, &mut price, &mut currency, &mut errors);

        assert!(errors.is_empty());
        assert_eq!(price, 100.0);
        assert_eq!(currency, "ETB");
    }

    #[test]
    fn plan_terms_reject_out_of_range_values() {
        let mut errors = ErrMap::new();
        let mut price = -1.0;
        let mut currency = "usd".to_string();

        check_plan_terms(0, &mut price, &mut currency, &mut errors);

        assert!(errors.contains("duration"));
        assert!(errors.contains("price"));
        assert!(errors.contains("currency"));
        assert_eq!(price, -1.0);
    }
}
