//! Member and platform subscriptions.

use super::{log_failure, map_repo_error, ServiceError, ServiceResult};
use crate::logging::SUBSCRIPTION_LOG;
use crate::model::subscription::{SpSubscription, Subscription};
use crate::repo::subscription_repo::{
    SpSubscriptionRepository, SqliteSpSubscriptionRepository, SqliteSubscriptionRepository,
    SubscriptionRepository,
};
use crate::validation::is_blank;
use log::info;
use rusqlite::Connection;

const MODULE: &str = "subscription";

pub struct SubscriptionService<'conn> {
    subscriptions: SqliteSubscriptionRepository<'conn>,
    sp_subscriptions: SqliteSpSubscriptionRepository<'conn>,
}

impl<'conn> SubscriptionService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            subscriptions: SqliteSubscriptionRepository::new(conn),
            sp_subscriptions: SqliteSpSubscriptionRepository::new(conn),
        }
    }

    /// Snapshots subscriber, plan, project and provider into an unsaved
    /// subscription expiring one plan duration from now.
    pub fn construct_subscription(
        &self,
        subscriber_id: &str,
        plan_id: &str,
    ) -> ServiceResult<Subscription> {
        info!(
            target: SUBSCRIPTION_LOG,
            "event=subscription_construct module={} status=start subscriber_id={} plan_id={}",
            MODULE,
            subscriber_id,
            plan_id
        );
        match self
            .subscriptions
            .construct_subscription(subscriber_id, plan_id)
        {
            Ok(Some(subscription)) => Ok(subscription),
            Ok(None) => Err(ServiceError::failed("unable to construct subscription")),
            Err(err) => Err(log_failure(
                MODULE,
                "subscription_construct",
                "unable to construct subscription",
                &err,
            )),
        }
    }

    pub fn add_subscription(&self, subscription: &Subscription) -> ServiceResult<Subscription> {
        let stored = self
            .subscriptions
            .create_subscription(subscription)
            .map_err(|err| {
                log_failure(
                    MODULE,
                    "subscription_add",
                    "unable to add new subscription",
                    &err,
                )
            })?;
        info!(
            target: SUBSCRIPTION_LOG,
            "event=subscription_add module={} status=ok id={} subscriber_id={} expires_at={}",
            MODULE,
            stored.id,
            stored.subscriber_id,
            stored.expires_at
        );
        Ok(stored)
    }

    pub fn find_subscription(&self, id: &str) -> ServiceResult<Subscription> {
        if is_blank(id) {
            return Err(ServiceError::not_found("no subscription found"));
        }
        match self.subscriptions.find_subscription(id) {
            Ok(Some(subscription)) => Ok(subscription),
            Ok(None) => Err(ServiceError::not_found("no subscription found")),
            Err(err) => Err(log_failure(
                MODULE,
                "subscription_find",
                "no subscription found",
                &err,
            )),
        }
    }

    /// Lists subscriptions whose subscriber, provider, project or plan id is
    /// `identifier`.
    pub fn find_multiple_subscriptions(&self, identifier: &str) -> Vec<Subscription> {
        self.subscriptions
            .find_subscriptions(identifier)
            .unwrap_or_else(|err| {
                log_failure(
                    MODULE,
                    "subscription_find_multiple",
                    "no subscription found",
                    &err,
                );
                Vec::new()
            })
    }

    pub fn update_subscription(&self, subscription: &Subscription) -> ServiceResult<Subscription> {
        let updated = self
            .subscriptions
            .update_subscription(subscription)
            .map_err(|err| {
                map_repo_error(
                    MODULE,
                    "subscription_update",
                    "no subscription found",
                    "unable to update subscription",
                    err,
                )
            })?;
        info!(
            target: SUBSCRIPTION_LOG,
            "event=subscription_update module={} status=ok id={}", MODULE, updated.id
        );
        Ok(updated)
    }

    pub fn delete_subscription(&self, id: &str) -> ServiceResult<Subscription> {
        let subscription = self.find_subscription(id)?;
        self.subscriptions
            .delete_subscription(&subscription.id)
            .map_err(|err| {
                map_repo_error(
                    MODULE,
                    "subscription_delete",
                    "no subscription found",
                    "unable to delete subscription",
                    err,
                )
            })?;
        info!(
            target: SUBSCRIPTION_LOG,
            "event=subscription_delete module={} status=ok id={}", MODULE, subscription.id
        );
        Ok(subscription)
    }

    pub fn delete_multiple_subscriptions(&self, identifier: &str) -> Vec<Subscription> {
        let subscriptions = self.find_multiple_subscriptions(identifier);
        match self.subscriptions.delete_subscriptions(identifier) {
            Ok(deleted) => {
                info!(
                    target: SUBSCRIPTION_LOG,
                    "event=subscription_delete_multiple module={} status=ok deleted={}",
                    MODULE,
                    deleted
                );
                subscriptions
            }
            Err(err) => {
                log_failure(
                    MODULE,
                    "subscription_delete_multiple",
                    "unable to delete subscriptions",
                    &err,
                );
                Vec::new()
            }
        }
    }

    pub fn add_sp_subscription(
        &self,
        subscription: &SpSubscription,
    ) -> ServiceResult<SpSubscription> {
        let stored = self
            .sp_subscriptions
            .create_sp_subscription(subscription)
            .map_err(|err| {
                log_failure(
                    MODULE,
                    "sp_subscription_add",
                    "unable to add new subscription",
                    &err,
                )
            })?;
        info!(
            target: SUBSCRIPTION_LOG,
            "event=sp_subscription_add module={} status=ok provider_id={} expires_at={}",
            MODULE,
            stored.provider_id,
            stored.expires_at
        );
        Ok(stored)
    }

    pub fn find_sp_subscription(&self, provider_id: &str) -> ServiceResult<SpSubscription> {
        if is_blank(provider_id) {
            return Err(ServiceError::not_found("no subscription found"));
        }
        match self.sp_subscriptions.find_sp_subscription(provider_id) {
            Ok(Some(subscription)) => Ok(subscription),
            Ok(None) => Err(ServiceError::not_found("no subscription found")),
            Err(err) => Err(log_failure(
                MODULE,
                "sp_subscription_find",
                "no subscription found",
                &err,
            )),
        }
    }

    pub fn find_multiple_sp_subscriptions(&self, plan_id: &str) -> Vec<SpSubscription> {
        self.sp_subscriptions
            .find_sp_subscriptions_by_plan(plan_id)
            .unwrap_or_else(|err| {
                log_failure(
                    MODULE,
                    "sp_subscription_find_multiple",
                    "no subscription found",
                    &err,
                );
                Vec::new()
            })
    }

    pub fn update_sp_subscription(
        &self,
        subscription: &SpSubscription,
    ) -> ServiceResult<SpSubscription> {
        let updated = self
            .sp_subscriptions
            .update_sp_subscription(subscription)
            .map_err(|err| {
                map_repo_error(
                    MODULE,
                    "sp_subscription_update",
                    "no subscription found",
                    "unable to update subscription",
                    err,
                )
            })?;
        info!(
            target: SUBSCRIPTION_LOG,
            "event=sp_subscription_update module={} status=ok provider_id={}",
            MODULE,
            updated.provider_id
        );
        Ok(updated)
    }

    pub fn delete_sp_subscription(&self, provider_id: &str) -> ServiceResult<SpSubscription> {
        let subscription = self.find_sp_subscription(provider_id)?;
        self.sp_subscriptions
            .delete_sp_subscription(provider_id)
            .map_err(|err| {
                map_repo_error(
                    MODULE,
                    "sp_subscription_delete",
                    "no subscription found",
                    "unable to delete subscription",
                    err,
                )
            })?;
        info!(
            target: SUBSCRIPTION_LOG,
            "event=sp_subscription_delete module={} status=ok provider_id={}",
            MODULE,
            provider_id
        );
        Ok(subscription)
    }

    pub fn delete_multiple_sp_subscriptions(&self, plan_id: &str) -> Vec<SpSubscription> {
        let subscriptions = self.find_multiple_sp_subscriptions(plan_id);
        match self.sp_subscriptions.delete_sp_subscriptions_by_plan(plan_id) {
            Ok(deleted) => {
                info!(
                    target: SUBSCRIPTION_LOG,
                    "event=sp_subscription_delete_multiple module={} status=ok plan_id={} deleted={}",
                    MODULE,
                    plan_id,
                    deleted
                );
                subscriptions
            }
            Err(err) => {
                log_failure(
                    MODULE,
                    "sp_subscription_delete_multiple",
                    "unable to delete subscriptions",
                    &err,
                );
                Vec::new()
            }
        }
    }
}
