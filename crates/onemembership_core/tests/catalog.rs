use onemembership_core::db::open_db_in_memory;
use onemembership_core::model::account::{ServiceProvider, User};
use onemembership_core::model::catalog::{
    ChatLinkKey, PlanChatLink, Project, ProjectChatLink, SpSubscriptionPlan, SubscriptionPlan,
    UserChatLink,
};
use onemembership_core::model::subscription::SpSubscription;
use onemembership_core::service::plan_service::SubscriptionPlanService;
use onemembership_core::service::project_service::ProjectService;
use onemembership_core::service::provider_service::ServiceProviderService;
use onemembership_core::service::subscription_service::SubscriptionService;
use onemembership_core::service::user_service::UserService;
use onemembership_core::util::add_days;
use onemembership_core::ServiceError;
use rusqlite::Connection;

fn provider(conn: &Connection) -> ServiceProvider {
    let mut provider = ServiceProvider::new("Sara", "Alemu", "+251922000001");
    provider.user_name = "sara".to_string();
    ServiceProviderService::new(conn)
        .add_service_provider(&provider)
        .unwrap()
}

fn project(conn: &Connection, provider_id: &str, name: &str, link: &str) -> Project {
    let projects = ProjectService::new(conn);
    let mut project = Project::new(provider_id, name);
    project.project_link = link.to_string();
    let errors = projects.validate_project(&mut project);
    assert!(errors.is_empty(), "unexpected errors: {errors}");
    projects.add_project(&project).unwrap()
}

fn plan(conn: &Connection, project_id: &str, name: &str, duration: i64) -> SubscriptionPlan {
    let plans = SubscriptionPlanService::new(conn);
    let mut plan = SubscriptionPlan::new(project_id, name);
    plan.benefits = "weekly lessons".to_string();
    plan.duration = duration;
    plan.price = 99.999;
    plan.currency = "etb".to_string();
    let errors = plans.validate_subscription_plan(&mut plan);
    assert!(errors.is_empty(), "unexpected errors: {errors}");
    plans.add_subscription_plan(&plan).unwrap()
}

#[test]
fn project_names_are_unique_per_provider_and_links_globally() {
    let conn = open_db_in_memory().unwrap();
    let projects = ProjectService::new(&conn);
    let owner = provider(&conn);
    let stored = project(&conn, &owner.id, "Guitar Class", "Guitar");

    assert!(stored.id.starts_with("Pr-"));
    assert_eq!(stored.project_link, "guitar");
    assert_eq!(projects.find_project("guitar").unwrap().id, stored.id);

    let mut clash = Project::new(owner.id.clone(), "Guitar Class");
    clash.project_link = "GUITAR".to_string();
    let errors = projects.validate_project(&mut clash);
    assert_eq!(
        errors.get("name"),
        Some("project name already exists in your project list")
    );
    assert_eq!(
        errors.get("project_link"),
        Some("project link is taken, link should be unique")
    );

    let mut unlinked = Project::new(owner.id.clone(), "Piano Class");
    unlinked.project_link = "  ".to_string();
    assert!(projects.validate_project(&mut unlinked).is_empty());
    assert_eq!(unlinked.project_link, "");

    let mut renamed = stored.clone();
    renamed.description = "Beginner friendly".to_string();
    assert!(projects.validate_project(&mut renamed).is_empty());
}

#[test]
fn malformed_project_link_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let projects = ProjectService::new(&conn);
    let owner = provider(&conn);

    let mut spaced = Project::new(owner.id.clone(), "Yoga");
    spaced.project_link = "yoga class".to_string();
    assert_eq!(
        projects.validate_project(&mut spaced).get("project_link"),
        Some("project link shouldn't contain space or any special characters")
    );

    let mut long = Project::new(owner.id, "Yoga");
    long.project_link = "y".repeat(21);
    assert_eq!(
        projects.validate_project(&mut long).get("project_link"),
        Some("project link should not be longer than 20 characters")
    );
}

#[test]
fn project_chat_links_are_validated_and_cascade() {
    let conn = open_db_in_memory().unwrap();
    let projects = ProjectService::new(&conn);
    let owner = provider(&conn);
    let stored = project(&conn, &owner.id, "Guitar Class", "guitar");

    let mut link = ProjectChatLink {
        project_id: stored.id.clone(),
        chat_id: -100123,
        kind: "channel".to_string(),
    };
    assert!(projects.validate_project_chat_link(&mut link).is_empty());
    assert_eq!(link.kind, "CHANNEL");
    projects.add_project_chat_link(&link).unwrap();

    let mut duplicate = link.clone();
    let errors = projects.validate_project_chat_link(&mut duplicate);
    assert_eq!(errors.get("chat_id"), Some("chat already linked to the project"));

    let mut bad = ProjectChatLink {
        project_id: "Pr-missing".to_string(),
        chat_id: 0,
        kind: "forum".to_string(),
    };
    let errors = projects.validate_project_chat_link(&mut bad);
    assert_eq!(errors.get("type"), Some("invalid chat type selected"));
    assert_eq!(errors.get("chat_id"), Some("invalid chat id used"));
    assert_eq!(errors.get("project_id"), Some("no project found"));

    projects.delete_project(&stored.id).unwrap();
    assert!(projects
        .find_multiple_project_chat_links(&ChatLinkKey::Chat(-100123))
        .is_empty());
}

#[test]
fn plan_terms_are_normalized_and_checked() {
    let conn = open_db_in_memory().unwrap();
    let plans = SubscriptionPlanService::new(&conn);
    let owner = provider(&conn);
    let stored_project = project(&conn, &owner.id, "Guitar Class", "guitar");
    let stored = plan(&conn, &stored_project.id, "Monthly", 30);

    assert!(stored.id.starts_with("SBP-"));
    assert_eq!(stored.price, 100.0);
    assert_eq!(stored.currency, "ETB");

    let mut invalid = SubscriptionPlan::new(stored_project.id.clone(), "Monthly");
    invalid.duration = 0;
    invalid.price = -5.0;
    invalid.currency = "usd".to_string();
    let errors = plans.validate_subscription_plan(&mut invalid);
    assert_eq!(
        errors.get("name"),
        Some("subscription plan name already exists in the current project")
    );
    assert_eq!(errors.get("duration"), Some("invalid subscription plan duration used"));
    assert_eq!(errors.get("price"), Some("invalid subscription plan price used"));
    assert_eq!(errors.get("currency"), Some("invalid currency type selected"));

    let other_project = project(&conn, &owner.id, "Piano Class", "piano");
    let mut same_name_elsewhere = SubscriptionPlan::new(other_project.id, "Monthly");
    same_name_elsewhere.duration = 30;
    same_name_elsewhere.currency = "ETB".to_string();
    assert!(plans
        .validate_subscription_plan(&mut same_name_elsewhere)
        .is_empty());

    assert_eq!(plans.find_multiple_subscription_plans(&stored_project.id).len(), 1);
    assert_eq!(plans.delete_multiple_subscription_plans(&stored_project.id).len(), 1);
    assert!(plans.find_subscription_plan(&stored.id).is_err());
}

#[test]
fn platform_plan_names_are_globally_unique() {
    let conn = open_db_in_memory().unwrap();
    let plans = SubscriptionPlanService::new(&conn);

    let mut basic = SpSubscriptionPlan {
        id: String::new(),
        name: "Basic".to_string(),
        duration: 30,
        price: 150.0,
        currency: "ETB".to_string(),
        created_at: 0,
        updated_at: 0,
    };
    assert!(plans.validate_sp_subscription_plan(&mut basic).is_empty());
    let stored = plans.add_sp_subscription_plan(&basic).unwrap();

    let mut clash = basic.clone();
    assert_eq!(
        plans.validate_sp_subscription_plan(&mut clash).get("name"),
        Some("subscription plan name already exists")
    );

    let mut renamed = stored.clone();
    renamed.price = 200.0;
    assert!(plans.validate_sp_subscription_plan(&mut renamed).is_empty());
    assert_eq!(plans.all_sp_subscription_plans().len(), 1);
}

#[test]
fn plan_and_user_chat_links() {
    let conn = open_db_in_memory().unwrap();
    let plans = SubscriptionPlanService::new(&conn);
    let owner = provider(&conn);
    let stored_project = project(&conn, &owner.id, "Guitar Class", "guitar");
    let stored = plan(&conn, &stored_project.id, "Monthly", 30);
    let user = UserService::new(&conn)
        .add_user(&User::new("Abebe", "Kebede", "+251911223344"))
        .unwrap();

    let link = PlanChatLink {
        plan_id: stored.id.clone(),
        chat_id: -100500,
    };
    assert!(plans.validate_plan_chat_link(&link).is_empty());
    plans.add_plan_chat_link(&link).unwrap();
    assert_eq!(
        plans.validate_plan_chat_link(&link).get("chat_id"),
        Some("chat already linked to the subscription plan")
    );

    let invite = plans
        .add_user_chat_link(&UserChatLink {
            user_id: user.id.clone(),
            plan_id: stored.id.clone(),
            chat_id: -100500,
            invite_link: "https://t.me/+invite".to_string(),
            created_at: 0,
        })
        .unwrap();
    assert!(invite.created_at > 0);
    assert_eq!(
        plans
            .find_multiple_user_chat_links(&ChatLinkKey::User(user.id.clone()))
            .len(),
        1
    );

    plans.delete_subscription_plan(&stored.id).unwrap();
    assert!(plans
        .find_multiple_plan_chat_links(&ChatLinkKey::Chat(-100500))
        .is_empty());
    assert!(plans
        .find_user_chat_link(&user.id, &stored.id, -100500)
        .is_err());
}

#[test]
fn subscription_snapshot_survives_plan_deletion() {
    let conn = open_db_in_memory().unwrap();
    let subscriptions = SubscriptionService::new(&conn);
    let plans = SubscriptionPlanService::new(&conn);
    let owner = provider(&conn);
    let stored_project = project(&conn, &owner.id, "Guitar Class", "guitar");
    let stored_plan = plan(&conn, &stored_project.id, "Monthly", 30);
    let mut subscriber = User::new("Abebe", "Kebede", "+251911223344");
    subscriber.user_name = "abebe".to_string();
    let subscriber = UserService::new(&conn).add_user(&subscriber).unwrap();

    let draft = subscriptions
        .construct_subscription(&subscriber.id, &stored_plan.id)
        .unwrap();
    assert!(draft.id.is_empty());
    assert_eq!(draft.subscriber_user_name, "abebe");
    assert_eq!(draft.provider_id, owner.id);
    assert_eq!(draft.project_link, "guitar");
    assert_eq!(draft.subscription_plan_price, 100.0);
    assert_eq!(draft.expires_at, add_days(draft.created_at, 30));

    let stored = subscriptions.add_subscription(&draft).unwrap();
    assert!(stored.id.starts_with("SUB-"));

    plans.delete_subscription_plan(&stored_plan.id).unwrap();
    let kept = subscriptions.find_subscription(&stored.id).unwrap();
    assert_eq!(kept.subscription_plan_name, "Monthly");
    assert_eq!(subscriptions.find_multiple_subscriptions(&owner.id).len(), 1);

    assert_eq!(
        subscriptions
            .construct_subscription(&subscriber.id, &stored_plan.id)
            .unwrap_err(),
        ServiceError::failed("unable to construct subscription")
    );

    assert_eq!(
        subscriptions
            .delete_multiple_subscriptions(&subscriber.id)
            .len(),
        1
    );
    assert!(subscriptions.find_subscription(&stored.id).is_err());
}

#[test]
fn provider_platform_subscription_is_one_per_provider() {
    let conn = open_db_in_memory().unwrap();
    let subscriptions = SubscriptionService::new(&conn);
    let owner = provider(&conn);

    let subscription = SpSubscription {
        provider_id: owner.id.clone(),
        subscription_plan_id: "SPP-basic".to_string(),
        subscription_plan_name: "Basic".to_string(),
        subscription_plan_duration: 30,
        subscription_plan_price: 150.0,
        subscription_plan_currency: "ETB".to_string(),
        expires_at: add_days(0, 30),
        ..SpSubscription::default()
    };
    subscriptions.add_sp_subscription(&subscription).unwrap();
    assert!(subscriptions.add_sp_subscription(&subscription).is_err());

    let mut renewed = subscriptions.find_sp_subscription(&owner.id).unwrap();
    renewed.expires_at = add_days(renewed.expires_at, 30);
    let updated = subscriptions.update_sp_subscription(&renewed).unwrap();
    assert_eq!(updated.expires_at, add_days(0, 60));

    assert_eq!(subscriptions.find_multiple_sp_subscriptions("SPP-basic").len(), 1);
    subscriptions.delete_sp_subscription(&owner.id).unwrap();
    assert!(matches!(
        subscriptions.find_sp_subscription(&owner.id),
        Err(ServiceError::NotFound(_))
    ));
}
