use onemembership_core::db::open_db_in_memory;
use onemembership_core::model::account::{
    ClientPreference, Feedback, FeedbackStatus, ServiceProvider, SpPassword, SpWallet, User,
    UserPassword,
};
use onemembership_core::service::common_service::CommonService;
use onemembership_core::service::deleted_service::DeletedService;
use onemembership_core::service::feedback_service::FeedbackService;
use onemembership_core::service::password::HashParams;
use onemembership_core::service::preference_service::PreferenceService;
use onemembership_core::service::provider_service::ServiceProviderService;
use onemembership_core::model::transaction::{
    InitiatedFrom, SpPayrollTransaction, SpSubscriptionTransaction, SubscriptionTransaction,
    TransactionStatus,
};
use onemembership_core::service::transaction_service::TransactionService;
use onemembership_core::service::user_service::UserService;
use onemembership_core::ServiceError;
use rusqlite::Connection;

const FAST_HASH: HashParams = HashParams {
    memory_kib: 128,
    iterations: 1,
    parallelism: 1,
};

fn setup() -> Connection {
    let conn = open_db_in_memory().unwrap();
    CommonService::new(&conn).seed_default_languages().unwrap();
    conn
}

fn add_user(service: &UserService<'_>, user_name: &str, phone: &str, email: &str) -> User {
    let mut user = User::new("Abebe", "Kebede", phone);
    user.user_name = user_name.to_string();
    user.email = email.to_string();
    let errors = service.validate_user_profile(&mut user);
    assert!(errors.is_empty(), "unexpected errors: {errors}");
    service.add_user(&user).unwrap()
}

#[test]
fn user_profile_is_normalized_and_stored() {
    let conn = setup();
    let users = UserService::new(&conn);

    let user = add_user(&users, "Abebe_K", "0911 223 344", "abebe@example.com");

    assert!(user.id.starts_with("UR-"));
    assert_eq!(user.user_name, "abebe_k");
    assert_eq!(user.phone_number, "+251911223344");
    assert_eq!(users.find_user("0911223344").unwrap().id, user.id);
    assert_eq!(users.find_user("abebe@example.com").unwrap().id, user.id);
    assert_eq!(users.total_users(), 1);
}

#[test]
fn duplicate_profile_fields_are_rejected_on_create_only() {
    let conn = setup();
    let users = UserService::new(&conn);
    let first = add_user(&users, "abebe", "+251911223344", "abebe@example.com");

    let mut clash = User::new("Other", "Person", "0911223344");
    clash.user_name = "ABEBE".to_string();
    clash.email = "abebe@example.com".to_string();
    let errors = users.validate_user_profile(&mut clash);
    assert_eq!(
        errors.get("user_name"),
        Some("username is taken, username should be unique")
    );
    assert_eq!(errors.get("email"), Some("email address already exists"));
    assert_eq!(errors.get("phone_number"), Some("phone number already exists"));

    let mut unchanged = first.clone();
    unchanged.first_name = "Abe".to_string();
    assert!(users.validate_user_profile(&mut unchanged).is_empty());
    let updated = users.update_user(&unchanged).unwrap();
    assert_eq!(updated.first_name, "Abe");
}

#[test]
fn malformed_profile_fields_are_reported() {
    let conn = setup();
    let users = UserService::new(&conn);

    let mut user = User::new("Abebe", "Kebede", "12ab");
    user.user_name = "has space".to_string();
    user.email = "not-an-email".to_string();
    let errors = users.validate_user_profile(&mut user);

    assert_eq!(
        errors.get("user_name"),
        Some("username shouldn't contain space or any special characters")
    );
    assert_eq!(errors.get("email"), Some("invalid email address used"));
    assert_eq!(errors.get("phone_number"), Some("invalid phonenumber used"));
}

#[test]
fn blank_lookup_is_not_found() {
    let conn = setup();
    let users = UserService::new(&conn);
    assert_eq!(
        users.find_user("   ").unwrap_err(),
        ServiceError::not_found("no user found")
    );
}

#[test]
fn search_merges_exact_and_prefix_matches() {
    let conn = setup();
    let users = UserService::new(&conn);
    let abebe = add_user(&users, "abebe", "+251911000001", "");
    let mut abel = User::new("Abel", "Tesfaye", "+251911000002");
    abel.user_name = "abel".to_string();
    let abel = users.add_user(&abel).unwrap();

    let exact = users.search_users("abebe", 0, &[]);
    assert_eq!(exact.items.len(), 1);
    assert_eq!(exact.items[0].id, abebe.id);

    let prefix = users.search_users("Abe", 0, &[]);
    let ids: Vec<&str> = prefix.items.iter().map(|user| user.id.as_str()).collect();
    assert!(ids.contains(&abebe.id.as_str()));
    assert!(ids.contains(&abel.id.as_str()));

    assert!(users.search_users("", 0, &[]).items.is_empty());
}

#[test]
fn user_password_is_hashed_and_checked() {
    let conn = setup();
    let users = UserService::new(&conn).with_hash_params(FAST_HASH);
    let user = add_user(&users, "abebe", "+251911223344", "");

    let mut short = UserPassword {
        user_id: user.id.clone(),
        password: "short".to_string(),
        ..UserPassword::default()
    };
    let err = users.verify_user_password(&mut short, "short").unwrap_err();
    assert_eq!(
        err.field_errors().and_then(|errors| errors.get("password")),
        Some("password should contain at least 8 characters")
    );

    let mut password = UserPassword {
        user_id: user.id.clone(),
        password: "correct horse".to_string(),
        ..UserPassword::default()
    };
    users
        .verify_user_password(&mut password, "correct horse")
        .unwrap();
    assert_ne!(password.password, "correct horse");
    assert!(!password.salt.is_empty());
    users.add_user_password(&password).unwrap();

    assert!(users.check_user_password(&user.id, "correct horse"));
    assert!(!users.check_user_password(&user.id, "wrong horse"));
    assert!(!users.check_user_password("UR-missing", "correct horse"));
}

#[test]
fn deleting_user_moves_it_to_trash_and_detaches_satellites() {
    let conn = setup();
    let users = UserService::new(&conn);
    let preferences = PreferenceService::new(&conn);
    let feedbacks = FeedbackService::new(&conn);
    let deleted = DeletedService::new(&conn);
    let user = add_user(&users, "abebe", "+251911223344", "abebe@example.com");

    preferences
        .add_client_preference(&ClientPreference::new(user.id.clone()))
        .unwrap();
    let feedback = feedbacks
        .add_feedback(&Feedback::new(user.id.clone(), "great service"))
        .unwrap();

    let removed = users.delete_user(&user.id).unwrap();
    assert_eq!(removed.id, user.id);
    assert!(users.find_user(&user.id).is_err());
    assert!(preferences.find_client_preference(&user.id).is_err());
    assert_eq!(feedbacks.find_feedback(&feedback.id).unwrap().client_id, None);

    let trashed = deleted.find_deleted_user("abebe").unwrap();
    assert!(trashed.id.starts_with("DUR_"));
    assert_eq!(trashed.user_id, format!("{}_{}", trashed.id, user.id));
    assert_eq!(trashed.email, "abebe@example.com");

    let search = deleted.search_deleted_users("Abe", 0, &[]);
    assert_eq!(search.items.len(), 1);
}

#[test]
fn deleting_missing_user_is_not_found() {
    let conn = setup();
    let users = UserService::new(&conn);
    assert!(matches!(
        users.delete_user("UR-missing"),
        Err(ServiceError::NotFound(_))
    ));
}

fn add_provider(
    service: &ServiceProviderService<'_>,
    user_name: &str,
    phone: &str,
) -> ServiceProvider {
    let mut provider = ServiceProvider::new("Sara", "Alemu", phone);
    provider.user_name = user_name.to_string();
    let errors = service.validate_service_provider_profile(&mut provider);
    assert!(errors.is_empty(), "unexpected errors: {errors}");
    service.add_service_provider(&provider).unwrap()
}

#[test]
fn provider_wallet_is_validated_and_canonicalized() {
    let conn = setup();
    let providers = ServiceProviderService::new(&conn);
    let provider = add_provider(&providers, "sara", "+251922000001");

    let mut wallet = SpWallet {
        provider_id: provider.id.clone(),
        linked_account: "1000123456".to_string(),
        linked_account_provider: "cbe".to_string(),
        ..SpWallet::default()
    };
    assert!(providers.validate_sp_wallet(&mut wallet).is_empty());
    assert_eq!(wallet.linked_account_provider, "CBE");
    providers.add_sp_wallet(&wallet).unwrap();
    assert_eq!(
        providers.find_sp_wallet(&provider.id).unwrap().linked_account,
        "1000123456"
    );

    let mut bad = SpWallet {
        provider_id: provider.id.clone(),
        linked_account: "x".repeat(256),
        linked_account_provider: "Unknown Bank".to_string(),
        running_amount: -1.0,
        ..SpWallet::default()
    };
    let errors = providers.validate_sp_wallet(&mut bad);
    assert_eq!(
        errors.get("linked_account"),
        Some("service provider account should not be longer than 255 characters")
    );
    assert_eq!(
        errors.get("linked_account_provider"),
        Some("invalid account provider selected")
    );
    assert!(errors.contains("running_amount"));

    let mut unset = SpWallet {
        provider_id: provider.id.clone(),
        linked_account_provider: "CBE".to_string(),
        running_amount: f64::NAN,
        pending_amount: f64::INFINITY,
        ..SpWallet::default()
    };
    let errors = providers.validate_sp_wallet(&mut unset);
    assert_eq!(
        errors.get("running_amount"),
        Some("running amount can not be negative")
    );
    assert_eq!(
        errors.get("pending_amount"),
        Some("pending amount can not be negative")
    );
}

#[test]
fn provider_password_and_trash_round_trip() {
    let conn = setup();
    let providers = ServiceProviderService::new(&conn).with_hash_params(FAST_HASH);
    let deleted = DeletedService::new(&conn);
    let provider = add_provider(&providers, "sara", "+251922000001");

    let mut password = SpPassword {
        provider_id: provider.id.clone(),
        password: "provider pass".to_string(),
        ..SpPassword::default()
    };
    providers
        .verify_sp_password(&mut password, "provider pass")
        .unwrap();
    providers.add_sp_password(&password).unwrap();
    assert!(providers.check_sp_password(&provider.id, "provider pass"));

    providers.delete_service_provider(&provider.id).unwrap();
    assert!(providers.find_service_provider(&provider.id).is_err());
    assert!(providers.find_sp_password(&provider.id).is_err());

    let trashed = deleted.find_deleted_service_provider("sara").unwrap();
    assert!(trashed.id.starts_with("DSP_"));
    assert!(trashed.provider_id.ends_with(&provider.id));
}

#[test]
fn preference_language_is_resolved_or_rejected() {
    let conn = setup();
    let preferences = PreferenceService::new(&conn);

    let mut blank = ClientPreference {
        client_id: "UR-1".to_string(),
        language: " ".to_string(),
    };
    assert!(preferences.validate_client_preference(&mut blank).is_empty());
    assert_eq!(blank.language, "en");

    let mut by_name = ClientPreference {
        client_id: "UR-1".to_string(),
        language: "English".to_string(),
    };
    assert!(preferences.validate_client_preference(&mut by_name).is_empty());
    assert_eq!(by_name.language, "en");

    let mut unknown = ClientPreference {
        client_id: "UR-1".to_string(),
        language: "xx".to_string(),
    };
    let errors = preferences.validate_client_preference(&mut unknown);
    assert_eq!(errors.get("language"), Some("preferred language not found"));
}

#[test]
fn feedback_lifecycle() {
    let conn = setup();
    let users = UserService::new(&conn);
    let feedbacks = FeedbackService::new(&conn);
    let user = add_user(&users, "abebe", "+251911223344", "");

    let orphan = Feedback::new("UR-missing", "hello");
    assert_eq!(
        feedbacks.validate_feedback(&orphan).get("client_id"),
        Some("no client found for the provided client id")
    );
    let empty = Feedback::new(user.id.clone(), "  ");
    assert_eq!(
        feedbacks.validate_feedback(&empty).get("comment"),
        Some("comment can not be empty")
    );

    let feedback = Feedback::new(user.id.clone(), "please add yearly plans");
    assert!(feedbacks.validate_feedback(&feedback).is_empty());
    let stored = feedbacks.add_feedback(&feedback).unwrap();
    assert!(stored.id.starts_with("FB-"));

    assert_eq!(feedbacks.all_feedbacks(FeedbackStatus::Unseen, 0).items.len(), 1);
    feedbacks.mark_as_seen(&stored.id).unwrap();
    assert_eq!(
        feedbacks.mark_as_seen(&stored.id).unwrap_err(),
        ServiceError::failed("unable to perform operation")
    );
    assert_eq!(feedbacks.all_feedbacks(FeedbackStatus::Seen, 0).items.len(), 1);

    let found = feedbacks.search_feedbacks("please", FeedbackStatus::Any, 0, &[]);
    assert_eq!(found.items.len(), 1);

    assert_eq!(feedbacks.delete_multiple_feedbacks(&user.id).len(), 1);
    assert!(feedbacks.find_feedback(&stored.id).is_err());
}

#[test]
fn deleting_accounts_moves_their_transactions_to_trash() {
    let conn = setup();
    let users = UserService::new(&conn);
    let providers = ServiceProviderService::new(&conn);
    let transactions = TransactionService::new(&conn);
    let deleted = DeletedService::new(&conn);
    let user = add_user(&users, "abebe", "+251911223344", "");
    let provider = add_provider(&providers, "sara", "+251922000001");

    let member_payment = transactions
        .add_subscription_transaction(&SubscriptionTransaction {
            id: String::new(),
            user_id: user.id.clone(),
            plan_id: "SBP-plan".to_string(),
            app_id: "app-1".to_string(),
            receiver_name: "Guitar Class".to_string(),
            subject: "Monthly".to_string(),
            received_amount: 100.0,
            transaction_fee: 2.0,
            currency_type: "ETB".to_string(),
            timeout_express: 60,
            nonce: "n1".to_string(),
            out_trade_no: "T_n1".to_string(),
            trade_no: "TB-0001".to_string(),
            status: TransactionStatus::Complete,
            initiated_from: InitiatedFrom::Web.as_str().to_string(),
            created_at: 0,
            updated_at: 0,
        })
        .unwrap();
    let provider_payment = transactions
        .add_sp_subscription_transaction(&SpSubscriptionTransaction {
            id: String::new(),
            provider_id: provider.id.clone(),
            plan_id: "SBP-basic".to_string(),
            app_id: "app-1".to_string(),
            receiver_name: String::new(),
            subject: "Basic".to_string(),
            received_amount: 150.0,
            transaction_fee: 2.0,
            currency_type: "ETB".to_string(),
            timeout_express: 60,
            nonce: "n2".to_string(),
            out_trade_no: "T_n2".to_string(),
            trade_no: String::new(),
            status: TransactionStatus::Pending,
            created_at: 0,
            updated_at: 0,
        })
        .unwrap();
    let payroll = transactions
        .add_sp_payroll_transaction(&SpPayrollTransaction {
            id: String::new(),
            provider_id: provider.id.clone(),
            payed_amount: 480.5,
            linked_account: "1000123456789".to_string(),
            linked_account_provider: "CBE".to_string(),
            status: TransactionStatus::Complete,
            created_at: 0,
            updated_at: 0,
        })
        .unwrap();

    users.delete_user(&user.id).unwrap();
    let trashed_user = deleted.find_deleted_user("abebe").unwrap();
    assert_eq!(trashed_user.user_id, format!("{}_{}", trashed_user.id, user.id));
    let trashed = deleted
        .find_deleted_subscription_transaction(&member_payment.id)
        .unwrap();
    assert_eq!(trashed.user_id, trashed_user.user_id);
    assert_eq!(trashed.trade_no, "TB-0001");
    assert_eq!(
        deleted
            .find_deleted_subscription_transactions(&trashed_user.user_id)
            .len(),
        1
    );
    assert!(transactions
        .find_multiple_subscription_transactions(&user.id)
        .is_empty());

    providers.delete_service_provider(&provider.id).unwrap();
    let trashed_provider = deleted.find_deleted_service_provider("sara").unwrap();
    assert_eq!(
        trashed_provider.provider_id,
        format!("{}_{}", trashed_provider.id, provider.id)
    );
    assert_eq!(
        deleted
            .find_deleted_sp_subscription_transaction(&provider_payment.id)
            .unwrap()
            .provider_id,
        trashed_provider.provider_id
    );
    assert_eq!(
        deleted
            .find_deleted_sp_payroll_transaction(&payroll.id)
            .unwrap()
            .provider_id,
        trashed_provider.provider_id
    );
    assert_eq!(
        deleted
            .find_deleted_sp_subscription_transactions(&trashed_provider.provider_id)
            .len(),
        1
    );
    assert_eq!(
        deleted
            .find_deleted_sp_payroll_transactions(&trashed_provider.provider_id)
            .len(),
        1
    );
    assert!(transactions
        .find_multiple_sp_payroll_transactions(&provider.id)
        .is_empty());
    assert_eq!(
        deleted.find_deleted_subscription_transaction("SBT-missing"),
        Err(ServiceError::not_found("no deleted transaction found"))
    );
}
