use onemembership_core::config::TelebirrAccount;
use onemembership_core::db::open_db_in_memory;
use onemembership_core::model::account::{ServiceProvider, User};
use onemembership_core::model::transaction::{
    InitiatedFrom, PaymentGateway, SpPayrollTransaction, SpSubscriptionTransaction,
    SubscriptionTransaction, TransactionStatus,
};
use onemembership_core::service::provider_service::ServiceProviderService;
use onemembership_core::{
    PaymentError, PaymentTransport, ServiceError, TelebirrClient, TransactionService, UserService,
    WebPayment,
};
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::RsaPrivateKey;
use rusqlite::Connection;

const ACCEPTED: &str =
    r#"{"code":0,"msg":"success","data":{"toPayUrl":"https://pay.example.test/h5/1"}}"#;
const REJECTED: &str = r#"{"code":"7","msg":"invalid sign"}"#;

struct StubTransport {
    response: &'static str,
}

impl PaymentTransport for StubTransport {
    fn post_json(&self, _url: &str, _body: &str) -> Result<String, PaymentError> {
        Ok(self.response.to_string())
    }
}

fn telebirr(response: &'static str) -> TelebirrClient<StubTransport> {
    let private = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
    let pem = private
        .to_public_key()
        .to_public_key_pem(LineEnding::LF)
        .unwrap();
    let account = TelebirrAccount {
        api_access_point: "https://pay.example.test/service-openup/".to_string(),
        app_id: "app-1".to_string(),
        app_key: "secret".to_string(),
        notify_url: "https://example.test/notify".to_string(),
        return_url: "https://example.test/done".to_string(),
        short_code: "500100".to_string(),
        transaction_fee: 2.0,
    };
    TelebirrClient::new(account, &pem, StubTransport { response }).unwrap()
}

fn user(conn: &Connection) -> User {
    UserService::new(conn)
        .add_user(&User::new("Abebe", "Kebede", "+251911223344"))
        .unwrap()
}

fn provider(conn: &Connection) -> ServiceProvider {
    ServiceProviderService::new(conn)
        .add_service_provider(&ServiceProvider::new("Sara", "Alemu", "+251922000001"))
        .unwrap()
}

fn member_transaction(user_id: &str, nonce: &str) -> SubscriptionTransaction {
    SubscriptionTransaction {
        id: String::new(),
        user_id: user_id.to_string(),
        plan_id: "SBP-plan".to_string(),
        app_id: "app-1".to_string(),
        receiver_name: String::new(),
        subject: "Monthly".to_string(),
        received_amount: 100.0,
        transaction_fee: 2.0,
        currency_type: "ETB".to_string(),
        timeout_express: 60,
        nonce: nonce.to_string(),
        out_trade_no: format!("T_{nonce}"),
        trade_no: String::new(),
        status: TransactionStatus::Pending,
        initiated_from: InitiatedFrom::Web.as_str().to_string(),
        created_at: 0,
        updated_at: 0,
    }
}

fn provider_transaction(provider_id: &str, nonce: &str) -> SpSubscriptionTransaction {
    SpSubscriptionTransaction {
        id: String::new(),
        provider_id: provider_id.to_string(),
        plan_id: "SPP-basic".to_string(),
        app_id: "app-1".to_string(),
        receiver_name: String::new(),
        subject: "Basic plan".to_string(),
        received_amount: 150.0,
        transaction_fee: 2.0,
        currency_type: "ETB".to_string(),
        timeout_express: 60,
        nonce: nonce.to_string(),
        out_trade_no: format!("T_{nonce}"),
        trade_no: String::new(),
        status: TransactionStatus::Pending,
        created_at: 0,
        updated_at: 0,
    }
}

fn web_payment(user_id: &str) -> WebPayment<'_> {
    WebPayment {
        user_id,
        plan_id: "SBP-plan",
        receiver_name: "Guitar Class",
        subject: "Monthly",
        currency_type: "ETB",
        initiated_from: InitiatedFrom::TelegramBot,
        received_amount: 100.0,
    }
}

#[test]
fn gateway_names_are_required_and_unique() {
    let conn = open_db_in_memory().unwrap();
    let service = TransactionService::new(&conn);

    assert_eq!(
        service
            .validate_payment_gateway(&PaymentGateway::new(" "))
            .get("name"),
        Some("gateway name can not be empty")
    );
    assert_eq!(
        service
            .validate_payment_gateway(&PaymentGateway::new("x".repeat(1001)))
            .get("name"),
        Some("gateway name should not be longer than 1000 characters")
    );

    let telebirr = PaymentGateway::new("Telebirr");
    assert!(service.validate_payment_gateway(&telebirr).is_empty());
    let stored = service.add_payment_gateway(&telebirr).unwrap();
    assert!(stored.id > 0);

    assert_eq!(
        service.validate_payment_gateway(&telebirr).get("name"),
        Some("gateway name already exists")
    );
    assert!(service.validate_payment_gateway(&stored).is_empty());

    assert_eq!(service.find_payment_gateway("Telebirr").unwrap(), stored);
    assert_eq!(
        service.find_payment_gateway(&stored.id.to_string()).unwrap(),
        stored
    );

    let mut renamed = stored.clone();
    renamed.name = "Telebirr H5".to_string();
    service.update_payment_gateway(&renamed).unwrap();
    assert_eq!(service.all_payment_gateways().len(), 1);
    assert_eq!(
        service.delete_payment_gateway("Telebirr H5").unwrap().id,
        stored.id
    );
    assert!(matches!(
        service.find_payment_gateway("Telebirr H5"),
        Err(ServiceError::NotFound(_))
    ));
}

#[test]
fn trade_ids_are_unique_across_member_and_provider_payments() {
    let conn = open_db_in_memory().unwrap();
    let service = TransactionService::new(&conn);
    let member = user(&conn);
    let owner = provider(&conn);

    let first = member_transaction(&member.id, "n1");
    assert!(service.validate_subscription_transaction(&first).is_empty());
    let stored = service.add_subscription_transaction(&first).unwrap();
    assert!(stored.id.starts_with("SBT-"));

    let errors = service.validate_subscription_transaction(&member_transaction(&member.id, "n1"));
    assert_eq!(
        errors.get("nonce"),
        Some("subscription transaction nonce should be unique")
    );
    assert_eq!(
        errors.get("out_trade_no"),
        Some("subscription transaction out trade number should be unique")
    );

    let mut clash = provider_transaction(&owner.id, "n1");
    clash.subject = "gold!".to_string();
    let errors = service.validate_sp_subscription_transaction(&clash);
    assert!(errors.contains("nonce"));
    assert_eq!(
        errors.get("subject"),
        Some("subscription transaction subject should not contain any special characters")
    );

    let fresh = provider_transaction(&owner.id, "n2");
    assert!(service.validate_sp_subscription_transaction(&fresh).is_empty());
    service.add_sp_subscription_transaction(&fresh).unwrap();
    assert!(service
        .validate_subscription_transaction(&member_transaction(&member.id, "n2"))
        .contains("nonce"));
}

#[test]
fn member_transaction_settles_and_is_deleted_by_owner() {
    let conn = open_db_in_memory().unwrap();
    let service = TransactionService::new(&conn);
    let member = user(&conn);

    let mut stored = service
        .add_subscription_transaction(&member_transaction(&member.id, "n1"))
        .unwrap();
    stored.status = TransactionStatus::Complete;
    stored.trade_no = "TB-0001".to_string();
    service.update_subscription_transaction(&stored).unwrap();

    let settled = service.find_subscription_transaction(&stored.id).unwrap();
    assert_eq!(settled.status, TransactionStatus::Complete);
    assert_eq!(settled.trade_no, "TB-0001");
    assert_eq!(service.find_multiple_subscription_transactions("SBP-plan").len(), 1);

    let mut missing = stored.clone();
    missing.id = "SBT-missing".to_string();
    assert_eq!(
        service.update_subscription_transaction(&missing),
        Err(ServiceError::not_found("no subscription transaction found"))
    );

    assert_eq!(
        service
            .delete_multiple_subscription_transactions(&member.id)
            .len(),
        1
    );
    assert!(service
        .find_multiple_subscription_transactions(&member.id)
        .is_empty());
    assert!(service
        .delete_multiple_subscription_transactions(&member.id)
        .is_empty());
}

#[test]
fn provider_transaction_and_payroll_lifecycle() {
    let conn = open_db_in_memory().unwrap();
    let service = TransactionService::new(&conn);
    let owner = provider(&conn);

    let stored = service
        .add_sp_subscription_transaction(&provider_transaction(&owner.id, "n1"))
        .unwrap();
    assert_eq!(
        service
            .find_multiple_sp_subscription_transactions(&owner.id)
            .len(),
        1
    );
    assert_eq!(
        service.delete_sp_subscription_transaction(&stored.id).unwrap().id,
        stored.id
    );

    let payroll = service
        .add_sp_payroll_transaction(&SpPayrollTransaction {
            id: String::new(),
            provider_id: owner.id.clone(),
            payed_amount: 480.5,
            linked_account: "1000123456789".to_string(),
            linked_account_provider: "CBE".to_string(),
            status: TransactionStatus::Pending,
            created_at: 0,
            updated_at: 0,
        })
        .unwrap();
    assert!(payroll.id.starts_with("PRT-"));

    let mut paid = payroll.clone();
    paid.status = TransactionStatus::Complete;
    service.update_sp_payroll_transaction(&paid).unwrap();
    assert_eq!(
        service.find_sp_payroll_transaction(&payroll.id).unwrap().status,
        TransactionStatus::Complete
    );
    assert_eq!(
        service.find_sp_payroll_transaction(""),
        Err(ServiceError::not_found("no payroll transaction found"))
    );
    assert_eq!(
        service
            .delete_multiple_sp_payroll_transactions(&owner.id)
            .len(),
        1
    );
    assert!(service.find_sp_payroll_transaction(&payroll.id).is_err());
}

#[test]
fn web_checkout_stores_pending_transaction_after_gateway_accepts() {
    let conn = open_db_in_memory().unwrap();
    let member = user(&conn);
    let service = TransactionService::with_telebirr(&conn, telebirr(ACCEPTED));

    let url = service.telebirr_h5_web_url(&web_payment(&member.id)).unwrap();
    assert_eq!(url, "https://pay.example.test/h5/1");

    let stored = service.find_multiple_subscription_transactions(&member.id);
    assert_eq!(stored.len(), 1);
    let transaction = &stored[0];
    assert_eq!(transaction.status, TransactionStatus::Pending);
    assert_eq!(transaction.app_id, "app-1");
    assert_eq!(transaction.transaction_fee, 2.0);
    assert_eq!(transaction.received_amount, 100.0);
    assert_eq!(transaction.timeout_express, 60);
    assert_eq!(transaction.initiated_from, "telegram_bot");
    assert_eq!(transaction.out_trade_no, format!("T_{}", transaction.nonce));
    assert_eq!(transaction.nonce.len(), 32);
}

#[test]
fn rejected_checkout_stores_nothing() {
    let conn = open_db_in_memory().unwrap();
    let member = user(&conn);
    let service = TransactionService::with_telebirr(&conn, telebirr(REJECTED));

    assert_eq!(
        service.telebirr_h5_web_url(&web_payment(&member.id)),
        Err(ServiceError::failed("unable to generate web url"))
    );
    assert!(service
        .find_multiple_subscription_transactions(&member.id)
        .is_empty());
}

fn used_nonce() -> String {
    "n-used".to_string()
}

#[test]
fn checkout_gives_up_when_every_nonce_is_taken() {
    let conn = open_db_in_memory().unwrap();
    let member = user(&conn);
    let service =
        TransactionService::with_telebirr(&conn, telebirr(ACCEPTED)).with_nonce_source(used_nonce);
    let existing = service
        .add_subscription_transaction(&member_transaction(&member.id, &used_nonce()))
        .unwrap();

    assert_eq!(
        service.telebirr_h5_web_url(&web_payment(&member.id)),
        Err(ServiceError::failed("unable to generate unique transaction id"))
    );
    let stored = service.find_multiple_subscription_transactions(&member.id);
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, existing.id);
}

#[test]
fn checkout_without_gateway_account_fails() {
    let conn = open_db_in_memory().unwrap();
    let member = user(&conn);
    let service = TransactionService::new(&conn);

    assert_eq!(
        service.telebirr_h5_web_url(&web_payment(&member.id)),
        Err(ServiceError::failed("payment gateway not configured"))
    );
}
