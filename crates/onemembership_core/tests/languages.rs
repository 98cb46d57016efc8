use onemembership_core::db::{open_db_in_memory, PAGE_SIZE};
use onemembership_core::model::account::User;
use onemembership_core::model::language::{Language, LanguageEntry};
use onemembership_core::service::common_service::CommonService;
use onemembership_core::util::now_epoch_ms;
use onemembership_core::{ServiceError, UserService};

fn amharic() -> Language {
    Language {
        code: "am".to_string(),
        name: "Amharic".to_string(),
        flag: "🇪🇹".to_string(),
        display_order: 2,
    }
}

fn entry(identifier: &str, code: &str, value: &str) -> LanguageEntry {
    LanguageEntry {
        id: 0,
        identifier: identifier.to_string(),
        code: code.to_string(),
        value: value.to_string(),
    }
}

#[test]
fn seeding_is_idempotent_and_languages_stay_unique() {
    let conn = open_db_in_memory().unwrap();
    let common = CommonService::new(&conn);

    assert_eq!(common.seed_default_languages().unwrap(), 1);
    assert_eq!(common.seed_default_languages().unwrap(), 0);
    assert_eq!(common.find_language("English").unwrap().code, "en");

    common.add_language(&amharic()).unwrap();
    let err = common.add_language(&amharic()).unwrap_err();
    let errors = err.field_errors().unwrap();
    assert_eq!(errors.get("code"), Some("language code already exists"));
    assert_eq!(errors.get("name"), Some("language name already exists"));

    let codes: Vec<String> = common
        .all_languages()
        .into_iter()
        .map(|language| language.code)
        .collect();
    assert_eq!(codes, ["en", "am"]);
}

#[test]
fn entries_resolve_by_bare_label_and_fall_back_to_identifier() {
    let conn = open_db_in_memory().unwrap();
    let common = CommonService::new(&conn);
    common.seed_default_languages().unwrap();
    common.add_language(&amharic()).unwrap();

    common.add_language_entry(&entry("🏠 Home", "am", "ቤት")).unwrap();
    assert_eq!(common.find_language_entry("Home", "am"), "ቤት");
    assert_eq!(common.find_language_entry("🏠 Home", "am"), "ቤት");
    assert_eq!(common.find_language_entry("🏠 Home", "en"), "🏠 Home");

    common.update_language_entry("Home", "am", "መነሻ").unwrap();
    assert_eq!(common.find_language_entry("Home", "am"), "መነሻ");
    assert_eq!(
        common.update_language_entry("Settings", "am", "ቅንብር"),
        Err(ServiceError::not_found("no language entry found"))
    );

    let err = common
        .add_language_entry(&entry(" ", "fr", "Maison"))
        .unwrap_err();
    let errors = err.field_errors().unwrap();
    assert!(errors.contains("identifier"));
    assert_eq!(errors.get("code"), Some("invalid language selected"));

    common.delete_language_entry("Home", "am").unwrap();
    assert!(common.find_language_entries("Home").is_empty());
}

#[test]
fn renaming_a_language_code_carries_its_entries() {
    let conn = open_db_in_memory().unwrap();
    let common = CommonService::new(&conn);
    common.add_language(&amharic()).unwrap();
    common.add_language_entry(&entry("Home", "am", "ቤት")).unwrap();

    let mut renamed = amharic();
    renamed.code = "amh".to_string();
    common.update_language("am", &renamed).unwrap();

    assert_eq!(common.find_language_entry("Home", "amh"), "ቤት");
    common.delete_language("amh").unwrap();
    assert!(common.find_language_entries("Home").is_empty());
    assert_eq!(
        common.delete_language("amh"),
        Err(ServiceError::not_found("no language found"))
    );
}

#[test]
fn users_are_listed_in_pages_and_counted_by_creation_time() {
    let conn = open_db_in_memory().unwrap();
    let users = UserService::new(&conn);
    let start = now_epoch_ms();
    let total = PAGE_SIZE as usize + 1;
    for index in 0..total {
        users
            .add_user(&User::new(format!("User{index}"), "Test", ""))
            .unwrap();
    }

    let first = users.all_users_with_pagination(0);
    assert_eq!(first.items.len(), PAGE_SIZE as usize);
    assert_eq!(first.page_count, 2);
    assert_eq!(users.all_users_with_pagination(1).items.len(), 1);
    assert!(users.all_users_with_pagination(2).items.is_empty());

    assert_eq!(users.users_created_between(start, now_epoch_ms()), total as i64);
    assert_eq!(users.users_created_between(0, start - 1), 0);
}

#[test]
fn single_value_updates_are_limited_to_profile_columns() {
    let conn = open_db_in_memory().unwrap();
    let users = UserService::new(&conn);
    let user = users
        .add_user(&User::new("Abebe", "Kebede", "+251911223344"))
        .unwrap();

    users
        .update_user_single_value(&user.id, "first_name", "Abel")
        .unwrap();
    assert_eq!(users.find_user(&user.id).unwrap().first_name, "Abel");

    assert_eq!(
        users.update_user_single_value(&user.id, "id", "UR-forged"),
        Err(ServiceError::failed("unable to update user"))
    );
    assert_eq!(
        users.update_user_single_value("UR-missing", "first_name", "Abel"),
        Err(ServiceError::not_found("no user found"))
    );
}
