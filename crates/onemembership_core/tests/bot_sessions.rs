use onemembership_core::bot::{session_key, SessionStore, SqliteSessionStore};
use onemembership_core::db::open_db_in_memory;
use std::time::Duration;

const HOUR: Duration = Duration::from_secs(60 * 60);

#[test]
fn values_round_trip_and_set_replaces() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteSessionStore::new(&conn);
    let key = session_key(-1001, "step");

    assert_eq!(store.get(&key).unwrap(), None);
    store.set(&key, "ask_name", Some(HOUR)).unwrap();
    assert_eq!(store.get(&key).unwrap().as_deref(), Some("ask_name"));

    store.set(&key, "ask_price", None).unwrap();
    assert_eq!(store.get(&key).unwrap().as_deref(), Some("ask_price"));
    assert_eq!(store.get(&session_key(-1002, "step")).unwrap(), None);
}

#[test]
fn expired_values_read_as_absent_until_purged() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteSessionStore::new(&conn);

    store.set("-1:draft", "Gold", Some(Duration::ZERO)).unwrap();
    store.set("-1:lang", "en", None).unwrap();
    store.set("-1:step", "ask_name", Some(HOUR)).unwrap();

    assert_eq!(store.get("-1:draft").unwrap(), None);
    assert_eq!(store.purge_expired().unwrap(), 1);
    assert_eq!(store.purge_expired().unwrap(), 0);

    let remaining: i64 = conn
        .query_row("SELECT COUNT(*) FROM bot_sessions;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(remaining, 2);
}

#[test]
fn remove_reports_whether_a_live_value_existed() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteSessionStore::new(&conn);

    store.set("-1:step", "ask_name", Some(HOUR)).unwrap();
    store.set("-1:stale", "x", Some(Duration::ZERO)).unwrap();

    assert!(store.remove("-1:step").unwrap());
    assert!(!store.remove("-1:step").unwrap());
    assert!(!store.remove("-1:stale").unwrap());
    assert_eq!(store.purge_expired().unwrap(), 0);
}
