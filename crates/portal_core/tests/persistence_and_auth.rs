use std::rc::Rc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, TimeZone, Utc};
use futures::executor::block_on;
use portal_core::{storage::LocalStorageProvider, AuthApp, AuthToken, EventHub, ReliableDictionary};
use portal_host::{KeyValueStorage, MemoryKeyValueStorage};
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Reminder {
    title: String,
    due: DateTime<Utc>,
}

fn jwt(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}

#[test]
fn local_storage_round_trips_dates_through_a_fresh_provider() {
    let storage: Rc<dyn KeyValueStorage> = Rc::new(MemoryKeyValueStorage::default());
    let reminder = Reminder {
        title: "Handover".to_string(),
        due: Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).single().expect("date"),
    };

    let writer = ReliableDictionary::new(LocalStorageProvider::new(
        "REMINDERS",
        Rc::clone(&storage),
        &EventHub::new(),
        Map::new(),
    ));
    block_on(writer.set_async("next", &reminder)).expect("write");

    let reader = ReliableDictionary::new(LocalStorageProvider::new(
        "REMINDERS",
        storage,
        &EventHub::new(),
        Map::new(),
    ));
    assert_eq!(
        block_on(reader.get_async::<Reminder>("next")).expect("read"),
        Some(reminder)
    );
}

#[test]
fn auth_app_resources_are_normalized_and_only_grow() {
    let mut app = AuthApp::new("Portal", ["https://API.example.com/", " https://tasks.example.com "]);
    assert_eq!(
        app.resources().to_vec(),
        vec!["https://api.example.com".to_string(), "https://tasks.example.com".to_string()]
    );

    assert!(!app.update_resources(["HTTPS://api.example.com"]));
    assert!(app.update_resources(["https://context.example.com/"]));
    assert_eq!(app.resources().len(), 3);
    assert!(app.matches("https://context.example.com/contexts/1"));
}

#[test]
fn token_validity_flips_at_expiry() {
    let now = Utc::now();
    let future = AuthToken::parse(&jwt(&json!({
        "oid": "u1",
        "exp": (now + Duration::seconds(1)).timestamp(),
        "name": "Ada"
    })))
    .expect("future token");
    let past = AuthToken::parse(&jwt(&json!({
        "oid": "u1",
        "exp": (now - Duration::seconds(1)).timestamp()
    })))
    .expect("past token");

    assert!(future.is_valid());
    assert!(!past.is_valid());
    assert_eq!(future.to_user().full_name, "Ada");
}
