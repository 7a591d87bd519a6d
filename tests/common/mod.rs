#![allow(dead_code)]

use fridgefriend::{EmailConfig, FridgeFriend, FridgeFriendConfig, RecipeConfig};
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const USER_ID: &str = "user-1";
pub const USER_EMAIL: &str = "sam@example.com";

pub fn session_body() -> Value {
    json!({
        "access_token": "user-jwt",
        "refresh_token": "refresh",
        "expires_in": 3600,
        "token_type": "bearer",
        "user": { "id": USER_ID, "email": USER_EMAIL }
    })
}

/// A client pointed at `server` for every backend, with email and recipes configured
pub fn client(server: &MockServer) -> FridgeFriend {
    let config = FridgeFriendConfig::new(&server.uri(), "anon-key")
        .unwrap()
        .with_email(EmailConfig {
            base_url: server.uri(),
            service_id: "service_test".to_string(),
            template_id: "template_notify".to_string(),
            expiry_template_id: Some("template_expiry".to_string()),
            user_id: "public-key".to_string(),
            access_token: None,
        })
        .with_recipes(RecipeConfig {
            base_url: server.uri(),
            api_key: "spoon-key".to_string(),
        });
    FridgeFriend::new(config).unwrap()
}

pub async fn signed_in_client(server: &MockServer) -> FridgeFriend {
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_body()))
        .mount(server)
        .await;

    let client = client(server);
    client.sign_in(USER_EMAIL, "password").await.unwrap();
    client
}

/// Accepted memberships of the test user
pub async fn mock_memberships(server: &MockServer, memberships: Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/household_members"))
        .and(query_param("user_id", format!("eq.{}", USER_ID)))
        .and(query_param("status", "eq.accepted"))
        .and(query_param("select", "household_id,role"))
        .respond_with(ResponseTemplate::new(200).set_body_json(memberships))
        .mount(server)
        .await;
}

/// Profile preference flags read before emailing
pub async fn mock_email_preferences(server: &MockServer, expiry: bool, email: bool) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("select", "expiry_notifications,email_notifications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "expiry_notifications": expiry,
            "email_notifications": email
        }])))
        .mount(server)
        .await;
}

/// The dedup lookup finds `existing` rows and the list reload returns `listed`
pub async fn mock_notification_reads(server: &MockServer, existing: Value, listed: Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/notifications"))
        .and(query_param("select", "id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(existing))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/notifications"))
        .and(query_param("select", "*"))
        .and(query_param("order", "created_at.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listed))
        .mount(server)
        .await;
}

pub fn notification_row(id: &str, title: &str, message: &str, kind: &str) -> Value {
    json!({
        "id": id,
        "user_id": USER_ID,
        "title": title,
        "message": message,
        "type": kind,
        "read": false,
        "created_at": "2024-05-01T10:00:00+00:00"
    })
}

pub fn item_row(id: &str, name: &str, expiration: &str, location: &str, household_id: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "quantity": 1,
        "unit": "piece",
        "category": "dairy",
        "purchased": "2024-04-28",
        "expiration": expiration,
        "location": location,
        "notes": null,
        "user_id": USER_ID,
        "household_id": household_id,
        "created_at": "2024-04-28T10:00:00+00:00"
    })
}
