mod common;

use common::*;
use fridgefriend::household::InviteOutcome;
use fridgefriend::models::MembershipStatus;
use fridgefriend::Error;
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mock_profile_household(server: &MockServer, household_id: Option<&str>) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("select", "household_id"))
        .and(query_param("id", format!("eq.{}", USER_ID)))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "household_id": household_id }])),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_resolve_prefers_owned_household() {
    let server = MockServer::start().await;
    let client = signed_in_client(&server).await;
    mock_memberships(
        &server,
        json!([
            { "household_id": "A", "role": "member" },
            { "household_id": "B", "role": "owner" }
        ]),
    )
    .await;

    let resolved = client.households().resolve_for_user(USER_ID).await.unwrap();
    assert_eq!(resolved.as_deref(), Some("B"));
}

#[tokio::test]
async fn test_accept_invite_transitions_once() {
    let server = MockServer::start().await;
    let client = signed_in_client(&server).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/household_members"))
        .and(query_param("user_id", format!("eq.{}", USER_ID)))
        .and(query_param("household_id", "eq.h7"))
        .and(query_param("status", "eq.pending"))
        .and(body_json(json!({ "status": "accepted" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": "m1",
            "household_id": "h7",
            "user_id": USER_ID,
            "role": "member",
            "status": "accepted"
        }])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("id", format!("eq.{}", USER_ID)))
        .and(body_json(json!({ "household_id": "h7" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = client.households().accept_invite("h7").await.unwrap();
    assert_eq!(outcome, InviteOutcome::Accepted);
}

#[tokio::test]
async fn test_accept_invite_again_is_a_no_op() {
    let server = MockServer::start().await;
    let client = signed_in_client(&server).await;

    // No pending row is left to transition.
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/household_members"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/household_members"))
        .and(query_param("household_id", "eq.h7"))
        .and(query_param("status", "eq.accepted"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "household_id": "h7" }])))
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = client.households().accept_invite("h7").await.unwrap();
    assert_eq!(outcome, InviteOutcome::AlreadyAccepted);
}

#[tokio::test]
async fn test_accept_unknown_invite_is_not_found() {
    let server = MockServer::start().await;
    let client = signed_in_client(&server).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/household_members"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/household_members"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = client.households().accept_invite("h404").await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_pending_invites_accept_both_embed_shapes() {
    let server = MockServer::start().await;
    let client = signed_in_client(&server).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/household_members"))
        .and(query_param("select", "household_id,status,households(name)"))
        .and(query_param("status", "eq.pending"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "household_id": "h1", "status": "pending", "households": { "name": "Flat 4" } },
            { "household_id": "h2", "status": "pending", "households": [{ "name": "Cabin" }] }
        ])))
        .mount(&server)
        .await;

    let invites = client.households().pending_invites(USER_ID).await.unwrap();
    assert_eq!(invites.len(), 2);
    assert_eq!(invites[0].household_name, "Flat 4");
    assert_eq!(invites[1].household_name, "Cabin");
    assert!(invites.iter().all(|i| i.status == MembershipStatus::Pending));
}

#[tokio::test]
async fn test_invite_by_email_inserts_pending_member() {
    let server = MockServer::start().await;
    let client = signed_in_client(&server).await;
    mock_profile_household(&server, Some("h1")).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("email", "eq.alex@example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "user-2", "email": "alex@example.com", "name": "Alex" }
        ])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/household_members"))
        .and(body_json(json!({
            "user_id": "user-2",
            "household_id": "h1",
            "status": "pending",
            "role": "member"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": "m2",
            "household_id": "h1",
            "user_id": "user-2",
            "role": "member",
            "status": "pending"
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let member = client
        .households()
        .invite_by_email("  Alex@Example.com ")
        .await
        .unwrap();
    assert_eq!(member.status, MembershipStatus::Pending);
}

#[tokio::test]
async fn test_invite_rejects_bad_and_unknown_addresses() {
    let server = MockServer::start().await;
    let client = signed_in_client(&server).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("email", "eq.nobody@example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let households = client.households();
    assert!(matches!(
        households.invite_by_email("not-an-email").await,
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        households.invite_by_email("nobody@example.com").await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_invite_requires_own_household() {
    let server = MockServer::start().await;
    let client = signed_in_client(&server).await;
    mock_profile_household(&server, None).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("email", "eq.alex@example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "user-2", "email": "alex@example.com" }
        ])))
        .mount(&server)
        .await;

    let result = client.households().invite_by_email("alex@example.com").await;
    assert!(matches!(result, Err(Error::NoHousehold(_))));
}

#[tokio::test]
async fn test_save_household_name_creates_default_household() {
    let server = MockServer::start().await;
    let client = signed_in_client(&server).await;
    mock_profile_household(&server, None).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/households"))
        .and(body_json(json!({ "name": "sam's Household" })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!([{ "id": "h9", "name": "sam's Household" }])),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/profiles"))
        .and(body_json(json!({ "household_id": "h9" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/household_members"))
        .and(body_partial_json(json!({
            "household_id": "h9",
            "user_id": USER_ID,
            "role": "owner",
            "status": "accepted"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/households"))
        .and(query_param("id", "eq.h9"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "id": "h9", "name": "sam's Household" }])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let household = client.households().save_household_name("").await.unwrap();
    assert_eq!(household.id, "h9");
    assert_eq!(household.name, "sam's Household");
}

#[tokio::test]
async fn test_members_joined_with_profiles() {
    let server = MockServer::start().await;
    let client = signed_in_client(&server).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/household_members"))
        .and(query_param("household_id", "eq.h1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "m1", "household_id": "h1", "user_id": USER_ID, "role": "owner", "status": "accepted" },
            { "id": "m2", "household_id": "h1", "user_id": "ghost", "role": "member", "status": "pending" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("id", format!("in.({},ghost)", USER_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": USER_ID, "email": USER_EMAIL, "name": "Sam" }
        ])))
        .mount(&server)
        .await;

    let members = client.households().members("h1").await.unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].profile.name.as_deref(), Some("Sam"));
    assert_eq!(members[1].profile.id, "");
}
