//! Scope resolution: the account-only billing probe and how the session
//! records its verdict.

use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use hookcache::auth::ACCOUNT_SCOPE_KEY;
use hookcache::{ApiError, CmApi, HttpClient, Scope, Session};

const TEST_KEY: &str = "testkeytestkeytestkey";

fn setup(server: &MockServer) -> (Session, CmApi) {
    let (session, _rx) = Session::new();
    session.set_api_key(TEST_KEY);
    let api = CmApi::new(HttpClient::new(server.uri(), session.clone()).expect("client builds"));
    (session, api)
}

#[tokio::test]
async fn billing_success_means_account_scope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/billingdetails.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Credits": 500 })))
        .expect(1)
        .mount(&server)
        .await;

    let (session, api) = setup(&server);
    let cancel = CancellationToken::new();
    let scope = session.validate(&api, &cancel).await.expect("probe ok");

    assert_eq!(scope, Scope::Account);
    assert_eq!(session.scope(), Some(Scope::Account));
    assert_eq!(session.scope_key().as_deref(), Some(ACCOUNT_SCOPE_KEY));
}

#[tokio::test]
async fn billing_403_reads_as_client_scope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/billingdetails.json"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let (session, api) = setup(&server);
    let cancel = CancellationToken::new();
    let scope = session.validate(&api, &cancel).await.expect("probe ok");

    assert_eq!(scope, Scope::Client);
    // Scope key needs an active client for client-scoped keys.
    assert_eq!(session.scope_key(), None);
    session.set_client_id("c1");
    assert_eq!(session.scope_key().as_deref(), Some("c1"));
}

#[tokio::test]
async fn billing_404_reads_as_client_scope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/billingdetails.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let (_session, api) = setup(&server);
    let cancel = CancellationToken::new();
    assert_eq!(api.resolve_scope(&cancel).await.expect("probe ok"), Scope::Client);
}

#[tokio::test]
async fn probe_401_tears_down_the_session_it_was_probing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/billingdetails.json"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let (session, api) = setup(&server);
    let cancel = CancellationToken::new();
    let scope = session.validate(&api, &cancel).await.expect("probe resolves");

    // The inference still says client scope, but the 401 side effect has
    // already cleared the credential, so nothing is recorded.
    assert_eq!(scope, Scope::Client);
    assert!(!session.is_authenticated());
    assert_eq!(session.scope(), None);
}

#[tokio::test]
async fn probe_transport_errors_propagate() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/billingdetails.json"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (_session, api) = setup(&server);
    let cancel = CancellationToken::new();
    let err = api.resolve_scope(&cancel).await.expect_err("not a scope answer");
    assert!(matches!(err, ApiError::Server { status: 500, .. }));
}

#[tokio::test]
async fn client_details_expose_billing_reachability() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/clients/c1.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "BasicDetails": { "ClientID": "c1", "CompanyName": "Acme" },
            "BillingDetails": { "CurrentTier": "Unlimited" }
        })))
        .mount(&server)
        .await;

    let (_session, api) = setup(&server);
    let cancel = CancellationToken::new();
    let details = api.get_client_details("c1", &cancel).await.expect("fetch ok");

    assert_eq!(details.basic_details.client_id, "c1");
    assert!(details.billing_reachable());
}
