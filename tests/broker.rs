mod common;

use common::{
    CLIENT_ID, ISSUER, SUBJECT, TEST_SIGNING_KID, TEST_SIGNING_PUBLIC_PEM, epoch_now,
    mint_upstream_token, seed_store,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use std::sync::Arc;
use warden::auth::error::AuthError;
use warden::auth::session::SessionIdentity;
use warden::auth::signer::AccessClaims;
use warden::broker::{AuthorizationBroker, AuthorizeRequest};
use warden::config::BrokerConfig;
use warden::store::memory::InMemoryStore;
use warden::store::{ClientScope, KeyStore};

fn broker_config() -> BrokerConfig {
    BrokerConfig {
        issuer_url: "https://warden.example".to_string(),
        max_token_lifetime_secs: 300,
    }
}

fn decode_access(token: &str) -> (AccessClaims, Option<String>) {
    let header = jsonwebtoken::decode_header(token).expect("header");
    let mut validation = Validation::new(Algorithm::RS256);
    validation.validate_aud = false;
    validation.set_issuer(&["https://warden.example"]);
    let data = jsonwebtoken::decode::<AccessClaims>(
        token,
        &DecodingKey::from_rsa_pem(TEST_SIGNING_PUBLIC_PEM.as_bytes()).expect("public key"),
        &validation,
    )
    .expect("decode");
    (data.claims, header.kid)
}

fn authorize_request<'a>(
    token: &'a str,
    requested_scope: Option<&'a str>,
) -> AuthorizeRequest<'a> {
    AuthorizeRequest {
        upstream_token: token,
        user_context: None,
        client_scope: ClientScope::client(CLIENT_ID),
        requested_scope,
        authorized_party: CLIENT_ID,
    }
}

#[tokio::test]
async fn authorize_issues_a_narrowed_signed_token() {
    let store = Arc::new(seed_store().await);
    let broker = AuthorizationBroker::new(store, broker_config());
    let token = mint_upstream_token(SUBJECT, ISSUER, epoch_now() + 3600);

    let issued = broker
        .authorize(&authorize_request(&token, Some("test-permission1")))
        .await
        .expect("authorize");

    let expected_scope: std::collections::BTreeSet<String> =
        ["test-permission1".to_string()].into_iter().collect();
    let expected_roles: std::collections::BTreeSet<String> =
        ["test-client1:test-role1".to_string()].into_iter().collect();
    assert_eq!(issued.scope, expected_scope);
    assert_eq!(issued.roles, expected_roles);
    assert_eq!(issued.accepted_scope.as_deref(), Some("test-permission1"));

    let (claims, kid) = decode_access(&issued.access_token);
    assert_eq!(kid.as_deref(), Some(TEST_SIGNING_KID));
    assert_eq!(claims.sub, SUBJECT);
    assert_eq!(claims.azp, CLIENT_ID);
    assert_eq!(claims.roles, "test-client1:test-role1");
    assert_eq!(claims.scope, "test-permission1");
}

#[tokio::test]
async fn token_lifetime_never_exceeds_config_or_upstream() {
    let store = Arc::new(seed_store().await);
    let broker = AuthorizationBroker::new(store, broker_config());

    // Upstream outlives the configured maximum: the config wins.
    let long = mint_upstream_token(SUBJECT, ISSUER, epoch_now() + 86_400);
    let issued = broker
        .authorize(&authorize_request(&long, None))
        .await
        .expect("authorize");
    assert_eq!(issued.expires_in, 300);
    let (claims, _) = decode_access(&issued.access_token);
    assert_eq!(claims.exp - claims.iat, 300);

    // Upstream expires before the maximum: the upstream bound wins.
    let short = mint_upstream_token(SUBJECT, ISSUER, epoch_now() + 60);
    let issued = broker
        .authorize(&authorize_request(&short, None))
        .await
        .expect("authorize");
    assert!(issued.expires_in <= 60);
    let (claims, _) = decode_access(&issued.access_token);
    assert!(claims.exp - claims.iat <= 60);
}

#[tokio::test]
async fn refresh_reuses_the_handle_and_the_session_scope() {
    let store = Arc::new(seed_store().await);
    let broker = AuthorizationBroker::new(store, broker_config());
    let token = mint_upstream_token(SUBJECT, ISSUER, epoch_now() + 3600);

    let issued = broker
        .authorize(&authorize_request(&token, Some("test-permission1")))
        .await
        .expect("authorize");
    let refreshed = broker
        .refresh(
            &issued.refresh_handle,
            CLIENT_ID,
            ClientScope::client(CLIENT_ID),
        )
        .await
        .expect("refresh");

    assert_eq!(refreshed.refresh_handle, issued.refresh_handle);
    assert_eq!(refreshed.scope, issued.scope);
    assert_eq!(refreshed.roles, issued.roles);
    let (claims, _) = decode_access(&refreshed.access_token);
    assert_eq!(claims.scope, "test-permission1");
}

#[tokio::test]
async fn refresh_never_widens_a_grant_narrowed_to_nothing() {
    let store = Arc::new(seed_store().await);
    let broker = AuthorizationBroker::new(store, broker_config());
    let token = mint_upstream_token(SUBJECT, ISSUER, epoch_now() + 3600);

    // Unknown names narrow silently; the resulting grant holds nothing.
    let issued = broker
        .authorize(&authorize_request(&token, Some("no-such-permission")))
        .await
        .expect("authorize");
    assert!(issued.scope.is_empty());
    assert!(issued.roles.is_empty());
    let (claims, _) = decode_access(&issued.access_token);
    assert_eq!(claims.scope, "");

    // The empty outcome is still a narrowing: refresh must keep the grant
    // empty, not fall back to the persona's full entitled set.
    let refreshed = broker
        .refresh(
            &issued.refresh_handle,
            CLIENT_ID,
            ClientScope::client(CLIENT_ID),
        )
        .await
        .expect("refresh");
    assert!(refreshed.scope.is_empty());
    assert!(refreshed.roles.is_empty());
    let (claims, _) = decode_access(&refreshed.access_token);
    assert_eq!(claims.scope, "");
    assert_eq!(claims.roles, "");
}

#[tokio::test]
async fn already_expired_upstream_assertion_is_rejected() {
    let store = Arc::new(seed_store().await);
    let broker = AuthorizationBroker::new(store, broker_config());
    let stale = mint_upstream_token(SUBJECT, ISSUER, epoch_now() - 10);
    assert!(matches!(
        broker.authorize(&authorize_request(&stale, None)).await,
        Err(AuthError::Expired)
    ));
}

#[tokio::test]
async fn authorize_without_signing_keys_is_a_configuration_fault() {
    // Full fixture, but bootstrap never ran.
    let store = Arc::new(common::seed_store_without_key().await);
    let broker = AuthorizationBroker::new(store, broker_config());
    let token = mint_upstream_token(SUBJECT, ISSUER, epoch_now() + 3600);
    assert!(matches!(
        broker.authorize(&authorize_request(&token, None)).await,
        Err(AuthError::ConfigurationFault(_))
    ));
}

#[tokio::test]
async fn logout_revokes_the_refresh_handle() {
    let store = Arc::new(seed_store().await);
    let broker = AuthorizationBroker::new(store, broker_config());
    let token = mint_upstream_token(SUBJECT, ISSUER, epoch_now() + 3600);
    let issued = broker
        .authorize(&authorize_request(&token, None))
        .await
        .expect("authorize");

    broker
        .logout(&SessionIdentity {
            subject: SUBJECT,
            user_context: "",
            issuer: ISSUER,
        })
        .await
        .expect("logout");

    assert!(matches!(
        broker
            .refresh(
                &issued.refresh_handle,
                CLIENT_ID,
                ClientScope::client(CLIENT_ID)
            )
            .await,
        Err(AuthError::NotFound(_))
    ));
}

#[tokio::test]
async fn bootstrap_generates_a_key_for_an_empty_store() {
    let store = Arc::new(InMemoryStore::new());
    let broker = AuthorizationBroker::new(store.clone(), broker_config());
    assert!(store.current_key().await.expect("query").is_none());
    broker.bootstrap().await.expect("bootstrap");
    let key = store.current_key().await.expect("query").expect("key");
    assert!(key.public_key_pem.contains("BEGIN RSA PUBLIC KEY"));
    // Idempotent: a second bootstrap keeps the same key.
    broker.bootstrap().await.expect("bootstrap again");
    let again = store.current_key().await.expect("query").expect("key");
    assert_eq!(again.kid, key.kid);
}
