// lib/vault-client/tests/integration_auth.rs

mod common;

use common::FakeVault;
use vault_client::{AuthSelector, ClientOptions, CredentialBundle, ErrorKind, KvClient, VaultError};

fn login(bundle: CredentialBundle) -> AuthSelector {
    AuthSelector::new(bundle, ClientOptions::default())
}

#[tokio::test]
async fn test_static_token_is_validated_with_lookup_self() {
    let vault = FakeVault::new("cluster-a").with_token("s.root");
    let server = vault.start().await;

    let session = login(CredentialBundle::new(server.uri()).with_token("s.root"))
        .login()
        .await
        .expect("token should be accepted");

    assert_eq!(session.address(), server.uri());
    let calls = vault.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].path, "auth/token/lookup-self");
}

#[tokio::test]
async fn test_token_present_means_no_login_call() {
    let vault = FakeVault::new("cluster-a")
        .with_token("s.root")
        .with_jwt_login("kubernetes", "k8s.jwt", None, "s.k8s")
        .with_jwt_login("jwt", "ci.jwt", None, "s.ci");
    let server = vault.start().await;

    let bundle = CredentialBundle::new(server.uri())
        .with_token("s.root")
        .with_kubernetes_jwt("k8s.jwt")
        .with_jwt("ci.jwt");
    login(bundle).login().await.unwrap();

    assert!(vault.calls().iter().all(|c| !c.path.ends_with("/login")));
}

#[tokio::test]
async fn test_rejected_token_is_auth_error() {
    let vault = FakeVault::new("cluster-a").with_token("s.root");
    let server = vault.start().await;

    let err = login(CredentialBundle::new(server.uri()).with_token("s.wrong"))
        .login()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Auth);
    assert!(err.to_string().contains("permission denied"));
}

#[tokio::test]
async fn test_kubernetes_jwt_preferred_over_ci_jwt() {
    let vault = FakeVault::new("cluster-a")
        .with_jwt_login("kubernetes", "k8s.jwt", Some("deployer"), "s.k8s")
        .with_jwt_login("jwt", "ci.jwt", Some("deployer"), "s.ci")
        .with_mount("secret", 1)
        .with_secret("secret", "app", serde_json::json!({"key": "value"}));
    let server = vault.start().await;

    let bundle = CredentialBundle::new(server.uri())
        .with_kubernetes_jwt("k8s.jwt")
        .with_jwt("ci.jwt")
        .with_role("deployer");
    let session = login(bundle).login().await.unwrap();

    let logins: Vec<_> = vault
        .calls()
        .into_iter()
        .filter(|c| c.path.ends_with("/login"))
        .collect();
    assert_eq!(logins.len(), 1);
    assert_eq!(logins[0].path, "auth/kubernetes/login");

    // The issued token works for data calls.
    let record = KvClient::new(&session).read("secret/app").await.unwrap();
    assert!(record.is_some());
}

#[tokio::test]
async fn test_ci_jwt_uses_jwt_mount_by_default() {
    let vault = FakeVault::new("cluster-a").with_jwt_login("jwt", "ci.jwt", None, "s.ci");
    let server = vault.start().await;

    login(CredentialBundle::new(server.uri()).with_jwt("ci.jwt"))
        .login()
        .await
        .unwrap();

    assert_eq!(vault.calls()[0].path, "auth/jwt/login");
}

#[tokio::test]
async fn test_mount_override_redirects_login() {
    let vault = FakeVault::new("cluster-a").with_jwt_login("git", "ci.jwt", Some("ci"), "s.git");
    let server = vault.start().await;

    let bundle = CredentialBundle::new(server.uri())
        .with_jwt("ci.jwt")
        .with_role("ci")
        .with_auth_mount("git");
    login(bundle).login().await.unwrap();

    assert_eq!(vault.calls()[0].path, "auth/git/login");
}

#[tokio::test]
async fn test_wrong_role_is_auth_error() {
    let vault = FakeVault::new("cluster-a").with_jwt_login("jwt", "ci.jwt", Some("ci"), "s.ci");
    let server = vault.start().await;

    let bundle = CredentialBundle::new(server.uri())
        .with_jwt("ci.jwt")
        .with_role("admin");
    let err = login(bundle).login().await.unwrap_err();

    match err {
        VaultError::AuthError { mount, message } => {
            assert_eq!(mount, "auth/jwt/login");
            assert!(message.contains("invalid role"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_no_credential_makes_no_calls() {
    let vault = FakeVault::new("cluster-a");
    let server = vault.start().await;

    let err = login(CredentialBundle::new(server.uri()).with_role("ci"))
        .login()
        .await
        .unwrap_err();

    assert!(matches!(err, VaultError::NoCredential));
    assert!(vault.calls().is_empty());
}
