//! End-to-end session scenarios against a mock case-management API.

use credential_store::{CredentialStore, FileStorage, MemoryStorage, MirroredStorage, SecureStorage};
use futures_util::future::join_all;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::tempdir;
use themis::{
    ApiRequest, AuthApi, AuthError, RefreshError, Role, SessionManager, SessionStatus, TokenPair,
};
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn memory_store() -> Arc<CredentialStore> {
    Arc::new(CredentialStore::new(Box::new(MemoryStorage::new())))
}

fn manager(server: &MockServer, store: Arc<CredentialStore>) -> SessionManager {
    let api = AuthApi::new(Url::parse(&server.uri()).unwrap(), Duration::from_secs(5)).unwrap();
    SessionManager::new(api, store)
}

async fn mount_login(server: &MockServer, role: &str, access: &str, refresh: &str) {
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": { "id": 1, "nombre": "Ana Ruiz", "rol": role },
            "tokens": { "accessToken": access, "refreshToken": refresh }
        })))
        .mount(server)
        .await;
}

async fn mount_refresh(server: &MockServer, response: ResponseTemplate, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(body_json(json!({ "refreshToken": "RT0" })))
        .respond_with(response)
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn rotated_pair() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "accessToken": "AT1", "refreshToken": "RT1" }))
}

async fn mount_expired(server: &MockServer, route: &str, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(header("authorization", "Bearer AT0"))
        .respond_with(ResponseTemplate::new(401))
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn mount_fresh(server: &MockServer, route: &str, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(header("authorization", "Bearer AT1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn scenario_a_login_normalizes_role_and_permissions() {
    let server = MockServer::start().await;
    mount_login(&server, "juez", "AT1", "RT1").await;
    let store = memory_store();
    let manager = manager(&server, store.clone());

    let user = manager.sign_in("ana@juzgado.example", "secreto").await.unwrap();

    assert_eq!(user.id, "1");
    assert_eq!(user.role, Role::Judge);
    assert!(manager.has_permission("expedientes.read"));
    assert!(!manager.has_permission("usuarios.write"));
    assert_eq!(store.token_pair(), Some(TokenPair::new("AT1", "RT1")));
}

#[tokio::test]
async fn scenario_b_expired_token_refreshes_once_and_replays() {
    let server = MockServer::start().await;
    mount_login(&server, "secretario", "AT0", "RT0").await;
    mount_refresh(&server, rotated_pair(), 1).await;
    mount_expired(&server, "/expedientes", 1).await;
    mount_fresh(&server, "/expedientes", 1).await;

    let store = memory_store();
    let manager = manager(&server, store.clone());
    manager.sign_in("ana@juzgado.example", "secreto").await.unwrap();

    let response = manager.request(&ApiRequest::get("/expedientes")).await.unwrap();

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(store.token_pair(), Some(TokenPair::new("AT1", "RT1")));
    assert_eq!(manager.status(), SessionStatus::Authenticated);
}

#[tokio::test]
async fn scenario_c_rejected_refresh_ends_session() {
    let server = MockServer::start().await;
    mount_login(&server, "administrador", "AT0", "RT0").await;
    mount_refresh(&server, ResponseTemplate::new(401), 1).await;
    mount_expired(&server, "/expedientes", 1).await;

    let store = memory_store();
    let manager = manager(&server, store.clone());
    manager.sign_in("ana@juzgado.example", "secreto").await.unwrap();
    assert!(manager.has_permission("usuarios.write"));

    let err = manager
        .request(&ApiRequest::get("/expedientes"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AuthError::Refresh(RefreshError::Rejected { status: 401, .. })
    ));
    let session = manager.snapshot();
    assert_eq!(session.status, SessionStatus::Unauthenticated);
    assert!(session.user.is_none());
    assert!(session.error.is_some());
    assert!(store.is_empty());
    for permission in ["expedientes.read", "usuarios.write", "all"] {
        assert!(!manager.has_permission(permission));
    }
}

#[tokio::test]
async fn scenario_d_back_to_back_calls_share_one_refresh() {
    let server = MockServer::start().await;
    mount_login(&server, "juez", "AT0", "RT0").await;
    mount_refresh(
        &server,
        rotated_pair().set_delay(Duration::from_millis(200)),
        1,
    )
    .await;
    mount_expired(&server, "/expedientes", 2).await;
    mount_fresh(&server, "/expedientes", 2).await;

    let manager = manager(&server, memory_store());
    manager.sign_in("ana@juzgado.example", "secreto").await.unwrap();

    let request = ApiRequest::get("/expedientes");
    let (first, second) = tokio::join!(manager.request(&request), manager.request(&request));

    assert!(first.unwrap().is_success());
    assert!(second.unwrap().is_success());
    assert_eq!(manager.gateway().refresher().network_calls(), 1);
}

#[tokio::test]
async fn concurrent_401s_are_deduplicated() {
    const CALLS: u64 = 8;

    let server = MockServer::start().await;
    mount_login(&server, "juez", "AT0", "RT0").await;
    mount_refresh(
        &server,
        rotated_pair().set_delay(Duration::from_millis(200)),
        1,
    )
    .await;
    mount_expired(&server, "/documentos", CALLS).await;
    mount_fresh(&server, "/documentos", CALLS).await;

    let manager = manager(&server, memory_store());
    manager.sign_in("ana@juzgado.example", "secreto").await.unwrap();

    let request = ApiRequest::get("/documentos");
    let responses = join_all((0..CALLS).map(|_| manager.request(&request))).await;

    for response in responses {
        assert!(response.unwrap().is_success());
    }
    assert_eq!(manager.gateway().refresher().network_calls(), 1);
}

#[tokio::test]
async fn refresh_outage_keeps_session() {
    let server = MockServer::start().await;
    mount_login(&server, "juez", "AT0", "RT0").await;
    mount_refresh(&server, ResponseTemplate::new(503), 1).await;
    mount_expired(&server, "/expedientes", 1).await;

    let store = memory_store();
    let manager = manager(&server, store.clone());
    manager.sign_in("ana@juzgado.example", "secreto").await.unwrap();

    let err = manager
        .request(&ApiRequest::get("/expedientes"))
        .await
        .unwrap_err();

    assert!(err.is_transient());
    assert_eq!(manager.status(), SessionStatus::Authenticated);
    assert_eq!(store.token_pair(), Some(TokenPair::new("AT0", "RT0")));
}

#[tokio::test]
async fn concurrent_sign_outs_end_in_one_clean_state() {
    let server = MockServer::start().await;
    mount_login(&server, "juez", "AT1", "RT1").await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(204).set_delay(Duration::from_millis(50)))
        .mount(&server)
        .await;

    let store = memory_store();
    let manager = manager(&server, store.clone());
    manager.sign_in("ana@juzgado.example", "secreto").await.unwrap();

    let sessions = join_all((0..5).map(|_| manager.sign_out())).await;

    for session in sessions {
        assert_eq!(session.status, SessionStatus::Unauthenticated);
        assert!(session.user.is_none());
    }
    assert!(store.is_empty());
    assert!(manager.cached_user().is_none());
}

#[tokio::test]
async fn sign_out_does_not_wait_for_a_hanging_server() {
    let server = MockServer::start().await;
    mount_login(&server, "juez", "AT1", "RT1").await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(204).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let store = memory_store();
    let manager = manager(&server, store.clone()).with_logout_timeout(Duration::from_millis(100));
    manager.sign_in("ana@juzgado.example", "secreto").await.unwrap();

    let mut rx = manager.subscribe();
    let started = Instant::now();
    let session = manager.sign_out().await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(session.status, SessionStatus::Unauthenticated);
    assert_eq!(rx.borrow_and_update().status, SessionStatus::Unauthenticated);
    assert!(store.is_empty());
}

#[tokio::test]
async fn sign_out_ignores_server_errors() {
    let server = MockServer::start().await;
    mount_login(&server, "juez", "AT1", "RT1").await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let store = memory_store();
    let manager = manager(&server, store.clone());
    manager.sign_in("ana@juzgado.example", "secreto").await.unwrap();

    let session = manager.sign_out().await;
    assert_eq!(session.status, SessionStatus::Unauthenticated);
    assert!(session.error.is_none());
    assert!(store.is_empty());
}

#[tokio::test]
async fn sign_in_then_fresh_bootstrap_restores_session() {
    let server = MockServer::start().await;
    mount_login(&server, "juez", "AT1", "RT1").await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer AT1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": { "id": 1, "nombre": "Ana Ruiz", "rol": "juez" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let credentials = dir.path().join("credentials.json");

    let first = manager(
        &server,
        Arc::new(CredentialStore::new(Box::new(FileStorage::new(&credentials)))),
    );
    let signed_in = first.sign_in("ana@juzgado.example", "secreto").await.unwrap();

    let store = Arc::new(CredentialStore::new(Box::new(FileStorage::new(&credentials))));
    let second = manager(&server, store.clone());
    let session = second.bootstrap().await;

    assert_eq!(session.status, SessionStatus::Authenticated);
    assert_eq!(store.token_pair(), Some(TokenPair::new("AT1", "RT1")));
    // The /me response has no email; the cached profile supplies it.
    assert_eq!(session.user, Some(signed_in));
}

#[tokio::test]
async fn bootstrap_without_token_makes_no_request() {
    let server = MockServer::start().await;
    let manager = manager(&server, memory_store());

    let session = manager.bootstrap().await;

    assert_eq!(session.status, SessionStatus::Unauthenticated);
    assert!(!session.is_loading());
    assert!(session.error.is_none());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn bootstrap_with_failing_profile_fetch_clears_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let store = memory_store();
    store.set_token_pair(&TokenPair::new("AT0", "RT0"));
    let manager = manager(&server, store.clone());

    let session = manager.bootstrap().await;

    assert_eq!(session.status, SessionStatus::Unauthenticated);
    assert!(!session.is_loading());
    assert!(store.is_empty());
}

#[tokio::test]
async fn bootstrap_with_revoked_refresh_token_ends_unauthenticated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, ResponseTemplate::new(401), 1).await;

    let store = memory_store();
    store.set_token_pair(&TokenPair::new("AT0", "RT0"));
    let manager = manager(&server, store.clone());

    let session = manager.bootstrap().await;

    assert_eq!(session.status, SessionStatus::Unauthenticated);
    assert!(store.is_empty());
}

#[tokio::test]
async fn bootstrap_runs_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "user": { "id": "7", "role": "OPERATOR", "email": "op@example.org" } }))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = memory_store();
    store.set_token_pair(&TokenPair::new("AT0", "RT0"));
    let manager = manager(&server, store);

    let (first, second) = tokio::join!(manager.bootstrap(), manager.bootstrap());
    let third = manager.bootstrap().await;

    assert_eq!(first, second);
    assert_eq!(second, third);
    assert_eq!(third.status, SessionStatus::Authenticated);
    assert!(manager.has_role(&[Role::Operator]));
}

#[tokio::test]
async fn mirrored_store_restores_from_secondary() {
    let server = MockServer::start().await;
    mount_login(&server, "juez", "AT1", "RT1").await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer AT1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "user": { "id": 1, "rol": "juez" } })),
        )
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let primary = dir.path().join("credentials.json");
    let secondary = dir.path().join("credentials.mirror.json");
    let mirrored = || {
        Arc::new(CredentialStore::new(Box::new(MirroredStorage::new(
            Box::new(FileStorage::new(&primary)),
            Box::new(FileStorage::new(&secondary)),
        ))))
    };

    manager(&server, mirrored())
        .sign_in("ana@juzgado.example", "secreto")
        .await
        .unwrap();
    std::fs::remove_file(&primary).unwrap();

    let session = manager(&server, mirrored()).bootstrap().await;
    assert_eq!(session.status, SessionStatus::Authenticated);
}

#[tokio::test]
async fn refresh_transport_failure_keeps_session() {
    let server = MockServer::start().await;
    mount_login(&server, "juez", "AT0", "RT0").await;
    mount_refresh(&server, rotated_pair().set_delay(Duration::from_secs(2)), 1).await;
    mount_expired(&server, "/expedientes", 1).await;

    let store = memory_store();
    let api = AuthApi::new(Url::parse(&server.uri()).unwrap(), Duration::from_millis(300)).unwrap();
    let manager = SessionManager::new(api, store.clone());
    manager.sign_in("ana@juzgado.example", "secreto").await.unwrap();

    let err = manager
        .request(&ApiRequest::get("/expedientes"))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Refresh(RefreshError::Network(_))));
    assert!(err.is_transient());
    assert_eq!(manager.status(), SessionStatus::Authenticated);
    assert!(manager.has_permission("expedientes.read"));
    assert_eq!(store.token_pair(), Some(TokenPair::new("AT0", "RT0")));
}

#[tokio::test]
async fn sign_out_during_sign_in_discards_the_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "user": { "id": 1, "nombre": "Ana Ruiz", "rol": "juez" },
                    "tokens": { "accessToken": "AT1", "refreshToken": "RT1" }
                }))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(2)
        .mount(&server)
        .await;

    let store = memory_store();
    let manager = manager(&server, store.clone());

    let (signed_in, signed_out) = tokio::join!(
        manager.sign_in("ana@juzgado.example", "secreto"),
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            manager.sign_out().await
        }
    );

    assert_eq!(signed_out.status, SessionStatus::Unauthenticated);
    assert!(matches!(signed_in, Err(AuthError::Authentication(_))));
    let session = manager.snapshot();
    assert_eq!(session.status, SessionStatus::Unauthenticated);
    assert!(session.user.is_none());
    assert!(session.error.is_none());
    assert!(store.is_empty());

    // The next sign-in is unaffected by the cancelled one.
    manager.sign_in("ana@juzgado.example", "secreto").await.unwrap();
    assert!(manager.snapshot().is_authenticated());
    assert_eq!(store.token_pair(), Some(TokenPair::new("AT1", "RT1")));
}

#[tokio::test]
async fn sign_in_over_corrupt_credentials_file_persists_tokens() {
    let server = MockServer::start().await;
    mount_login(&server, "juez", "AT1", "RT1").await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer AT1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "user": { "id": 1, "rol": "juez" } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let credentials = dir.path().join("credentials.json");
    std::fs::write(&credentials, "{broken").unwrap();

    let store = Arc::new(CredentialStore::new(Box::new(FileStorage::new(&credentials))));
    let first = manager(&server, store.clone());
    first.sign_in("ana@juzgado.example", "secreto").await.unwrap();
    assert_eq!(store.token_pair(), Some(TokenPair::new("AT1", "RT1")));

    let second = manager(
        &server,
        Arc::new(CredentialStore::new(Box::new(FileStorage::new(&credentials)))),
    );
    assert_eq!(second.bootstrap().await.status, SessionStatus::Authenticated);
}

#[test]
fn mirrored_store_keeps_full_secondary_pair_over_partial_primary() {
    let dir = tempdir().unwrap();
    let primary = dir.path().join("credentials.json");
    let secondary = dir.path().join("credentials.mirror.json");
    FileStorage::new(&primary).set("auth_token", "AT-stale").unwrap();
    FileStorage::new(&secondary)
        .set_many(&[("auth_token", "AT1"), ("auth_refresh_token", "RT1")])
        .unwrap();

    let store = CredentialStore::new(Box::new(MirroredStorage::new(
        Box::new(FileStorage::new(&primary)),
        Box::new(FileStorage::new(&secondary)),
    )));

    assert_eq!(store.token_pair(), Some(TokenPair::new("AT1", "RT1")));
    assert_eq!(
        FileStorage::new(&secondary).get("auth_refresh_token").unwrap(),
        Some("RT1".to_string())
    );
}
