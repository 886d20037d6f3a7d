//! End-to-end session flows through the bootstrapped core.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::navigation::{NavigationTarget, Navigator};
use bridge_traits::storage::SecureStore;
use core_auth::{AuthError, TokenPair};
use core_runtime::events::{AuthEvent, CoreEvent, SessionEndReason};
use core_service::{CoreConfig, CoreService, RouteAccess};
use mockall::mock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const API: &str = "http://localhost:8000/api/";
const LOGIN: &str = "http://localhost:8000/api/auth/login/";
const REFRESH: &str = "http://localhost:8000/api/auth/token/refresh/";
const BOOKS: &str = "http://localhost:8000/api/books/";

#[derive(Default)]
struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl SecureStore for MemoryStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn delete_secret(&self, key: &str) -> BridgeResult<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> BridgeResult<Vec<String>> {
        Ok(self.entries.lock().unwrap().keys().cloned().collect())
    }

    async fn clear_all(&self) -> BridgeResult<()> {
        self.entries.lock().unwrap().clear();
        Ok(())
    }
}

#[derive(Default)]
struct RecordingNavigator {
    targets: Mutex<Vec<NavigationTarget>>,
}

impl RecordingNavigator {
    fn targets(&self) -> Vec<NavigationTarget> {
        self.targets.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, target: NavigationTarget) -> BridgeResult<()> {
        self.targets.lock().unwrap().push(target);
        Ok(())
    }
}

/// Backend whose access tokens can be expired from the test.
struct FakeBackend {
    valid_access: Mutex<String>,
    refresh_accepted: Mutex<bool>,
    sent: Mutex<Vec<HttpRequest>>,
}

impl FakeBackend {
    fn new() -> Self {
        Self {
            valid_access: Mutex::new("a1".to_string()),
            refresh_accepted: Mutex::new(true),
            sent: Mutex::new(Vec::new()),
        }
    }

    fn expire_access(&self, next: &str) {
        *self.valid_access.lock().unwrap() = next.to_string();
    }

    fn reject_refresh(&self) {
        *self.refresh_accepted.lock().unwrap() = false;
    }

    fn calls_to(&self, url: &str) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.url == url)
            .count()
    }
}

fn json(status: u16, body: serde_json::Value) -> HttpResponse {
    HttpResponse::new(status, serde_json::to_vec(&body).unwrap())
}

#[async_trait]
impl HttpClient for FakeBackend {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.sent.lock().unwrap().push(request.clone());

        let response = match request.url.as_str() {
            LOGIN => json(
                200,
                serde_json::json!({
                    "access": "a1",
                    "refresh": "r1",
                    "user": {"id": 1, "email": "reader@example.com"}
                }),
            ),
            REFRESH => {
                if *self.refresh_accepted.lock().unwrap() {
                    let access = self.valid_access.lock().unwrap().clone();
                    json(200, serde_json::json!({"access": access}))
                } else {
                    json(401, serde_json::json!({"detail": "Token is blacklisted"}))
                }
            }
            _ => {
                let valid = self.valid_access.lock().unwrap().clone();
                if request.bearer() == Some(valid.as_str()) {
                    HttpResponse::new(200, "P")
                } else {
                    json(401, serde_json::json!({"detail": "Given token not valid"}))
                }
            }
        };
        Ok(response)
    }
}

struct Fixture {
    core: CoreService,
    backend: Arc<FakeBackend>,
    store: Arc<MemoryStore>,
    navigator: Arc<RecordingNavigator>,
}

async fn bootstrap_with(
    backend: Arc<FakeBackend>,
    store: Arc<MemoryStore>,
    navigator: Arc<RecordingNavigator>,
) -> Fixture {
    let config = CoreConfig::builder()
        .api_base_url(API)
        .http_client(backend.clone())
        .secure_store(store.clone())
        .navigator(navigator.clone())
        .build()
        .expect("valid config");

    let core = CoreService::bootstrap(config).await.expect("bootstrap");

    Fixture {
        core,
        backend,
        store,
        navigator,
    }
}

async fn fixture() -> Fixture {
    bootstrap_with(
        Arc::new(FakeBackend::new()),
        Arc::new(MemoryStore::default()),
        Arc::new(RecordingNavigator::default()),
    )
    .await
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_expired_access_token_is_refreshed_transparently() {
    let f = fixture().await;
    f.core
        .session()
        .login("reader@example.com", "hunter2")
        .await
        .unwrap();
    assert_eq!(f.navigator.targets(), vec![NavigationTarget::Main]);

    f.backend.expire_access("a2");
    let response = f
        .core
        .transport()
        .execute(HttpRequest::get("books/"))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body.as_ref(), b"P");
    assert_eq!(f.backend.calls_to(REFRESH), 1);
    assert_eq!(f.backend.calls_to(BOOKS), 2);
    assert_eq!(
        f.core.transport().store().snapshot(),
        Some(TokenPair::new("a2", "r1"))
    );
    assert!(f.core.session().is_authenticated());
    assert_eq!(f.navigator.targets(), vec![NavigationTarget::Main]);
}

#[tokio::test]
async fn test_rejected_refresh_routes_to_sign_in_once() {
    let f = fixture().await;
    let mut events = f.core.events().filter(|event| event.is_session_ended());
    f.core
        .session()
        .login("reader@example.com", "hunter2")
        .await
        .unwrap();

    f.backend.expire_access("a2");
    f.backend.reject_refresh();

    let first = f.core.transport().execute(HttpRequest::get("books/")).await;
    let second = f.core.transport().execute(HttpRequest::get("books/")).await;

    match first {
        Err(AuthError::RefreshFailed { status, message }) => {
            assert_eq!(status, Some(401));
            assert_eq!(message, "Token is blacklisted");
        }
        other => panic!("expected RefreshFailed, got {:?}", other),
    }
    // Nothing left to refresh with
    assert!(matches!(second, Err(AuthError::AuthRequired { .. })));
    assert_eq!(f.backend.calls_to(REFRESH), 1);

    let ended = events.recv().await.unwrap();
    assert_eq!(
        ended,
        CoreEvent::Auth(AuthEvent::SessionEnded {
            reason: SessionEndReason::RefreshRejected
        })
    );

    let navigator = f.navigator.clone();
    wait_for(move || navigator.targets().len() == 2).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(
        f.navigator.targets(),
        vec![NavigationTarget::Main, NavigationTarget::Unauthenticated]
    );
    assert!(!f.core.session().is_authenticated());
    assert!(!f.core.session().guard(RouteAccess::RequiresAuth).is_allowed());
}

#[tokio::test]
async fn test_session_survives_restart() {
    let f = fixture().await;
    f.core
        .session()
        .login("reader@example.com", "hunter2")
        .await
        .unwrap();

    let restarted = bootstrap_with(
        f.backend.clone(),
        f.store.clone(),
        Arc::new(RecordingNavigator::default()),
    )
    .await;

    assert!(restarted.core.session().is_authenticated());
    assert!(restarted.core.session().check_session());

    restarted.core.session().logout().await.unwrap();
    assert!(f.store.entries.lock().unwrap().is_empty());
    assert_eq!(
        restarted.navigator.targets(),
        vec![NavigationTarget::Unauthenticated]
    );
}

mock! {
    pub Http {}

    #[async_trait]
    impl HttpClient for Http {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        async fn execute_with_retry(
            &self,
            request: HttpRequest,
            policy: RetryPolicy,
        ) -> BridgeResult<HttpResponse>;
    }
}

#[tokio::test]
async fn test_bootstrap_and_session_check_do_no_network_io() {
    let mut http = MockHttp::new();
    http.expect_execute().times(0);
    http.expect_execute_with_retry().times(0);

    let config = CoreConfig::builder()
        .api_base_url(API)
        .http_client(Arc::new(http))
        .secure_store(Arc::new(MemoryStore::default()))
        .navigator(Arc::new(RecordingNavigator::default()))
        .build()
        .unwrap();

    let core = CoreService::bootstrap(config).await.unwrap();

    assert!(!core.session().check_session());
    assert!(!core.session().check_session());
    assert_eq!(core.config().origin(), "http://localhost:8000");
}

#[tokio::test]
async fn test_unauthenticated_401_requires_sign_in() {
    let mut http = MockHttp::new();
    http.expect_execute()
        .times(1)
        .returning(|_| Ok(HttpResponse::new(401, "")));

    let navigator = Arc::new(RecordingNavigator::default());
    let config = CoreConfig::builder()
        .api_base_url(API)
        .http_client(Arc::new(http))
        .secure_store(Arc::new(MemoryStore::default()))
        .navigator(navigator.clone())
        .build()
        .unwrap();
    let core = CoreService::bootstrap(config).await.unwrap();

    let result = core.transport().execute(HttpRequest::get("books/")).await;

    let err = core_service::CoreError::from(result.unwrap_err());
    assert!(err.requires_sign_in());
    // Already signed out, so no navigation
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(navigator.targets().is_empty());
}
