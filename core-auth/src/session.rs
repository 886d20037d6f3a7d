//! # Session Controller
//!
//! Owns the derived authentication state and the user-facing login and logout
//! operations.
//!
//! The state is always derived from credential presence:
//! `Authenticated` exactly when the [`CredentialStore`] holds an access token.
//! Every operation updates the store first and the state second.
//!
//! ## Usage
//!
//! ```no_run
//! use core_auth::{AuthenticatedTransport, CredentialStore, SessionController};
//! use core_runtime::events::EventBus;
//! use std::sync::Arc;
//! # use bridge_traits::navigation::Navigator;
//! # async fn example(
//! #     transport: AuthenticatedTransport,
//! #     navigator: Arc<dyn Navigator>,
//! # ) -> core_auth::Result<()> {
//! let event_bus = EventBus::new(100);
//! let store = Arc::clone(transport.store());
//! let controller = Arc::new(SessionController::new(transport, store, event_bus, navigator));
//! let _listener = controller.spawn_session_listener();
//!
//! let profile = controller.login("reader@example.com", "hunter2").await?;
//! println!("signed in as {:?}", profile.display_name());
//! assert!(controller.is_authenticated());
//!
//! controller.logout().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::guard::{authorize, GuardDecision, RouteAccess};
use crate::token_store::CredentialStore;
use crate::transport::{error_message, AuthenticatedTransport};
use crate::types::{AuthState, LoginRequest, LoginResponse, SessionState, UserProfile};
use bridge_traits::http::HttpRequest;
use bridge_traits::navigation::{NavigationTarget, Navigator};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus, SessionEndReason, SessionEvent};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Login, logout and session-state owner.
pub struct SessionController {
    transport: AuthenticatedTransport,
    store: Arc<CredentialStore>,
    event_bus: EventBus,
    navigator: Arc<dyn Navigator>,
    session: RwLock<SessionState>,
}

impl SessionController {
    /// Create a controller whose initial state reflects what the store holds.
    pub fn new(
        transport: AuthenticatedTransport,
        store: Arc<CredentialStore>,
        event_bus: EventBus,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let state = AuthState::from_token_presence(store.has_access_token());
        debug!(state = %state, "Session controller created");

        Self {
            transport,
            store,
            event_bus,
            navigator,
            session: RwLock::new(SessionState { state, user: None }),
        }
    }

    fn read_session(&self) -> RwLockReadGuard<'_, SessionState> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_session(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.session
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> SessionState {
        self.read_session().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read_session().is_authenticated()
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.read_session().user.clone()
    }

    pub fn guard(&self, access: RouteAccess) -> GuardDecision {
        authorize(access, self.is_authenticated())
    }

    /// Sign in with the backend's credential endpoint.
    ///
    /// On any failure the local session is cleared and the state is
    /// `Unauthenticated`.
    #[instrument(skip(self, identifier, secret))]
    pub async fn login(&self, identifier: &str, secret: &str) -> Result<UserProfile> {
        info!("Signing in");
        self.emit(CoreEvent::Auth(AuthEvent::SigningIn));

        let outcome = match self.try_login(identifier, secret).await {
            Ok(_) if !self.store.has_access_token() => Err(AuthError::AuthRequired {
                url: self.transport.endpoints().login.clone(),
            }),
            outcome => outcome,
        };

        match outcome {
            Ok(profile) => {
                self.transition(SessionState {
                    state: AuthState::Authenticated,
                    user: Some(profile.clone()),
                });
                self.emit(CoreEvent::Auth(AuthEvent::SignedIn {
                    user_id: profile.id,
                    email: profile.email.clone(),
                }));
                self.navigate(NavigationTarget::Main);

                info!(user_id = ?profile.id, "Sign-in completed");
                Ok(profile)
            }
            Err(e) => {
                warn!(error = %e, "Sign-in failed");
                if let Err(clear_err) = self.store.clear().await {
                    warn!(error = %clear_err, "Failed to clear credentials after sign-in failure");
                }
                self.transition(SessionState::default());
                self.emit(CoreEvent::Auth(AuthEvent::AuthError {
                    message: e.to_string(),
                    recoverable: !matches!(e, AuthError::SecureStorageUnavailable(_)),
                }));
                Err(e)
            }
        }
    }

    async fn try_login(&self, identifier: &str, secret: &str) -> Result<UserProfile> {
        let identifier = identifier.trim();
        if identifier.is_empty() || secret.is_empty() {
            return Err(AuthError::InvalidCredentials(
                "identifier and secret are required".to_string(),
            ));
        }

        let url = self.transport.resolve(&self.transport.endpoints().login)?;
        let request = HttpRequest::post(url.as_str()).json(&LoginRequest {
            email: identifier,
            password: secret,
        })?;

        let response = self.transport.execute_unauthenticated(request).await?;
        if !response.is_success() {
            return Err(AuthError::LoginFailed {
                status: Some(response.status),
                message: error_message(&response),
            });
        }

        let login: LoginResponse = serde_json::from_slice(&response.body)
            .map_err(|e| AuthError::InvalidResponse(format!("login response: {}", e)))?;

        if login.access.is_empty() || login.refresh.is_empty() {
            return Err(AuthError::InvalidResponse(
                "login response carried an empty token".to_string(),
            ));
        }

        self.store.set(login.access, login.refresh).await?;

        match login.user {
            Some(profile) => Ok(profile),
            None => Ok(self.fetch_profile_or(identifier).await),
        }
    }

    /// User details right after sign-in. Never refreshes, so a rejected call
    /// cannot tear down the session that was just stored.
    async fn fetch_profile_or(&self, identifier: &str) -> UserProfile {
        let fallback = || UserProfile::from_identifier(identifier);

        let url = match self.transport.resolve(&self.transport.endpoints().current_user) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Invalid user endpoint, using sign-in identifier");
                return fallback();
            }
        };

        match self
            .transport
            .execute_without_refresh(HttpRequest::get(url.as_str()))
            .await
        {
            Ok(response) if response.is_success() => {
                serde_json::from_slice(&response.body).unwrap_or_else(|e| {
                    warn!(error = %e, "Malformed user details, using sign-in identifier");
                    fallback()
                })
            }
            Ok(response) => {
                warn!(status = response.status, "Could not load user details, using sign-in identifier");
                fallback()
            }
            Err(e) => {
                warn!(error = %e, "Could not load user details, using sign-in identifier");
                fallback()
            }
        }
    }

    /// Sign out. The backend call is best effort; the local session is always
    /// cleared.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        info!("Signing out");

        if self.store.has_access_token() {
            self.notify_backend_logout().await;
        }

        let cleared = self.store.clear().await;
        if let Err(e) = &cleared {
            warn!(error = %e, "Failed to delete stored credentials");
        }

        self.transition(SessionState::default());
        self.emit(CoreEvent::Auth(AuthEvent::SignedOut));
        self.navigate(NavigationTarget::Unauthenticated);

        info!("Sign-out completed");
        cleared
    }

    async fn notify_backend_logout(&self) {
        let url = match self.transport.resolve(&self.transport.endpoints().logout) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Invalid logout endpoint, skipping backend call");
                return;
            }
        };

        match self
            .transport
            .execute_without_refresh(HttpRequest::post(url.as_str()))
            .await
        {
            Ok(response) if response.is_success() => debug!("Backend session closed"),
            Ok(response) => {
                warn!(status = response.status, "Backend logout returned an error status")
            }
            Err(e) => warn!(error = %e, "Backend logout failed"),
        }
    }

    /// Re-derive the state from the store. No network call.
    pub fn check_session(&self) -> bool {
        let authenticated = self.store.has_access_token();
        let current = self.state();

        if current.is_authenticated() != authenticated {
            debug!(authenticated, "Session state out of date, updating");
            self.transition(SessionState {
                state: AuthState::from_token_presence(authenticated),
                user: if authenticated { current.user } else { None },
            });
        }

        authenticated
    }

    /// React to the transport giving up on the session.
    ///
    /// Navigates only on the `Authenticated` to `Unauthenticated` transition,
    /// so repeated signals for the same failure route the user once. Returns
    /// whether navigation was requested.
    pub fn handle_session_ended(&self, reason: SessionEndReason) -> bool {
        let was_authenticated = self.transition(SessionState::default());

        if was_authenticated {
            info!(reason = %reason, "Session ended, routing to sign-in");
            self.navigate(NavigationTarget::Unauthenticated);
        } else {
            debug!(reason = %reason, "Session already ended");
        }

        was_authenticated
    }

    /// Reload the current user's details through the authenticated transport.
    #[instrument(skip(self))]
    pub async fn refresh_profile(&self) -> Result<UserProfile> {
        let path = self.transport.endpoints().current_user.clone();
        let profile: UserProfile = self.transport.get_json(&path).await?;

        let mut session = self.write_session();
        if session.is_authenticated() {
            session.user = Some(profile.clone());
        }

        Ok(profile)
    }

    /// Route every `SessionEnded` event on the bus to
    /// [`handle_session_ended`](Self::handle_session_ended).
    ///
    /// The task holds only a weak reference and stops once the controller is
    /// dropped or the bus closes.
    pub fn spawn_session_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let mut receiver = self.event_bus.subscribe();
        let weak = Arc::downgrade(self);

        tokio::spawn(async move {
            loop {
                let event = receiver.recv().await;
                let Some(controller) = weak.upgrade() else {
                    break;
                };

                match event {
                    Ok(CoreEvent::Auth(AuthEvent::SessionEnded { reason })) => {
                        controller.handle_session_ended(reason);
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Session listener fell behind");
                        if !controller.store.has_access_token() {
                            controller.handle_session_ended(SessionEndReason::RefreshUnavailable);
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Session listener stopped");
        })
    }

    /// Replace the session state. Returns whether the previous state was
    /// authenticated and the new one is not.
    fn transition(&self, next: SessionState) -> bool {
        let (was_authenticated, now_authenticated) = {
            let mut session = self.write_session();
            let was = session.is_authenticated();
            *session = next;
            (was, session.is_authenticated())
        };

        if was_authenticated != now_authenticated {
            self.emit(CoreEvent::Session(SessionEvent::StateChanged {
                authenticated: now_authenticated,
            }));
        }

        was_authenticated && !now_authenticated
    }

    fn navigate(&self, target: NavigationTarget) {
        self.emit(CoreEvent::Session(SessionEvent::NavigationRequested {
            route: target.route().to_string(),
        }));

        if let Err(e) = self.navigator.navigate(target) {
            warn!(target = %target, error = %e, "Navigation failed");
        }
    }

    fn emit(&self, event: CoreEvent) {
        let _ = self.event_bus.emit(event);
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("session", &*self.read_session())
            .field("transport", &self.transport)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{json_response, ScriptedHttpClient};
    use crate::token_store::tests::MockSecureStore;
    use crate::types::TokenPair;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::HttpResponse;
    use bridge_traits::BridgeError;
    use core_runtime::config::AuthEndpoints;
    use mockall::mock;
    use mockall::predicate::eq;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use url::Url;

    mock! {
        pub Nav {}

        impl Navigator for Nav {
            fn navigate(&self, target: NavigationTarget) -> BridgeResult<()>;
        }
    }

    const LOGIN: &str = "http://localhost:8000/api/auth/login/";
    const LOGOUT: &str = "http://localhost:8000/api/auth/logout/";
    const USER: &str = "http://localhost:8000/api/auth/user/";
    const REFRESH: &str = "http://localhost:8000/api/auth/token/refresh/";

    struct Harness {
        controller: Arc<SessionController>,
        client: Arc<ScriptedHttpClient>,
        secure: MockSecureStore,
        event_bus: EventBus,
    }

    async fn harness(
        client: ScriptedHttpClient,
        navigator: MockNav,
        tokens: Option<(&str, &str)>,
    ) -> Harness {
        let secure = MockSecureStore::new();
        let store = Arc::new(
            CredentialStore::load(Arc::new(secure.clone()), "http://localhost:8000")
                .await
                .unwrap(),
        );
        if let Some((access, refresh)) = tokens {
            store.set(access, refresh).await.unwrap();
        }

        let client = Arc::new(client);
        let event_bus = EventBus::new(64);
        let transport = AuthenticatedTransport::new(
            client.clone(),
            Arc::clone(&store),
            Url::parse("http://localhost:8000/api/").unwrap(),
            AuthEndpoints::default(),
            event_bus.clone(),
        )
        .unwrap();

        let controller = Arc::new(SessionController::new(
            transport,
            store,
            event_bus.clone(),
            Arc::new(navigator),
        ));

        Harness {
            controller,
            client,
            secure,
            event_bus,
        }
    }

    fn expect_navigation(navigator: &mut MockNav, target: NavigationTarget, times: usize) {
        navigator
            .expect_navigate()
            .with(eq(target))
            .times(times)
            .returning(|_| Ok(()));
    }

    fn login_ok() -> ScriptedHttpClient {
        ScriptedHttpClient::new(|request| match request.url.as_str() {
            LOGIN => Ok(json_response(
                200,
                serde_json::json!({
                    "access": "a1",
                    "refresh": "r1",
                    "user": {"pk": 7, "email": "reader@example.com", "first_name": "Ada"}
                }),
            )),
            _ => Ok(HttpResponse::new(204, "")),
        })
    }

    #[tokio::test]
    async fn test_initial_state_follows_store() {
        let signed_in = harness(login_ok(), MockNav::new(), Some(("a1", "r1"))).await;
        assert!(signed_in.controller.is_authenticated());

        let signed_out = harness(login_ok(), MockNav::new(), None).await;
        assert!(!signed_out.controller.is_authenticated());
        assert_eq!(signed_out.controller.state(), SessionState::default());
    }

    #[tokio::test]
    async fn test_login_success() {
        let mut navigator = MockNav::new();
        expect_navigation(&mut navigator, NavigationTarget::Main, 1);
        let h = harness(login_ok(), navigator, None).await;
        let mut events = h.event_bus.subscribe();

        let profile = h
            .controller
            .login("reader@example.com", "hunter2")
            .await
            .unwrap();

        assert_eq!(profile.id, Some(7));
        assert!(h.controller.is_authenticated());
        assert_eq!(h.controller.current_user(), Some(profile));
        assert_eq!(
            h.controller.transport.store().snapshot(),
            Some(TokenPair::new("a1", "r1"))
        );

        let sent = h.client.requests();
        assert_eq!(sent[0].url, LOGIN);
        assert_eq!(sent[0].bearer(), None);
        let body: serde_json::Value =
            serde_json::from_slice(sent[0].body.as_ref().unwrap()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"email": "reader@example.com", "password": "hunter2"})
        );

        let mut received = Vec::new();
        while let Ok(event) = events.try_recv() {
            received.push(event);
        }
        assert!(received.contains(&CoreEvent::Auth(AuthEvent::SignedIn {
            user_id: Some(7),
            email: Some("reader@example.com".to_string()),
        })));
        assert!(received.contains(&CoreEvent::Session(SessionEvent::StateChanged {
            authenticated: true
        })));
    }

    #[tokio::test]
    async fn test_login_fetches_profile_when_response_has_none() {
        let client = ScriptedHttpClient::new(|request| match request.url.as_str() {
            LOGIN => Ok(json_response(
                200,
                serde_json::json!({"access_token": "a1", "refresh_token": "r1"}),
            )),
            USER => {
                assert_eq!(request.bearer(), Some("a1"));
                Ok(json_response(200, serde_json::json!({"id": 3, "username": "ada"})))
            }
            _ => Ok(HttpResponse::new(404, "")),
        });
        let mut navigator = MockNav::new();
        expect_navigation(&mut navigator, NavigationTarget::Main, 1);
        let h = harness(client, navigator, None).await;

        let profile = h.controller.login("ada@example.com", "pw").await.unwrap();

        assert_eq!(profile.id, Some(3));
        assert_eq!(profile.username.as_deref(), Some("ada"));
    }

    #[tokio::test]
    async fn test_login_falls_back_to_identifier_profile() {
        let client = ScriptedHttpClient::new(|request| match request.url.as_str() {
            LOGIN => Ok(json_response(200, serde_json::json!({"access": "a1", "refresh": "r1"}))),
            _ => Ok(HttpResponse::new(500, "")),
        });
        let mut navigator = MockNav::new();
        expect_navigation(&mut navigator, NavigationTarget::Main, 1);
        let h = harness(client, navigator, None).await;

        let profile = h.controller.login("ada@example.com", "pw").await.unwrap();

        assert_eq!(profile, UserProfile::from_identifier("ada@example.com"));
        assert!(h.controller.is_authenticated());
    }

    #[tokio::test]
    async fn test_login_profile_401_keeps_new_session() {
        let client = ScriptedHttpClient::new(|request| match request.url.as_str() {
            LOGIN => Ok(json_response(200, serde_json::json!({"access": "a1", "refresh": "r1"}))),
            _ => Ok(HttpResponse::new(401, "")),
        });
        let mut navigator = MockNav::new();
        expect_navigation(&mut navigator, NavigationTarget::Main, 1);
        let h = harness(client, navigator, None).await;
        let mut events = h.event_bus.subscribe();

        let profile = h.controller.login("ada@example.com", "pw").await.unwrap();

        assert_eq!(profile, UserProfile::from_identifier("ada@example.com"));
        assert!(h.controller.is_authenticated());
        assert_eq!(
            h.controller.transport.store().snapshot(),
            Some(TokenPair::new("a1", "r1"))
        );
        assert_eq!(h.client.count_to(REFRESH), 0);

        while let Ok(event) = events.try_recv() {
            assert!(!event.is_session_ended());
        }
    }

    #[tokio::test]
    async fn test_authenticated_state_tracks_store_after_login() {
        let client = ScriptedHttpClient::new(|request| match request.url.as_str() {
            LOGIN => Ok(json_response(200, serde_json::json!({"access": "a1", "refresh": "r1"}))),
            _ => Ok(HttpResponse::new(401, "")),
        });
        let mut navigator = MockNav::new();
        expect_navigation(&mut navigator, NavigationTarget::Main, 1);
        let h = harness(client, navigator, None).await;

        let result = h.controller.login("ada@example.com", "pw").await;

        assert!(result.is_ok());
        assert_eq!(
            h.controller.is_authenticated(),
            h.controller.transport.store().has_access_token()
        );
    }

    #[tokio::test]
    async fn test_login_rejected_leaves_unauthenticated() {
        let client = ScriptedHttpClient::new(|_| {
            Ok(json_response(
                401,
                serde_json::json!({"detail": "No active account found with the given credentials"}),
            ))
        });
        // No navigation expected
        let h = harness(client, MockNav::new(), None).await;
        let mut events = h.event_bus.subscribe();

        let result = h.controller.login("reader@example.com", "wrong").await;

        match result {
            Err(AuthError::LoginFailed { status, message }) => {
                assert_eq!(status, Some(401));
                assert_eq!(message, "No active account found with the given credentials");
            }
            other => panic!("expected LoginFailed, got {:?}", other),
        }
        assert!(!h.controller.is_authenticated());
        assert!(!h.controller.transport.store().has_access_token());
        // A rejected login never goes through refresh
        assert_eq!(h.client.requests().len(), 1);

        let mut saw_error = false;
        while let Ok(event) = events.try_recv() {
            if let CoreEvent::Auth(AuthEvent::AuthError { recoverable, .. }) = event {
                assert!(recoverable);
                saw_error = true;
            }
        }
        assert!(saw_error);
    }

    #[tokio::test]
    async fn test_login_failure_clears_previous_session() {
        let client = ScriptedHttpClient::new(|_| Ok(HttpResponse::new(400, "")));
        let h = harness(client, MockNav::new(), Some(("a0", "r0"))).await;

        let result = h.controller.login("reader@example.com", "wrong").await;

        assert!(matches!(result, Err(AuthError::LoginFailed { status: Some(400), .. })));
        assert!(!h.controller.is_authenticated());
        assert_eq!(h.controller.transport.store().refresh_token(), None);
    }

    #[tokio::test]
    async fn test_login_malformed_response() {
        let client = ScriptedHttpClient::new(|_| Ok(HttpResponse::new(200, "<html>")));
        let h = harness(client, MockNav::new(), None).await;

        let result = h.controller.login("reader@example.com", "pw").await;

        assert!(matches!(result, Err(AuthError::InvalidResponse(_))));
        assert!(!h.controller.is_authenticated());
    }

    #[tokio::test]
    async fn test_login_network_failure() {
        let client = ScriptedHttpClient::new(|_| Err(BridgeError::Timeout(Duration::from_secs(30))));
        let h = harness(client, MockNav::new(), None).await;

        let result = h.controller.login("reader@example.com", "pw").await;

        assert!(matches!(result, Err(AuthError::Transport(BridgeError::Timeout(_)))));
        assert!(!h.controller.is_authenticated());
    }

    #[tokio::test]
    async fn test_login_requires_identifier_and_secret() {
        let h = harness(login_ok(), MockNav::new(), None).await;

        let result = h.controller.login("  ", "pw").await;

        assert!(matches!(result, Err(AuthError::InvalidCredentials(_))));
        assert!(h.client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_backend_fails() {
        let client = ScriptedHttpClient::new(|_| Err(BridgeError::Network("offline".to_string())));
        let mut navigator = MockNav::new();
        expect_navigation(&mut navigator, NavigationTarget::Unauthenticated, 1);
        let h = harness(client, navigator, Some(("a1", "r1"))).await;
        let mut events = h.event_bus.subscribe();

        h.controller.logout().await.unwrap();

        assert!(!h.controller.is_authenticated());
        assert!(!h.controller.transport.store().has_access_token());
        let sent = h.client.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].url, LOGOUT);
        assert_eq!(sent[0].bearer(), Some("a1"));

        let mut saw_signed_out = false;
        while let Ok(event) = events.try_recv() {
            saw_signed_out |= event == CoreEvent::Auth(AuthEvent::SignedOut);
        }
        assert!(saw_signed_out);
    }

    #[tokio::test]
    async fn test_logout_does_not_refresh_on_401() {
        let client = ScriptedHttpClient::new(|_| Ok(HttpResponse::new(401, "")));
        let mut navigator = MockNav::new();
        expect_navigation(&mut navigator, NavigationTarget::Unauthenticated, 1);
        let h = harness(client, navigator, Some(("a1", "r1"))).await;

        h.controller.logout().await.unwrap();

        assert_eq!(h.client.requests().len(), 1);
        assert!(!h.controller.is_authenticated());
    }

    #[tokio::test]
    async fn test_logout_reports_storage_failure_after_clearing_state() {
        let mut navigator = MockNav::new();
        expect_navigation(&mut navigator, NavigationTarget::Unauthenticated, 1);
        let h = harness(login_ok(), navigator, Some(("a1", "r1"))).await;
        h.secure.fail_deletes.store(true, Ordering::SeqCst);

        let result = h.controller.logout().await;

        assert!(matches!(result, Err(AuthError::SecureStorageUnavailable(_))));
        assert!(!h.controller.is_authenticated());
        assert!(!h.controller.transport.store().has_access_token());
    }

    #[tokio::test]
    async fn test_check_session_is_idempotent_and_offline() {
        let h = harness(login_ok(), MockNav::new(), Some(("a1", "r1"))).await;

        assert!(h.controller.check_session());
        assert!(h.controller.check_session());

        h.controller.transport.store().clear().await.unwrap();
        assert!(!h.controller.check_session());
        assert!(!h.controller.check_session());
        assert!(!h.controller.is_authenticated());
        assert!(h.client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_session_ended_navigates_once() {
        let mut navigator = MockNav::new();
        expect_navigation(&mut navigator, NavigationTarget::Unauthenticated, 1);
        let h = harness(login_ok(), navigator, Some(("a1", "r1"))).await;

        assert!(h.controller.handle_session_ended(SessionEndReason::RefreshRejected));
        assert!(!h.controller.handle_session_ended(SessionEndReason::RefreshRejected));
        assert!(!h.controller.is_authenticated());
    }

    #[tokio::test]
    async fn test_navigation_failure_does_not_roll_back() {
        let mut navigator = MockNav::new();
        navigator
            .expect_navigate()
            .returning(|_| Err(BridgeError::NotAvailable("no window".to_string())));
        let h = harness(login_ok(), navigator, Some(("a1", "r1"))).await;

        assert!(h.controller.handle_session_ended(SessionEndReason::MissingRefreshToken));
        assert!(!h.controller.is_authenticated());
    }

    #[tokio::test]
    async fn test_listener_routes_session_ended_events() {
        let mut navigator = MockNav::new();
        expect_navigation(&mut navigator, NavigationTarget::Unauthenticated, 1);
        let h = harness(login_ok(), navigator, Some(("a1", "r1"))).await;
        let listener = h.controller.spawn_session_listener();

        let mut navigations = h
            .event_bus
            .subscribe();
        for _ in 0..3 {
            h.event_bus
                .emit(CoreEvent::Auth(AuthEvent::SessionEnded {
                    reason: SessionEndReason::RefreshRejected,
                }))
                .unwrap();
        }

        let requested = tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if let Ok(CoreEvent::Session(SessionEvent::NavigationRequested { route })) =
                    navigations.recv().await
                {
                    return route;
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(requested, "/login");
        assert!(!h.controller.is_authenticated());

        drop(h.controller);
        h.event_bus
            .emit(CoreEvent::Auth(AuthEvent::SignedOut))
            .ok();
        tokio::time::timeout(Duration::from_secs(1), listener)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_refresh_profile_updates_user() {
        let client = ScriptedHttpClient::new(|request| match request.url.as_str() {
            USER => Ok(json_response(200, serde_json::json!({"id": 9, "email": "z@example.com"}))),
            _ => Ok(HttpResponse::new(404, "")),
        });
        let h = harness(client, MockNav::new(), Some(("a1", "r1"))).await;

        let profile = h.controller.refresh_profile().await.unwrap();

        assert_eq!(profile.id, Some(9));
        assert_eq!(h.controller.current_user(), Some(profile));
    }

    #[tokio::test]
    async fn test_guard_uses_current_state() {
        let mut navigator = MockNav::new();
        expect_navigation(&mut navigator, NavigationTarget::Unauthenticated, 1);
        let h = harness(login_ok(), navigator, Some(("a1", "r1"))).await;

        assert!(h.controller.guard(RouteAccess::RequiresAuth).is_allowed());
        assert_eq!(
            h.controller.guard(RouteAccess::GuestOnly),
            GuardDecision::Redirect(NavigationTarget::Main)
        );

        h.controller.logout().await.unwrap();

        assert_eq!(
            h.controller.guard(RouteAccess::RequiresAuth),
            GuardDecision::Redirect(NavigationTarget::Unauthenticated)
        );
    }
}
