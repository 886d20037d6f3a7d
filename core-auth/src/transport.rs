//! # Authenticated Transport
//!
//! Wraps the host [`HttpClient`] so that every call to a protected endpoint
//! carries the stored access token, and recovers from an expired token by
//! running the refresh exchange and replaying the request once.
//!
//! ## Failure protocol
//!
//! 1. Any response other than `401` is handed back unchanged.
//! 2. A `401` on an already replayed request, or on the refresh endpoint
//!    itself, is terminal ([`AuthError::TerminalAuthFailure`]).
//! 3. A `401` without a stored refresh token clears the session
//!    ([`AuthError::AuthRequired`]).
//! 4. Otherwise the request is marked as replayed, a new access token is
//!    obtained through the raw client and the request is sent again.
//!    If the refresh fails the session is cleared and
//!    [`AuthError::RefreshFailed`] is returned.
//!
//! Steps 3 and 4 publish [`AuthEvent::SessionEnded`] when they tear the
//! session down. The session controller listens for it and routes the user.
//!
//! ## Refresh sharing
//!
//! Only one refresh exchange runs at a time. Requests that hit `401` while it
//! is running wait on the same shared future. The exchange runs on its own
//! task and finishes even if every waiter goes away.

use crate::error::{AuthError, Result};
use crate::token_store::CredentialStore;
use crate::types::{RefreshRequest, RefreshResponse};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use core_runtime::config::{AuthEndpoints, CoreConfig};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus, SessionEndReason};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Longest error body kept in [`AuthError::UnexpectedStatus`].
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Outcome of one refresh exchange, shared by every waiter.
#[derive(Debug, Clone)]
struct RefreshFailure {
    status: Option<u16>,
    message: String,
}

impl From<RefreshFailure> for AuthError {
    fn from(failure: RefreshFailure) -> Self {
        AuthError::RefreshFailed {
            status: failure.status,
            message: failure.message,
        }
    }
}

type RefreshOutcome = std::result::Result<String, RefreshFailure>;
type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Request plus the replay marker.
struct OutboundRequest {
    request: HttpRequest,
    url: Url,
    retried: bool,
}

struct TransportInner {
    raw: Arc<dyn HttpClient>,
    store: Arc<CredentialStore>,
    api_base_url: Url,
    endpoints: AuthEndpoints,
    refresh_url: Url,
    event_bus: EventBus,
    in_flight: Mutex<Option<SharedRefresh>>,
}

/// HTTP client for protected endpoints.
///
/// Cloning is cheap; clones share the credential store and the in-flight
/// refresh.
#[derive(Clone)]
pub struct AuthenticatedTransport {
    inner: Arc<TransportInner>,
}

impl AuthenticatedTransport {
    pub fn new(
        raw: Arc<dyn HttpClient>,
        store: Arc<CredentialStore>,
        api_base_url: Url,
        endpoints: AuthEndpoints,
        event_bus: EventBus,
    ) -> Result<Self> {
        let refresh_url = join(&api_base_url, &endpoints.token_refresh)?;

        Ok(Self {
            inner: Arc::new(TransportInner {
                raw,
                store,
                api_base_url,
                endpoints,
                refresh_url,
                event_bus,
                in_flight: Mutex::new(None),
            }),
        })
    }

    pub fn from_config(
        config: &CoreConfig,
        store: Arc<CredentialStore>,
        event_bus: EventBus,
    ) -> Result<Self> {
        Self::new(
            Arc::clone(&config.http_client),
            store,
            config.api_base_url.clone(),
            config.endpoints.clone(),
            event_bus,
        )
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.inner.store
    }

    pub fn endpoints(&self) -> &AuthEndpoints {
        &self.inner.endpoints
    }

    pub fn api_base_url(&self) -> &Url {
        &self.inner.api_base_url
    }

    /// Resolve a path (or absolute URL) against the API base URL.
    pub fn resolve(&self, path: &str) -> Result<Url> {
        match Url::parse(path) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => join(&self.inner.api_base_url, path),
            Err(e) => Err(AuthError::InvalidRequest(format!(
                "Invalid request URL '{}': {}",
                path, e
            ))),
        }
    }

    /// Whether `url` targets the refresh endpoint. Query and fragment are ignored.
    pub fn is_refresh_endpoint(&self, url: &Url) -> bool {
        let refresh = &self.inner.refresh_url;
        url.origin() == refresh.origin()
            && url.path().trim_end_matches('/') == refresh.path().trim_end_matches('/')
    }

    /// Send a request to a protected endpoint.
    ///
    /// Non-`401` responses, including other error statuses, come back as
    /// `Ok`. Network failures come back as [`AuthError::Transport`].
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let outbound = self.prepare(request)?;
        self.dispatch(outbound).await
    }

    /// Send through the raw client without a bearer and without refresh
    /// handling.
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    pub async fn execute_unauthenticated(&self, request: HttpRequest) -> Result<HttpResponse> {
        let outbound = self.prepare(request)?;
        Ok(self.inner.raw.execute(outbound.request).await?)
    }

    /// Attach the bearer if one is stored, but hand a `401` back untouched.
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    pub async fn execute_without_refresh(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut outbound = self.prepare(request)?;
        if let Some(token) = self.inner.store.access_token() {
            outbound.request.set_bearer(token);
        }
        Ok(self.inner.raw.execute(outbound.request).await?)
    }

    /// GET `path` and decode a successful JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.resolve(path)?;
        let response = self.execute(HttpRequest::get(url.as_str())).await?;
        decode_json(path, response)
    }

    /// POST `body` as JSON to `path` and decode a successful JSON body.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let url = self.resolve(path)?;
        let request = HttpRequest::post(url.as_str()).json(body)?;
        let response = self.execute(request).await?;
        decode_json(path, response)
    }

    fn prepare(&self, mut request: HttpRequest) -> Result<OutboundRequest> {
        let url = self.resolve(&request.url)?;
        request.url = url.to_string();
        Ok(OutboundRequest {
            request,
            url,
            retried: false,
        })
    }

    async fn dispatch(&self, mut outbound: OutboundRequest) -> Result<HttpResponse> {
        let sent_with = self.inner.store.access_token();
        match &sent_with {
            Some(token) => outbound.request.set_bearer(token.as_str()),
            None => {
                debug!("No access token stored, sending without credentials");
            }
        }

        let response = self.inner.raw.execute(outbound.request.clone()).await?;
        if !response.is_unauthorized() {
            return Ok(response);
        }

        self.handle_unauthorized(outbound, sent_with, response.status)
            .await
    }

    async fn handle_unauthorized(
        &self,
        mut outbound: OutboundRequest,
        sent_with: Option<String>,
        status: u16,
    ) -> Result<HttpResponse> {
        if outbound.retried || self.is_refresh_endpoint(&outbound.url) {
            warn!(status, "Request rejected after replay or on refresh endpoint");
            return Err(terminal(&outbound, status));
        }

        let store = &self.inner.store;
        let current = store.access_token();

        if current.is_some() && current != sent_with {
            // Another caller already refreshed (or signed in) since this request left.
            debug!("Access token changed while request was in flight, replaying");
            outbound.retried = true;
            return self.replay(outbound, current).await;
        }

        if sent_with.is_some() && current.is_none() {
            debug!("Session already cleared while request was in flight");
            return Err(AuthError::AuthRequired {
                url: outbound.url.to_string(),
            });
        }

        let Some(refresh_token) = store.refresh_token() else {
            info!("Received 401 with no refresh token, ending session");
            if let Err(e) = store.clear().await {
                warn!(error = %e, "Failed to clear credentials");
            }
            self.inner
                .emit_session_ended(SessionEndReason::MissingRefreshToken);
            return Err(AuthError::AuthRequired {
                url: outbound.url.to_string(),
            });
        };

        outbound.retried = true;
        let access_token = self
            .refresh(refresh_token, sent_with.as_deref(), &outbound.url)
            .await?;
        self.replay(outbound, Some(access_token)).await
    }

    async fn replay(
        &self,
        mut outbound: OutboundRequest,
        access_token: Option<String>,
    ) -> Result<HttpResponse> {
        if let Some(token) = access_token {
            outbound.request.set_bearer(token);
        }

        let response = self.inner.raw.execute(outbound.request.clone()).await?;
        if response.is_unauthorized() {
            warn!(status = response.status, "Replayed request rejected");
            return Err(terminal(&outbound, response.status));
        }

        debug!(status = response.status, "Replayed request completed");
        Ok(response)
    }

    /// Join the running refresh or start one.
    async fn refresh(
        &self,
        refresh_token: String,
        sent_with: Option<&str>,
        url: &Url,
    ) -> Result<String> {
        let shared = {
            let mut slot = self.inner.in_flight.lock().await;
            match slot.as_ref() {
                Some(running) => {
                    debug!("Joining in-flight token refresh");
                    running.clone()
                }
                None => {
                    // A refresh may have finished between the 401 and taking the lock.
                    match self.inner.store.access_token() {
                        Some(current) if Some(current.as_str()) != sent_with => {
                            return Ok(current);
                        }
                        None if sent_with.is_some() => {
                            return Err(AuthError::AuthRequired {
                                url: url.to_string(),
                            });
                        }
                        _ => {}
                    }

                    let inner = Arc::clone(&self.inner);
                    let task = tokio::spawn(async move {
                        let outcome = inner.run_refresh(refresh_token).await;
                        *inner.in_flight.lock().await = None;
                        outcome
                    });

                    let future: BoxFuture<'static, RefreshOutcome> = async move {
                        task.await.unwrap_or_else(|e| {
                            Err(RefreshFailure {
                                status: None,
                                message: format!("refresh task aborted: {}", e),
                            })
                        })
                    }
                    .boxed();

                    let shared = future.shared();
                    *slot = Some(shared.clone());
                    shared
                }
            }
        };

        shared.await.map_err(AuthError::from)
    }
}

impl TransportInner {
    /// One refresh exchange. Runs on its own task.
    async fn run_refresh(&self, refresh_token: String) -> RefreshOutcome {
        info!("Refreshing access token");
        let _ = self
            .event_bus
            .emit(CoreEvent::Auth(AuthEvent::TokenRefreshing));

        match self.exchange(&refresh_token).await {
            Ok(refreshed) => {
                let rotated = refreshed.refresh.as_deref().is_some_and(|r| !r.is_empty());
                match self
                    .store
                    .update_access(refreshed.access.clone(), refreshed.refresh, &refresh_token)
                    .await
                {
                    Ok(true) => {
                        info!(rotated, "Access token refreshed");
                        let _ = self
                            .event_bus
                            .emit(CoreEvent::Auth(AuthEvent::TokenRefreshed { rotated }));
                        Ok(refreshed.access)
                    }
                    Ok(false) => {
                        info!("Session changed during refresh, discarding new token");
                        Err(RefreshFailure {
                            status: None,
                            message: "session changed during refresh".to_string(),
                        })
                    }
                    Err(e) => {
                        self.end_session(SessionEndReason::RefreshUnavailable).await;
                        Err(RefreshFailure {
                            status: None,
                            message: e.to_string(),
                        })
                    }
                }
            }
            Err((reason, failure)) => {
                warn!(status = ?failure.status, reason = %reason, "Token refresh failed");
                self.end_session(reason).await;
                Err(failure)
            }
        }
    }

    async fn exchange(
        &self,
        refresh_token: &str,
    ) -> std::result::Result<RefreshResponse, (SessionEndReason, RefreshFailure)> {
        let unavailable = |message: String| {
            (
                SessionEndReason::RefreshUnavailable,
                RefreshFailure {
                    status: None,
                    message,
                },
            )
        };

        let request = HttpRequest::post(self.refresh_url.as_str())
            .json(&RefreshRequest {
                refresh: refresh_token,
            })
            .map_err(|e| unavailable(e.to_string()))?;

        let response = self
            .raw
            .execute(request)
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        if !response.is_success() {
            return Err((
                SessionEndReason::RefreshRejected,
                RefreshFailure {
                    status: Some(response.status),
                    message: error_message(&response),
                },
            ));
        }

        let refreshed: RefreshResponse = serde_json::from_slice(&response.body)
            .map_err(|e| unavailable(format!("malformed refresh response: {}", e)))?;

        if refreshed.access.is_empty() {
            return Err(unavailable(
                "refresh response carried an empty access token".to_string(),
            ));
        }

        Ok(refreshed)
    }

    async fn end_session(&self, reason: SessionEndReason) {
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "Failed to clear credentials");
        }
        self.emit_session_ended(reason);
    }

    fn emit_session_ended(&self, reason: SessionEndReason) {
        let _ = self
            .event_bus
            .emit(CoreEvent::Auth(AuthEvent::SessionEnded { reason }));
    }
}

impl std::fmt::Debug for AuthenticatedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedTransport")
            .field("api_base_url", &self.inner.api_base_url.as_str())
            .field("refresh_url", &self.inner.refresh_url.as_str())
            .finish()
    }
}

fn join(base: &Url, path: &str) -> Result<Url> {
    base.join(path.trim_start_matches('/')).map_err(|e| {
        AuthError::InvalidRequest(format!("Invalid request path '{}': {}", path, e))
    })
}

fn terminal(outbound: &OutboundRequest, status: u16) -> AuthError {
    AuthError::TerminalAuthFailure {
        url: outbound.url.to_string(),
        status,
    }
}

fn truncated_body(response: &HttpResponse) -> String {
    String::from_utf8_lossy(&response.body)
        .chars()
        .take(MAX_ERROR_BODY_CHARS)
        .collect()
}

/// Human-readable reason from an error response. Prefers the `detail` field.
pub(crate) fn error_message(response: &HttpResponse) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(&response.body) {
        if let Some(detail) = value.get("detail").and_then(|d| d.as_str()) {
            return detail.to_string();
        }
    }

    let body = truncated_body(response);
    if body.trim().is_empty() {
        format!("HTTP {}", response.status)
    } else {
        body
    }
}

fn decode_json<T: DeserializeOwned>(path: &str, response: HttpResponse) -> Result<T> {
    if !response.is_success() {
        return Err(AuthError::UnexpectedStatus {
            status: response.status,
            body: truncated_body(&response),
        });
    }

    serde_json::from_slice(&response.body)
        .map_err(|e| AuthError::InvalidResponse(format!("{}: {}", path, e)))
}
