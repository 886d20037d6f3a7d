//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, secure
//! storage, navigation) into the shared Rust core. Desktop apps typically
//! enable the `desktop-shims` feature (which depends on `bridge-desktop`) so
//! that any bridge left out of the [`CoreConfig`] falls back to the desktop
//! default.
//!
//! ```no_run
//! use core_runtime::config::CoreConfig;
//! use core_service::CoreService;
//!
//! # async fn example() -> core_service::Result<()> {
//! let config = CoreConfig::builder()
//!     .api_base_url("https://api.folio.example/api/")
//!     .build()?;
//! let core = CoreService::bootstrap(config).await?;
//!
//! core.session().login("reader@example.com", "hunter2").await?;
//! let _books = core.transport().execute(bridge_traits::HttpRequest::get("books/")).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;

pub use error::{CoreError, Result};

pub use core_auth::{
    AuthError, AuthState, AuthenticatedTransport, CredentialStore, GuardDecision, RouteAccess,
    SessionController, SessionState, UserProfile,
};
pub use core_runtime::config::{AuthEndpoints, CoreConfig, CoreConfigBuilder};
pub use core_runtime::events::{CoreEvent, EventBus, EventStream};

#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
pub use bridge_desktop::{ReqwestHttpClient, WatchNavigator};

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

struct ServiceInner {
    config: CoreConfig,
    event_bus: EventBus,
    transport: AuthenticatedTransport,
    session: Arc<SessionController>,
    listener: JoinHandle<()>,
}

impl Drop for ServiceInner {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    inner: Arc<ServiceInner>,
}

impl CoreService {
    /// Build the event bus, load stored credentials for the configured origin,
    /// and start the session listener.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn bootstrap(config: CoreConfig) -> Result<Self> {
        config.validate()?;

        let event_bus = EventBus::new(config.event_buffer_size);
        let store = Arc::new(
            CredentialStore::load(Arc::clone(&config.secure_store), config.origin()).await?,
        );
        let transport =
            AuthenticatedTransport::from_config(&config, Arc::clone(&store), event_bus.clone())?;
        let session = Arc::new(SessionController::new(
            transport.clone(),
            store,
            event_bus.clone(),
            Arc::clone(&config.navigator),
        ));
        let listener = session.spawn_session_listener();

        info!(
            api_base_url = %config.api_base_url,
            authenticated = session.is_authenticated(),
            "Core service ready"
        );

        Ok(Self {
            inner: Arc::new(ServiceInner {
                config,
                event_bus,
                transport,
                session,
                listener,
            }),
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.inner.config
    }

    pub fn session(&self) -> &Arc<SessionController> {
        &self.inner.session
    }

    /// Client for protected endpoints.
    pub fn transport(&self) -> &AuthenticatedTransport {
        &self.inner.transport
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.event_bus
    }

    /// New subscription to core events. Past events are not replayed.
    pub fn events(&self) -> EventStream {
        EventStream::new(self.inner.event_bus.subscribe())
    }
}

impl std::fmt::Debug for CoreService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreService")
            .field("config", &self.inner.config)
            .field("session", &self.inner.session.state())
            .finish()
    }
}
