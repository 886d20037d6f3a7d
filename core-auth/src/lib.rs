//! # Authentication Module
//!
//! Access-token lifecycle for the Folio client core.
//!
//! ## Overview
//!
//! The backend issues a short-lived access token and a long-lived refresh
//! token at login. This crate keeps both in secure storage, attaches the
//! access token to every protected call, and trades the refresh token for a
//! new access token when the backend answers `401`. Callers never see an
//! expired token as long as the refresh token is still good.
//!
//! ## Components
//!
//! - [`CredentialStore`]: durable token pair, scoped to one API origin
//! - [`AuthenticatedTransport`]: bearer injection, refresh and single replay
//! - [`SessionController`]: login, logout and the derived session state
//! - [`guard`]: route access decisions
//!
//! Session teardown is signalled through
//! [`AuthEvent::SessionEnded`](core_runtime::events::AuthEvent::SessionEnded)
//! on the event bus; the controller turns it into navigation.

pub mod error;
pub mod guard;
pub mod session;
pub mod token_store;
pub mod transport;
pub mod types;

#[cfg(test)]
mod test_support;

pub use error::{AuthError, Result};
pub use guard::{authorize, GuardDecision, RouteAccess};
pub use session::SessionController;
pub use token_store::CredentialStore;
pub use transport::AuthenticatedTransport;
pub use types::{AuthState, SessionState, TokenKind, TokenPair, UserProfile};
