//! Navigation Boundary
//!
//! The core never drives UI directly. When the session changes it asks the
//! host, through [`Navigator`], to show one of a small set of entry points.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Host UI entry points the core can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NavigationTarget {
    /// Login / unauthenticated entry point.
    Unauthenticated,
    /// Main view shown after a successful login.
    Main,
}

impl NavigationTarget {
    /// Route path used by the default web shell.
    pub fn route(&self) -> &'static str {
        match self {
            NavigationTarget::Unauthenticated => "/login",
            NavigationTarget::Main => "/",
        }
    }
}

impl std::fmt::Display for NavigationTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.route())
    }
}

/// Host navigation trait
///
/// Implementations must be cheap and non-blocking; they are invoked from async
/// tasks. A failing navigation is logged by the caller and never rolls back
/// session state.
#[cfg_attr(test, mockall::automock)]
pub trait Navigator: Send + Sync {
    fn navigate(&self, target: NavigationTarget) -> Result<()>;
}
