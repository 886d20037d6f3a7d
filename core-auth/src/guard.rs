//! Route access decisions derived from the session state.

use bridge_traits::navigation::NavigationTarget;

/// Who may enter a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    /// Only signed-in users (library, reader, settings).
    RequiresAuth,
    /// Only signed-out users (login, registration).
    GuestOnly,
    /// Everyone.
    Public,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Proceed,
    Redirect(NavigationTarget),
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardDecision::Proceed)
    }
}

pub fn authorize(access: RouteAccess, is_authenticated: bool) -> GuardDecision {
    match (access, is_authenticated) {
        (RouteAccess::RequiresAuth, false) => {
            GuardDecision::Redirect(NavigationTarget::Unauthenticated)
        }
        (RouteAccess::GuestOnly, true) => GuardDecision::Redirect(NavigationTarget::Main),
        _ => GuardDecision::Proceed,
    }
}
