//! Navigation bridge backed by a `tokio::sync::watch` channel.

use bridge_traits::{
    error::Result,
    navigation::{NavigationTarget, Navigator},
};
use tokio::sync::watch;
use tracing::debug;

/// Publishes the most recent navigation request so a desktop shell can
/// observe it with [`WatchNavigator::subscribe`].
///
/// Only the latest target is retained. A shell that lags behind sees the
/// current screen, not the history.
pub struct WatchNavigator {
    sender: watch::Sender<Option<NavigationTarget>>,
}

impl WatchNavigator {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self { sender }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<NavigationTarget>> {
        self.sender.subscribe()
    }

    pub fn current(&self) -> Option<NavigationTarget> {
        *self.sender.borrow()
    }
}

impl Default for WatchNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator for WatchNavigator {
    fn navigate(&self, target: NavigationTarget) -> Result<()> {
        debug!(route = target.route(), "Navigation requested");
        // send_replace keeps the value even with no live receivers
        self.sender.send_replace(Some(target));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigate_without_subscribers_keeps_latest() {
        let navigator = WatchNavigator::new();
        assert_eq!(navigator.current(), None);

        navigator.navigate(NavigationTarget::Main).unwrap();
        navigator
            .navigate(NavigationTarget::Unauthenticated)
            .unwrap();

        assert_eq!(navigator.current(), Some(NavigationTarget::Unauthenticated));
    }

    #[tokio::test]
    async fn test_subscriber_is_notified() {
        let navigator = WatchNavigator::new();
        let mut receiver = navigator.subscribe();

        navigator.navigate(NavigationTarget::Main).unwrap();

        receiver.changed().await.unwrap();
        assert_eq!(*receiver.borrow(), Some(NavigationTarget::Main));
    }
}
