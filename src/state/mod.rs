pub mod registry;

use crate::config::RelayConfig;
use tokio::sync::watch;

pub use registry::{Member, Outbound, Registry};

/// Shared application state
pub struct AppState {
    pub config: RelayConfig,
    pub registry: Registry,
    /// Externally reachable address, written only by the tunnel provisioner
    public_url: watch::Sender<Option<String>>,
}

impl AppState {
    pub fn new(config: RelayConfig) -> Self {
        let (public_url, _rx) = watch::channel(None);
        Self {
            config,
            registry: Registry::new(),
            public_url,
        }
    }

    pub fn public_url(&self) -> Option<String> {
        self.public_url.borrow().clone()
    }

    pub fn set_public_url(&self, url: String) {
        self.public_url.send_replace(Some(url));
    }

    pub fn subscribe_public_url(&self) -> watch::Receiver<Option<String>> {
        self.public_url.subscribe()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(RelayConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_public_url_starts_unset() {
        let state = AppState::default();
        assert!(state.public_url().is_none());
        assert!(state.registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_set_public_url_notifies_subscribers() {
        let state = AppState::default();
        let mut rx = state.subscribe_public_url();

        state.set_public_url("https://abc.ngrok.app".to_string());

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_deref(), Some("https://abc.ngrok.app"));
        assert_eq!(state.public_url().as_deref(), Some("https://abc.ngrok.app"));
    }
}
