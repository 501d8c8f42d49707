//! Public address provisioning.
//!
//! The relay itself only listens locally. An externally reachable address
//! comes from a provider (a fixed URL, or a local ngrok agent) and is
//! published to `AppState` once known. Failures are logged and retried; the
//! relay keeps running on its local address in the meantime.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};

use crate::config::TunnelConfig;
use crate::error::{RelayError, RelayResult};
use crate::state::AppState;

/// Source of the relay's externally reachable address
#[async_trait]
pub trait TunnelProvider: Send + Sync {
    /// Resolve the public URL (as reported by the provider, usually https)
    async fn public_url(&self) -> RelayResult<String>;

    fn name(&self) -> &str;
}

/// Operator-supplied address, returned as-is
pub struct StaticAddress {
    url: String,
}

impl StaticAddress {
    pub fn new(url: String) -> Self {
        Self { url }
    }
}

#[async_trait]
impl TunnelProvider for StaticAddress {
    async fn public_url(&self) -> RelayResult<String> {
        Ok(self.url.clone())
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Reads tunnels from a local ngrok agent's inspection API
pub struct NgrokAgent {
    api_url: String,
    local_port: u16,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TunnelList {
    tunnels: Vec<TunnelInfo>,
}

#[derive(Debug, Deserialize)]
struct TunnelInfo {
    public_url: String,
    #[serde(default)]
    proto: String,
    config: Option<TunnelTarget>,
}

#[derive(Debug, Deserialize)]
struct TunnelTarget {
    addr: String,
}

impl NgrokAgent {
    pub fn new(api_url: String, local_port: u16) -> RelayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| RelayError::Provisioning(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_url,
            local_port,
            client,
        })
    }
}

#[async_trait]
impl TunnelProvider for NgrokAgent {
    async fn public_url(&self) -> RelayResult<String> {
        let url = format!("{}/api/tunnels", self.api_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RelayError::Provisioning(format!("ngrok agent unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(RelayError::Provisioning(format!(
                "ngrok agent API returned status: {}",
                response.status()
            )));
        }

        let list: TunnelList = response
            .json()
            .await
            .map_err(|e| RelayError::Provisioning(format!("Invalid ngrok response: {}", e)))?;

        select_tunnel(&list.tunnels, self.local_port).ok_or_else(|| {
            RelayError::Provisioning(format!("No ngrok tunnel targets port {}", self.local_port))
        })
    }

    fn name(&self) -> &str {
        "ngrok"
    }
}

/// Pick the tunnel forwarding to `port`, preferring https over http
fn select_tunnel(tunnels: &[TunnelInfo], port: u16) -> Option<String> {
    let suffix = format!(":{}", port);
    let mut matching: Vec<&TunnelInfo> = tunnels
        .iter()
        .filter(|t| {
            t.config
                .as_ref()
                .is_some_and(|c| c.addr.ends_with(&suffix) || c.addr == port.to_string())
        })
        .collect();
    matching.sort_by_key(|t| t.proto != "https");
    matching.first().map(|t| t.public_url.clone())
}

/// Rewrite an http(s) URL to the matching websocket scheme
pub fn to_ws_scheme(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        url.to_string()
    }
}

/// Build the provider for a tunnel config. Returns None when disabled.
pub fn build_provider(
    config: &TunnelConfig,
    local_port: u16,
) -> RelayResult<Option<Arc<dyn TunnelProvider>>> {
    match config {
        TunnelConfig::Disabled => Ok(None),
        TunnelConfig::Static { url } => Ok(Some(Arc::new(StaticAddress::new(url.clone())))),
        TunnelConfig::NgrokAgent { api_url, .. } => {
            Ok(Some(Arc::new(NgrokAgent::new(api_url.clone(), local_port)?)))
        }
    }
}

/// Start `ngrok http <port>`. The agent is killed when the handle is dropped.
fn spawn_agent(binary: &str, port: u16) -> RelayResult<Child> {
    Command::new(binary)
        .args(["http", &port.to_string()])
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| RelayError::Provisioning(format!("Failed to start {}: {}", binary, e)))
}

/// Spawn a background task that resolves the public address, retrying until it succeeds
pub fn spawn_provisioner(state: Arc<AppState>) {
    let config = state.config.tunnel.clone();
    let port = state.config.ws_port;
    let retry = state.config.tunnel_retry;

    let provider = match build_provider(&config, port) {
        Ok(Some(p)) => p,
        Ok(None) => {
            tracing::info!("Public address provisioning disabled");
            return;
        }
        Err(e) => {
            tracing::error!("{}", e);
            return;
        }
    };

    tokio::spawn(async move {
        // Held for the life of the task so the agent stays up
        let agent = match &config {
            TunnelConfig::NgrokAgent {
                spawn: true,
                binary,
                ..
            } => match spawn_agent(binary, port) {
                Ok(child) => {
                    tracing::info!("Started ngrok agent for port {}", port);
                    Some(child)
                }
                Err(e) => {
                    tracing::error!("{}", e);
                    None
                }
            },
            _ => None,
        };

        loop {
            match provider.public_url().await {
                Ok(url) => {
                    tracing::info!(provider = provider.name(), "Public address: {}", url);
                    state.set_public_url(url);
                    break;
                }
                Err(e) => {
                    tracing::warn!(provider = provider.name(), "{}", e);
                    tokio::time::sleep(retry).await;
                }
            }
        }

        if agent.is_some() {
            std::future::pending::<()>().await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tunnel(public_url: &str, proto: &str, addr: &str) -> TunnelInfo {
        TunnelInfo {
            public_url: public_url.to_string(),
            proto: proto.to_string(),
            config: Some(TunnelTarget {
                addr: addr.to_string(),
            }),
        }
    }

    #[test]
    fn test_to_ws_scheme() {
        assert_eq!(to_ws_scheme("https://abc.ngrok.app"), "wss://abc.ngrok.app");
        assert_eq!(to_ws_scheme("http://abc.ngrok.app"), "ws://abc.ngrok.app");
        assert_eq!(to_ws_scheme("wss://already"), "wss://already");
    }

    #[test]
    fn test_select_tunnel_prefers_https_for_port() {
        let tunnels = vec![
            tunnel("http://a.ngrok.app", "http", "http://localhost:8888"),
            tunnel("https://other.ngrok.app", "https", "http://localhost:3001"),
            tunnel("https://a.ngrok.app", "https", "http://localhost:8888"),
        ];
        assert_eq!(
            select_tunnel(&tunnels, 8888).as_deref(),
            Some("https://a.ngrok.app")
        );
        assert_eq!(select_tunnel(&tunnels, 9999), None);
    }

    #[test]
    fn test_tunnel_list_parses_agent_response() {
        let body = r#"{"tunnels":[{"name":"command_line","public_url":"https://a.ngrok.app","proto":"https","config":{"addr":"http://localhost:8888","inspect":true}}],"uri":"/api/tunnels"}"#;
        let list: TunnelList = serde_json::from_str(body).unwrap();
        assert_eq!(
            select_tunnel(&list.tunnels, 8888).as_deref(),
            Some("https://a.ngrok.app")
        );
    }

    #[tokio::test]
    async fn test_static_provider() {
        let provider = build_provider(
            &TunnelConfig::Static {
                url: "https://relay.example.com".to_string(),
            },
            8888,
        )
        .unwrap()
        .unwrap();
        assert_eq!(provider.name(), "static");
        assert_eq!(
            provider.public_url().await.unwrap(),
            "https://relay.example.com"
        );
    }

    #[tokio::test]
    async fn test_disabled_provider() {
        assert!(build_provider(&TunnelConfig::Disabled, 8888)
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_unreachable_agent_is_provisioning_error() {
        let agent = NgrokAgent::new("http://127.0.0.1:9".to_string(), 8888).unwrap();
        let err = agent.public_url().await.unwrap_err();
        assert!(matches!(err, RelayError::Provisioning(_)));
    }

    #[tokio::test]
    async fn test_provisioner_publishes_static_address() {
        let mut config = crate::config::RelayConfig::default();
        config.tunnel = TunnelConfig::Static {
            url: "https://relay.example.com".to_string(),
        };
        let state = Arc::new(AppState::new(config));
        let mut rx = state.subscribe_public_url();

        spawn_provisioner(state.clone());

        rx.changed().await.unwrap();
        assert_eq!(state.public_url().as_deref(), Some("https://relay.example.com"));
    }
}
