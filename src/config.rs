//! Runtime configuration loaded from environment variables.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

const DEFAULT_WS_PORT: u16 = 8888;
const DEFAULT_API_PORT: u16 = 3001;
const DEFAULT_NGROK_API_URL: &str = "http://127.0.0.1:4040";
const DEFAULT_TUNNEL_RETRY_SECS: u64 = 5;

/// How the externally reachable address is obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TunnelConfig {
    /// No public address; `/ngrok-url` keeps answering 503
    Disabled,
    /// A fixed address supplied by the operator
    Static { url: String },
    /// Ask a local ngrok agent for its tunnels, optionally starting it first
    NgrokAgent {
        api_url: String,
        spawn: bool,
        binary: String,
    },
}

/// Relay configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind_addr: IpAddr,
    pub ws_port: u16,
    pub api_port: u16,
    pub tunnel: TunnelConfig,
    pub tunnel_retry: Duration,
    /// Whether to redraw the console status board on changes
    pub status_console: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            ws_port: DEFAULT_WS_PORT,
            api_port: DEFAULT_API_PORT,
            tunnel: TunnelConfig::NgrokAgent {
                api_url: DEFAULT_NGROK_API_URL.to_string(),
                spawn: false,
                binary: "ngrok".to_string(),
            },
            tunnel_retry: Duration::from_secs(DEFAULT_TUNNEL_RETRY_SECS),
            status_console: true,
        }
    }
}

impl RelayConfig {
    /// Load config from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key).and_then(|v| {
                let trimmed = v.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
        };
        let flag = |key: &str, default: bool| {
            get(key)
                .map(|v| v != "0" && v.to_lowercase() != "false")
                .unwrap_or(default)
        };
        let defaults = Self::default();

        let bind_addr = match get("BIND_ADDR") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!("Invalid BIND_ADDR {:?}: {}, using default", raw, e);
                defaults.bind_addr
            }),
            None => defaults.bind_addr,
        };
        let ws_port = parse_or(get("WS_PORT"), "WS_PORT", defaults.ws_port);
        let api_port = parse_or(get("API_PORT"), "API_PORT", defaults.api_port);
        let retry_secs = parse_or(
            get("TUNNEL_RETRY_SECS"),
            "TUNNEL_RETRY_SECS",
            DEFAULT_TUNNEL_RETRY_SECS,
        );

        let tunnel = if flag("TUNNEL_DISABLED", false) {
            TunnelConfig::Disabled
        } else if let Some(url) = get("PUBLIC_URL") {
            TunnelConfig::Static { url }
        } else {
            TunnelConfig::NgrokAgent {
                api_url: get("NGROK_API_URL")
                    .map(|u| u.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| DEFAULT_NGROK_API_URL.to_string()),
                spawn: flag("NGROK_SPAWN", false),
                binary: get("NGROK_BIN").unwrap_or_else(|| "ngrok".to_string()),
            }
        };

        Self {
            bind_addr,
            ws_port,
            api_port,
            tunnel,
            tunnel_retry: Duration::from_secs(retry_secs.max(1)),
            status_console: flag("STATUS_CONSOLE", true),
        }
    }

    pub fn ws_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.ws_port)
    }

    pub fn api_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.api_port)
    }

    /// Address local clients use to reach the relay
    pub fn local_ws_url(&self) -> String {
        format!("ws://localhost:{}", self.ws_port)
    }

    pub fn local_api_url(&self) -> String {
        format!("http://localhost:{}", self.api_port)
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(v) => v.parse().unwrap_or_else(|e| {
            tracing::warn!("Invalid {} {:?}: {}, using default", key, v, e);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RelayConfig::from_lookup(|_| None);
        assert_eq!(config.ws_port, 8888);
        assert_eq!(config.api_port, 3001);
        assert_eq!(config.local_ws_url(), "ws://localhost:8888");
        assert!(config.status_console);
        assert_eq!(
            config.tunnel,
            TunnelConfig::NgrokAgent {
                api_url: "http://127.0.0.1:4040".to_string(),
                spawn: false,
                binary: "ngrok".to_string(),
            }
        );
    }

    #[test]
    fn test_public_url_wins_over_agent() {
        let config = RelayConfig::from_lookup(lookup(&[
            ("PUBLIC_URL", " https://relay.example.com "),
            ("NGROK_SPAWN", "1"),
        ]));
        assert_eq!(
            config.tunnel,
            TunnelConfig::Static {
                url: "https://relay.example.com".to_string()
            }
        );
    }

    #[test]
    fn test_tunnel_disabled() {
        let config = RelayConfig::from_lookup(lookup(&[
            ("TUNNEL_DISABLED", "true"),
            ("PUBLIC_URL", "https://relay.example.com"),
        ]));
        assert_eq!(config.tunnel, TunnelConfig::Disabled);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = RelayConfig::from_lookup(lookup(&[
            ("WS_PORT", "not-a-port"),
            ("API_PORT", ""),
            ("BIND_ADDR", "nowhere"),
            ("TUNNEL_RETRY_SECS", "0"),
            ("STATUS_CONSOLE", "0"),
        ]));
        assert_eq!(config.ws_port, 8888);
        assert_eq!(config.api_port, 3001);
        assert_eq!(config.bind_addr, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.tunnel_retry, Duration::from_secs(1));
        assert!(!config.status_console);
    }

    #[test]
    #[serial]
    fn test_from_env_reads_process_env() {
        std::env::set_var("WS_PORT", "9999");
        std::env::set_var("NGROK_API_URL", "http://localhost:4041/");
        let config = RelayConfig::from_env();
        std::env::remove_var("WS_PORT");
        std::env::remove_var("NGROK_API_URL");

        assert_eq!(config.ws_port, 9999);
        assert_eq!(config.ws_addr().port(), 9999);
        match config.tunnel {
            TunnelConfig::NgrokAgent { api_url, .. } => {
                assert_eq!(api_url, "http://localhost:4041")
            }
            other => panic!("Expected ngrok agent tunnel, got {:?}", other),
        }
    }
}
