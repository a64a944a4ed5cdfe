//! Trainer configuration.
//!
//! [`GymConfig`] is plain serde data so it can live in a JSON file next to a
//! training script:
//!
//! ```json
//! {
//!   "endpoint": { "type": "tcp", "addr": "127.0.0.1:5041" },
//!   "expected_peers": 2,
//!   "handshake_timeout_ms": 30000,
//!   "render_flag": true
//! }
//! ```
//!
//! Missing fields take the `DEFAULT_*` values below.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GymwireError, Result};
use crate::protocol::ProtocolOptions;
use crate::transport::{
    connect_pipe, connect_tcp, AnyAcceptor, BoxedStream, PipeListener, TcpAcceptor,
};

/// Default TCP address the trainer binds.
pub const DEFAULT_TCP_ADDR: &str = "127.0.0.1:5041";

/// Default number of environment peers.
pub const DEFAULT_EXPECTED_PEERS: usize = 1;

/// Where the trainer listens and peers connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Endpoint {
    /// TCP socket address, e.g. `127.0.0.1:5041`.
    Tcp { addr: String },
    /// Unix domain socket path or Windows named pipe name.
    Pipe { path: String },
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint::Tcp {
            addr: DEFAULT_TCP_ADDR.to_string(),
        }
    }
}

impl Endpoint {
    /// Bind the listening side.
    pub async fn bind(&self) -> Result<AnyAcceptor> {
        match self {
            Endpoint::Tcp { addr } => Ok(AnyAcceptor::Tcp(TcpAcceptor::bind(addr).await?)),
            Endpoint::Pipe { path } => Ok(AnyAcceptor::Pipe(PipeListener::bind(path).await?)),
        }
    }

    /// Connect as an environment peer.
    pub async fn connect(&self) -> Result<BoxedStream> {
        match self {
            Endpoint::Tcp { addr } => connect_tcp(addr).await,
            Endpoint::Pipe { path } => connect_pipe(path).await,
        }
    }
}

/// Configuration for a [`Trainer`](crate::Trainer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GymConfig {
    /// Where to listen for peers.
    pub endpoint: Endpoint,
    /// Number of peers to wait for before the session is usable.
    pub expected_peers: usize,
    /// Bound on the whole connect phase. `None` waits forever.
    pub handshake_timeout_ms: Option<u64>,
    /// Bound on each individual send/recv. `None` waits forever.
    pub io_timeout_ms: Option<u64>,
    /// Whether step requests carry the render flag.
    pub render_flag: bool,
}

impl Default for GymConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            expected_peers: DEFAULT_EXPECTED_PEERS,
            handshake_timeout_ms: None,
            io_timeout_ms: None,
            render_flag: false,
        }
    }
}

impl GymConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: GymConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.expected_peers == 0 {
            return Err(GymwireError::Config(
                "expected_peers must be at least 1".to_string(),
            ));
        }
        let empty = match &self.endpoint {
            Endpoint::Tcp { addr } => addr.is_empty(),
            Endpoint::Pipe { path } => path.is_empty(),
        };
        if empty {
            return Err(GymwireError::Config("endpoint address is empty".to_string()));
        }
        Ok(())
    }

    pub fn handshake_timeout(&self) -> Option<Duration> {
        self.handshake_timeout_ms.map(Duration::from_millis)
    }

    pub fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout_ms.map(Duration::from_millis)
    }

    pub fn protocol_options(&self) -> ProtocolOptions {
        ProtocolOptions {
            render_flag: self.render_flag,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GymConfig::default();
        assert_eq!(
            config.endpoint,
            Endpoint::Tcp {
                addr: DEFAULT_TCP_ADDR.to_string()
            }
        );
        assert_eq!(config.expected_peers, DEFAULT_EXPECTED_PEERS);
        assert_eq!(config.handshake_timeout(), None);
        assert_eq!(config.io_timeout(), None);
        assert!(!config.protocol_options().render_flag);
    }

    #[test]
    fn test_parse_full_document() {
        let config = GymConfig::from_json_str(
            r#"{
                "endpoint": { "type": "pipe", "path": "/tmp/gym.sock" },
                "expected_peers": 3,
                "handshake_timeout_ms": 1500,
                "io_timeout_ms": 250,
                "render_flag": true
            }"#,
        )
        .unwrap();

        assert_eq!(
            config.endpoint,
            Endpoint::Pipe {
                path: "/tmp/gym.sock".to_string()
            }
        );
        assert_eq!(config.expected_peers, 3);
        assert_eq!(config.handshake_timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(config.io_timeout(), Some(Duration::from_millis(250)));
        assert!(config.render_flag);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config = GymConfig::from_json_str(r#"{ "expected_peers": 2 }"#).unwrap();
        assert_eq!(config.expected_peers, 2);
        assert_eq!(config.endpoint, Endpoint::default());
    }

    #[test]
    fn test_zero_peers_rejected() {
        assert!(matches!(
            GymConfig::from_json_str(r#"{ "expected_peers": 0 }"#),
            Err(GymwireError::Config(_))
        ));
    }

    #[test]
    fn test_malformed_json_is_json_error() {
        assert!(matches!(
            GymConfig::from_json_str("{ not json"),
            Err(GymwireError::Json(_))
        ));
    }

    #[test]
    fn test_unknown_endpoint_type_rejected() {
        let err = GymConfig::from_json_str(r#"{ "endpoint": { "type": "udp", "addr": "x" } }"#);
        assert!(matches!(err, Err(GymwireError::Json(_))));
    }

    #[test]
    fn test_serialize_round_trip_keeps_tag() {
        let config = GymConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains(r#""type":"tcp""#));
        assert_eq!(GymConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_from_json_file_missing_is_io_error() {
        assert!(matches!(
            GymConfig::from_json_file("/nonexistent/gymwire.json"),
            Err(GymwireError::Io(_))
        ));
    }
}
