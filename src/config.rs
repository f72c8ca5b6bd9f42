//! Configuration.
//!
//! The configuration is read from a YAML document. Every value has a
//! default, so an empty document is a valid configuration: an in-memory
//! store answering on port 5333 without local or recursive resolution.
//!
//! ```yaml
//! dns:
//!   listen: 0.0.0.0:5333
//!   requestLog: true
//!   local:
//!     enabled: true
//!     domains: [lan]
//!   recursion:
//!     enabled: true
//!     upstreams: [1.1.1.1, "9.9.9.9:53"]
//!     denyRecursion: [local]
//! backend:
//!   adapter: file
//!   path: /var/lib/nsengine/db.json
//! ```

use std::fmt;
use std::fs;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::Deserialize;

//------------ Config --------------------------------------------------------

/// The complete configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dns: DnsConfig,
    pub backend: BackendConfig,
}

impl Config {
    /// Parses a configuration from a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let res: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        res.dns.recursion.upstream_addrs()?;
        Ok(res)
    }

    /// Reads a configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_yaml(&fs::read_to_string(path)?)
    }
}

//------------ DnsConfig -----------------------------------------------------

/// Configuration of query handling.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DnsConfig {
    /// The address to listen on for queries.
    pub listen: SocketAddr,

    /// Whether to answer queries over UDP.
    pub udp: bool,

    /// Whether to answer queries over TCP.
    pub tcp: bool,

    /// Whether to log a line for every query answered.
    pub request_log: bool,

    pub local: LocalConfig,

    pub recursion: RecursionConfig,
}

impl Default for DnsConfig {
    fn default() -> Self {
        DnsConfig {
            listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 5333),
            udp: true,
            tcp: true,
            request_log: false,
            local: Default::default(),
            recursion: Default::default(),
        }
    }
}

//------------ LocalConfig ---------------------------------------------------

/// Configuration of resolution through the host’s resolver.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    pub enabled: bool,

    /// Domains whose names are resolved by the host.
    pub domains: Vec<String>,
}

//------------ RecursionConfig -----------------------------------------------

/// Configuration of forwarding to upstream resolvers.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecursionConfig {
    pub enabled: bool,

    /// The upstream servers as `addr` or `addr:port`.
    pub upstreams: Vec<String>,

    /// Top-level labels for which queries are never forwarded.
    pub deny_recursion: Vec<String>,
}

impl RecursionConfig {
    /// Returns the upstream servers as socket addresses.
    ///
    /// Entries without a port use port 53.
    pub fn upstream_addrs(&self) -> Result<Vec<SocketAddr>, ConfigError> {
        self.upstreams
            .iter()
            .map(|upstream| {
                if let Ok(addr) = upstream.parse::<SocketAddr>() {
                    return Ok(addr);
                }
                upstream
                    .parse::<IpAddr>()
                    .map(|addr| SocketAddr::new(addr, 53))
                    .map_err(|_| ConfigError::InvalidUpstream(upstream.clone()))
            })
            .collect()
    }
}

impl Default for RecursionConfig {
    fn default() -> Self {
        RecursionConfig {
            enabled: false,
            upstreams: vec!["1.1.1.1".into(), "1.0.0.1".into()],
            deny_recursion: Vec::new(),
        }
    }
}

//------------ BackendConfig -------------------------------------------------

/// Selection and parameters of the record store adapter.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(tag = "adapter", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Keep everything in memory.
    #[default]
    Memory,

    /// Persist to a JSON document that is re-read periodically.
    File {
        path: PathBuf,

        /// The re-read interval in milliseconds.
        #[serde(rename = "pollInterval", default = "default_poll_interval")]
        poll_interval: u64,
    },

    /// Mirror a Consul key-value tree.
    Consul {
        #[serde(default = "default_consul_endpoint")]
        endpoint: String,

        #[serde(default = "default_consul_root")]
        root: String,
    },
}

fn default_poll_interval() -> u64 {
    500
}

fn default_consul_endpoint() -> String {
    "http://127.0.0.1:8500".into()
}

fn default_consul_root() -> String {
    "nsengine".into()
}

//============ Error Types ===================================================

//------------ ConfigError ---------------------------------------------------

/// The configuration could not be loaded.
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read.
    Io(io::Error),

    /// The document is not valid.
    Yaml(serde_yaml::Error),

    /// An upstream server is not an address.
    InvalidUpstream(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "cannot read config: {err}"),
            ConfigError::Yaml(err) => write!(f, "invalid config: {err}"),
            ConfigError::InvalidUpstream(upstream) => {
                write!(f, "invalid upstream server '{upstream}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(err) => Some(err),
            ConfigError::Yaml(err) => Some(err),
            ConfigError::InvalidUpstream(_) => None,
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Yaml(err)
    }
}

//============ Testing =======================================================
