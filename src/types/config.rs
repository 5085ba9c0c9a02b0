use std::time::Duration;

use crate::protocol::dacp::{DACP_DEFAULT_PORT, DEFAULT_ITEM_META};

/// Configuration for a remote session
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Server host name or address (default: "localhost")
    pub host: String,

    /// Server DACP port (default: 3689)
    pub port: u16,

    /// Read timeout for every request except the status long poll (default: 10 seconds)
    pub request_timeout: Duration,

    /// Connect timeout for every request except the status long poll (default: 5 seconds)
    pub connect_timeout: Duration,

    /// Number of login attempts after the poll loop fails (default: 3)
    pub reconnect_attempts: u32,

    /// Delay between reconnection attempts (default: 1 second)
    pub reconnect_delay: Duration,

    /// Port for the pairing listener, 0 for an ephemeral port (default: 0)
    pub pairing_port: u16,

    /// How long to wait for the server to send its pairing request (default: 120 seconds)
    pub pairing_timeout: Duration,

    /// Name shown in the server's pairing prompt
    pub display_name: String,

    /// Metadata fields requested for item lookups and searches
    pub item_meta: Vec<String>,

    /// Edge length in pixels requested for now-playing artwork (default: 320)
    pub artwork_size: u32,

    /// Log every decoded status tree at debug level
    pub debug_protocol: bool,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DACP_DEFAULT_PORT,
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            reconnect_attempts: 3,
            reconnect_delay: Duration::from_secs(1),
            pairing_port: 0,
            pairing_timeout: Duration::from_secs(120),
            display_name: "DACP Remote".to_string(),
            item_meta: DEFAULT_ITEM_META.iter().map(|s| (*s).to_string()).collect(),
            artwork_size: 320,
            debug_protocol: false,
        }
    }
}

impl RemoteConfig {
    /// Create a new config builder
    #[must_use]
    pub fn builder() -> RemoteConfigBuilder {
        RemoteConfigBuilder::default()
    }

    /// Key under which this server's pairing is stored
    #[must_use]
    pub fn server_id(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Metadata field names as borrowed strings
    #[must_use]
    pub fn item_meta_fields(&self) -> Vec<&str> {
        self.item_meta.iter().map(String::as_str).collect()
    }
}

/// Builder for `RemoteConfig`
#[derive(Debug, Clone, Default)]
pub struct RemoteConfigBuilder {
    config: RemoteConfig,
}

impl RemoteConfigBuilder {
    /// Set server host
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set server port
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set request timeout
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set connect timeout
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set reconnection attempts and the delay between them
    #[must_use]
    pub fn reconnect(mut self, attempts: u32, delay: Duration) -> Self {
        self.config.reconnect_attempts = attempts;
        self.config.reconnect_delay = delay;
        self
    }

    /// Set pairing listener port
    #[must_use]
    pub fn pairing_port(mut self, port: u16) -> Self {
        self.config.pairing_port = port;
        self
    }

    /// Set pairing timeout
    #[must_use]
    pub fn pairing_timeout(mut self, timeout: Duration) -> Self {
        self.config.pairing_timeout = timeout;
        self
    }

    /// Set the advertised display name
    #[must_use]
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.config.display_name = name.into();
        self
    }

    /// Replace the metadata field list
    #[must_use]
    pub fn item_meta<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.item_meta = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set artwork edge length
    #[must_use]
    pub fn artwork_size(mut self, pixels: u32) -> Self {
        self.config.artwork_size = pixels;
        self
    }

    /// Enable debug protocol logging
    #[must_use]
    pub fn debug_protocol(mut self, enable: bool) -> Self {
        self.config.debug_protocol = enable;
        self
    }

    /// Build the config
    #[must_use]
    pub fn build(self) -> RemoteConfig {
        self.config
    }
}
