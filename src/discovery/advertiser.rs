//! Touch-remote service advertisement for pairing
//!
//! A server only sends its pairing request to remotes it can see on the
//! local network, so the remote announces `_touch-remote._tcp` for as long
//! as the pairing listener is open.

use std::collections::HashMap;

use mdns_sd::{Error as MdnsError, ServiceDaemon, ServiceInfo};

/// Service type a server browses for when the user pairs a remote
pub const TOUCH_REMOTE_SERVICE_TYPE: &str = "_touch-remote._tcp.local.";

/// Errors from service advertisement
#[derive(Debug, thiserror::Error)]
pub enum AdvertiserError {
    /// mDNS error
    #[error("mDNS error: {0}")]
    Mdns(#[from] MdnsError),

    /// Service not registered
    #[error("Service not registered")]
    NotRegistered,

    /// Service already registered
    #[error("Service already registered")]
    AlreadyRegistered,
}

/// What the advertisement tells the server about this remote
#[derive(Debug, Clone)]
pub struct TouchRemoteRecord {
    /// Name shown in the server's pairing prompt (`DvNm`)
    pub display_name: String,
    /// Random token identifying this pairing attempt (`Pair`)
    pub pair_token: u64,
    /// Port of the pairing listener
    pub port: u16,
}

impl TouchRemoteRecord {
    /// Instance name, the pairing token as 16 uppercase hex digits
    #[must_use]
    pub fn service_name(&self) -> String {
        format!("{:016X}", self.pair_token)
    }

    /// TXT record entries
    #[must_use]
    pub fn txt(&self) -> TxtRecordBuilder {
        let mut builder = TxtRecordBuilder::new();
        builder
            .add("DvNm", &self.display_name)
            .add("RemV", "10000")
            .add("DvTy", "iPod")
            .add("RemN", "Remote")
            .add("txtvers", "1")
            .add("Pair", &self.service_name());
        builder
    }
}

/// Build TXT record for service advertisement
#[derive(Debug, Clone, Default)]
pub struct TxtRecordBuilder {
    records: HashMap<String, String>,
}

impl TxtRecordBuilder {
    /// Create a new builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key-value pair
    pub fn add(&mut self, key: &str, value: &str) -> &mut Self {
        self.records.insert(key.to_string(), value.to_string());
        self
    }

    /// Value stored under `key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.records.get(key).map(String::as_str)
    }

    /// Build into `HashMap` for mdns-sd
    #[must_use]
    pub fn build_map(&self) -> HashMap<String, String> {
        self.records.clone()
    }
}

/// mDNS host name for this machine, falling back to a fixed name
#[must_use]
pub fn local_host_name() -> String {
    let host = hostname::get().map_or_else(
        |_| "dacp-remote".to_string(),
        |h| h.to_string_lossy().into_owned(),
    );
    format!("{}.local.", host.trim_end_matches(".local").replace(' ', "-"))
}

/// Touch-remote service advertiser
///
/// Unregisters on drop, so an abandoned pairing attempt does not leave the
/// record on the network.
pub struct TouchRemoteAdvertiser {
    record: TouchRemoteRecord,
    daemon: ServiceDaemon,
    service_fullname: Option<String>,
}

impl TouchRemoteAdvertiser {
    /// Create a new advertiser
    ///
    /// # Errors
    ///
    /// Returns error if the mDNS daemon cannot be started.
    pub fn new(record: TouchRemoteRecord) -> Result<Self, AdvertiserError> {
        let daemon = ServiceDaemon::new()?;
        Ok(Self {
            record,
            daemon,
            service_fullname: None,
        })
    }

    /// The advertised record
    #[must_use]
    pub fn record(&self) -> &TouchRemoteRecord {
        &self.record
    }

    /// Whether the record is currently on the network
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.service_fullname.is_some()
    }

    /// Register the service on the network
    ///
    /// # Errors
    ///
    /// Returns error if service is already registered or mDNS registration fails.
    pub fn register(&mut self) -> Result<(), AdvertiserError> {
        if self.service_fullname.is_some() {
            return Err(AdvertiserError::AlreadyRegistered);
        }

        let service_name = self.record.service_name();
        let service_info = ServiceInfo::new(
            TOUCH_REMOTE_SERVICE_TYPE,
            &service_name,
            &local_host_name(),
            "",
            self.record.port,
            self.record.txt().build_map(),
        )?
        .enable_addr_auto();

        self.daemon.register(service_info.clone())?;
        self.service_fullname = Some(service_info.get_fullname().to_string());

        tracing::info!(
            name = %service_name,
            port = %self.record.port,
            display_name = %self.record.display_name,
            "touch-remote service registered"
        );

        Ok(())
    }

    /// Unregister the service from the network
    ///
    /// # Errors
    ///
    /// Returns error if service is not registered or mDNS unregistration fails.
    pub fn unregister(&mut self) -> Result<(), AdvertiserError> {
        let fullname = self
            .service_fullname
            .take()
            .ok_or(AdvertiserError::NotRegistered)?;

        self.daemon.unregister(&fullname)?;

        tracing::info!(name = %fullname, "touch-remote service unregistered");

        Ok(())
    }
}

impl Drop for TouchRemoteAdvertiser {
    fn drop(&mut self) {
        if self.service_fullname.is_some() {
            let _ = self.unregister();
        }
        let _ = self.daemon.shutdown();
    }
}
