//! Cluster-wide configuration.
use connstring::{self, Host};
use error::Error::ArgumentError;
use error::{Error, Result};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use super::ClusterType;
use super::listener::SdamListener;

/// The default heartbeat interval, in milliseconds.
pub const DEFAULT_HEARTBEAT_FREQUENCY_MS: u64 = 10000;

/// The address family used for resolving seed endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl FromStr for AddressFamily {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        match &s.to_lowercase()[..] {
            "ipv4" => Ok(AddressFamily::Ipv4),
            "ipv6" => Ok(AddressFamily::Ipv6),
            other => Err(ArgumentError(format!(
                "'{}' is not a valid address family; expected ipv4 or ipv6.",
                other
            ))),
        }
    }
}

/// A username/password pair parsed from the userinfo segment of a URI.
///
/// Carried for the authentication collaborator; the topology engine itself
/// never consumes it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: Option<String>,
}

/// Immutable configuration for one cluster.
#[derive(Clone)]
pub struct ClusterSettings {
    /// The seed endpoints monitoring starts from.
    pub endpoints: Vec<Host>,
    /// The declared deployment type; Unknown means discover it.
    pub cluster_type: ClusterType,
    /// The expected replica set name, when known up front. A member
    /// reporting a different name is removed as soon as it reports.
    pub replica_set_name: Option<String>,
    /// How often each monitored server is health-checked.
    pub heartbeat_interval: Duration,
    /// The address family used to resolve endpoints.
    pub address_family: Option<AddressFamily>,
    /// Credentials parsed from the connection string, if any.
    pub credential: Option<Credential>,
    /// Receiver for structured topology notifications.
    pub listener: Option<Arc<SdamListener>>,
}

impl fmt::Debug for ClusterSettings {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ClusterSettings")
            .field("endpoints", &self.endpoints)
            .field("cluster_type", &self.cluster_type)
            .field("replica_set_name", &self.replica_set_name)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("address_family", &self.address_family)
            .finish()
    }
}

impl ClusterSettings {
    /// Returns settings for the given seeds with every other field defaulted.
    pub fn new(endpoints: Vec<Host>) -> ClusterSettings {
        ClusterSettings {
            endpoints: endpoints,
            cluster_type: ClusterType::Unknown,
            replica_set_name: None,
            heartbeat_interval: Duration::from_millis(DEFAULT_HEARTBEAT_FREQUENCY_MS),
            address_family: None,
            credential: None,
            listener: None,
        }
    }

    pub fn with_cluster_type(mut self, cluster_type: ClusterType) -> ClusterSettings {
        self.cluster_type = cluster_type;
        self
    }

    pub fn with_replica_set_name(mut self, name: &str) -> ClusterSettings {
        self.replica_set_name = Some(name.to_owned());
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> ClusterSettings {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_address_family(mut self, family: AddressFamily) -> ClusterSettings {
        self.address_family = Some(family);
        self
    }

    pub fn with_listener(mut self, listener: Arc<SdamListener>) -> ClusterSettings {
        self.listener = Some(listener);
        self
    }

    /// Parses settings from a `mongodb://` connection string.
    ///
    /// Recognized options: `addressFamily` (ipv4|ipv6), `clusterType`,
    /// `endpoint` (repeatable, extra seeds), `heartbeat`/`heartbeatInterval`
    /// (milliseconds), `replicaSet`. Unrecognized options are ignored.
    pub fn from_uri(uri: &str) -> Result<ClusterSettings> {
        let connection_string = connstring::parse(uri)?;

        let mut settings = ClusterSettings::new(connection_string.hosts.clone());

        if let Some(user) = connection_string.user {
            settings.credential = Some(Credential {
                username: user,
                password: connection_string.password,
            });
        }

        let options = match connection_string.options {
            Some(options) => options,
            None => return Ok(settings),
        };

        for endpoint in options.endpoints.iter() {
            let host = connstring::parse_host(endpoint)?;
            if !settings.endpoints.contains(&host) {
                settings.endpoints.push(host);
            }
        }

        for (key, value) in options.options.iter() {
            match &key.to_lowercase()[..] {
                "addressfamily" => {
                    settings.address_family = Some(AddressFamily::from_str(value)?);
                }
                "clustertype" => {
                    settings.cluster_type = ClusterType::from_str(value)?;
                }
                "heartbeat" | "heartbeatinterval" => {
                    let millis = value.parse::<u64>().map_err(|_| {
                        ArgumentError(format!(
                            "'{}' is not a valid heartbeat interval; expected milliseconds.",
                            value
                        ))
                    })?;
                    settings.heartbeat_interval = Duration::from_millis(millis);
                }
                "replicaset" => {
                    settings.replica_set_name = Some(value.to_owned());
                }
                // Unrecognized options are silently ignored.
                _ => (),
            }
        }

        Ok(settings)
    }
}
