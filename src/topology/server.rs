//! Server-level value types and the monitored-server boundary.
use bson::oid;
use common::Tag;
use connstring::Host;
use error::{Error, Result};
use semver::Version;

use std::str::FromStr;
use std::sync::Arc;
use std::sync::mpsc::Sender;

use super::{ClusterId, ClusterType};

/// The minimum wire version this engine can talk to.
pub const MIN_SUPPORTED_WIRE_VERSION: i64 = 0;
/// The maximum wire version this engine can talk to.
pub const MAX_SUPPORTED_WIRE_VERSION: i64 = 6;

/// Describes the server role within a server set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServerType {
    /// Standalone server.
    Standalone,
    /// Shard router (mongos).
    ShardRouter,
    /// Replica set primary.
    RSPrimary,
    /// Replica set secondary.
    RSSecondary,
    /// Replica set arbiter.
    RSArbiter,
    /// Replica set member of some other type.
    RSOther,
    /// Replica set ghost member, seen during certain reconfiguration windows.
    RSGhost,
    /// Passive replica set member; carries data but is never elected.
    RSPassive,
    /// Load balancer fronting the deployment.
    LoadBalanced,
    /// Server type is currently unknown.
    Unknown,
}

/// The connection state of a monitored server.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServerState {
    Connected,
    Disconnected,
}

/// A replica set's membership, as last reported by one of its members.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplicaSetConfig {
    /// Every member endpoint the reporting server knows about.
    pub members: Vec<Host>,
    /// The replica set name.
    pub name: Option<String>,
    /// The reporting server's opinion of who the primary is.
    pub primary: Option<Host>,
    /// The replica set config version.
    pub version: Option<i32>,
}

/// Server information gathered from server monitoring.
#[derive(Clone, Debug, PartialEq)]
pub struct ServerDescription {
    /// The monitored endpoint.
    pub host: Host,
    /// The server role last reported by the endpoint.
    pub server_type: ServerType,
    /// Whether the endpoint responded to its last heartbeat.
    pub state: ServerState,
    /// The average round-trip time of recent heartbeats, in milliseconds.
    pub round_trip_time: Option<i64>,
    /// The minimum wire version supported by this server.
    pub min_wire_version: i64,
    /// The maximum wire version supported by this server.
    pub max_wire_version: i64,
    /// The server build version, when the monitor has completed a handshake.
    pub version: Option<Version>,
    /// Tags for targeted operations on specific replica set members.
    pub tags: Vec<Tag>,
    /// The replica set membership reported by the server, if it is a member.
    pub replica_set_config: Option<ReplicaSetConfig>,
    /// The server's current election id, if it believes it is a primary.
    pub election_id: Option<oid::ObjectId>,
}

/// An (old, new) pair describing one monitored server's description change.
#[derive(Clone, Debug)]
pub struct ServerDescriptionChange {
    pub old_description: ServerDescription,
    pub new_description: ServerDescription,
}

impl FromStr for ServerType {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "Standalone" => ServerType::Standalone,
            "ShardRouter" => ServerType::ShardRouter,
            "RSPrimary" => ServerType::RSPrimary,
            "RSSecondary" => ServerType::RSSecondary,
            "RSArbiter" => ServerType::RSArbiter,
            "RSOther" => ServerType::RSOther,
            "RSGhost" => ServerType::RSGhost,
            "RSPassive" => ServerType::RSPassive,
            "LoadBalanced" => ServerType::LoadBalanced,
            _ => ServerType::Unknown,
        })
    }
}

impl ServerType {
    /// Returns true for every replica set member role, ghosts included.
    pub fn is_replica_set_member(&self) -> bool {
        match *self {
            ServerType::RSPrimary |
            ServerType::RSSecondary |
            ServerType::RSArbiter |
            ServerType::RSOther |
            ServerType::RSGhost |
            ServerType::RSPassive => true,
            _ => false,
        }
    }

    /// Returns true for roles that hold data and serve reads.
    pub fn is_data_bearing(&self) -> bool {
        match *self {
            ServerType::Standalone |
            ServerType::ShardRouter |
            ServerType::RSPrimary |
            ServerType::RSSecondary |
            ServerType::RSPassive => true,
            _ => false,
        }
    }

    /// Maps a server role to the cluster type it implies.
    ///
    /// Roles outside the mapping indicate a logic bug in whoever produced
    /// the description and surface as an internal error.
    pub fn to_cluster_type(&self) -> Result<ClusterType> {
        match *self {
            ServerType::Standalone => Ok(ClusterType::Standalone),
            ServerType::ShardRouter => Ok(ClusterType::Sharded),
            ServerType::Unknown => Ok(ClusterType::Unknown),
            ref stype if stype.is_replica_set_member() => Ok(ClusterType::ReplicaSet),
            ref stype => Err(Error::InternalError(format!(
                "Unexpected server type {:?} has no cluster type.",
                stype
            ))),
        }
    }
}

impl ReplicaSetConfig {
    /// Returns a config with no members, name, primary, or version.
    pub fn empty() -> ReplicaSetConfig {
        ReplicaSetConfig {
            members: Vec::new(),
            name: None,
            primary: None,
            version: None,
        }
    }

    pub fn new(members: Vec<Host>, name: Option<String>, primary: Option<Host>,
               version: Option<i32>) -> ReplicaSetConfig {
        ReplicaSetConfig {
            members: members,
            name: name,
            primary: primary,
            version: version,
        }
    }

    pub fn contains(&self, host: &Host) -> bool {
        self.members.contains(host)
    }
}

impl ServerDescription {
    /// Returns a default, unknown description for the given endpoint.
    pub fn new(host: Host) -> ServerDescription {
        ServerDescription {
            host: host,
            server_type: ServerType::Unknown,
            state: ServerState::Disconnected,
            round_trip_time: None,
            min_wire_version: 0,
            max_wire_version: 0,
            version: None,
            tags: Vec::new(),
            replica_set_config: None,
            election_id: None,
        }
    }

    /// Returns a bare placeholder that is explicitly disconnected.
    ///
    /// Used when demoting a stale primary without waiting for its own next
    /// heartbeat; only the endpoint identity survives.
    pub fn disconnected(host: Host) -> ServerDescription {
        ServerDescription::new(host)
    }

    /// Returns true if the server's wire version range overlaps ours.
    pub fn is_compatible(&self) -> bool {
        self.state == ServerState::Disconnected ||
            (self.min_wire_version <= MAX_SUPPORTED_WIRE_VERSION &&
             self.max_wire_version >= MIN_SUPPORTED_WIRE_VERSION)
    }

    /// The replica set name reported by the server, if any.
    pub fn set_name(&self) -> Option<String> {
        match self.replica_set_config {
            Some(ref config) => config.name.clone(),
            None => None,
        }
    }
}

/// One monitored server: owns its heartbeat loop and connection pool.
///
/// The topology engine treats implementations as black boxes; heartbeat
/// outcomes arrive only through the description-change channel the server
/// was constructed with.
pub trait ClusterableServer: Send + Sync + ::std::fmt::Debug {
    /// The endpoint this server monitors.
    fn host(&self) -> Host;

    /// A synchronous snapshot of the server's current description.
    fn description(&self) -> ServerDescription;

    /// Starts the server's heartbeat loop.
    fn initialize(&self);

    /// Forces an immediate re-check, used on primary step-down.
    fn invalidate(&self);

    /// Stops the heartbeat loop and releases the server's resources.
    fn dispose(&self);
}

/// Creates monitored servers on behalf of a cluster.
pub trait ServerFactory: Send + Sync {
    /// Creates a server for the endpoint. Description changes must be sent
    /// through `tx` as (old, new) pairs.
    fn create_server(&self, cluster_id: ClusterId, host: Host,
                     tx: Sender<ServerDescriptionChange>) -> Arc<ClusterableServer>;
}
