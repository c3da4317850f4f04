//! Server discovery and monitoring for MongoDB server sets.
//!
//! The topology module tracks a changing set of live servers, classifies the
//! deployment type (standalone, replica set, or sharded), folds asynchronous
//! heartbeat results into immutable point-in-time cluster descriptions, and
//! serves those snapshots to concurrent callers performing server selection.
pub mod cluster;
pub mod description;
pub mod handle;
pub mod ismaster;
pub mod listener;
pub mod multi;
pub mod select;
pub mod server;
pub mod settings;
pub mod single;

use error::{Error, Result};

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

pub use self::cluster::Cluster;
pub use self::description::ClusterDescription;
pub use self::handle::{ClusterHandle, ReferenceCountedCluster};
pub use self::multi::{MultiServerCluster, StandaloneCluster};
pub use self::select::ServerSelector;
pub use self::server::{ClusterableServer, ReplicaSetConfig, ServerDescription, ServerFactory,
                       ServerState, ServerType};
pub use self::settings::ClusterSettings;
pub use self::single::SingleServerCluster;

static NEXT_CLUSTER_ID: AtomicUsize = AtomicUsize::new(0);

/// Describes the deployment type of a server set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClusterType {
    Unknown,
    /// A direct connection to a single server, regardless of its role.
    Direct,
    Standalone,
    ReplicaSet,
    Sharded,
    LoadBalanced,
}

/// The lifecycle state of a cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClusterState {
    Uninitialized,
    Connected,
    Disposed,
}

/// A process-unique identifier for one cluster instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClusterId(pub usize);

impl ClusterId {
    /// Returns the next unused cluster id.
    pub fn new() -> ClusterId {
        ClusterId(NEXT_CLUSTER_ID.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "cluster {}", self.0)
    }
}

impl FromStr for ClusterType {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "Direct" => ClusterType::Direct,
            "Standalone" => ClusterType::Standalone,
            "ReplicaSet" => ClusterType::ReplicaSet,
            "Sharded" => ClusterType::Sharded,
            "LoadBalanced" => ClusterType::LoadBalanced,
            _ => ClusterType::Unknown,
        })
    }
}
