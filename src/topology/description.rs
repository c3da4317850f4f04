//! Immutable point-in-time snapshots of the whole topology.
use connstring::Host;

use super::{ClusterState, ClusterType};
use super::server::{ReplicaSetConfig, ServerDescription, ServerType};

/// An immutable snapshot of one cluster's topology.
///
/// Descriptions are never mutated; every topology-affecting event produces a
/// new instance through the `with_*` projections, and the owning cluster
/// stamps each published instance with the next revision.
#[derive(Clone, Debug)]
pub struct ClusterDescription {
    /// The deployment type.
    pub cluster_type: ClusterType,
    /// The cluster lifecycle state.
    pub state: ClusterState,
    /// Known servers, kept sorted by endpoint for stable comparisons.
    pub servers: Vec<ServerDescription>,
    /// The replica set membership, populated only for replica set clusters.
    pub replica_set_config: Option<ReplicaSetConfig>,
    /// Monotonically increasing version stamped by the owning cluster on
    /// every published update. Excluded from equality.
    pub revision: u64,
}

impl ClusterDescription {
    /// Returns an empty, uninitialized description of the given type.
    pub fn new(cluster_type: ClusterType) -> ClusterDescription {
        ClusterDescription {
            cluster_type: cluster_type,
            state: ClusterState::Uninitialized,
            servers: Vec::new(),
            replica_set_config: None,
            revision: 0,
        }
    }

    /// Looks up the description for an endpoint.
    pub fn server(&self, host: &Host) -> Option<&ServerDescription> {
        self.servers.iter().find(|server| &server.host == host)
    }

    /// Returns true if any known server has the given role.
    pub fn has_server_of_type(&self, server_type: ServerType) -> bool {
        self.servers.iter().any(|server| server.server_type == server_type)
    }

    /// Returns true if every connected server falls within the supported
    /// wire version range.
    pub fn is_compatible(&self) -> bool {
        self.servers.iter().all(|server| server.is_compatible())
    }

    /// Projects a copy with the given deployment type.
    pub fn with_type(&self, cluster_type: ClusterType) -> ClusterDescription {
        let mut description = self.clone();
        description.cluster_type = cluster_type;
        if cluster_type != ClusterType::ReplicaSet {
            description.replica_set_config = None;
        }
        description
    }

    /// Projects a copy with the given lifecycle state.
    pub fn with_state(&self, state: ClusterState) -> ClusterDescription {
        let mut description = self.clone();
        description.state = state;
        description
    }

    /// Projects a copy with `server` folded in, replacing any previous
    /// description for the same endpoint. The server order stays sorted.
    pub fn with_server(&self, server: ServerDescription) -> ClusterDescription {
        let mut description = self.clone();

        if description.cluster_type == ClusterType::ReplicaSet {
            if let Some(ref config) = server.replica_set_config {
                description.replica_set_config = Some(config.clone());
            }
        }

        match description.servers.iter().position(|s| s.host == server.host) {
            Some(index) => description.servers[index] = server,
            None => {
                description.servers.push(server);
                description.servers.sort_by(|a, b| a.host.cmp(&b.host));
            }
        }

        description
    }

    /// Projects a copy without any description for `host`.
    pub fn without_server(&self, host: &Host) -> ClusterDescription {
        let mut description = self.clone();
        description.servers.retain(|server| &server.host != host);
        description
    }

    /// Projects a copy carrying the given revision.
    pub fn with_revision(&self, revision: u64) -> ClusterDescription {
        let mut description = self.clone();
        description.revision = revision;
        description
    }
}

// Structural equality over (type, state, servers, replica set config);
// the revision stamp is deliberately excluded.
impl PartialEq for ClusterDescription {
    fn eq(&self, other: &ClusterDescription) -> bool {
        self.cluster_type == other.cluster_type && self.state == other.state &&
            self.servers == other.servers &&
            self.replica_set_config == other.replica_set_config
    }
}
