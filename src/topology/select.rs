//! Pluggable server selection policies.
use common::{ReadMode, ReadPreference, Tag};

use super::description::ClusterDescription;
use super::server::{ServerDescription, ServerType};

/// Filters a topology snapshot down to the servers eligible for an
/// operation. Implementations are pure: the cluster applies the filter and
/// breaks remaining ties at random, but never interprets its semantics.
pub trait ServerSelector: Send + Sync {
    fn select_servers(&self, description: &ClusterDescription,
                      candidates: &[ServerDescription]) -> Vec<ServerDescription>;
}

impl<F> ServerSelector for F
    where F: Fn(&ClusterDescription, &[ServerDescription]) -> Vec<ServerDescription> + Send + Sync
{
    fn select_servers(&self, description: &ClusterDescription,
                      candidates: &[ServerDescription]) -> Vec<ServerDescription> {
        self(description, candidates)
    }
}

/// Selects servers that can accept writes.
pub struct WritableServerSelector;

impl ServerSelector for WritableServerSelector {
    fn select_servers(&self, _description: &ClusterDescription,
                      candidates: &[ServerDescription]) -> Vec<ServerDescription> {
        candidates
            .iter()
            .filter(|server| match server.server_type {
                ServerType::Standalone |
                ServerType::ShardRouter |
                ServerType::RSPrimary |
                ServerType::LoadBalanced => true,
                _ => false,
            })
            .cloned()
            .collect()
    }
}

/// Selects replica set members according to a read preference.
pub struct ReadPreferenceSelector {
    pub read_preference: ReadPreference,
}

impl ReadPreferenceSelector {
    pub fn new(read_preference: ReadPreference) -> ReadPreferenceSelector {
        ReadPreferenceSelector {
            read_preference: read_preference,
        }
    }

    fn primaries(candidates: &[ServerDescription]) -> Vec<ServerDescription> {
        candidates
            .iter()
            .filter(|server| server.server_type == ServerType::RSPrimary)
            .cloned()
            .collect()
    }

    fn secondaries(&self, candidates: &[ServerDescription]) -> Vec<ServerDescription> {
        let secondaries: Vec<ServerDescription> = candidates
            .iter()
            .filter(|server| match server.server_type {
                ServerType::RSSecondary | ServerType::RSPassive => true,
                _ => false,
            })
            .cloned()
            .collect();

        self.filter_by_tag_sets(secondaries)
    }

    // Applies the preference's tag sets in order, using the first set that
    // matches at least one server. No tag sets means every candidate matches.
    fn filter_by_tag_sets(&self, candidates: Vec<ServerDescription>) -> Vec<ServerDescription> {
        if self.read_preference.tag_sets.is_empty() {
            return candidates;
        }

        for tag_set in self.read_preference.tag_sets.iter() {
            let matched: Vec<ServerDescription> = candidates
                .iter()
                .filter(|server| tag_set.iter().all(|tag| server_has_tag(server, tag)))
                .cloned()
                .collect();

            if !matched.is_empty() {
                return matched;
            }
        }

        Vec::new()
    }
}

fn server_has_tag(server: &ServerDescription, tag: &Tag) -> bool {
    server.tags.iter().any(|candidate| candidate == tag)
}

impl ServerSelector for ReadPreferenceSelector {
    fn select_servers(&self, description: &ClusterDescription,
                      candidates: &[ServerDescription]) -> Vec<ServerDescription> {
        // Single-server and sharded topologies answer reads from any
        // data-bearing server.
        match description.cluster_type {
            super::ClusterType::ReplicaSet => (),
            _ => {
                return candidates
                    .iter()
                    .filter(|server| server.server_type.is_data_bearing())
                    .cloned()
                    .collect()
            }
        }

        match self.read_preference.mode {
            ReadMode::Primary => ReadPreferenceSelector::primaries(candidates),
            ReadMode::PrimaryPreferred => {
                let primaries = ReadPreferenceSelector::primaries(candidates);
                if primaries.is_empty() {
                    self.secondaries(candidates)
                } else {
                    primaries
                }
            }
            ReadMode::Secondary => self.secondaries(candidates),
            ReadMode::SecondaryPreferred => {
                let secondaries = self.secondaries(candidates);
                if secondaries.is_empty() {
                    ReadPreferenceSelector::primaries(candidates)
                } else {
                    secondaries
                }
            }
            ReadMode::Nearest => {
                let mut eligible = ReadPreferenceSelector::primaries(candidates);
                eligible.extend(self.secondaries(candidates));
                eligible
            }
        }
    }
}
