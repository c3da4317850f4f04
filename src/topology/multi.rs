//! State machines for replica set, sharded, and standalone topologies.
use bson::oid;
use common::CancellationToken;
use connstring::Host;
use error::Error::ArgumentError;
use error::Result;

use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use super::{ClusterState, ClusterType};
use super::cluster::{Cluster, ClusterCore};
use super::description::ClusterDescription;
use super::listener::{ServerAddedEvent, ServerRemovedEvent};
use super::select::ServerSelector;
use super::server::{ClusterableServer, ServerDescription, ServerDescriptionChange,
                    ServerFactory, ServerState, ServerType};
use super::settings::ClusterSettings;

const STATE_INITIAL: usize = 0;
const STATE_OPEN: usize = 1;
const STATE_DISPOSED: usize = 2;

// How often the fold loop wakes to re-check the cancellation flag.
const MONITOR_WAKE_MS: u64 = 100;

/// A cluster of dynamically discovered servers.
///
/// Owns one monitored server per known endpoint. Servers push description
/// changes into a shared queue; a single consumer thread folds them into the
/// cluster description one at a time, so cluster-level updates are serialized
/// even though heartbeats complete in parallel.
#[derive(Clone)]
pub struct MultiServerCluster {
    inner: Arc<MultiInner>,
}

struct MultiInner {
    core: ClusterCore,
    factory: Arc<ServerFactory>,
    // The active monitored servers, under a lock separate from the
    // description lock in `core`. List bookkeeping always completes and
    // unlocks before a description is published.
    servers: Mutex<Vec<Arc<ClusterableServer>>>,
    event_tx: Mutex<Option<Sender<ServerDescriptionChange>>>,
    event_rx: Mutex<Option<Receiver<ServerDescriptionChange>>>,
    state: AtomicUsize,
    monitor_token: CancellationToken,
    // The adopted replica set name; taken from settings, or lazily from the
    // first member that reports one.
    replica_set_name: Mutex<Option<String>>,
    // The largest election id seen from any primary.
    max_election_id: Mutex<Option<oid::ObjectId>>,
}

impl MultiServerCluster {
    pub fn new(settings: ClusterSettings, factory: Arc<ServerFactory>)
               -> Result<MultiServerCluster> {
        if settings.endpoints.is_empty() {
            return Err(ArgumentError(
                "At least one seed endpoint is required.".to_owned(),
            ));
        }
        if settings.cluster_type == ClusterType::Direct {
            return Err(ArgumentError(
                "ClusterType::Direct is not supported for a MultiServerCluster; \
                 use a SingleServerCluster."
                    .to_owned(),
            ));
        }

        let (tx, rx) = channel();
        let replica_set_name = settings.replica_set_name.clone();

        Ok(MultiServerCluster {
            inner: Arc::new(MultiInner {
                core: ClusterCore::new(settings),
                factory: factory,
                servers: Mutex::new(Vec::new()),
                event_tx: Mutex::new(Some(tx)),
                event_rx: Mutex::new(Some(rx)),
                state: AtomicUsize::new(STATE_INITIAL),
                monitor_token: CancellationToken::new(),
                replica_set_name: Mutex::new(replica_set_name),
                max_election_id: Mutex::new(None),
            }),
        })
    }
}

impl Cluster for MultiServerCluster {
    fn initialize(&self) -> Result<()> {
        self.inner.core.throw_if_disposed()?;

        let transition = self.inner.state.compare_exchange(
            STATE_INITIAL,
            STATE_OPEN,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        if transition.is_err() {
            return Ok(());
        }

        // Start the single-consumer fold loop before any server can report.
        if let Some(rx) = self.inner.event_rx.lock()?.take() {
            let inner = self.inner.clone();
            thread::spawn(move || MultiInner::monitor_servers(inner, rx));
        }

        let mut description = self.inner.core.description()?
            .with_state(ClusterState::Connected);
        let endpoints = self.inner.core.settings().endpoints.clone();
        for host in endpoints {
            description = self.inner.ensure_server(description, host)?;
        }

        self.inner.core.update_description(description)?;
        Ok(())
    }

    fn description(&self) -> Result<ClusterDescription> {
        self.inner.core.throw_if_disposed()?;
        self.inner.core.description()
    }

    fn get_description(&self, minimum_revision: u64, timeout: Duration,
                       token: &CancellationToken) -> Result<ClusterDescription> {
        self.inner.core.get_description(minimum_revision, timeout, token)
    }

    fn select_server(&self, selector: &ServerSelector, timeout: Duration,
                     token: &CancellationToken) -> Result<Arc<ClusterableServer>> {
        let inner = &self.inner;
        inner.core.select_server_with(selector, timeout, token,
                                      |host| inner.try_get_server(host))
    }

    fn dispose(&self) -> Result<()> {
        if self.inner.state.swap(STATE_DISPOSED, Ordering::SeqCst) == STATE_DISPOSED {
            return Ok(());
        }

        self.inner.monitor_token.cancel();
        *self.inner.event_tx.lock()? = None;

        let hosts: Vec<Host> = {
            let servers = self.inner.servers.lock()?;
            servers.iter().map(|server| server.host()).collect()
        };

        let mut description = self.inner.core.description()?;
        for host in hosts {
            description = self.inner
                .remove_server(description, &host, "The cluster is closing.")?;
        }
        self.inner.core.update_description(description)?;

        self.inner.core.dispose()
    }
}

impl MultiInner {
    fn monitor_servers(inner: Arc<MultiInner>, rx: Receiver<ServerDescriptionChange>) {
        while !inner.monitor_token.is_cancelled() {
            match rx.recv_timeout(Duration::from_millis(MONITOR_WAKE_MS)) {
                Ok(change) => {
                    // A fold failure indicates a misbehaving collaborator;
                    // the loop keeps serving the remaining servers.
                    let _ = inner.process_server_description_changed(change);
                }
                Err(RecvTimeoutError::Timeout) => (),
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn process_server_description_changed(&self, change: ServerDescriptionChange)
                                          -> Result<()> {
        let new_description = change.new_description.clone();

        // Events can still arrive for a server that was just removed;
        // they no longer concern this cluster.
        if !self.is_monitored(&new_description.host)? {
            return Ok(());
        }

        let mut description = self.core.description()?;

        if new_description.state == ServerState::Disconnected {
            // A down server stays a member, marked down.
            description = description.with_server(new_description);
        } else {
            if description.cluster_type == ClusterType::Unknown {
                let implied = new_description.server_type.to_cluster_type()?;
                description = description.with_type(implied);
            }

            description = match description.cluster_type {
                ClusterType::ReplicaSet => {
                    self.process_replica_set_change(description, &change)?
                }
                ClusterType::Sharded => {
                    self.process_sharded_change(description, new_description)?
                }
                ClusterType::Standalone => {
                    self.process_standalone_change(description, new_description)?
                }
                _ => description.with_server(new_description),
            };
        }

        self.core.update_description(description)?;
        Ok(())
    }

    fn process_replica_set_change(&self, mut description: ClusterDescription,
                                  change: &ServerDescriptionChange)
                                  -> Result<ClusterDescription> {
        let new_description = change.new_description.clone();
        let host = new_description.host.clone();

        if !new_description.server_type.is_replica_set_member() {
            let reason = format!(
                "Server is a {:?}, not a replica set member.",
                new_description.server_type
            );
            return self.remove_server(description, &host, &reason);
        }

        // Ghost members never trigger membership reconciliation.
        if new_description.server_type == ServerType::RSGhost {
            return Ok(description.with_server(new_description));
        }

        let reported_name = new_description.set_name();
        let mismatch = {
            let mut adopted = self.replica_set_name.lock()?;
            if adopted.is_none() {
                *adopted = reported_name.clone();
            }
            *adopted != reported_name
        };
        if mismatch {
            return self.remove_server(
                description,
                &host,
                "Server is a member of a different replica set than the one in use.",
            );
        }

        description = description.with_server(new_description.clone());
        description = self.ensure_servers(description, &new_description)?;

        if new_description.server_type == ServerType::RSPrimary {
            // A primary whose election id is older than the largest seen
            // lost a race it does not know about yet.
            if let Some(ref election_id) = new_description.election_id {
                let mut max_election_id = self.max_election_id.lock()?;
                let stale = match *max_election_id {
                    Some(ref max) => max.bytes() > election_id.bytes(),
                    None => false,
                };
                if stale {
                    if let Some(server) = self.try_get_server(&host) {
                        server.invalidate();
                    }
                    return Ok(description.with_server(ServerDescription::disconnected(host)));
                }
                *max_election_id = Some(election_id.clone());
            }

            if change.old_description.server_type != ServerType::RSPrimary {
                // A fresh election. Only one primary may be recorded at a
                // time; the losers are demoted to disconnected placeholders
                // without waiting for their own heartbeats to confirm.
                let demoted: Vec<Host> = description
                    .servers
                    .iter()
                    .filter(|server| {
                        server.server_type == ServerType::RSPrimary && server.host != host
                    })
                    .map(|server| server.host.clone())
                    .collect();

                for other in demoted {
                    if let Some(server) = self.try_get_server(&other) {
                        server.invalidate();
                    }
                    description =
                        description.with_server(ServerDescription::disconnected(other));
                }
            }
        }

        Ok(description)
    }

    fn process_sharded_change(&self, description: ClusterDescription,
                              new_description: ServerDescription)
                              -> Result<ClusterDescription> {
        if new_description.server_type != ServerType::ShardRouter {
            let host = new_description.host.clone();
            return self.remove_server(description, &host, "Server is not a shard router.");
        }

        Ok(description.with_server(new_description))
    }

    fn process_standalone_change(&self, description: ClusterDescription,
                                 new_description: ServerDescription)
                                 -> Result<ClusterDescription> {
        if self.core.settings().endpoints.len() > 1 {
            let host = new_description.host.clone();
            return self.remove_server(
                description,
                &host,
                "A standalone topology allows exactly one seed endpoint.",
            );
        }

        if new_description.server_type != ServerType::Standalone {
            // The endpoint stays a member, marked down until it reports
            // a standalone role again.
            let host = new_description.host.clone();
            return Ok(description.with_server(ServerDescription::disconnected(host)));
        }

        Ok(description.with_server(new_description))
    }

    // Reconciles the monitored set against a member's reported membership.
    // Missing members are added; if the reporting member is the primary, its
    // view is authoritative and extra members are pruned.
    fn ensure_servers(&self, mut description: ClusterDescription,
                      reporting: &ServerDescription) -> Result<ClusterDescription> {
        let config = match reporting.replica_set_config {
            Some(ref config) => config.clone(),
            None => return Ok(description),
        };

        let has_primary = description
            .servers
            .iter()
            .any(|server| server.server_type == ServerType::RSPrimary);

        if reporting.server_type == ServerType::RSPrimary || !has_primary {
            for member in config.members.iter() {
                description = self.ensure_server(description, member.clone())?;
            }
        }

        if reporting.server_type == ServerType::RSPrimary {
            let extras: Vec<Host> = description
                .servers
                .iter()
                .filter(|server| !config.contains(&server.host))
                .map(|server| server.host.clone())
                .collect();

            for host in extras {
                description = self.remove_server(
                    description,
                    &host,
                    "Server is not in the host list of the primary.",
                )?;
            }
        }

        Ok(description)
    }

    // Starts monitoring an endpoint unless it is already monitored.
    fn ensure_server(&self, description: ClusterDescription, host: Host)
                     -> Result<ClusterDescription> {
        if self.state.load(Ordering::SeqCst) == STATE_DISPOSED {
            return Ok(description);
        }

        let server = {
            let mut servers = self.servers.lock()?;
            if servers.iter().any(|server| server.host() == host) {
                return Ok(description);
            }

            let tx = match *self.event_tx.lock()? {
                Some(ref tx) => tx.clone(),
                None => return Ok(description),
            };

            let server = self.factory.create_server(self.core.cluster_id(), host.clone(), tx);
            servers.push(server.clone());
            server
        };

        let event = ServerAddedEvent {
            cluster_id: self.core.cluster_id(),
            host: host,
        };
        let _ = self.core.listener().run_server_added_hooks(&event);

        let description = description.with_server(server.description());
        server.initialize();
        Ok(description)
    }

    // Stops monitoring an endpoint and drops its description.
    fn remove_server(&self, description: ClusterDescription, host: &Host, reason: &str)
                     -> Result<ClusterDescription> {
        let server = {
            let mut servers = self.servers.lock()?;
            match servers.iter().position(|server| server.host() == *host) {
                Some(index) => servers.remove(index),
                None => return Ok(description),
            }
        };

        server.dispose();

        let event = ServerRemovedEvent {
            cluster_id: self.core.cluster_id(),
            host: host.clone(),
            reason: reason.to_owned(),
        };
        let _ = self.core.listener().run_server_removed_hooks(&event);

        Ok(description.without_server(host))
    }

    fn is_monitored(&self, host: &Host) -> Result<bool> {
        let servers = self.servers.lock()?;
        Ok(servers.iter().any(|server| server.host() == *host))
    }

    fn try_get_server(&self, host: &Host) -> Option<Arc<ClusterableServer>> {
        match self.servers.lock() {
            Ok(servers) => servers
                .iter()
                .find(|server| server.host() == *host)
                .map(|server| server.clone()),
            Err(_) => None,
        }
    }
}

/// A cluster pinned to the standalone topology type.
///
/// Thin specialization of `MultiServerCluster`: discovery runs the same way,
/// but the deployment type is declared up front, so a second responding
/// endpoint or a non-standalone role is treated as misconfiguration.
pub struct StandaloneCluster {
    inner: MultiServerCluster,
}

impl StandaloneCluster {
    pub fn new(settings: ClusterSettings, factory: Arc<ServerFactory>)
               -> Result<StandaloneCluster> {
        match settings.cluster_type {
            ClusterType::Unknown | ClusterType::Standalone => (),
            other => {
                return Err(ArgumentError(format!(
                    "A StandaloneCluster cannot be declared as {:?}.",
                    other
                )))
            }
        }

        let settings = settings.with_cluster_type(ClusterType::Standalone);
        Ok(StandaloneCluster {
            inner: MultiServerCluster::new(settings, factory)?,
        })
    }
}

impl Cluster for StandaloneCluster {
    fn initialize(&self) -> Result<()> {
        self.inner.initialize()
    }

    fn description(&self) -> Result<ClusterDescription> {
        self.inner.description()
    }

    fn get_description(&self, minimum_revision: u64, timeout: Duration,
                       token: &CancellationToken) -> Result<ClusterDescription> {
        self.inner.get_description(minimum_revision, timeout, token)
    }

    fn select_server(&self, selector: &ServerSelector, timeout: Duration,
                     token: &CancellationToken) -> Result<Arc<ClusterableServer>> {
        self.inner.select_server(selector, timeout, token)
    }

    fn dispose(&self) -> Result<()> {
        self.inner.dispose()
    }
}
