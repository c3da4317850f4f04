//! A cluster pinned to exactly one server, used for direct connections.
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
use super::server::{ClusterableServer, ServerDescriptionChange, ServerFactory,
                    ServerState};
use super::settings::ClusterSettings;

const STATE_INITIAL: usize = 0;
const STATE_OPEN: usize = 1;
const STATE_DISPOSED: usize = 2;

const MONITOR_WAKE_MS: u64 = 100;

/// A cluster that monitors a single endpoint and never removes it.
///
/// The monitored server stays a member no matter what role it reports. The
/// first connected report establishes the deployment type; a later report
/// implying a different type drops the server's description from the view
/// (so selection cannot use it) while monitoring continues.
#[derive(Clone)]
pub struct SingleServerCluster {
    inner: Arc<SingleInner>,
}

struct SingleInner {
    core: ClusterCore,
    factory: Arc<ServerFactory>,
    server: Mutex<Option<Arc<ClusterableServer>>>,
    event_tx: Mutex<Option<Sender<ServerDescriptionChange>>>,
    event_rx: Mutex<Option<Receiver<ServerDescriptionChange>>>,
    state: AtomicUsize,
    monitor_token: CancellationToken,
    // The deployment type established by the first connected report. A
    // declared type other than Direct or Unknown pins it from the start.
    established_type: Mutex<ClusterType>,
}

impl SingleServerCluster {
    pub fn new(settings: ClusterSettings, factory: Arc<ServerFactory>)
               -> Result<SingleServerCluster> {
        if settings.endpoints.len() != 1 {
            return Err(ArgumentError(
                "A SingleServerCluster requires exactly one endpoint.".to_owned(),
            ));
        }

        let established_type = match settings.cluster_type {
            ClusterType::Direct | ClusterType::Unknown => ClusterType::Unknown,
            declared => declared,
        };

        let (tx, rx) = channel();

        Ok(SingleServerCluster {
            inner: Arc::new(SingleInner {
                core: ClusterCore::new(settings),
                factory: factory,
                server: Mutex::new(None),
                event_tx: Mutex::new(Some(tx)),
                event_rx: Mutex::new(Some(rx)),
                state: AtomicUsize::new(STATE_INITIAL),
                monitor_token: CancellationToken::new(),
                established_type: Mutex::new(established_type),
            }),
        })
    }
}

impl Cluster for SingleServerCluster {
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

        if let Some(rx) = self.inner.event_rx.lock()?.take() {
            let inner = self.inner.clone();
            thread::spawn(move || SingleInner::monitor_server(inner, rx));
        }

        let host = self.inner.core.settings().endpoints[0].clone();
        let tx = match *self.inner.event_tx.lock()? {
            Some(ref tx) => tx.clone(),
            None => return Ok(()),
        };
        let server = self.inner
            .factory
            .create_server(self.inner.core.cluster_id(), host.clone(), tx);
        *self.inner.server.lock()? = Some(server.clone());

        let event = ServerAddedEvent {
            cluster_id: self.inner.core.cluster_id(),
            host: host,
        };
        let _ = self.inner.core.listener().run_server_added_hooks(&event);

        let description = self.inner.core.description()?
            .with_state(ClusterState::Connected)
            .with_server(server.description());
        self.inner.core.update_description(description)?;

        server.initialize();
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

        let server = self.inner.server.lock()?.take();
        let mut description = self.inner.core.description()?;
        if let Some(server) = server {
            let host = server.host();
            server.dispose();

            let event = ServerRemovedEvent {
                cluster_id: self.inner.core.cluster_id(),
                host: host.clone(),
                reason: "The cluster is closing.".to_owned(),
            };
            let _ = self.inner.core.listener().run_server_removed_hooks(&event);

            description = description.without_server(&host);
        }
        self.inner.core.update_description(description)?;

        self.inner.core.dispose()
    }
}

impl SingleInner {
    fn monitor_server(inner: Arc<SingleInner>, rx: Receiver<ServerDescriptionChange>) {
        while !inner.monitor_token.is_cancelled() {
            match rx.recv_timeout(Duration::from_millis(MONITOR_WAKE_MS)) {
                Ok(change) => {
                    let _ = inner.process_server_description_changed(change);
                }
                Err(RecvTimeoutError::Timeout) => (),
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn process_server_description_changed(&self, change: ServerDescriptionChange)
                                          -> Result<()> {
        let new_description = change.new_description;

        if !self.is_monitored(&new_description.host)? {
            return Ok(());
        }

        let mut description = self.core.description()?;

        if new_description.state == ServerState::Disconnected {
            description = description.with_server(new_description);
        } else {
            let implied = new_description.server_type.to_cluster_type()?;

            let established = {
                let mut established = self.established_type.lock()?;
                if *established == ClusterType::Unknown {
                    *established = implied;
                }
                *established
            };

            if implied != established {
                // The wrong kind of server answered. It stays monitored,
                // but its description is withheld from selection.
                description = description.without_server(&new_description.host);
            } else {
                if description.cluster_type == ClusterType::Unknown {
                    description = description.with_type(implied);
                }
                description = description.with_server(new_description);
            }
        }

        self.core.update_description(description)?;
        Ok(())
    }

    fn is_monitored(&self, host: &Host) -> Result<bool> {
        let server = self.server.lock()?;
        Ok(match *server {
            Some(ref server) => server.host() == *host,
            None => false,
        })
    }

    fn try_get_server(&self, host: &Host) -> Option<Arc<ClusterableServer>> {
        match self.server.lock() {
            Ok(server) => match *server {
                Some(ref server) if server.host() == *host => Some(server.clone()),
                _ => None,
            },
            Err(_) => None,
        }
    }
}
