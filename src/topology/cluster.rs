//! The cluster contract and its description-broadcast core.
use common::CancellationToken;
use connstring::Host;
use error::Error::{CancellationError, OperationError, TimeoutError};
use error::Result;

use rand::{thread_rng, Rng};

use std::sync::{Arc, Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use super::{ClusterId, ClusterState};
use super::description::ClusterDescription;
use super::listener::{ClusterDescriptionChangedEvent, SdamListener};
use super::select::ServerSelector;
use super::server::{ClusterableServer, ServerDescription, ServerState};
use super::settings::ClusterSettings;

/// The public contract shared by every cluster implementation.
pub trait Cluster: Send + Sync {
    /// Starts monitoring; idempotent.
    fn initialize(&self) -> Result<()>;

    /// A snapshot of the current topology description.
    fn description(&self) -> Result<ClusterDescription>;

    /// Returns the first published description whose revision is at least
    /// `minimum_revision`, waiting up to `timeout` for one to appear.
    fn get_description(&self, minimum_revision: u64, timeout: Duration,
                       token: &CancellationToken) -> Result<ClusterDescription>;

    /// Selects one live server matching `selector`, waiting up to `timeout`
    /// for the topology to produce a match.
    fn select_server(&self, selector: &ServerSelector, timeout: Duration,
                     token: &CancellationToken) -> Result<Arc<ClusterableServer>>;

    /// Stops monitoring and releases every owned server; idempotent.
    fn dispose(&self) -> Result<()>;
}

/// Shared state and behavior for cluster implementations: the current
/// description, the revision discipline, and the wait-for-change primitive.
///
/// Any predicate over the description can be implemented as "poll under the
/// mutex, else wait on the shared signal and retry", because every topology
/// mutation publishes a new revision and wakes all waiters.
pub struct ClusterCore {
    cluster_id: ClusterId,
    settings: ClusterSettings,
    listener: Arc<SdamListener>,
    description: Mutex<ClusterDescription>,
    changed: Condvar,
    disposed: AtomicBool,
}

impl ClusterCore {
    pub fn new(settings: ClusterSettings) -> ClusterCore {
        let listener = match settings.listener {
            Some(ref listener) => listener.clone(),
            None => Arc::new(SdamListener::new()),
        };
        let description = ClusterDescription::new(settings.cluster_type);

        ClusterCore {
            cluster_id: ClusterId::new(),
            settings: settings,
            listener: listener,
            description: Mutex::new(description),
            changed: Condvar::new(),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn cluster_id(&self) -> ClusterId {
        self.cluster_id
    }

    pub fn settings(&self) -> &ClusterSettings {
        &self.settings
    }

    pub fn listener(&self) -> &SdamListener {
        &self.listener
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn throw_if_disposed(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(OperationError(
                "The cluster has been disposed.".to_owned(),
            ));
        }
        Ok(())
    }

    /// A snapshot of the current description.
    pub fn description(&self) -> Result<ClusterDescription> {
        let guard = self.description.lock()?;
        Ok(guard.clone())
    }

    /// Publishes a new topology description.
    ///
    /// Stamps the next revision, swaps the description under the lock, then
    /// notifies listener hooks before waking generic waiters. Listener code
    /// never runs while the description lock is held.
    pub fn update_description(&self, description: ClusterDescription)
                              -> Result<ClusterDescription> {
        let (old, published) = {
            let mut guard = self.description.lock()?;
            let published = description.with_revision(guard.revision + 1);
            let old = ::std::mem::replace(&mut *guard, published.clone());
            (old, published)
        };

        let event = ClusterDescriptionChangedEvent {
            cluster_id: self.cluster_id,
            old_description: old,
            new_description: published.clone(),
        };
        let _ = self.listener.run_description_changed_hooks(&event);

        self.changed.notify_all();
        Ok(published)
    }

    /// Marks the core disposed and publishes the final description.
    ///
    /// Waiters already blocked on the change signal are not interrupted;
    /// they wake against the final, disposed-state description.
    pub fn dispose(&self) -> Result<()> {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            let current = self.description()?;
            self.update_description(current.with_state(ClusterState::Disposed))?;
        }
        Ok(())
    }

    /// Waits for a description with revision at least `minimum_revision`.
    ///
    /// The timeout budget slides across wait iterations: however many times
    /// the description changes without satisfying the revision requirement,
    /// the caller's overall deadline holds.
    pub fn get_description(&self, minimum_revision: u64, timeout: Duration,
                           token: &CancellationToken) -> Result<ClusterDescription> {
        self.throw_if_disposed()?;

        let deadline = Instant::now() + timeout;
        let mut guard = self.description.lock()?;

        loop {
            if token.is_cancelled() {
                return Err(CancellationError(
                    "The wait for a topology description was cancelled.".to_owned(),
                ));
            }

            if guard.revision >= minimum_revision {
                return Ok(guard.clone());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(TimeoutError(format!(
                    "No description with revision {} was published within the timeout.",
                    minimum_revision
                )));
            }

            let (next_guard, _) = self.changed.wait_timeout(guard, deadline - now)?;
            guard = next_guard;
        }
    }

    /// Selects one live server, retrying as the topology changes.
    ///
    /// Each pass snapshots the description, pre-filters to connected
    /// servers, applies the caller's selector, breaks remaining ties
    /// uniformly at random, and resolves the chosen endpoint through
    /// `resolve`. A candidate whose server was concurrently removed is
    /// discarded and the next candidate is tried without re-running the
    /// selector. When no candidate resolves, the pass suspends until the
    /// next published description or the sliding deadline.
    pub fn select_server_with<F>(&self, selector: &ServerSelector, timeout: Duration,
                                 token: &CancellationToken, resolve: F)
                                 -> Result<Arc<ClusterableServer>>
        where F: Fn(&Host) -> Option<Arc<ClusterableServer>>
    {
        self.throw_if_disposed()?;

        let deadline = Instant::now() + timeout;

        loop {
            if token.is_cancelled() {
                return Err(CancellationError(
                    "Server selection was cancelled.".to_owned(),
                ));
            }

            let description = self.description()?;
            let snapshot_revision = description.revision;

            let connected: Vec<ServerDescription> = description
                .servers
                .iter()
                .filter(|server| server.state == ServerState::Connected)
                .cloned()
                .collect();

            let mut eligible = selector.select_servers(&description, &connected);

            while !eligible.is_empty() {
                let index = if eligible.len() == 1 {
                    0
                } else {
                    thread_rng().gen_range(0, eligible.len())
                };
                let candidate = eligible.remove(index);

                if let Some(server) = resolve(&candidate.host) {
                    return Ok(server);
                }
            }

            // Nothing eligible resolved; wait for the topology to move.
            let now = Instant::now();
            if now >= deadline {
                return Err(TimeoutError(
                    "No server matching the selector became available within the timeout."
                        .to_owned(),
                ));
            }

            let guard = self.description.lock()?;
            if guard.revision == snapshot_revision {
                let _ = self.changed.wait_timeout(guard, deadline - now)?;
            }
        }
    }
}
