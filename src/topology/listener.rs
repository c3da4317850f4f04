//! Structured notifications for topology changes.
//!
//! The listener is a best-effort audit surface, separate from the generic
//! "description changed" wakeup that selection waiters block on. Hooks run
//! before that wakeup is released, so listener-based observers always see a
//! change at least as early as generic pollers.
use connstring::Host;
use error::Result;

use std::ops::{Deref, DerefMut};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use super::ClusterId;
use super::description::ClusterDescription;

/// A server began being monitored by a cluster.
#[derive(Clone, Debug)]
pub struct ServerAddedEvent {
    pub cluster_id: ClusterId,
    pub host: Host,
}

/// A server stopped being monitored by a cluster.
#[derive(Clone, Debug)]
pub struct ServerRemovedEvent {
    pub cluster_id: ClusterId,
    pub host: Host,
    /// Why the server was removed, e.g. a wrong replica set name.
    pub reason: String,
}

/// A cluster published a new topology description.
#[derive(Clone, Debug)]
pub struct ClusterDescriptionChangedEvent {
    pub cluster_id: ClusterId,
    pub old_description: ClusterDescription,
    pub new_description: ClusterDescription,
}

pub type ServerAddedHook = fn(&ServerAddedEvent);
pub type ServerRemovedHook = fn(&ServerRemovedEvent);
pub type DescriptionChangedHook = fn(&ClusterDescriptionChangedEvent);

/// Dispatches topology notifications to registered hooks.
pub struct SdamListener {
    no_added_hooks: AtomicBool,
    no_removed_hooks: AtomicBool,
    no_changed_hooks: AtomicBool,
    added_hooks: RwLock<Vec<ServerAddedHook>>,
    removed_hooks: RwLock<Vec<ServerRemovedHook>>,
    changed_hooks: RwLock<Vec<DescriptionChangedHook>>,
}

impl SdamListener {
    pub fn new() -> SdamListener {
        SdamListener {
            no_added_hooks: AtomicBool::new(true),
            no_removed_hooks: AtomicBool::new(true),
            no_changed_hooks: AtomicBool::new(true),
            added_hooks: RwLock::new(Vec::new()),
            removed_hooks: RwLock::new(Vec::new()),
            changed_hooks: RwLock::new(Vec::new()),
        }
    }

    pub fn add_server_added_hook(&self, hook: ServerAddedHook) -> Result<()> {
        let mut guard = self.added_hooks.write()?;
        self.no_added_hooks.store(false, Ordering::SeqCst);
        Ok(guard.deref_mut().push(hook))
    }

    pub fn add_server_removed_hook(&self, hook: ServerRemovedHook) -> Result<()> {
        let mut guard = self.removed_hooks.write()?;
        self.no_removed_hooks.store(false, Ordering::SeqCst);
        Ok(guard.deref_mut().push(hook))
    }

    pub fn add_description_changed_hook(&self, hook: DescriptionChangedHook) -> Result<()> {
        let mut guard = self.changed_hooks.write()?;
        self.no_changed_hooks.store(false, Ordering::SeqCst);
        Ok(guard.deref_mut().push(hook))
    }

    pub fn run_server_added_hooks(&self, event: &ServerAddedEvent) -> Result<()> {
        if self.no_added_hooks.load(Ordering::SeqCst) {
            return Ok(());
        }

        let guard = self.added_hooks.read()?;
        for hook in guard.deref().iter() {
            hook(event);
        }

        Ok(())
    }

    pub fn run_server_removed_hooks(&self, event: &ServerRemovedEvent) -> Result<()> {
        if self.no_removed_hooks.load(Ordering::SeqCst) {
            return Ok(());
        }

        let guard = self.removed_hooks.read()?;
        for hook in guard.deref().iter() {
            hook(event);
        }

        Ok(())
    }

    pub fn run_description_changed_hooks(&self,
                                         event: &ClusterDescriptionChangedEvent) -> Result<()> {
        if self.no_changed_hooks.load(Ordering::SeqCst) {
            return Ok(());
        }

        let guard = self.changed_hooks.read()?;
        for hook in guard.deref().iter() {
            hook(event);
        }

        Ok(())
    }
}

impl Default for SdamListener {
    fn default() -> SdamListener {
        SdamListener::new()
    }
}
