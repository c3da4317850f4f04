//! Shared cluster ownership through reference-counted handles.
use common::CancellationToken;
use error::Error::OperationError;
use error::Result;

use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use super::cluster::Cluster;
use super::description::ClusterDescription;
use super::select::ServerSelector;
use super::server::ClusterableServer;

/// Tracks how many handles share a cluster and disposes it when the count
/// reaches zero.
///
/// The count starts at one for the creating handle. An optional hook runs
/// once, just before the cluster itself is disposed, so an owner registry
/// can drop its entry first.
pub struct ReferenceCountedCluster {
    cluster: Arc<Cluster>,
    reference_count: AtomicUsize,
    on_zero: Mutex<Option<Box<Fn() + Send>>>,
}

impl ReferenceCountedCluster {
    pub fn new(cluster: Arc<Cluster>) -> ReferenceCountedCluster {
        ReferenceCountedCluster {
            cluster: cluster,
            reference_count: AtomicUsize::new(1),
            on_zero: Mutex::new(None),
        }
    }

    pub fn with_disposal_hook(cluster: Arc<Cluster>, hook: Box<Fn() + Send>)
                              -> ReferenceCountedCluster {
        ReferenceCountedCluster {
            cluster: cluster,
            reference_count: AtomicUsize::new(1),
            on_zero: Mutex::new(Some(hook)),
        }
    }

    pub fn cluster(&self) -> &Cluster {
        &*self.cluster
    }

    pub fn reference_count(&self) -> usize {
        self.reference_count.load(Ordering::SeqCst)
    }

    pub fn increment_reference_count(&self) -> usize {
        self.reference_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Drops one reference. The last reference out runs the disposal hook
    /// and disposes the cluster, exactly once.
    pub fn decrement_reference_count(&self) -> Result<usize> {
        let previous = self.reference_count.fetch_sub(1, Ordering::SeqCst);
        if previous == 1 {
            let hook = self.on_zero.lock()?.take();
            if let Some(hook) = hook {
                hook();
            }
            self.cluster.dispose()?;
        }
        Ok(previous - 1)
    }
}

/// One owner's view of a shared cluster.
///
/// Each handle counts as one reference; disposing a handle releases that
/// reference and no more, so disposing the same handle twice is harmless.
/// `fork` hands out an additional handle over the same cluster.
pub struct ClusterHandle {
    owned: Arc<ReferenceCountedCluster>,
    disposed: AtomicBool,
}

impl ClusterHandle {
    pub fn new(cluster: Arc<Cluster>) -> ClusterHandle {
        ClusterHandle {
            owned: Arc::new(ReferenceCountedCluster::new(cluster)),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn with_disposal_hook(cluster: Arc<Cluster>, hook: Box<Fn() + Send>)
                              -> ClusterHandle {
        ClusterHandle {
            owned: Arc::new(ReferenceCountedCluster::with_disposal_hook(cluster, hook)),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn reference_count(&self) -> usize {
        self.owned.reference_count()
    }

    /// Creates another handle over the same cluster, adding a reference.
    pub fn fork(&self) -> Result<ClusterHandle> {
        self.throw_if_disposed()?;
        self.owned.increment_reference_count();
        Ok(ClusterHandle {
            owned: self.owned.clone(),
            disposed: AtomicBool::new(false),
        })
    }

    fn throw_if_disposed(&self) -> Result<()> {
        if self.disposed.load(Ordering::SeqCst) {
            Err(OperationError("The cluster handle has been disposed.".to_owned()))
        } else {
            Ok(())
        }
    }
}

impl Cluster for ClusterHandle {
    fn initialize(&self) -> Result<()> {
        self.throw_if_disposed()?;
        self.owned.cluster().initialize()
    }

    fn description(&self) -> Result<ClusterDescription> {
        self.throw_if_disposed()?;
        self.owned.cluster().description()
    }

    fn get_description(&self, minimum_revision: u64, timeout: Duration,
                       token: &CancellationToken) -> Result<ClusterDescription> {
        self.throw_if_disposed()?;
        self.owned.cluster().get_description(minimum_revision, timeout, token)
    }

    fn select_server(&self, selector: &ServerSelector, timeout: Duration,
                     token: &CancellationToken) -> Result<Arc<ClusterableServer>> {
        self.throw_if_disposed()?;
        self.owned.cluster().select_server(selector, timeout, token)
    }

    fn dispose(&self) -> Result<()> {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            self.owned.decrement_reference_count()?;
        }
        Ok(())
    }
}
