//! Server discovery and monitoring (SDAM) for MongoDB server sets.
//!
//! This crate tracks the topology of a MongoDB deployment: which servers
//! exist, what role each one currently plays, and which of them a given
//! operation may be sent to. Monitored servers report heartbeat results as
//! they complete; a cluster folds those reports into immutable
//! point-in-time descriptions and wakes every thread waiting on a fresher
//! view or on server selection.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use std::time::Duration;
//! # use mongodb_sdam::common::CancellationToken;
//! # use mongodb_sdam::topology::{Cluster, MultiServerCluster, ServerFactory};
//! # use mongodb_sdam::topology::select::WritableServerSelector;
//! # use mongodb_sdam::topology::settings::ClusterSettings;
//! # fn demo(factory: Arc<ServerFactory>) -> mongodb_sdam::Result<()> {
//! let settings = ClusterSettings::from_uri(
//!     "mongodb://localhost:27017,localhost:27018/?replicaSet=shire")?;
//! let cluster = MultiServerCluster::new(settings, factory)?;
//! cluster.initialize()?;
//!
//! let token = CancellationToken::new();
//! let server = cluster.select_server(&WritableServerSelector,
//!                                    Duration::from_secs(30), &token)?;
//! # drop(server);
//! cluster.dispose()?;
//! # Ok(())
//! # }
//! ```
extern crate bson;
extern crate chrono;
extern crate rand;
extern crate semver;

pub mod common;
pub mod connstring;
pub mod error;
pub mod topology;

pub use error::{Error, Result};
pub use topology::{Cluster, ClusterDescription, ClusterHandle, ClusterSettings,
                   ClusterType, MultiServerCluster, ServerDescription, ServerSelector,
                   SingleServerCluster, StandaloneCluster};
