use mongodb_sdam::topology::{Cluster, ClusterType, SingleServerCluster, StandaloneCluster};
use mongodb_sdam::topology::server::{ServerState, ServerType};
use mongodb_sdam::topology::settings::ClusterSettings;

use std::sync::Arc;

use super::framework::{host, primary, secondary, shard_router, standalone, wait_until,
                       MockServerFactory};

fn single_cluster(settings: ClusterSettings)
                  -> (SingleServerCluster, Arc<MockServerFactory>) {
    let factory = MockServerFactory::new();
    let cluster = SingleServerCluster::new(settings, factory.clone()).unwrap();
    cluster.initialize().unwrap();
    (cluster, factory)
}

#[test]
fn requires_exactly_one_endpoint() {
    let factory = MockServerFactory::new();
    let none = ClusterSettings::new(Vec::new());
    assert!(SingleServerCluster::new(none, factory.clone()).is_err());

    let two = ClusterSettings::new(vec![host("a", 27017), host("b", 27017)]);
    assert!(SingleServerCluster::new(two, factory).is_err());
}

#[test]
fn first_report_establishes_the_deployment_type() {
    let a = host("a", 27017);
    let (cluster, factory) = single_cluster(ClusterSettings::new(vec![a.clone()]));

    factory.server(&a).publish(standalone(&a));

    assert!(wait_until(|| {
        cluster.description().unwrap().cluster_type == ClusterType::Standalone
    }));
    let description = cluster.description().unwrap();
    assert_eq!(
        ServerType::Standalone,
        description.server(&a).unwrap().server_type
    );

    cluster.dispose().unwrap();
}

#[test]
fn conflicting_report_is_withheld_but_server_stays_monitored() {
    let a = host("a", 27017);
    let (cluster, factory) = single_cluster(ClusterSettings::new(vec![a.clone()]));

    factory.server(&a).publish(shard_router(&a));
    assert!(wait_until(|| {
        cluster.description().unwrap().cluster_type == ClusterType::Sharded
    }));

    // The endpoint now claims a role from a different deployment type.
    factory.server(&a).publish(primary(&a, "shire", &[a.clone()]));
    assert!(wait_until(|| cluster.description().unwrap().server(&a).is_none()));
    assert!(!factory.server(&a).is_disposed());

    // A report matching the established type restores it.
    factory.server(&a).publish(shard_router(&a));
    assert!(wait_until(|| cluster.description().unwrap().server(&a).is_some()));

    cluster.dispose().unwrap();
}

#[test]
fn declared_type_pins_the_deployment() {
    let a = host("a", 27017);
    let settings = ClusterSettings::new(vec![a.clone()])
        .with_cluster_type(ClusterType::ReplicaSet);
    let (cluster, factory) = single_cluster(settings);

    factory.server(&a).publish(standalone(&a));
    assert!(wait_until(|| cluster.description().unwrap().server(&a).is_none()));

    factory.server(&a).publish(secondary(&a, "shire", &[a.clone()]));
    assert!(wait_until(|| {
        let description = cluster.description().unwrap();
        description
            .server(&a)
            .map_or(false, |server| server.server_type == ServerType::RSSecondary)
    }));

    cluster.dispose().unwrap();
}

#[test]
fn down_report_is_folded_as_is() {
    let a = host("a", 27017);
    let (cluster, factory) = single_cluster(ClusterSettings::new(vec![a.clone()]));

    factory.server(&a).publish(standalone(&a));
    assert!(wait_until(|| {
        cluster.description().unwrap().cluster_type == ClusterType::Standalone
    }));

    let down = ::mongodb_sdam::topology::server::ServerDescription::disconnected(a.clone());
    factory.server(&a).publish(down);

    assert!(wait_until(|| {
        let description = cluster.description().unwrap();
        description
            .server(&a)
            .map_or(false, |server| server.state == ServerState::Disconnected)
    }));

    cluster.dispose().unwrap();
}

#[test]
fn dispose_releases_the_server() {
    let a = host("a", 27017);
    let (cluster, factory) = single_cluster(ClusterSettings::new(vec![a.clone()]));

    cluster.dispose().unwrap();

    assert!(factory.server(&a).is_disposed());
    assert!(cluster.description().is_err());
    cluster.dispose().unwrap();
}

#[test]
fn standalone_cluster_declares_its_type_up_front() {
    let a = host("a", 27017);
    let factory = MockServerFactory::new();
    let settings = ClusterSettings::new(vec![a.clone()]);
    let cluster = StandaloneCluster::new(settings, factory.clone()).unwrap();
    cluster.initialize().unwrap();

    assert_eq!(
        ClusterType::Standalone,
        cluster.description().unwrap().cluster_type
    );

    factory.server(&a).publish(standalone(&a));
    assert!(wait_until(|| {
        let description = cluster.description().unwrap();
        description
            .server(&a)
            .map_or(false, |server| server.server_type == ServerType::Standalone)
    }));

    cluster.dispose().unwrap();
}

#[test]
fn standalone_cluster_rejects_other_declared_types() {
    let a = host("a", 27017);
    let settings = ClusterSettings::new(vec![a]).with_cluster_type(ClusterType::Sharded);
    assert!(StandaloneCluster::new(settings, MockServerFactory::new()).is_err());
}
