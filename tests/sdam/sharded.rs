use mongodb_sdam::topology::{Cluster, ClusterType, MultiServerCluster};
use mongodb_sdam::topology::server::ServerType;
use mongodb_sdam::topology::settings::ClusterSettings;

use super::framework::{host, primary, shard_router, standalone, wait_until,
                       MockServerFactory};

#[test]
fn routers_accumulate_in_a_sharded_topology() {
    let a = host("a", 27017);
    let b = host("b", 27017);
    let factory = MockServerFactory::new();
    let settings = ClusterSettings::new(vec![a.clone(), b.clone()])
        .with_cluster_type(ClusterType::Sharded);
    let cluster = MultiServerCluster::new(settings, factory.clone()).unwrap();
    cluster.initialize().unwrap();

    factory.server(&a).publish(shard_router(&a));
    factory.server(&b).publish(shard_router(&b));

    assert!(wait_until(|| {
        let description = cluster.description().unwrap();
        description.servers.len() == 2
            && description
                .servers
                .iter()
                .all(|server| server.server_type == ServerType::ShardRouter)
    }));

    cluster.dispose().unwrap();
}

#[test]
fn non_router_is_removed_from_a_sharded_topology() {
    let a = host("a", 27017);
    let b = host("b", 27017);
    let factory = MockServerFactory::new();
    let settings = ClusterSettings::new(vec![a.clone(), b.clone()])
        .with_cluster_type(ClusterType::Sharded);
    let cluster = MultiServerCluster::new(settings, factory.clone()).unwrap();
    cluster.initialize().unwrap();

    factory.server(&a).publish(shard_router(&a));
    factory.server(&b).publish(primary(&b, "shire", &[b.clone()]));

    assert!(wait_until(|| cluster.description().unwrap().server(&b).is_none()));
    assert!(factory.server(&b).is_disposed());
    assert!(cluster.description().unwrap().server(&a).is_some());

    cluster.dispose().unwrap();
}

#[test]
fn standalone_with_two_seeds_drops_the_responder() {
    let a = host("a", 27017);
    let b = host("b", 27017);
    let factory = MockServerFactory::new();
    let settings = ClusterSettings::new(vec![a.clone(), b.clone()])
        .with_cluster_type(ClusterType::Standalone);
    let cluster = MultiServerCluster::new(settings, factory.clone()).unwrap();
    cluster.initialize().unwrap();

    // A standalone deployment cannot have two members; whichever endpoint
    // answers is treated as misconfigured.
    factory.server(&a).publish(standalone(&a));

    assert!(wait_until(|| cluster.description().unwrap().server(&a).is_none()));
    assert!(factory.server(&a).is_disposed());

    cluster.dispose().unwrap();
}

#[test]
fn direct_type_is_rejected() {
    let a = host("a", 27017);
    let settings = ClusterSettings::new(vec![a]).with_cluster_type(ClusterType::Direct);
    assert!(MultiServerCluster::new(settings, MockServerFactory::new()).is_err());
}

#[test]
fn at_least_one_seed_is_required() {
    let settings = ClusterSettings::new(Vec::new());
    assert!(MultiServerCluster::new(settings, MockServerFactory::new()).is_err());
}

#[test]
fn wrong_role_in_a_standalone_topology_is_marked_down() {
    let a = host("a", 27017);
    let factory = MockServerFactory::new();
    let settings = ClusterSettings::new(vec![a.clone()])
        .with_cluster_type(ClusterType::Standalone);
    let cluster = MultiServerCluster::new(settings, factory.clone()).unwrap();
    cluster.initialize().unwrap();

    factory.server(&a).publish(primary(&a, "shire", &[a.clone()]));

    assert!(wait_until(|| {
        let description = cluster.description().unwrap();
        description.server(&a).map_or(false, |server| {
            server.server_type == ServerType::Unknown
                && server.state == ::mongodb_sdam::topology::server::ServerState::Disconnected
        })
    }));
    // The endpoint is still monitored, so a correct report recovers it.
    factory.server(&a).publish(standalone(&a));
    assert!(wait_until(|| {
        let description = cluster.description().unwrap();
        description
            .server(&a)
            .map_or(false, |server| server.server_type == ServerType::Standalone)
    }));

    cluster.dispose().unwrap();
}
