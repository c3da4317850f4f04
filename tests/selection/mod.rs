use mongodb_sdam::common::{CancellationToken, ReadMode, ReadPreference, Tag};
use mongodb_sdam::topology::Cluster;
use mongodb_sdam::topology::description::ClusterDescription;
use mongodb_sdam::topology::select::{ReadPreferenceSelector, ServerSelector,
                                     WritableServerSelector};
use mongodb_sdam::topology::server::{ServerDescription, ServerType};

use std::thread;
use std::time::{Duration, Instant};

use sdam::framework::{self, host, primary, secondary, wait_until};

#[test]
fn writable_selector_picks_the_primary() {
    let a = host("a", 27017);
    let b = host("b", 27017);
    let (cluster, factory) = framework::replica_set_cluster(&[a.clone(), b.clone()]);
    let members = [a.clone(), b.clone()];

    factory.server(&a).publish(primary(&a, "shire", &members));
    factory.server(&b).publish(secondary(&b, "shire", &members));
    assert!(wait_until(|| {
        let description = cluster.description().unwrap();
        description
            .server(&b)
            .map_or(false, |server| server.server_type == ServerType::RSSecondary)
    }));

    let token = CancellationToken::new();
    let server = cluster
        .select_server(&WritableServerSelector, Duration::from_secs(5), &token)
        .unwrap();
    assert_eq!(a, server.host());

    cluster.dispose().unwrap();
}

#[test]
fn selection_blocks_until_an_eligible_server_appears() {
    let a = host("a", 27017);
    let b = host("b", 27017);
    let (cluster, factory) = framework::replica_set_cluster(&[a.clone(), b.clone()]);
    let members = [a.clone(), b.clone()];

    // No primary yet; a report arrives while selection is waiting.
    let publisher = {
        let factory = factory.clone();
        let a = a.clone();
        let members = members.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            factory.server(&a).publish(primary(&a, "shire", &members));
        })
    };

    let token = CancellationToken::new();
    let server = cluster
        .select_server(&WritableServerSelector, Duration::from_secs(5), &token)
        .unwrap();
    assert_eq!(a, server.host());

    publisher.join().unwrap();
    cluster.dispose().unwrap();
}

#[test]
fn selection_times_out_with_a_sliding_budget() {
    let a = host("a", 27017);
    let (cluster, _factory) = framework::replica_set_cluster(&[a.clone()]);

    let token = CancellationToken::new();
    let start = Instant::now();
    let result = cluster.select_server(&WritableServerSelector,
                                       Duration::from_millis(200), &token);
    let elapsed = start.elapsed();

    let err = result.unwrap_err();
    assert!(err.is_timeout());
    assert_abs_diff_eq!(
        elapsed.as_secs() as f64 + f64::from(elapsed.subsec_millis()) / 1000.0,
        0.2,
        epsilon = 0.15
    );

    cluster.dispose().unwrap();
}

#[test]
fn cancellation_is_reported_distinctly_from_timeout() {
    let a = host("a", 27017);
    let (cluster, _factory) = framework::replica_set_cluster(&[a.clone()]);

    let token = CancellationToken::new();
    let canceller = {
        let token = token.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            token.cancel();
        })
    };

    let result = cluster.select_server(&WritableServerSelector,
                                       Duration::from_secs(30), &token);
    let err = result.unwrap_err();
    assert!(err.is_cancellation());
    assert!(!err.is_timeout());

    canceller.join().unwrap();
    cluster.dispose().unwrap();
}

#[test]
fn get_description_waits_for_the_requested_revision() {
    let a = host("a", 27017);
    let (cluster, factory) = framework::replica_set_cluster(&[a.clone()]);

    let token = CancellationToken::new();
    let current = cluster
        .get_description(0, Duration::from_secs(5), &token)
        .unwrap();

    let publisher = {
        let factory = factory.clone();
        let a = a.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            factory.server(&a).publish(primary(&a, "shire", &[a.clone()]));
        })
    };

    let next = cluster
        .get_description(current.revision + 1, Duration::from_secs(5), &token)
        .unwrap();
    assert!(next.revision > current.revision);
    assert_eq!(
        ServerType::RSPrimary,
        next.server(&a).unwrap().server_type
    );

    publisher.join().unwrap();
    cluster.dispose().unwrap();
}

#[test]
fn get_description_times_out_when_no_revision_arrives() {
    let a = host("a", 27017);
    let (cluster, _factory) = framework::replica_set_cluster(&[a.clone()]);

    let token = CancellationToken::new();
    let current = cluster
        .get_description(0, Duration::from_secs(5), &token)
        .unwrap();

    let start = Instant::now();
    let result = cluster.get_description(current.revision + 10,
                                         Duration::from_millis(200), &token);
    let elapsed = start.elapsed();

    assert!(result.unwrap_err().is_timeout());
    assert_abs_diff_eq!(
        elapsed.as_secs() as f64 + f64::from(elapsed.subsec_millis()) / 1000.0,
        0.2,
        epsilon = 0.15
    );

    cluster.dispose().unwrap();
}

#[test]
fn revisions_increase_with_every_published_change() {
    let a = host("a", 27017);
    let (cluster, factory) = framework::replica_set_cluster(&[a.clone()]);

    let first = cluster.description().unwrap().revision;
    factory.server(&a).publish(primary(&a, "shire", &[a.clone()]));
    assert!(wait_until(|| cluster.description().unwrap().revision > first));

    let second = cluster.description().unwrap().revision;
    factory.server(&a).publish(secondary(&a, "shire", &[a.clone()]));
    assert!(wait_until(|| cluster.description().unwrap().revision > second));

    cluster.dispose().unwrap();
}

#[test]
fn descriptions_compare_equal_across_revisions() {
    let a = host("a", 27017);
    let one = ClusterDescription::new(::mongodb_sdam::topology::ClusterType::ReplicaSet)
        .with_server(primary(&a, "shire", &[a.clone()]))
        .with_revision(3);
    let two = one.with_revision(9);

    // Revision identifies the publication, not the content.
    assert_eq!(one, two);
}

fn tagged_secondary(host: &::mongodb_sdam::connstring::Host, set: &str,
                    members: &[::mongodb_sdam::connstring::Host], dc: &str)
                    -> ServerDescription {
    let mut description = secondary(host, set, members);
    description.tags = vec![Tag::new("dc", dc)];
    description
}

#[test]
fn read_preference_selector_honors_modes_and_tag_sets() {
    let a = host("a", 27017);
    let b = host("b", 27017);
    let c = host("c", 27017);
    let members = [a.clone(), b.clone(), c.clone()];

    let description = ClusterDescription::new(::mongodb_sdam::topology::ClusterType::ReplicaSet);
    let candidates = vec![
        primary(&a, "shire", &members),
        tagged_secondary(&b, "shire", &members, "pdx"),
        tagged_secondary(&c, "shire", &members, "nyc"),
    ];

    let primary_only = ReadPreferenceSelector::new(ReadPreference::new(ReadMode::Primary, None));
    let picked = primary_only.select_servers(&description, &candidates);
    assert_eq!(1, picked.len());
    assert_eq!(a, picked[0].host);

    let secondaries = ReadPreferenceSelector::new(ReadPreference::new(ReadMode::Secondary, None));
    assert_eq!(2, secondaries.select_servers(&description, &candidates).len());

    let nearest = ReadPreferenceSelector::new(ReadPreference::new(ReadMode::Nearest, None));
    assert_eq!(3, nearest.select_servers(&description, &candidates).len());

    // An earlier tag set that matches wins over later ones.
    let tagged = ReadPreferenceSelector::new(ReadPreference::new(
        ReadMode::Secondary,
        Some(vec![
            vec![Tag::new("dc", "syd")],
            vec![Tag::new("dc", "nyc")],
            vec![Tag::new("dc", "pdx")],
        ]),
    ));
    let picked = tagged.select_servers(&description, &candidates);
    assert_eq!(1, picked.len());
    assert_eq!(c, picked[0].host);

    // Primary reads ignore tag sets entirely.
    let tagged_primary = ReadPreferenceSelector::new(ReadPreference::new(
        ReadMode::Primary,
        Some(vec![vec![Tag::new("dc", "syd")]]),
    ));
    assert_eq!(1, tagged_primary.select_servers(&description, &candidates).len());
}

#[test]
fn closures_are_selectors_too() {
    let a = host("a", 27017);
    let b = host("b", 27017);
    let (cluster, factory) = framework::replica_set_cluster(&[a.clone(), b.clone()]);
    let members = [a.clone(), b.clone()];

    factory.server(&b).publish(secondary(&b, "shire", &members));
    assert!(wait_until(|| {
        let description = cluster.description().unwrap();
        description
            .server(&b)
            .map_or(false, |server| server.server_type == ServerType::RSSecondary)
    }));

    let wants_b = b.clone();
    let selector = move |_: &ClusterDescription, candidates: &[ServerDescription]| {
        candidates
            .iter()
            .filter(|server| server.host == wants_b)
            .cloned()
            .collect::<Vec<ServerDescription>>()
    };

    let token = CancellationToken::new();
    let server = cluster
        .select_server(&selector, Duration::from_secs(5), &token)
        .unwrap();
    assert_eq!(b, server.host());

    cluster.dispose().unwrap();
}
