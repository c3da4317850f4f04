use mongodb_sdam::connstring::Host;
use mongodb_sdam::topology::ismaster::IsMasterResult;
use mongodb_sdam::topology::server::{ServerDescription, ServerState, ServerType};

use bson::oid::ObjectId;

#[test]
fn primary_reply_is_classified_and_carries_membership() {
    let oid = ObjectId::new().unwrap();
    let doc = doc! {
        "ok" => 1,
        "ismaster" => true,
        "setName" => "shire",
        "setVersion" => 2,
        "hosts" => ["a:27017", "b:27017"],
        "passives" => ["c:27017"],
        "arbiters" => ["d:27017"],
        "primary" => "a:27017",
        "electionId" => (oid.clone()),
        "minWireVersion" => 2,
        "maxWireVersion" => 6,
        "tags" => { "dc" => "pdx", "use" => "reporting" }
    };

    let result = IsMasterResult::new(doc).unwrap();
    assert!(result.ok);
    assert_eq!(ServerType::RSPrimary, result.server_type());
    assert_eq!(Some(oid), result.election_id);
    assert_eq!(2, result.min_wire_version);
    assert_eq!(6, result.max_wire_version);
    assert_eq!(2, result.tags.len());
    assert_eq!("dc", result.tags[0].name);
    assert_eq!("pdx", result.tags[0].value);

    let config = result.replica_set_config().unwrap();
    assert_eq!(Some("shire".to_owned()), config.name);
    assert_eq!(Some(2), config.version);
    assert_eq!(Some(Host::new("a", 27017)), config.primary);
    // Passives and arbiters count as members alongside the hosts list.
    assert_eq!(4, config.members.len());
    assert!(config.contains(&Host::new("c", 27017)));
    assert!(config.contains(&Host::new("d", 27017)));
}

#[test]
fn role_classification_covers_every_member_kind() {
    let secondary = doc! {
        "ok" => 1, "ismaster" => false, "secondary" => true, "setName" => "shire"
    };
    assert_eq!(
        ServerType::RSSecondary,
        IsMasterResult::new(secondary).unwrap().server_type()
    );

    let arbiter = doc! {
        "ok" => 1, "ismaster" => false, "arbiterOnly" => true, "setName" => "shire"
    };
    assert_eq!(
        ServerType::RSArbiter,
        IsMasterResult::new(arbiter).unwrap().server_type()
    );

    let passive = doc! {
        "ok" => 1, "ismaster" => false, "passive" => true, "setName" => "shire"
    };
    assert_eq!(
        ServerType::RSPassive,
        IsMasterResult::new(passive).unwrap().server_type()
    );

    let other = doc! {
        "ok" => 1, "ismaster" => false, "hidden" => true, "setName" => "shire"
    };
    assert_eq!(
        ServerType::RSOther,
        IsMasterResult::new(other).unwrap().server_type()
    );

    let ghost = doc! { "ok" => 1, "ismaster" => false, "isreplicaset" => true };
    assert_eq!(
        ServerType::RSGhost,
        IsMasterResult::new(ghost).unwrap().server_type()
    );

    let router = doc! { "ok" => 1, "ismaster" => true, "msg" => "isdbgrid" };
    assert_eq!(
        ServerType::ShardRouter,
        IsMasterResult::new(router).unwrap().server_type()
    );

    let standalone = doc! { "ok" => 1, "ismaster" => true };
    assert_eq!(
        ServerType::Standalone,
        IsMasterResult::new(standalone).unwrap().server_type()
    );
}

#[test]
fn not_ok_reply_produces_a_disconnected_placeholder() {
    let doc = doc! { "ok" => 0, "errmsg" => "not authorized" };
    let result = IsMasterResult::new(doc).unwrap();
    assert!(!result.ok);

    let host = Host::new("a", 27017);
    let description = ServerDescription::from_ismaster(host.clone(), &result, 42);
    assert_eq!(host, description.host);
    assert_eq!(ServerState::Disconnected, description.state);
    assert_eq!(ServerType::Unknown, description.server_type);
    assert_eq!(None, description.round_trip_time);
}

#[test]
fn ok_reply_builds_a_connected_description() {
    let doc = doc! {
        "ok" => 1,
        "ismaster" => false,
        "secondary" => true,
        "setName" => "shire",
        "hosts" => ["a:27017", "b:27017"],
        "maxWireVersion" => 6
    };
    let result = IsMasterResult::new(doc).unwrap();

    let description = ServerDescription::from_ismaster(Host::new("b", 27017), &result, 7);
    assert_eq!(ServerState::Connected, description.state);
    assert_eq!(ServerType::RSSecondary, description.server_type);
    assert_eq!(Some(7), description.round_trip_time);
    assert_eq!(Some("shire".to_owned()), description.set_name());
    assert!(description.is_compatible());
}

#[test]
fn extended_json_election_id_is_accepted() {
    let doc = doc! {
        "ok" => 1,
        "ismaster" => true,
        "setName" => "shire",
        "electionId" => { "$oid" => "507f1f77bcf86cd799439011" }
    };
    let result = IsMasterResult::new(doc).unwrap();
    assert_eq!(
        "507f1f77bcf86cd799439011",
        result.election_id.unwrap().to_hex()
    );
}

#[test]
fn missing_ok_field_is_an_error() {
    assert!(IsMasterResult::new(doc! { "ismaster" => true }).is_err());
}
