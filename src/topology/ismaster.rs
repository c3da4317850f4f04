//! Parsing of isMaster heartbeat replies into server descriptions.
//!
//! The wire exchange itself belongs to the monitoring collaborator; this
//! module only turns a raw reply document into the value types the topology
//! engine folds.
use bson::{self, Bson, oid};
use chrono::{DateTime, Utc};
use common::Tag;
use connstring::{self, Host};
use error::Error::ArgumentError;
use error::Result;

use super::server::{ReplicaSetConfig, ServerDescription, ServerState, ServerType};

/// The result of an isMaster command.
#[derive(Clone, Debug, PartialEq)]
pub struct IsMasterResult {
    pub ok: bool,
    pub is_master: bool,
    pub local_time: Option<DateTime<Utc>>,
    pub min_wire_version: i64,
    pub max_wire_version: i64,

    /// Shard-specific. mongos instances will add this field to the
    /// isMaster reply, and it will contain the value "isdbgrid".
    pub msg: String,

    // Replica set specific
    pub is_replica_set: bool,
    pub is_secondary: bool,
    pub arbiter_only: bool,
    pub passive: bool,
    pub hidden: bool,
    pub me: Option<Host>,
    pub hosts: Vec<Host>,
    pub passives: Vec<Host>,
    pub arbiters: Vec<Host>,
    pub tags: Vec<Tag>,
    pub set_name: String,
    pub set_version: Option<i32>,
    pub election_id: Option<oid::ObjectId>,
    pub primary: Option<Host>,
}

fn doc_truthy(doc: &bson::Document, key: &str) -> Result<bool> {
    match doc.get(key) {
        Some(&Bson::I32(v)) => Ok(v != 0),
        Some(&Bson::I64(v)) => Ok(v != 0),
        Some(&Bson::FloatingPoint(v)) => Ok(v != 0.0),
        _ => Err(ArgumentError(format!("result does not contain `{}`.", key))),
    }
}

fn doc_hosts(doc: &bson::Document, key: &str) -> Vec<Host> {
    match doc.get(key) {
        Some(&Bson::Array(ref arr)) => arr.iter()
            .filter_map(|bson| match bson {
                &Bson::String(ref s) => connstring::parse_host(s).ok(),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

impl IsMasterResult {
    /// Parses an isMaster response document from the server.
    pub fn new(doc: bson::Document) -> Result<IsMasterResult> {
        let ok = doc_truthy(&doc, "ok")?;

        let mut result = IsMasterResult {
            ok: ok,
            is_master: false,
            local_time: None,
            min_wire_version: 0,
            max_wire_version: 0,
            msg: String::new(),
            is_replica_set: false,
            is_secondary: false,
            arbiter_only: false,
            passive: false,
            hidden: false,
            me: None,
            hosts: Vec::new(),
            passives: Vec::new(),
            arbiters: Vec::new(),
            tags: Vec::new(),
            set_name: String::new(),
            set_version: None,
            election_id: None,
            primary: None,
        };

        if let Some(&Bson::Boolean(b)) = doc.get("ismaster") {
            result.is_master = b;
        }

        if let Some(&Bson::UtcDatetime(ref datetime)) = doc.get("localTime") {
            result.local_time = Some(datetime.clone());
        }

        if let Some(&Bson::I64(v)) = doc.get("minWireVersion") {
            result.min_wire_version = v;
        }

        if let Some(&Bson::I32(v)) = doc.get("minWireVersion") {
            result.min_wire_version = v as i64;
        }

        if let Some(&Bson::I64(v)) = doc.get("maxWireVersion") {
            result.max_wire_version = v;
        }

        if let Some(&Bson::I32(v)) = doc.get("maxWireVersion") {
            result.max_wire_version = v as i64;
        }

        if let Some(&Bson::String(ref s)) = doc.get("msg") {
            result.msg = s.to_owned();
        }

        if let Some(&Bson::Boolean(b)) = doc.get("secondary") {
            result.is_secondary = b;
        }

        if let Some(&Bson::Boolean(b)) = doc.get("isreplicaset") {
            result.is_replica_set = b;
        }

        if let Some(&Bson::Boolean(b)) = doc.get("arbiterOnly") {
            result.arbiter_only = b;
        }

        if let Some(&Bson::Boolean(b)) = doc.get("passive") {
            result.passive = b;
        }

        if let Some(&Bson::Boolean(b)) = doc.get("hidden") {
            result.hidden = b;
        }

        if let Some(&Bson::String(ref s)) = doc.get("setName") {
            result.set_name = s.to_owned();
        }

        if let Some(&Bson::I32(v)) = doc.get("setVersion") {
            result.set_version = Some(v);
        }

        if let Some(&Bson::String(ref s)) = doc.get("me") {
            result.me = Some(connstring::parse_host(s)?);
        }

        result.hosts = doc_hosts(&doc, "hosts");
        result.passives = doc_hosts(&doc, "passives");
        result.arbiters = doc_hosts(&doc, "arbiters");

        if let Some(&Bson::String(ref s)) = doc.get("primary") {
            result.primary = Some(connstring::parse_host(s)?);
        }

        if let Some(&Bson::Document(ref tags)) = doc.get("tags") {
            for (key, val) in tags.into_iter() {
                if let &Bson::String(ref tag) = val {
                    result.tags.push(Tag::new(key, tag));
                }
            }
        }

        match doc.get("electionId") {
            Some(&Bson::ObjectId(ref id)) => result.election_id = Some(id.clone()),
            Some(&Bson::Document(ref doc)) => {
                if let Some(&Bson::String(ref s)) = doc.get("$oid") {
                    result.election_id = Some(oid::ObjectId::with_string(s)?);
                }
            }
            _ => (),
        }

        Ok(result)
    }

    /// Classifies the server role implied by this reply.
    pub fn server_type(&self) -> ServerType {
        let set_name_empty = self.set_name.is_empty();
        let msg_empty = self.msg.is_empty();

        if msg_empty && set_name_empty && !self.is_replica_set {
            ServerType::Standalone
        } else if !msg_empty {
            ServerType::ShardRouter
        } else if self.is_master && !set_name_empty {
            ServerType::RSPrimary
        } else if self.is_secondary && !set_name_empty {
            ServerType::RSSecondary
        } else if self.arbiter_only && !set_name_empty {
            ServerType::RSArbiter
        } else if self.passive && !set_name_empty {
            ServerType::RSPassive
        } else if !set_name_empty {
            ServerType::RSOther
        } else if self.is_replica_set {
            ServerType::RSGhost
        } else {
            ServerType::Unknown
        }
    }

    /// The replica set membership carried by this reply, if any.
    pub fn replica_set_config(&self) -> Option<ReplicaSetConfig> {
        if self.set_name.is_empty() && self.hosts.is_empty() && self.passives.is_empty() &&
            self.arbiters.is_empty() {
            return None;
        }

        let mut members = self.hosts.clone();
        for host in self.passives.iter().chain(self.arbiters.iter()) {
            if !members.contains(host) {
                members.push(host.clone());
            }
        }

        let name = if self.set_name.is_empty() {
            None
        } else {
            Some(self.set_name.clone())
        };

        Some(ReplicaSetConfig::new(
            members,
            name,
            self.primary.clone(),
            self.set_version,
        ))
    }
}

impl ServerDescription {
    /// Builds a connected description for `host` from an isMaster reply.
    ///
    /// A not-ok reply produces a disconnected placeholder; partial failure
    /// of one server is topology data, never an error.
    pub fn from_ismaster(host: Host, ismaster: &IsMasterResult,
                         round_trip_time: i64) -> ServerDescription {
        if !ismaster.ok {
            return ServerDescription::disconnected(host);
        }

        let mut description = ServerDescription::new(host);
        description.state = ServerState::Connected;
        description.server_type = ismaster.server_type();
        description.round_trip_time = Some(round_trip_time);
        description.min_wire_version = ismaster.min_wire_version;
        description.max_wire_version = ismaster.max_wire_version;
        description.tags = ismaster.tags.clone();
        description.replica_set_config = ismaster.replica_set_config();
        description.election_id = ismaster.election_id.clone();
        description
    }
}
