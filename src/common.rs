//! Types shared between topology monitoring and server selection.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// The set of read modes for targeting members of a server set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    Primary,
    PrimaryPreferred,
    Secondary,
    SecondaryPreferred,
    Nearest,
}

/// Describes which servers are eligible for a read operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadPreference {
    /// The requested read mode.
    pub mode: ReadMode,
    /// Tag sets, in order of preference. A server matches a tag set if it
    /// carries every tag in the set.
    pub tag_sets: Vec<Vec<Tag>>,
}

impl ReadPreference {
    pub fn new(mode: ReadMode, tag_sets: Option<Vec<Vec<Tag>>>) -> ReadPreference {
        ReadPreference {
            mode: mode,
            tag_sets: tag_sets.unwrap_or(Vec::new()),
        }
    }
}

/// A single replica set member attribute, as reported by the member.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

impl Tag {
    pub fn new(name: &str, value: &str) -> Tag {
        Tag {
            name: name.to_owned(),
            value: value.to_owned(),
        }
    }
}

/// A cooperative cancellation flag shared between an operation and its caller.
///
/// Cloning the token shares the underlying flag; triggering any clone
/// cancels all of them.
#[derive(Clone, Debug)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Returns a fresh, untriggered token.
    pub fn new() -> CancellationToken {
        CancellationToken {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Trips the token and every clone sharing its flag.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Default for CancellationToken {
    fn default() -> CancellationToken {
        CancellationToken::new()
    }
}
