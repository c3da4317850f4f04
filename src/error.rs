//! Error types for topology monitoring and server selection.
use bson::oid;

use std::{error, fmt, sync};

/// A type for results generated by this crate.
pub type Result<T> = ::std::result::Result<T, Error>;

/// The error type for topology monitoring and server selection.
#[derive(Debug)]
pub enum Error {
    /// A method was called with an invalid argument or invalid settings.
    ArgumentError(String),
    /// An operation was attempted in an invalid state, such as after disposal.
    OperationError(String),
    /// An operation did not complete before its deadline elapsed.
    TimeoutError(String),
    /// An operation was abandoned because its cancellation token was triggered.
    CancellationError(String),
    /// An internal invariant was broken; indicates a logic bug, not an
    /// environmental condition.
    InternalError(String),
    /// A lock was poisoned by a panicking thread.
    PoisonLockError,
}

impl<'a> From<&'a str> for Error {
    fn from(s: &str) -> Error {
        Error::OperationError(s.to_owned())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Error {
        Error::OperationError(s)
    }
}

impl From<oid::Error> for Error {
    fn from(err: oid::Error) -> Error {
        Error::ArgumentError(format!("Invalid object id: {}", err))
    }
}

impl<T> From<sync::PoisonError<T>> for Error {
    fn from(_: sync::PoisonError<T>) -> Error {
        Error::PoisonLockError
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            &Error::ArgumentError(ref inner) => inner.fmt(fmt),
            &Error::OperationError(ref inner) => inner.fmt(fmt),
            &Error::TimeoutError(ref inner) => inner.fmt(fmt),
            &Error::CancellationError(ref inner) => inner.fmt(fmt),
            &Error::InternalError(ref inner) => inner.fmt(fmt),
            &Error::PoisonLockError => write!(fmt, "Lock poisoned."),
        }
    }
}

impl error::Error for Error {
    fn description(&self) -> &str {
        match self {
            &Error::ArgumentError(ref inner) => inner,
            &Error::OperationError(ref inner) => inner,
            &Error::TimeoutError(ref inner) => inner,
            &Error::CancellationError(ref inner) => inner,
            &Error::InternalError(ref inner) => inner,
            &Error::PoisonLockError => "Lock poisoned",
        }
    }

    fn cause(&self) -> Option<&error::Error> {
        None
    }
}

impl Error {
    /// Returns true if the error represents an elapsed deadline.
    pub fn is_timeout(&self) -> bool {
        match self {
            &Error::TimeoutError(_) => true,
            _ => false,
        }
    }

    /// Returns true if the error represents a triggered cancellation token.
    pub fn is_cancellation(&self) -> bool {
        match self {
            &Error::CancellationError(_) => true,
            _ => false,
        }
    }
}
