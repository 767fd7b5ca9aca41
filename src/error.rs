use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::lock::LockTimeout;
use crate::query::QueryParseError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    LockTimeout(#[from] LockTimeout),

    #[error("lock {path:?} released without being held")]
    LockNotHeld { path: PathBuf },

    #[error("corrupt segment file {path:?}: {reason}")]
    CorruptSegment { path: PathBuf, reason: String },

    #[error(transparent)]
    QueryParse(#[from] QueryParseError),

    #[error("commit failed, index generation unchanged: {source}")]
    CommitFailure {
        #[source]
        source: Box<Error>,
    },

    #[error("{op} {}: {source}", display_path(.path))]
    Io {
        op: &'static str,
        path: Option<PathBuf>,
        #[source]
        source: io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("index reader is closed")]
    ReaderClosed,

    #[error("indexing queue is shut down")]
    QueueClosed,

    #[error("indexing worker panicked")]
    WorkerPanicked,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

fn display_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!("{:?}", path),
        None => "<stream>".to_string(),
    }
}

impl Error {
    pub fn corrupt<P: AsRef<Path>, R: fmt::Display>(path: P, reason: R) -> Error {
        Error::CorruptSegment {
            path: path.as_ref().to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub fn commit_failure(source: Error) -> Error {
        match source {
            already @ Error::CommitFailure { .. } => already,
            other => Error::CommitFailure {
                source: Box::new(other),
            },
        }
    }

    /// True for errors caused by a missing file, used by readers racing a
    /// concurrent commit.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Io { source, .. } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io {
            op: "io",
            path: None,
            source: e,
        }
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(e: rmp_serde::decode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(e: rmp_serde::encode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<fst::Error> for Error {
    fn from(e: fst::Error) -> Self {
        match e {
            fst::Error::Io(source) => Error::Io {
                op: "fst",
                path: None,
                source,
            },
            other => Error::Serialization(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Attaches the failing operation and path to an `io::Result`.
pub trait IoContext<T> {
    fn at<P: AsRef<Path>>(self, op: &'static str, path: P) -> Result<T>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn at<P: AsRef<Path>>(self, op: &'static str, path: P) -> Result<T> {
        self.map_err(|source| Error::Io {
            op,
            path: Some(path.as_ref().to_path_buf()),
            source,
        })
    }
}
