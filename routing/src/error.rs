use thiserror::Error;

use crate::id::Id;

#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The bucket already holds its configured number of contacts.
    /// Always handled inside the routing table (split, probe or cache).
    #[error("bucket is full")]
    BucketFull,

    #[error("contact {0} is not in the routing table")]
    NotPresent(Id),

    #[error("bad id encoding: {0}")]
    BadEncoding(String),

    /// The bucket list no longer partitions the id space.
    /// This is a bug, callers should not try to recover from it.
    #[error("routing table invariant violated: {0}")]
    InvariantViolation(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
