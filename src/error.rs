use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("{0} used after it was closed")]
    ObjectDisposed(&'static str),

    #[error("failed to allocate {0}")]
    SessionAllocation(&'static str),
}
