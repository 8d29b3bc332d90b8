use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("timed out waiting for extension connection")]
    ConnectionTimeout,

    #[error("broker closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, Error>;
