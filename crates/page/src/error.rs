use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    #[error("no such node: {0}")]
    NoSuchNode(usize),

    #[error("page function failed: {0}")]
    ScriptFailed(String),

    #[error("page function requires page globals")]
    NeedsPageGlobals,
}

pub type Result<T> = std::result::Result<T, Error>;
