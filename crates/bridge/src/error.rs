use thiserror::Error;

use hb_protocol::messages;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{}", messages::NO_TABS)]
    NoTabs,

    #[error("tab not found: {0}")]
    TabNotFound(i64),

    #[error("{prefix}: {0}", prefix = messages::INVALID_PARAMS)]
    InvalidParams(String),

    #[error(transparent)]
    Engine(#[from] hb_engine::Error),

    #[error("{}", messages::EVALUATE_TIMED_OUT)]
    EvaluateTimedOut,

    #[error("{}", messages::EVALUATE_FAILED_ALL_WORLDS)]
    EvaluateFailedAllWorlds,

    #[error("navigation did not complete: {0}")]
    NavigationTimeout(String),

    #[error("screenshot failed: {0}")]
    Screenshot(String),

    #[error("{prefix}: {0}", prefix = messages::UNKNOWN_ACTION)]
    UnknownAction(String),

    #[error(transparent)]
    Ws(#[from] Box<tokio_tungstenite::tungstenite::Error>),
}

pub type Result<T> = std::result::Result<T, Error>;
