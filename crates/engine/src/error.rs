use thiserror::Error;

use hb_protocol::messages;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{prefix}: {0}", prefix = messages::HANDLE_NOT_FOUND)]
    HandleNotFound(String),

    #[error("{prefix}: {0}", prefix = messages::HANDLE_GONE)]
    HandleGone(String),

    #[error("{}", messages::ELEMENT_NOT_FOUND)]
    ElementNotFound,

    #[error("{prefix}: {0}", prefix = messages::INVALID_PARAMS)]
    InvalidParams(String),

    #[error("{prefix}: {0}", prefix = messages::UNKNOWN_ACTION)]
    UnknownAction(String),

    #[error(transparent)]
    Page(#[from] hb_page::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
