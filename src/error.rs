use thiserror::Error;

use crate::linguist::StateClass;

/// All errors produced by trellis.
#[derive(Debug, Error)]
pub enum TrellisError {
    #[error("search manager is already started")]
    AlreadyStarted,

    #[error("search manager is not started")]
    NotStarted,

    #[error("linguist produced no initial search state")]
    MissingInitialState,

    #[error("linguist declared an empty search state order")]
    EmptyStateOrder,

    #[error("state class {0:?} is not in the declared state order")]
    UnknownStateClass(StateClass),

    #[error("illegal state order: {from:?} -> {to:?}")]
    IllegalStateOrder { from: StateClass, to: StateClass },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, TrellisError>;
