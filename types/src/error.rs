//! Errors raised while constructing fundamental types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    #[error("account id is empty")]
    EmptyAccountId,

    #[error("account id is the null identity")]
    NullAccountId,

    #[error("account id exceeds {max} characters")]
    AccountIdTooLong { max: usize },

    #[error("account id contains invalid character {0:?}")]
    InvalidAccountChar(char),

    #[error("invalid batch id: {0}")]
    InvalidBatchId(String),
}
