use std::sync;

use failure::Fail;

#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "Invalid JSON")]
    InvalidJson,

    #[fail(display = "{}", _0)]
    Validation(String),

    #[fail(display = "Amount must be greater than zero")]
    NonPositiveAmount,

    #[fail(display = "Duplicate transaction signature")]
    DuplicateSignature(String),

    #[fail(display = "Presale has not ended")]
    PresaleOngoing,

    #[fail(display = "Nothing to claim")]
    NothingToClaim(String),

    #[fail(display = "Unauthorized")]
    Unauthorized,

    #[fail(display = "Export failed: {}", _0)]
    Export(String),

    #[fail(display = "Storage error: {}", _0)]
    Storage(#[fail(cause)] storage::Error),

    #[fail(display = "Another thread panicked while holding a lock")]
    PoisonError,
}

impl Error {
    /// Whether the request itself was at fault (as opposed to the server).
    pub fn is_validation(&self) -> bool {
        match self {
            Error::InvalidJson | Error::Validation(_) | Error::NonPositiveAmount => true,
            _ => false,
        }
    }
}

impl From<storage::Error> for Error {
    fn from(error: storage::Error) -> Self {
        Error::Storage(error)
    }
}

impl<T> From<sync::PoisonError<T>> for Error {
    fn from(_error: sync::PoisonError<T>) -> Self {
        Error::PoisonError
    }
}
