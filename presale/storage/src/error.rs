use std::{io, sync};

use failure::Fail;

#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "{}", _0)]
    Io(#[fail(cause)] io::Error),

    #[fail(display = "{}", _0)]
    Json(#[fail(cause)] serde_json::Error),

    #[fail(display = "{}", _0)]
    Csv(#[fail(cause)] csv::Error),

    #[fail(display = "Invalid tier configuration: {}", _0)]
    InvalidTier(String),

    #[fail(display = "No purchase ids left")]
    IdSpaceExhausted,

    #[fail(display = "Write rejected by storage backend")]
    WriteRejected,

    #[fail(display = "Another thread panicked while holding a lock")]
    PoisonError,
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::Io(error)
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Json(error)
    }
}

impl From<csv::Error> for Error {
    fn from(error: csv::Error) -> Self {
        Error::Csv(error)
    }
}

impl<T> From<sync::PoisonError<T>> for Error {
    fn from(_error: sync::PoisonError<T>) -> Self {
        Error::PoisonError
    }
}
