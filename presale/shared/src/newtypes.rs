//! Some newtypes.

use std::fmt;
use std::ops::Deref;

use uuid::Uuid;

/// Identifier shared by every log line emitted while serving one request.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> CorrelationId {
        CorrelationId(Uuid::new_v4())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        CorrelationId::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Represents a validated value.  Validation is user-specified.
#[derive(Clone, Debug, PartialEq)]
pub struct Validated<T>(T);

impl<T> Validated<T> {
    /// Creates a validated value from a given value and validation function.
    pub fn new<E, F>(v: T, guard: F) -> Result<Validated<T>, E>
    where
        F: Fn(&T) -> Result<(), E>,
    {
        guard(&v).map(|_| Validated(v))
    }

    pub fn into_raw(self) -> T {
        self.0
    }
}

impl<T> Deref for Validated<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}
