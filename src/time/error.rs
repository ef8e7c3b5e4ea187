use thiserror::Error;

/// An error that occurred while parsing a duration like `200ms`.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("'{0}' is not a duration, expected a number followed by a unit (e.g. 200ms)")]
    Syntax(String),
    #[error("Unit '{0}' not supported")]
    UnitNotSupported(String),
}
