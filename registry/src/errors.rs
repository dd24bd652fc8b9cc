use thiserror::Error;

/// Result type alias for registry operations.
pub type Result<T, E = RegistryError> = std::result::Result<T, E>;

/// Errors returned by the record store. Validation failures are never errors;
/// they are recorded on the records themselves.
#[derive(Error, Debug, PartialEq)]
pub enum RegistryError {
    #[error("client not found")]
    NotFound,

    #[error("another client already holds clave \"{0}\"")]
    DuplicateClave(String),
}
