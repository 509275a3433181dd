//! Error types for the dojo registry

use crate::tokens::TeamId;
use thiserror::Error;

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// A presented token did not authorize the requested mutation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("no token found in request")]
    MissingToken,

    #[error("unknown team token {0:?}")]
    UnknownToken(String),

    #[error("token is not valid for team {0}")]
    TokenMismatch(TeamId),
}

/// The address supplied on registration could not be used
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("no address found in request")]
    Missing,

    #[error("bad server URL: {0}")]
    Malformed(String),
}

/// Errors that can occur in the registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error("no such team: {0}")]
    NoSuchTeam(TeamId),
}
