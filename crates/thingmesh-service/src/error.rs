//! Identity error types.

use thingmesh_core::error::Error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("missing credential")]
    MissingToken,

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("identity service did not answer in time")]
    Timeout,

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<IdentityError> for Error {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::MissingToken
            | IdentityError::TokenExpired
            | IdentityError::TokenInvalid(_)
            | IdentityError::Timeout => Error::Authentication {
                reason: err.to_string(),
            },
            IdentityError::Crypto(msg) => Error::Internal(msg),
        }
    }
}
