// Error taxonomy shared by the naming, storage and upload layers.
// Backend-specific failures are mapped into these kinds at the `api`
// boundary, so nothing above it needs to know about HTTP or B2 codes.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Credentials were rejected or have expired. The user must reconfigure.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// An explicitly requested name is already taken.
    #[error("file `{0}` already exists")]
    NameConflict(String),

    /// Every random candidate collided with an existing object.
    #[error("could not find a unique name for the file in {attempts} attempts, try a longer name length")]
    NameExhausted { attempts: usize },

    #[error("`{0}` not found")]
    NotFound(String),

    /// Network or backend hiccup. Not retried automatically.
    #[error("temporary failure, try again: {0}")]
    Transient(String),

    #[error("{0}")]
    Unknown(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Unknown(format!("local file error: {}", err))
    }
}
