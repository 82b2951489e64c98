/// Shared error type used across all Tutorline crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// No identity token was presented.
    #[error("identity cookie not found")]
    MissingCredential,

    /// A token was presented but could not be decoded.
    #[error("invalid identity cookie")]
    InvalidIdentity,

    #[error("session store: {0}")]
    StoreUnavailable(String),

    #[error("assistants service: {0}")]
    ExternalService(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("cancelled")]
    Cancelled,

    #[error("HTTP: {0}")]
    Http(String),

    #[error("config: {0}")]
    Config(String),
}

impl Error {
    /// True for errors caused by the caller's credentials rather than by
    /// the server or its collaborators.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::MissingCredential | Error::InvalidIdentity)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
