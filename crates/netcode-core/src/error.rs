use thiserror::Error;

/// Errors surfaced to the host application.
///
/// Per the failure-semantics table, only state errors and transport errors
/// reach callers as `Err`; protocol and logical errors are logged and
/// dropped at the point of occurrence.
#[derive(Debug, Error)]
pub enum NetcodeError {
    #[error("operation requires role {expected:?}, but this session is {actual:?}")]
    RoleMismatch { expected: Role, actual: Role },

    #[error("not connected")]
    NotConnected,

    #[error("already connected")]
    AlreadyConnected,

    #[error("server is not listening")]
    NotListening,

    #[error("server is already listening")]
    AlreadyListening,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to decode message: {0}")]
    Decode(String),
}

/// The two roles a core instance can run as. Exactly one of `is_server` /
/// `is_client` is true for a given session (role exclusivity, spec §8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

pub type Result<T> = std::result::Result<T, NetcodeError>;
