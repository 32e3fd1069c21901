use thiserror::Error;

/// Failures reported by the remote store or the adapter in front of it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Remote store is not connected")]
    Disconnected,

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Remote command failed: {0}")]
    Command(String),

    #[error("Gave up connecting after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Remote store error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
