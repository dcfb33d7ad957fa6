//! Error types for the session layer.

use std::path::PathBuf;

use walletgate_protocol::ProtocolError;

/// A storage read, write, or parse failure.
///
/// These never reach the user: [`SessionStore`](crate::SessionStore)
/// logs and swallows them, which degrades durability and nothing else.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The backend refused the operation (quota exceeded, storage
    /// disabled, private browsing, ...).
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Filesystem error from [`FileStorage`](crate::FileStorage).
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A key contains characters the backend can't represent.
    #[error("invalid storage key {0:?}")]
    InvalidKey(String),

    /// The stored value couldn't be encoded or decoded.
    #[error(transparent)]
    Codec(#[from] ProtocolError),
}

/// Errors from setting up session persistence.
///
/// Unlike [`StorageError`] these do surface: a host that asks for file
/// storage in a directory it can't create should hear about it at
/// startup, not discover later that nothing was ever saved.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The storage directory couldn't be created.
    #[error("cannot use storage directory {path}: {source}")]
    StorageDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
