//! Unified error type for walletgate.

use walletgate_auth::AuthError;
use walletgate_protocol::ProtocolError;
use walletgate_provider::ProviderError;
use walletgate_session::{SessionError, StorageError};

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `walletgate` meta-crate, you deal with this single
/// error type instead of importing errors from each sub-crate.
/// `#[from]` generates the `From` impls, so `?` converts automatically.
#[derive(Debug, thiserror::Error)]
pub enum WalletgateError {
    /// Connect/capability errors from the lifecycle manager.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A wallet call failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A storage backend failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A storage backend couldn't be set up.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A record couldn't be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
