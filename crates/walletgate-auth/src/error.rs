//! Error types for the auth layer.

use walletgate_provider::ProviderError;

/// Errors surfaced by [`WalletAuth`](crate::WalletAuth) and its views.
///
/// Connection failures are also recorded as text in
/// [`AuthState::error`](crate::AuthState::error); `connect()` itself never
/// returns them.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    /// No wallet provider is installed, or it hasn't been injected yet.
    #[error("Midnight Lace wallet not found. Please install and enable it.")]
    ProviderNotFound,

    /// `enable()` or the follow-up state query failed, or timed out.
    #[error("failed to connect wallet: {0}")]
    ConnectFailed(String),

    /// A capability was requested with no connected wallet, or the
    /// connected wallet doesn't implement it.
    #[error("wallet capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// A view outlived the manager it was created from.
    #[error("wallet auth manager is not running")]
    NotInitialized,

    /// A capability call reached the wallet and the wallet failed it.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_not_found_message_mentions_install() {
        let msg = AuthError::ProviderNotFound.to_string();
        assert!(msg.contains("not found"));
        assert!(msg.contains("install"));
    }

    #[test]
    fn test_provider_error_converts_transparently() {
        let err: AuthError = ProviderError::Rejected("user declined".into()).into();
        assert!(matches!(err, AuthError::Provider(_)));
        assert_eq!(err.to_string(), "request rejected by wallet: user declined");
    }
}
