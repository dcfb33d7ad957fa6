/// Errors reported by a wallet provider or its capability handle.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// The wallet refused the request (user declined the prompt, wallet
    /// locked, origin not authorized, ...).
    #[error("request rejected by wallet: {0}")]
    Rejected(String),

    /// The connected wallet does not implement this optional member.
    #[error("wallet does not support `{0}`")]
    Unsupported(&'static str),

    /// Anything else the provider threw at us.
    #[error("wallet provider error: {0}")]
    Other(String),
}
