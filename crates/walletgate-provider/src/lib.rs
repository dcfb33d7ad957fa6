//! Wallet provider abstraction for walletgate.
//!
//! Provides the [`WalletProvider`] and [`WalletApi`] traits that abstract
//! over whatever injects a wallet into the host (a browser extension, a
//! desktop bridge, a test stub), and the [`ProviderLocator`] seam through
//! which the lifecycle manager finds one.
//!
//! A provider is an external, non-deterministic oracle: it can appear or
//! disappear between two calls to [`ProviderLocator::locate`]. Locating
//! never fails; absence is `None`.
//!
//! ```text
//! ProviderLocator ──locate()──→ WalletProvider ──enable()──→ WalletApi
//!                                                              │
//!                               state / sign_data / submit_tx ─┘
//! ```

mod error;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod slot;

pub use error::ProviderError;
#[cfg(any(test, feature = "mock"))]
pub use mock::{MockProvider, MockWallet};
pub use slot::{InjectedSlot, NoProvider};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use walletgate_protocol::{SignDataResult, TransactionResult, WalletState};

/// Optional members a [`WalletApi`] may or may not expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    SignData,
    SubmitTx,
    Balances,
    GetBalance,
}

impl Capability {
    /// The member name as wallets document it.
    pub fn member(self) -> &'static str {
        match self {
            Self::SignData => "signData",
            Self::SubmitTx => "submitTx",
            Self::Balances => "balances",
            Self::GetBalance => "getBalance",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.member())
    }
}

/// Shielded/unshielded amounts as reported by [`WalletApi::balances`].
///
/// Integers here (wallets report base units); the manager converts them to
/// the decimal strings of [`BalanceBreakdown`](walletgate_protocol::BalanceBreakdown).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawBalances {
    pub unshielded: u128,
    pub shielded: u128,
}

/// The injected provider object, before the user has approved anything.
///
/// `#[async_trait]` boxes the returned futures so the trait stays
/// object-safe: the manager holds providers as `Arc<dyn WalletProvider>`.
#[async_trait]
pub trait WalletProvider: Send + Sync + 'static {
    /// Human-readable name, used in logs.
    fn name(&self) -> &str;

    /// Asks the wallet for access. May pop up an extension prompt and wait
    /// on the user for an unbounded amount of time.
    async fn enable(&self) -> Result<Arc<dyn WalletApi>, ProviderError>;

    /// Whether this origin has already been granted access.
    async fn is_enabled(&self) -> Result<bool, ProviderError>;
}

/// The per-connection handle returned by [`WalletProvider::enable`].
///
/// Only [`state`](Self::state) is mandatory. The other members are
/// optional in the wild, so their default implementations fail with
/// [`ProviderError::Unsupported`] and [`supports`](Self::supports)
/// reports `false`. Check before calling.
#[async_trait]
pub trait WalletApi: Send + Sync + 'static {
    /// Current public identity of the wallet.
    async fn state(&self) -> Result<WalletState, ProviderError>;

    /// Whether the optional member `capability` is implemented.
    fn supports(&self, _capability: Capability) -> bool {
        false
    }

    /// Signs an opaque payload with the key behind `address`.
    async fn sign_data(
        &self,
        _address: &str,
        _payload: &str,
    ) -> Result<SignDataResult, ProviderError> {
        Err(ProviderError::Unsupported(Capability::SignData.member()))
    }

    /// Submits an opaque transaction.
    async fn submit_tx(&self, _tx: &Value) -> Result<TransactionResult, ProviderError> {
        Err(ProviderError::Unsupported(Capability::SubmitTx.member()))
    }

    async fn balances(&self) -> Result<RawBalances, ProviderError> {
        Err(ProviderError::Unsupported(Capability::Balances.member()))
    }

    async fn get_balance(&self) -> Result<String, ProviderError> {
        Err(ProviderError::Unsupported(Capability::GetBalance.member()))
    }
}

/// Finds the currently injected provider, if any.
///
/// Implementations must never panic or block: this is called on every
/// connect attempt and from UI code that only wants to know whether to
/// show an "install wallet" hint.
pub trait ProviderLocator: Send + Sync + 'static {
    fn locate(&self) -> Option<Arc<dyn WalletProvider>>;
}

/// Any closure returning an optional provider is a locator.
impl<F> ProviderLocator for F
where
    F: Fn() -> Option<Arc<dyn WalletProvider>> + Send + Sync + 'static,
{
    fn locate(&self) -> Option<Arc<dyn WalletProvider>> {
        self()
    }
}
