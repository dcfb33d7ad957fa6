//! # Walletgate
//!
//! Wallet-backed authentication sessions for Midnight dapps.
//!
//! Walletgate connects to an injected browser-extension wallet (Lace),
//! turns the connection into a time-boxed session, persists it so a
//! restart can reconnect silently, and disconnects when it expires.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use walletgate::prelude::*;
//!
//! # async fn run() -> Result<(), WalletgateError> {
//! init_tracing();
//!
//! let auth = walletgate::file_backed("./walletgate-state")?
//!     .config(AuthConfig::default())
//!     .on_connect(|wallet| println!("signed in as {}", wallet.session_address()))
//!     .build();
//!
//! auth.connect().await;
//! match auth.view().gate()? {
//!     AccessGate::Granted => println!("welcome"),
//!     AccessGate::Checking => println!("waiting for the wallet"),
//!     AccessGate::Denied => println!("connect your wallet"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Crates
//!
//! | Module | Concern |
//! |---|---|
//! | [`protocol`] | `WalletState`, `Session`, codec |
//! | [`provider`] | provider traits, injection slot, mock wallet (`mock` feature) |
//! | [`session`] | clock, storage backends, session store |
//! | [`watchdog`] | periodic expiry check |
//! | [`auth`] | the lifecycle manager and its views |

use std::path::Path;

mod error;
mod telemetry;

pub use error::WalletgateError;
pub use telemetry::{DEFAULT_FILTER, init_tracing};

pub use walletgate_auth as auth;
pub use walletgate_protocol as protocol;
pub use walletgate_provider as provider;
pub use walletgate_session as session;
pub use walletgate_watchdog as watchdog;

/// A manager builder that persists sessions as files under `dir`.
///
/// Fails if `dir` can't be created. Everything else keeps its default and
/// can still be overridden on the returned builder.
pub fn file_backed(dir: impl AsRef<Path>) -> Result<auth::WalletAuthBuilder, WalletgateError> {
    let storage = session::FileStorage::open(dir)?;
    Ok(auth::WalletAuth::builder().storage(storage))
}

pub mod prelude {
    pub use crate::{WalletgateError, file_backed, init_tracing};
    pub use walletgate_auth::{
        AccessGate, AuthConfig, AuthError, AuthState, AuthView, BalancePolicy, ConnectionPhase,
        LifecycleEvent, SessionView, WalletAuth, WalletAuthBuilder, WalletView,
    };
    pub use walletgate_protocol::{
        Metadata, Session, SignDataResult, TransactionResult, WalletState,
    };
    pub use walletgate_provider::{
        Capability, InjectedSlot, NoProvider, ProviderLocator, WalletApi, WalletProvider,
    };
    #[cfg(feature = "mock")]
    pub use walletgate_provider::{MockProvider, MockWallet};
    pub use walletgate_session::{
        Clock, FileStorage, KeyValueStore, ManualClock, MemoryStorage, SystemClock,
    };
}
