//! Wallet connection and session lifecycle for walletgate.
//!
//! A [`WalletAuth`] manager finds an injected wallet provider, asks it for
//! access, turns the answer into a time-boxed [`Session`], keeps that
//! session in a persistent store, and disconnects once it expires.
//!
//! # Key types
//!
//! - [`WalletAuth`]: the manager, built with [`WalletAuth::builder`]
//! - [`AuthState`]: the observable snapshot (`watch` channel)
//! - [`LifecycleEvent`]: connect/disconnect notifications (`broadcast`)
//! - [`AuthView`], [`SessionView`], [`WalletView`]: narrow handles for UI code
//! - [`AuthConfig`]: timeouts, auto-connect, balance policy
//!
//! # Example
//!
//! ```ignore
//! let auth = WalletAuth::builder()
//!     .config(AuthConfig::default())
//!     .locator(slot.clone())
//!     .storage(FileStorage::open("./state")?)
//!     .on_connect(|wallet| println!("hello {:?}", wallet.shield_address))
//!     .build();
//!
//! auth.connect().await;
//! if let Some(err) = auth.state().error {
//!     eprintln!("{err}");
//! }
//! ```
//!
//! [`Session`]: walletgate_protocol::Session

mod config;
mod error;
mod manager;
mod state;
mod views;

pub use config::{
    AuthConfig, BalancePolicy, Callbacks, ConnectCallback, ConnectionPhase, DisconnectCallback,
    ErrorCallback,
};
pub use error::AuthError;
pub use manager::{WalletAuth, WalletAuthBuilder};
pub use state::{AuthState, LifecycleEvent};
pub use views::{
    AUTO_REFRESH_THRESHOLD, AccessGate, AuthView, SessionView, WARNING_THRESHOLD, WalletView,
    format_duration, shorten_address,
};
