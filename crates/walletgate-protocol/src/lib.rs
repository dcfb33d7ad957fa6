//! Data model for walletgate.
//!
//! This crate defines the records that move between the wallet provider,
//! the lifecycle manager, and persistent storage:
//!
//! - **Types** ([`WalletState`], [`Session`], [`BalanceBreakdown`], etc.):
//!   what a wallet reports about itself and what we remember about a login.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those records are
//!   converted to/from bytes for the storage backstop.
//! - **Errors** ([`ProtocolError`]): what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer knows nothing about providers, timers, or storage
//! media. It only knows the shape of the data and how to serialize it.
//!
//! ```text
//! Provider (WalletState) → Protocol (Session) → Store (bytes)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod error;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    BalanceBreakdown, Metadata, Session, SignDataResult, TransactionResult,
    WalletState, UNKNOWN_ADDRESS,
};
