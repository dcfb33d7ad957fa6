//! Session persistence for walletgate.
//!
//! This crate owns the rules for keeping a [`Session`] record alive across
//! restarts:
//!
//! 1. **Time**: what "now" means ([`Clock`] trait)
//! 2. **Storage**: where bytes go ([`KeyValueStore`] trait, with
//!    [`MemoryStorage`] and [`FileStorage`])
//! 3. **Session store**: save/load/clear of the one session record, with
//!    expiry re-checked on load ([`SessionStore`])
//!
//! Persistence here is a durability *backstop*. Nothing in this crate is
//! allowed to fail the connection flow: [`SessionStore`] swallows every
//! storage error and logs it instead.
//!
//! # How it fits in the stack
//!
//! ```text
//! Auth layer (above)  ← owns the live session, mirrors it here
//!     ↕
//! Session layer (this crate)  ← persists and re-validates it
//!     ↕
//! Protocol layer (below)  ← provides Session, Codec
//! ```
//!
//! [`Session`]: walletgate_protocol::Session

mod clock;
mod error;
mod storage;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{SessionError, StorageError};
pub use storage::{FileStorage, KeyValueStore, MemoryStorage};
pub use store::{SESSION_STORAGE_KEY, SessionStore};
