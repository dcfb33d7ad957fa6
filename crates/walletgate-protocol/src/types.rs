//! Core record types for walletgate.
//!
//! Two records matter:
//!
//! - [`WalletState`]: what the wallet says about itself when we connect.
//! - [`Session`]: what WE remember about the login: who, since when, and
//!   until when.
//!
//! Both serialize with camelCase keys, matching what the wallet provider
//! hands us and what a browser host keeps in its key-value storage.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Open mapping owned by the host application and attached to a session.
pub type Metadata = Map<String, Value>;

/// Address recorded in a session when the wallet reports none we recognize.
pub const UNKNOWN_ADDRESS: &str = "unknown";

// ---------------------------------------------------------------------------
// WalletState
// ---------------------------------------------------------------------------

/// Balance split reported by some provider versions.
///
/// Amounts are decimal strings: wallets report values that don't fit an
/// `f64` without loss, and we never do arithmetic on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceBreakdown {
    pub unshielded: String,
    pub shielded: String,
    pub total: String,
}

/// Snapshot of a connected wallet's public identity.
///
/// Every field is optional because different provider versions report
/// different subsets. The lifecycle manager replaces this struct
/// wholesale on every connect and never edits it field by field.
///
/// Unknown fields survive a round-trip in [`extra`](Self::extra): the
/// `#[serde(flatten)]` attribute collects every key serde didn't match
/// into that map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// The shielded address. Preferred whenever present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shield_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_legacy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_address: Option<String>,

    /// Total balance as a decimal string. Often absent: not every provider
    /// exposes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balances: Option<BalanceBreakdown>,

    /// Human-readable provider label, set by the manager on connect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coin_public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coin_public_key_legacy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_public_key_legacy: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Provider-specific fields the manager does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WalletState {
    /// Address used to key a new [`Session`].
    ///
    /// Preference: shielded, then legacy, then [`UNKNOWN_ADDRESS`].
    pub fn session_address(&self) -> String {
        first_present(&[&self.shield_address, &self.legacy_address])
            .unwrap_or(UNKNOWN_ADDRESS)
            .to_string()
    }

    /// Best-effort primary address for display: shielded, plain, legacy.
    pub fn primary_address(&self) -> Option<&str> {
        first_present(&[&self.shield_address, &self.address, &self.legacy_address])
    }

    /// Best-effort legacy-format address.
    pub fn alternate_legacy_address(&self) -> Option<&str> {
        first_present(&[&self.legacy_address, &self.address_legacy])
    }
}

/// Returns the first field that is set and non-empty.
///
/// Empty strings count as absent: wallets sometimes report `""` for an
/// address format they don't support.
fn first_present<'a>(fields: &[&'a Option<String>]) -> Option<&'a str> {
    fields
        .iter()
        .filter_map(|field| Option::as_deref(*field))
        .find(|value| !value.is_empty())
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The authenticated-session record.
///
/// Timestamps are milliseconds since the Unix epoch. We use wall-clock
/// time (not `Instant`) because the record is persisted and must still
/// mean something after a process restart.
///
/// ```text
///   new() ──→ [live] ──(refreshed / merge_metadata)──→ [live]
///                │
///                └──(now > expires_at)──→ [logically expired]
/// ```
///
/// A logically expired session may still sit in memory until the
/// watchdog clears it. Readers must ask [`is_expired_at`](Self::is_expired_at)
/// rather than trusting the record's mere presence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// The authenticated identity.
    pub address: String,
    /// When the session was created. Never changes afterwards.
    pub connected_at: u64,
    /// When the session stops being valid. `None` means never.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    /// Host-owned data. Merged, never replaced.
    #[serde(default)]
    pub metadata: Metadata,
}

impl Session {
    /// Creates a session starting at `now`, expiring `timeout_ms` later
    /// (or never, for `None`).
    pub fn new(address: impl Into<String>, now: u64, timeout_ms: Option<u64>) -> Self {
        Self {
            address: address.into(),
            connected_at: now,
            expires_at: timeout_ms.map(|t| now.saturating_add(t)),
            metadata: Metadata::new(),
        }
    }

    /// `true` once `now` is strictly past `expires_at`.
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|expires_at| now > expires_at)
    }

    /// Milliseconds until expiry, floored at 0. Also 0 when the session
    /// never expires, since there is nothing to count down.
    pub fn time_remaining_at(&self, now: u64) -> u64 {
        self.expires_at
            .map(|expires_at| expires_at.saturating_sub(now))
            .unwrap_or(0)
    }

    /// Returns a copy whose expiry is pushed to `now + timeout_ms`.
    /// Address, creation time, and metadata are carried over unchanged.
    pub fn refreshed(&self, now: u64, timeout_ms: u64) -> Self {
        Self {
            expires_at: Some(now.saturating_add(timeout_ms)),
            ..self.clone()
        }
    }

    /// Shallow-merges `patch` into the metadata. Keys in `patch` win.
    pub fn merge_metadata(&mut self, patch: Metadata) {
        self.metadata.extend(patch);
    }

    /// Rejects records no code path would write, e.g. a hand-edited
    /// storage entry with an empty address.
    pub fn validate(&self) -> Result<(), crate::ProtocolError> {
        if self.address.is_empty() {
            return Err(crate::ProtocolError::InvalidRecord(
                "session address is empty".into(),
            ));
        }
        if self.expires_at.is_some_and(|e| e < self.connected_at) {
            return Err(crate::ProtocolError::InvalidRecord(
                "session expires before it was created".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pass-through results
// ---------------------------------------------------------------------------

/// What a wallet returns after signing arbitrary data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignDataResult {
    pub signature: String,
    pub key: String,
}

/// What a wallet returns after submitting a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResult {
    pub tx_hash: String,
    pub success: bool,
}
