//! The observable auth state and the lifecycle events.

use serde::Serialize;
use walletgate_protocol::{Session, WalletState};

use crate::ConnectionPhase;

/// Everything the manager knows, as one snapshot.
///
/// Published through a `tokio::sync::watch` channel: subscribers always see
/// a consistent snapshot, never a half-applied transition.
///
/// Invariants, upheld by every transition:
/// - `is_connected` ⇔ `wallet_state.is_some()` ⇔ `session.is_some()`
/// - `session.address == wallet_state.session_address()` while connected
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    pub is_connected: bool,
    pub is_connecting: bool,
    pub wallet_state: Option<WalletState>,
    pub session: Option<Session>,
    /// Text of the last connection failure. Cleared when a new attempt
    /// starts, on disconnect, and by `clear_error()`.
    pub error: Option<String>,
}

impl AuthState {
    pub fn phase(&self) -> ConnectionPhase {
        if self.is_connected {
            ConnectionPhase::Connected
        } else if self.is_connecting {
            ConnectionPhase::Connecting
        } else {
            ConnectionPhase::Disconnected
        }
    }
}

/// Broadcast to every [`WalletAuth::events`](crate::WalletAuth::events)
/// subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// A connect attempt committed. Carries the wallet state as stored.
    Connected(WalletState),
    /// `disconnect()` ran, explicitly or because the session expired.
    Disconnected,
}

impl LifecycleEvent {
    /// Stable event name, for hosts that forward events onto a string bus.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "midnight:connected",
            Self::Disconnected => "midnight:disconnected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_disconnected() {
        let state = AuthState::default();
        assert_eq!(state.phase(), ConnectionPhase::Disconnected);
        assert!(state.wallet_state.is_none());
        assert!(state.error.is_none());
    }

    #[test]
    fn test_connected_wins_over_connecting() {
        // A reconnect while already connected keeps reporting Connected.
        let state = AuthState {
            is_connected: true,
            is_connecting: true,
            ..AuthState::default()
        };
        assert_eq!(state.phase(), ConnectionPhase::Connected);
    }

    #[test]
    fn test_event_names() {
        assert_eq!(
            LifecycleEvent::Connected(WalletState::default()).name(),
            "midnight:connected"
        );
        assert_eq!(LifecycleEvent::Disconnected.name(), "midnight:disconnected");
    }
}
