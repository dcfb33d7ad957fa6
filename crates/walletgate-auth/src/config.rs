//! Manager configuration and the connection state machine.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use walletgate_protocol::WalletState;

use crate::AuthError;

// ---------------------------------------------------------------------------
// AuthConfig
// ---------------------------------------------------------------------------

/// How the manager treats the wallet's balance on connect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalancePolicy {
    /// Drop whatever balance the wallet reported. The supported wallet
    /// doesn't expose a reliable one; users check it in the wallet itself.
    #[default]
    Omit,
    /// Ask the wallet (`getBalance`, then `balances`) and fall back to no
    /// balance if it can't answer.
    Query,
}

/// Configuration for a [`WalletAuth`](crate::WalletAuth) manager.
///
/// Callbacks are not part of this struct (closures can't be serialized);
/// set them through [`WalletAuthBuilder`](crate::WalletAuthBuilder).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// How long a session lasts after connect or refresh.
    pub session_timeout: Duration,

    /// Reconnect at startup when a persisted, unexpired session exists.
    pub auto_connect: bool,

    /// How often the watchdog checks for session expiry.
    pub expiry_check_interval: Duration,

    /// Give up on `enable()` after this long. `None` waits as long as the
    /// user takes to answer the wallet prompt.
    pub connect_timeout: Option<Duration>,

    /// Written into [`WalletState::provider`] on connect.
    pub provider_label: String,

    pub balance_policy: BalancePolicy,

    /// Buffer size of the lifecycle event channel. A listener that falls
    /// further behind than this misses events (and is told so).
    pub event_capacity: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_timeout: Duration::from_secs(24 * 60 * 60),
            auto_connect: true,
            expiry_check_interval: Duration::from_secs(60),
            connect_timeout: None,
            provider_label: "Lace (Midnight)".to_string(),
            balance_policy: BalancePolicy::Omit,
            event_capacity: 16,
        }
    }
}

impl AuthConfig {
    /// Clamp values that would make the manager panic or misbehave.
    ///
    /// - `event_capacity` of 0 becomes 1 (Tokio rejects empty channels).
    /// - A zero `connect_timeout` is treated as no timeout: it would fail
    ///   every attempt before the wallet could answer.
    pub fn validated(mut self) -> Self {
        if self.event_capacity == 0 {
            tracing::warn!("event_capacity of 0, clamping to 1");
            self.event_capacity = 1;
        }
        if self.connect_timeout == Some(Duration::ZERO) {
            tracing::warn!("connect_timeout of 0, disabling timeout");
            self.connect_timeout = None;
        }
        self
    }

    /// `session_timeout` in the millisecond unit sessions are stored in.
    pub(crate) fn session_timeout_ms(&self) -> u64 {
        u64::try_from(self.session_timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

// ---------------------------------------------------------------------------
// Callbacks
// ---------------------------------------------------------------------------

pub type ConnectCallback = Arc<dyn Fn(&WalletState) + Send + Sync>;
pub type DisconnectCallback = Arc<dyn Fn() + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&AuthError) + Send + Sync>;

/// Host hooks invoked at lifecycle points.
///
/// They run synchronously on whichever task made the transition, after the
/// state change is visible. Calling back into the manager from a hook is
/// allowed.
#[derive(Clone, Default)]
pub struct Callbacks {
    pub on_connect: Option<ConnectCallback>,
    pub on_disconnect: Option<DisconnectCallback>,
    pub on_error: Option<ErrorCallback>,
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_connect", &self.on_connect.is_some())
            .field("on_disconnect", &self.on_disconnect.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ConnectionPhase
// ---------------------------------------------------------------------------

/// Where the manager is in the connection lifecycle.
///
/// Derived from the state flags, never stored. `is_connected` wins over
/// `is_connecting`, so reconnecting while connected stays `Connected`:
///
/// ```text
/// Disconnected ──connect()──→ Connecting ──ok──→ Connected ⟲ refresh / metadata
///      ↑                          │                  │
///      └────────── failure ───────┘                  │
///      └──────────────── disconnect() / expiry ──────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionPhase {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionPhase {
    /// Returns `true` if a transition from `self` to `target` can happen.
    pub fn can_transition_to(self, target: Self) -> bool {
        use ConnectionPhase::*;
        matches!(
            (self, target),
            (Disconnected, Connecting)
                | (Connecting, Connecting)
                | (Connecting, Connected)
                | (Connecting, Disconnected)
                | (Connected, Connected)
                | (Connected, Disconnected)
                // disconnect() is idempotent
                | (Disconnected, Disconnected)
        )
    }
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_config_default() {
        let config = AuthConfig::default();
        assert_eq!(config.session_timeout, Duration::from_secs(86_400));
        assert!(config.auto_connect);
        assert_eq!(config.expiry_check_interval, Duration::from_secs(60));
        assert_eq!(config.connect_timeout, None);
        assert_eq!(config.balance_policy, BalancePolicy::Omit);
    }

    #[test]
    fn test_validated_clamps_event_capacity() {
        let config = AuthConfig {
            event_capacity: 0,
            ..AuthConfig::default()
        }
        .validated();
        assert_eq!(config.event_capacity, 1);
    }

    #[test]
    fn test_validated_disables_zero_connect_timeout() {
        let config = AuthConfig {
            connect_timeout: Some(Duration::ZERO),
            ..AuthConfig::default()
        }
        .validated();
        assert_eq!(config.connect_timeout, None);
    }

    #[test]
    fn test_session_timeout_ms() {
        let config = AuthConfig {
            session_timeout: Duration::from_millis(1_000),
            ..AuthConfig::default()
        };
        assert_eq!(config.session_timeout_ms(), 1_000);
    }

    #[test]
    fn test_config_deserializes_with_defaults_for_missing_fields() {
        let config: AuthConfig =
            serde_json::from_str(r#"{"auto_connect": false}"#).unwrap();
        assert!(!config.auto_connect);
        assert_eq!(config.provider_label, "Lace (Midnight)");
    }

    #[test]
    fn test_phase_transitions() {
        use ConnectionPhase::*;
        assert!(Disconnected.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Disconnected));
        assert!(Connecting.can_transition_to(Connecting));
        assert!(Connected.can_transition_to(Connected));
        assert!(!Disconnected.can_transition_to(Connected));
        assert!(!Connected.can_transition_to(Connecting));
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(ConnectionPhase::Connecting.to_string(), "Connecting");
    }
}
