//! Read-mostly views over a running manager.
//!
//! UI code rarely wants the whole manager. A view is a narrow handle for
//! one concern: [`AuthView`] for gating access, [`SessionView`] for a
//! session timer, [`WalletView`] for wallet details.
//!
//! Views don't keep the manager alive. Once the last [`WalletAuth`] clone
//! is dropped, every view method returns [`AuthError::NotInitialized`].
//!
//! [`WalletAuth`]: crate::WalletAuth

use std::sync::{Arc, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use walletgate_protocol::{
    BalanceBreakdown, Metadata, Session, SignDataResult, TransactionResult, WalletState,
};

use crate::manager::Inner;
use crate::{AuthError, AuthState};

/// Below this much time left, a session counts as "expiring soon".
pub const WARNING_THRESHOLD: Duration = Duration::from_secs(10 * 60);

/// Below this much time left, [`SessionView::refresh_if_expiring`] with
/// this threshold extends the session.
pub const AUTO_REFRESH_THRESHOLD: Duration = Duration::from_secs(5 * 60);

// ---------------------------------------------------------------------------
// Shared plumbing
// ---------------------------------------------------------------------------

/// What every view holds: a weak manager reference and a state receiver.
#[derive(Clone)]
struct Scope {
    manager: Weak<Inner>,
    state: watch::Receiver<AuthState>,
}

impl Scope {
    fn new(inner: &Arc<Inner>) -> Self {
        Self {
            manager: Arc::downgrade(inner),
            state: inner.state.subscribe(),
        }
    }

    fn manager(&self) -> Result<Arc<Inner>, AuthError> {
        self.manager.upgrade().ok_or(AuthError::NotInitialized)
    }

    fn snapshot(&self) -> Result<AuthState, AuthError> {
        self.manager()?;
        Ok(self.state.borrow().clone())
    }

    async fn changed(&mut self) -> Result<AuthState, AuthError> {
        self.state
            .changed()
            .await
            .map_err(|_| AuthError::NotInitialized)?;
        Ok(self.state.borrow_and_update().clone())
    }
}

// ---------------------------------------------------------------------------
// AuthView
// ---------------------------------------------------------------------------

/// What a protected area should render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessGate {
    /// A connect attempt is running; show a "checking" placeholder.
    Checking,
    /// Not connected; show the fallback (usually a connect prompt).
    Denied,
    Granted,
}

impl AccessGate {
    pub fn from_state(state: &AuthState) -> Self {
        if state.is_connecting {
            Self::Checking
        } else if state.is_connected {
            Self::Granted
        } else {
            Self::Denied
        }
    }
}

/// The full auth surface: state plus every lifecycle operation.
#[derive(Clone)]
pub struct AuthView {
    scope: Scope,
}

impl AuthView {
    pub(crate) fn new(inner: &Arc<Inner>) -> Self {
        Self {
            scope: Scope::new(inner),
        }
    }

    pub fn state(&self) -> Result<AuthState, AuthError> {
        self.scope.snapshot()
    }

    pub fn is_connected(&self) -> Result<bool, AuthError> {
        Ok(self.scope.snapshot()?.is_connected)
    }

    pub fn is_connecting(&self) -> Result<bool, AuthError> {
        Ok(self.scope.snapshot()?.is_connecting)
    }

    pub fn error(&self) -> Result<Option<String>, AuthError> {
        Ok(self.scope.snapshot()?.error)
    }

    pub fn wallet_state(&self) -> Result<Option<WalletState>, AuthError> {
        Ok(self.scope.snapshot()?.wallet_state)
    }

    pub fn session(&self) -> Result<Option<Session>, AuthError> {
        Ok(self.scope.snapshot()?.session)
    }

    pub fn gate(&self) -> Result<AccessGate, AuthError> {
        Ok(AccessGate::from_state(&self.scope.snapshot()?))
    }

    /// Waits for the next state change and returns the new state.
    pub async fn changed(&mut self) -> Result<AuthState, AuthError> {
        self.scope.changed().await
    }

    pub async fn connect(&self) -> Result<(), AuthError> {
        self.scope.manager()?.connect().await;
        Ok(())
    }

    pub fn disconnect(&self) -> Result<(), AuthError> {
        self.scope.manager()?.disconnect();
        Ok(())
    }

    pub fn refresh_session(&self) -> Result<(), AuthError> {
        self.scope.manager()?.refresh_session();
        Ok(())
    }

    pub fn update_session_metadata(&self, patch: Metadata) -> Result<(), AuthError> {
        self.scope.manager()?.update_session_metadata(patch);
        Ok(())
    }

    pub fn clear_error(&self) -> Result<(), AuthError> {
        self.scope.manager()?.clear_error();
        Ok(())
    }

    pub fn provider_available(&self) -> Result<bool, AuthError> {
        Ok(self.scope.manager()?.provider_available())
    }

    pub async fn sign_data(
        &self,
        address: &str,
        payload: &str,
    ) -> Result<SignDataResult, AuthError> {
        self.scope.manager()?.sign_data(address, payload).await
    }

    pub async fn submit_transaction(&self, tx: &Value) -> Result<TransactionResult, AuthError> {
        self.scope.manager()?.submit_transaction(tx).await
    }
}

// ---------------------------------------------------------------------------
// SessionView
// ---------------------------------------------------------------------------

/// Session timing, for countdowns and "stay signed in?" prompts.
#[derive(Clone)]
pub struct SessionView {
    scope: Scope,
}

impl SessionView {
    pub(crate) fn new(inner: &Arc<Inner>) -> Self {
        Self {
            scope: Scope::new(inner),
        }
    }

    pub fn session(&self) -> Result<Option<Session>, AuthError> {
        Ok(self.scope.snapshot()?.session)
    }

    /// The session plus "now", read from the manager's clock.
    fn timed(&self) -> Result<(Option<Session>, u64), AuthError> {
        let inner = self.scope.manager()?;
        let session = self.scope.state.borrow().session.clone();
        Ok((session, inner.now_millis()))
    }

    /// `true` when a session exists and is past its expiry. The watchdog
    /// may not have cleared it yet.
    pub fn is_expired(&self) -> Result<bool, AuthError> {
        let (session, now) = self.timed()?;
        Ok(session.is_some_and(|s| s.is_expired_at(now)))
    }

    /// Time until expiry; zero without a session or without an expiry.
    pub fn time_remaining(&self) -> Result<Duration, AuthError> {
        let (session, now) = self.timed()?;
        Ok(session.map_or(Duration::ZERO, |s| {
            Duration::from_millis(s.time_remaining_at(now))
        }))
    }

    /// `true` when the session will expire within `threshold` but hasn't
    /// yet. A session without an expiry is never expiring soon.
    pub fn is_expiring_soon(&self, threshold: Duration) -> Result<bool, AuthError> {
        let (session, now) = self.timed()?;
        let Some(session) = session else {
            return Ok(false);
        };
        if session.expires_at.is_none() || session.is_expired_at(now) {
            return Ok(false);
        }
        let remaining = Duration::from_millis(session.time_remaining_at(now));
        Ok(!remaining.is_zero() && remaining < threshold)
    }

    /// [`is_expiring_soon`](Self::is_expiring_soon) with [`WARNING_THRESHOLD`].
    pub fn is_warning(&self) -> Result<bool, AuthError> {
        self.is_expiring_soon(WARNING_THRESHOLD)
    }

    /// Refreshes the session if it is expiring within `threshold`.
    /// Returns whether it refreshed.
    pub fn refresh_if_expiring(&self, threshold: Duration) -> Result<bool, AuthError> {
        if !self.is_expiring_soon(threshold)? {
            return Ok(false);
        }
        self.scope.manager()?.refresh_session();
        Ok(true)
    }

    /// Remaining time as `"Xh Ym"`, `"Xm Ys"` or `"Xs"`, or `"Expired"`.
    /// `None` without a session.
    pub fn format_remaining(&self) -> Result<Option<String>, AuthError> {
        let (session, now) = self.timed()?;
        Ok(session.map(|s| {
            if s.is_expired_at(now) {
                "Expired".to_string()
            } else {
                format_duration(Duration::from_millis(s.time_remaining_at(now)))
            }
        }))
    }

    pub fn refresh_session(&self) -> Result<(), AuthError> {
        self.scope.manager()?.refresh_session();
        Ok(())
    }

    pub fn update_session_metadata(&self, patch: Metadata) -> Result<(), AuthError> {
        self.scope.manager()?.update_session_metadata(patch);
        Ok(())
    }

    pub async fn changed(&mut self) -> Result<Option<Session>, AuthError> {
        Ok(self.scope.changed().await?.session)
    }
}

/// `"Xh Ym"` from an hour up, `"Xm Ys"` from a minute up, else `"Xs"`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

// ---------------------------------------------------------------------------
// WalletView
// ---------------------------------------------------------------------------

/// Wallet details and the two capabilities.
#[derive(Clone)]
pub struct WalletView {
    scope: Scope,
}

impl WalletView {
    pub(crate) fn new(inner: &Arc<Inner>) -> Self {
        Self {
            scope: Scope::new(inner),
        }
    }

    pub fn wallet_state(&self) -> Result<Option<WalletState>, AuthError> {
        Ok(self.scope.snapshot()?.wallet_state)
    }

    pub fn is_connected(&self) -> Result<bool, AuthError> {
        Ok(self.scope.snapshot()?.is_connected)
    }

    pub fn is_connecting(&self) -> Result<bool, AuthError> {
        Ok(self.scope.snapshot()?.is_connecting)
    }

    fn field<T>(&self, f: impl FnOnce(&WalletState) -> Option<T>) -> Result<Option<T>, AuthError> {
        Ok(self.wallet_state()?.as_ref().and_then(f))
    }

    /// Shielded address, then plain, then legacy.
    pub fn address(&self) -> Result<Option<String>, AuthError> {
        self.field(|w| w.primary_address().map(str::to_string))
    }

    pub fn legacy_address(&self) -> Result<Option<String>, AuthError> {
        self.field(|w| w.alternate_legacy_address().map(str::to_string))
    }

    /// [`address`](Self::address) shortened for display.
    pub fn short_address(&self) -> Result<Option<String>, AuthError> {
        Ok(self.address()?.map(|a| shorten_address(&a)))
    }

    pub fn balance(&self) -> Result<Option<String>, AuthError> {
        self.field(|w| w.balance.clone())
    }

    pub fn balances(&self) -> Result<Option<BalanceBreakdown>, AuthError> {
        self.field(|w| w.balances.clone())
    }

    pub fn provider(&self) -> Result<Option<String>, AuthError> {
        self.field(|w| w.provider.clone())
    }

    /// Extends the session and returns the balance as of the last
    /// connect. The balance itself is not re-queried.
    pub fn refresh_balance(&self) -> Result<Option<String>, AuthError> {
        self.scope.manager()?.refresh_session();
        self.balance()
    }

    pub async fn sign_data(
        &self,
        address: &str,
        payload: &str,
    ) -> Result<SignDataResult, AuthError> {
        self.scope.manager()?.sign_data(address, payload).await
    }

    pub async fn submit_transaction(&self, tx: &Value) -> Result<TransactionResult, AuthError> {
        self.scope.manager()?.submit_transaction(tx).await
    }

    pub async fn changed(&mut self) -> Result<Option<WalletState>, AuthError> {
        Ok(self.scope.changed().await?.wallet_state)
    }
}

/// First six and last four characters, e.g. `mn_shi...9xyz`. Addresses of
/// ten characters or fewer are returned unchanged.
pub fn shorten_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}
