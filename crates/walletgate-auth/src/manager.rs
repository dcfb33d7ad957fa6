//! The wallet auth manager: connect, session, expiry, disconnect.
//!
//! One [`WalletAuth`] owns the whole lifecycle. Its state lives in a
//! `watch` channel (readers get snapshots, never a half-applied change),
//! lifecycle events go out on a `broadcast` channel, and a watchdog task
//! disconnects once the session expires.
//!
//! # Concurrency
//!
//! Transitions are serialized by the `epoch` lock. Each `disconnect()`
//! bumps the epoch; a connect attempt remembers the epoch it started in
//! and refuses to commit if it changed while the wallet prompt was open.
//! Only one live connect attempt runs at a time: overlapping `connect()`
//! calls await the same shared future. An attempt from an older epoch is
//! never joined; `disconnect()` detaches it and the next `connect()`
//! starts over.
//!
//! Lock order is `in_flight` → `epoch` → (`api`, `watchdog`). The `watch`
//! lock is only ever taken innermost, and callbacks run with no lock held.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};
use walletgate_protocol::{
    BalanceBreakdown, Metadata, Session, SignDataResult, TransactionResult, WalletState,
};
use walletgate_provider::{Capability, InjectedSlot, ProviderLocator, WalletApi};
use walletgate_session::{Clock, KeyValueStore, MemoryStorage, SessionStore, SystemClock};
use walletgate_watchdog::{Verdict, WatchdogConfig, WatchdogHandle};

use crate::views::{AuthView, SessionView, WalletView};
use crate::{AuthConfig, AuthError, AuthState, BalancePolicy, Callbacks, LifecycleEvent};

/// A connect attempt that any number of callers can await.
type Attempt = Shared<BoxFuture<'static, ()>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Every critical section below assigns whole values; a panic can't
    // leave one half-written.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// WalletAuth
// ---------------------------------------------------------------------------

/// Manages one wallet connection and its session.
///
/// Cheap to clone; clones share the same manager. The manager shuts down
/// (watchdog included) when the last clone is dropped.
#[derive(Clone)]
pub struct WalletAuth {
    inner: Arc<Inner>,
}

impl WalletAuth {
    /// A manager with `config`, the process-wide [`InjectedSlot`],
    /// in-memory storage and the system clock.
    pub fn new(config: AuthConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn builder() -> WalletAuthBuilder {
        WalletAuthBuilder::default()
    }

    /// Current state snapshot.
    pub fn state(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    /// A receiver that wakes on every state change.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    /// Lifecycle events from now on.
    pub fn events(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.inner.events.subscribe()
    }

    pub fn config(&self) -> &AuthConfig {
        &self.inner.config
    }

    /// Connects to the wallet.
    ///
    /// Never fails: a failure is recorded in [`AuthState::error`] and
    /// reported to `on_error`. If an attempt is already running, this
    /// awaits that attempt instead of starting another one.
    pub async fn connect(&self) {
        self.inner.connect().await;
    }

    /// Drops the connection and the session, and clears the stored record.
    ///
    /// Safe to call in any state. Always emits
    /// [`LifecycleEvent::Disconnected`], even when nothing was connected.
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    /// Restarts the session timeout from now. No-op without a session.
    pub fn refresh_session(&self) {
        self.inner.refresh_session();
    }

    /// Merges `patch` into the session metadata (top-level keys replace).
    /// No-op without a session.
    pub fn update_session_metadata(&self, patch: Metadata) {
        self.inner.update_session_metadata(patch);
    }

    pub fn clear_error(&self) {
        self.inner.clear_error();
    }

    /// Asks the connected wallet to sign `payload` with `address`'s key.
    pub async fn sign_data(
        &self,
        address: &str,
        payload: &str,
    ) -> Result<SignDataResult, AuthError> {
        self.inner.sign_data(address, payload).await
    }

    pub async fn submit_transaction(&self, tx: &Value) -> Result<TransactionResult, AuthError> {
        self.inner.submit_transaction(tx).await
    }

    /// The raw capability handle of the connected wallet.
    pub fn wallet_api(&self) -> Option<Arc<dyn WalletApi>> {
        lock(&self.inner.api).clone()
    }

    /// Whether a provider is currently injected. Looked up fresh each call.
    pub fn provider_available(&self) -> bool {
        self.inner.provider_available()
    }

    /// Whether the injected provider reports this origin as already
    /// authorized. `false` without a provider or if the query fails.
    pub async fn is_provider_enabled(&self) -> bool {
        let Some(provider) = self.inner.locator.locate() else {
            return false;
        };
        match provider.is_enabled().await {
            Ok(enabled) => enabled,
            Err(e) => {
                debug!(error = %e, "isEnabled query failed");
                false
            }
        }
    }

    /// The persisted session record, re-validated against the clock.
    pub fn stored_session(&self) -> Option<Session> {
        self.inner.store.load()
    }

    /// Stops the expiry watchdog without touching the session.
    ///
    /// Dropping the last clone does this too; call it when the manager has
    /// to stay reachable but should stop doing background work.
    pub fn shutdown(&self) {
        if lock(&self.inner.watchdog).take().is_some() {
            debug!("expiry watchdog stopped");
        }
    }

    pub fn view(&self) -> AuthView {
        AuthView::new(&self.inner)
    }

    pub fn session_view(&self) -> SessionView {
        SessionView::new(&self.inner)
    }

    pub fn wallet_view(&self) -> WalletView {
        WalletView::new(&self.inner)
    }

    fn spawn_auto_connect(&self) {
        let Some(stored) = self.inner.store.load() else {
            debug!("no stored session, skipping auto-connect");
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("auto_connect needs a Tokio runtime, skipping");
            return;
        };

        info!(address = %stored.address, "stored session found, reconnecting");
        let auth = self.clone();
        runtime.spawn(async move {
            auth.connect().await;
            if !auth.inner.state.borrow().is_connected {
                info!("auto-connect failed, discarding stored session");
                auth.inner.store.clear();
            }
        });
    }
}

impl std::fmt::Debug for WalletAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletAuth")
            .field("phase", &self.inner.state.borrow().phase())
            .field("config", &self.inner.config)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Assembles a [`WalletAuth`]. Everything has a default.
#[derive(Default)]
pub struct WalletAuthBuilder {
    config: AuthConfig,
    callbacks: Callbacks,
    locator: Option<Arc<dyn ProviderLocator>>,
    storage: Option<Arc<dyn KeyValueStore>>,
    clock: Option<Arc<dyn Clock>>,
    storage_key: Option<String>,
}

impl WalletAuthBuilder {
    pub fn config(mut self, config: AuthConfig) -> Self {
        self.config = config;
        self
    }

    /// Where to look for the wallet provider.
    pub fn locator(mut self, locator: impl ProviderLocator) -> Self {
        self.locator = Some(Arc::new(locator));
        self
    }

    /// Where the session record is persisted.
    pub fn storage(mut self, storage: impl KeyValueStore) -> Self {
        self.storage = Some(Arc::new(storage));
        self
    }

    /// Overrides the storage key (default `midnight_session`).
    pub fn storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = Some(key.into());
        self
    }

    pub fn clock(mut self, clock: impl Clock) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn on_connect(mut self, f: impl Fn(&WalletState) + Send + Sync + 'static) -> Self {
        self.callbacks.on_connect = Some(Arc::new(f));
        self
    }

    pub fn on_disconnect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.callbacks.on_disconnect = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&AuthError) + Send + Sync + 'static) -> Self {
        self.callbacks.on_error = Some(Arc::new(f));
        self
    }

    /// Builds the manager.
    ///
    /// With `auto_connect` on and an unexpired stored session, this spawns
    /// a reconnect attempt, which requires a Tokio runtime. Outside one the
    /// attempt is skipped with a warning.
    pub fn build(self) -> WalletAuth {
        let config = self.config.validated();
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        let mut store = SessionStore::new(storage, Arc::clone(&clock));
        if let Some(key) = self.storage_key {
            store = store.with_key(key);
        }
        let locator = self
            .locator
            .unwrap_or_else(|| Arc::new(InjectedSlot::global().clone()));

        let (state, _) = watch::channel(AuthState::default());
        let (events, _) = broadcast::channel(config.event_capacity);
        let auto_connect = config.auto_connect;

        let auth = WalletAuth {
            inner: Arc::new(Inner {
                config,
                callbacks: self.callbacks,
                locator,
                store,
                clock,
                state,
                events,
                api: Mutex::new(None),
                watchdog: Mutex::new(None),
                in_flight: Mutex::new(None),
                epoch: Mutex::new(0),
            }),
        };

        debug!(auto_connect, "wallet auth manager created");
        if auto_connect {
            auth.spawn_auto_connect();
        }
        auth
    }
}

// ---------------------------------------------------------------------------
// Inner
// ---------------------------------------------------------------------------

/// Shared manager state. Views hold a `Weak` to this.
pub(crate) struct Inner {
    config: AuthConfig,
    callbacks: Callbacks,
    locator: Arc<dyn ProviderLocator>,
    store: SessionStore,
    clock: Arc<dyn Clock>,
    pub(crate) state: watch::Sender<AuthState>,
    events: broadcast::Sender<LifecycleEvent>,
    /// Capability handle of the connected wallet.
    api: Mutex<Option<Arc<dyn WalletApi>>>,
    /// Dropping the handle aborts the task, so clearing this field (or
    /// dropping `Inner`) stops the watchdog.
    watchdog: Mutex<Option<WatchdogHandle>>,
    /// The live attempt, tagged with the epoch it started in.
    in_flight: Mutex<Option<(u64, Attempt)>>,
    /// Bumped on every disconnect.
    epoch: Mutex<u64>,
}

/// Ends an attempt, even if the attempt task panicked.
struct AttemptGuard {
    inner: Arc<Inner>,
    epoch: u64,
}

impl Drop for AttemptGuard {
    fn drop(&mut self) {
        // Under the slot lock, and only while this attempt still owns the
        // slot: a detached attempt must not clear its successor's flag.
        let mut slot = lock(&self.inner.in_flight);
        if slot.as_ref().is_some_and(|(epoch, _)| *epoch == self.epoch) {
            *slot = None;
            self.inner.transition(|s| s.is_connecting = false);
        }
    }
}

impl Inner {
    pub(crate) fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    /// Applies one state mutation. Phase changes must follow
    /// [`ConnectionPhase::can_transition_to`](crate::ConnectionPhase::can_transition_to).
    fn transition(&self, modify: impl FnOnce(&mut AuthState)) {
        self.state.send_modify(|s| {
            let before = s.phase();
            modify(s);
            let after = s.phase();
            debug_assert!(
                before.can_transition_to(after),
                "illegal phase change {before} -> {after}"
            );
        });
    }

    pub(crate) async fn connect(self: &Arc<Self>) {
        let attempt = {
            let mut slot = lock(&self.in_flight);
            let epoch = *lock(&self.epoch);
            match slot.as_ref() {
                Some((started, attempt)) if *started == epoch => {
                    debug!("connect already in progress, joining it");
                    attempt.clone()
                }
                stale => {
                    if stale.is_some() {
                        debug!("previous attempt was superseded, starting over");
                    }
                    self.transition(|s| {
                        s.is_connecting = true;
                        s.error = None;
                    });

                    // Spawned so the attempt finishes even if every caller
                    // stops awaiting it.
                    let guard = AttemptGuard {
                        inner: Arc::clone(self),
                        epoch,
                    };
                    let task = tokio::spawn(async move {
                        guard.inner.run_attempt(epoch).await;
                        drop(guard);
                    });
                    let attempt = async move {
                        if let Err(e) = task.await {
                            warn!(error = %e, "connect attempt ended abnormally");
                        }
                    }
                    .boxed()
                    .shared();

                    *slot = Some((epoch, attempt.clone()));
                    attempt
                }
            }
        };
        attempt.await;
    }

    async fn run_attempt(self: &Arc<Self>, epoch: u64) {
        match self.establish().await {
            Ok((api, wallet)) => self.commit(epoch, api, wallet),
            Err(err) => self.fail(epoch, err),
        }
    }

    /// Locate, enable, and read the wallet's state. No state changes.
    async fn establish(&self) -> Result<(Arc<dyn WalletApi>, WalletState), AuthError> {
        let provider = self.locator.locate().ok_or(AuthError::ProviderNotFound)?;
        debug!(provider = provider.name(), "requesting wallet access");

        let enable = provider.enable();
        let enabled = match self.config.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, enable).await.map_err(|_| {
                AuthError::ConnectFailed(format!(
                    "wallet did not answer within {}ms",
                    limit.as_millis()
                ))
            })?,
            None => enable.await,
        };
        let api = enabled.map_err(|e| AuthError::ConnectFailed(e.to_string()))?;

        let mut wallet = api
            .state()
            .await
            .map_err(|e| AuthError::ConnectFailed(e.to_string()))?;
        wallet.provider = Some(self.config.provider_label.clone());
        match self.config.balance_policy {
            BalancePolicy::Omit => wallet.balance = None,
            BalancePolicy::Query => query_balance(api.as_ref(), &mut wallet).await,
        }

        Ok((api, wallet))
    }

    fn commit(self: &Arc<Self>, epoch: u64, api: Arc<dyn WalletApi>, wallet: WalletState) {
        let session = {
            let current = lock(&self.epoch);
            if *current != epoch {
                info!("disconnected while the wallet prompt was open, discarding result");
                return;
            }

            let session = Session::new(
                wallet.session_address(),
                self.clock.now_millis(),
                Some(self.config.session_timeout_ms()),
            );
            *lock(&self.api) = Some(api);
            self.transition(|s| {
                s.is_connected = true;
                s.wallet_state = Some(wallet.clone());
                s.session = Some(session.clone());
            });
            self.store.save(&session);
            self.arm_watchdog();
            session
        };

        info!(
            address = %session.address,
            expires_at = ?session.expires_at,
            "wallet connected"
        );
        let _ = self.events.send(LifecycleEvent::Connected(wallet.clone()));
        if let Some(on_connect) = &self.callbacks.on_connect {
            on_connect(&wallet);
        }
    }

    fn fail(&self, epoch: u64, err: AuthError) {
        {
            let current = lock(&self.epoch);
            if *current != epoch {
                info!(error = %err, "superseded connect attempt failed, ignoring");
                return;
            }
            warn!(error = %err, "wallet connection failed");
            self.transition(|s| s.error = Some(err.to_string()));
        }
        if let Some(on_error) = &self.callbacks.on_error {
            on_error(&err);
        }
    }

    pub(crate) fn disconnect(&self) {
        {
            let mut in_flight = lock(&self.in_flight);
            let mut epoch = lock(&self.epoch);
            *epoch += 1;
            // Callers already awaiting the old attempt still get it back;
            // new callers start a fresh one.
            *in_flight = None;
            *lock(&self.api) = None;
            let watchdog = lock(&self.watchdog).take();
            self.transition(|s| {
                s.is_connected = false;
                s.is_connecting = false;
                s.wallet_state = None;
                s.session = None;
                s.error = None;
            });
            self.store.clear();
            // May be the watchdog's own task; abort only lands at its next
            // await, after the check has returned.
            drop(watchdog);
        }

        info!("wallet disconnected");
        let _ = self.events.send(LifecycleEvent::Disconnected);
        if let Some(on_disconnect) = &self.callbacks.on_disconnect {
            on_disconnect();
        }
    }

    pub(crate) fn refresh_session(&self) {
        let now = self.clock.now_millis();
        let timeout = self.config.session_timeout_ms();
        match self.edit_session(|session| *session = session.refreshed(now, timeout)) {
            Some(session) => debug!(expires_at = ?session.expires_at, "session refreshed"),
            None => debug!("no session to refresh"),
        }
    }

    pub(crate) fn update_session_metadata(&self, patch: Metadata) {
        if self.edit_session(|session| session.merge_metadata(patch)).is_none() {
            debug!("no session to update");
        }
    }

    /// Applies `edit` to the live session and persists the result.
    /// Returns the edited session, or `None` if there is no session.
    fn edit_session(&self, edit: impl FnOnce(&mut Session)) -> Option<Session> {
        let _epoch = lock(&self.epoch);
        let mut edited = None;
        self.state.send_if_modified(|s| {
            let Some(session) = s.session.as_mut() else {
                return false;
            };
            edit(session);
            edited = Some(session.clone());
            true
        });
        if let Some(session) = &edited {
            self.store.save(session);
        }
        edited
    }

    pub(crate) fn clear_error(&self) {
        self.state.send_if_modified(|s| s.error.take().is_some());
    }

    pub(crate) async fn sign_data(
        &self,
        address: &str,
        payload: &str,
    ) -> Result<SignDataResult, AuthError> {
        let api = self.capability(Capability::SignData)?;
        Ok(api.sign_data(address, payload).await?)
    }

    pub(crate) async fn submit_transaction(
        &self,
        tx: &Value,
    ) -> Result<TransactionResult, AuthError> {
        let api = self.capability(Capability::SubmitTx)?;
        Ok(api.submit_tx(tx).await?)
    }

    pub(crate) fn provider_available(&self) -> bool {
        self.locator.locate().is_some()
    }

    /// The connected wallet's handle, if it implements `capability`.
    fn capability(&self, capability: Capability) -> Result<Arc<dyn WalletApi>, AuthError> {
        let api = lock(&self.api)
            .clone()
            .ok_or_else(|| AuthError::CapabilityUnavailable("wallet not connected".into()))?;
        if !api.supports(capability) {
            return Err(AuthError::CapabilityUnavailable(format!(
                "connected wallet does not support `{capability}`"
            )));
        }
        Ok(api)
    }

    /// Starts (or restarts) the expiry watchdog. Caller holds `epoch`.
    fn arm_watchdog(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let handle = walletgate_watchdog::spawn(
            WatchdogConfig::every(self.config.expiry_check_interval),
            move || match weak.upgrade() {
                Some(inner) => inner.check_expiry(),
                None => Verdict::Stop,
            },
        );
        // Replacing the old handle aborts the old task.
        *lock(&self.watchdog) = Some(handle);
    }

    fn check_expiry(&self) -> Verdict {
        let session = self.state.borrow().session.clone();
        let Some(session) = session else {
            return Verdict::Stop;
        };
        if session.is_expired_at(self.clock.now_millis()) {
            info!(address = %session.address, "session expired, disconnecting");
            self.disconnect();
            return Verdict::Stop;
        }
        Verdict::Continue
    }
}

/// Fills in `balance` (and `balances`, if that's what the wallet offers).
/// Leaves both unset if the wallet can't answer.
async fn query_balance(api: &dyn WalletApi, wallet: &mut WalletState) {
    wallet.balance = None;

    if api.supports(Capability::GetBalance) {
        match api.get_balance().await {
            Ok(balance) => {
                wallet.balance = Some(balance);
                return;
            }
            Err(e) => debug!(error = %e, "getBalance failed"),
        }
    }

    if api.supports(Capability::Balances) {
        match api.balances().await {
            Ok(raw) => {
                let total = raw.unshielded.saturating_add(raw.shielded).to_string();
                wallet.balance = Some(total.clone());
                wallet.balances = Some(BalanceBreakdown {
                    unshielded: raw.unshielded.to_string(),
                    shielded: raw.shielded.to_string(),
                    total,
                });
            }
            Err(e) => debug!(error = %e, "balances query failed"),
        }
    }
}
