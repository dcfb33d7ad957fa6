//! In-memory provider for tests and demos. Enabled by the `mock` feature.
//!
//! [`MockProvider`] answers like a real wallet would, without a browser or
//! a user: configure what `enable()` and `state()` return, which optional
//! members exist, and how long the "user" takes to approve.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use walletgate_protocol::{SignDataResult, TransactionResult, WalletState};

use crate::{Capability, ProviderError, RawBalances, WalletApi, WalletProvider};

/// Canned wallet behaviour shared by a provider and the handles it enables.
#[derive(Debug, Clone, Default)]
struct Script {
    state: WalletState,
    enable_error: Option<String>,
    state_error: Option<String>,
    enable_delay: Option<Duration>,
    signing: bool,
    tx_submission: bool,
    balance: Option<String>,
    balances: Option<RawBalances>,
}

/// A scriptable [`WalletProvider`].
#[derive(Debug, Clone)]
pub struct MockProvider {
    script: Script,
    enable_calls: Arc<AtomicUsize>,
    enabled: Arc<AtomicBool>,
}

impl MockProvider {
    /// A provider whose wallet reports `shield_address`.
    pub fn new(shield_address: &str) -> Self {
        Self::with_state(WalletState {
            shield_address: Some(shield_address.to_string()),
            ..WalletState::default()
        })
    }

    /// A provider whose wallet reports exactly `state`.
    pub fn with_state(state: WalletState) -> Self {
        Self {
            script: Script {
                state,
                ..Script::default()
            },
            enable_calls: Arc::new(AtomicUsize::new(0)),
            enabled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// `enable()` fails as if the user declined the prompt.
    pub fn rejecting(mut self, reason: &str) -> Self {
        self.script.enable_error = Some(reason.to_string());
        self
    }

    /// `enable()` succeeds but the handle's `state()` fails.
    pub fn failing_state(mut self, reason: &str) -> Self {
        self.script.state_error = Some(reason.to_string());
        self
    }

    /// `enable()` waits this long before answering (the user reading the
    /// extension prompt). Uses Tokio time, so paused-clock tests control it.
    pub fn with_enable_delay(mut self, delay: Duration) -> Self {
        self.script.enable_delay = Some(delay);
        self
    }

    pub fn with_signing(mut self) -> Self {
        self.script.signing = true;
        self
    }

    pub fn with_tx_submission(mut self) -> Self {
        self.script.tx_submission = true;
        self
    }

    /// The wallet exposes `getBalance()` returning `balance`.
    pub fn with_balance(mut self, balance: &str) -> Self {
        self.script.balance = Some(balance.to_string());
        self
    }

    /// The wallet exposes `balances()`.
    pub fn with_balances(mut self, unshielded: u128, shielded: u128) -> Self {
        self.script.balances = Some(RawBalances {
            unshielded,
            shielded,
        });
        self
    }

    /// How many times `enable()` has been called on this provider (or any
    /// clone of it).
    pub fn enable_calls(&self) -> usize {
        self.enable_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn enable(&self) -> Result<Arc<dyn WalletApi>, ProviderError> {
        self.enable_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.script.enable_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = &self.script.enable_error {
            return Err(ProviderError::Rejected(reason.clone()));
        }

        self.enabled.store(true, Ordering::SeqCst);
        Ok(Arc::new(MockWallet {
            script: self.script.clone(),
            submitted: AtomicUsize::new(0),
        }))
    }

    async fn is_enabled(&self) -> Result<bool, ProviderError> {
        Ok(self.enabled.load(Ordering::SeqCst))
    }
}

/// The handle a [`MockProvider`] hands out on `enable()`.
#[derive(Debug)]
pub struct MockWallet {
    script: Script,
    submitted: AtomicUsize,
}

#[async_trait]
impl WalletApi for MockWallet {
    async fn state(&self) -> Result<WalletState, ProviderError> {
        match &self.script.state_error {
            Some(reason) => Err(ProviderError::Other(reason.clone())),
            None => Ok(self.script.state.clone()),
        }
    }

    fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::SignData => self.script.signing,
            Capability::SubmitTx => self.script.tx_submission,
            Capability::Balances => self.script.balances.is_some(),
            Capability::GetBalance => self.script.balance.is_some(),
        }
    }

    async fn sign_data(
        &self,
        address: &str,
        payload: &str,
    ) -> Result<SignDataResult, ProviderError> {
        if !self.script.signing {
            return Err(ProviderError::Unsupported(Capability::SignData.member()));
        }
        Ok(SignDataResult {
            signature: format!("sig:{address}:{payload}"),
            key: "mock-key".to_string(),
        })
    }

    async fn submit_tx(&self, _tx: &Value) -> Result<TransactionResult, ProviderError> {
        if !self.script.tx_submission {
            return Err(ProviderError::Unsupported(Capability::SubmitTx.member()));
        }
        let n = self.submitted.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(TransactionResult {
            tx_hash: format!("mock-tx-{n}"),
            success: true,
        })
    }

    async fn balances(&self) -> Result<RawBalances, ProviderError> {
        self.script
            .balances
            .ok_or(ProviderError::Unsupported(Capability::Balances.member()))
    }

    async fn get_balance(&self) -> Result<String, ProviderError> {
        self.script
            .balance
            .clone()
            .ok_or(ProviderError::Unsupported(Capability::GetBalance.member()))
    }
}
