use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use walletgate::prelude::*;
use walletgate::provider::ProviderError;

// ---------------------------------------------------------------------------
// A hand-written provider
// ---------------------------------------------------------------------------

/// Stands in for the browser extension: "asks the user" by waiting a bit,
/// then approves. Signs by reversing the payload, which is all a demo needs.
struct StubLace {
    address: String,
    approval_delay: Duration,
    enabled: AtomicBool,
}

impl StubLace {
    fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            approval_delay: Duration::from_millis(300),
            enabled: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl WalletProvider for StubLace {
    fn name(&self) -> &str {
        "stub-lace"
    }

    async fn enable(&self) -> Result<Arc<dyn WalletApi>, ProviderError> {
        tracing::info!("stub wallet: approval prompt shown");
        tokio::time::sleep(self.approval_delay).await;
        self.enabled.store(true, Ordering::SeqCst);
        Ok(Arc::new(StubApi {
            address: self.address.clone(),
        }))
    }

    async fn is_enabled(&self) -> Result<bool, ProviderError> {
        Ok(self.enabled.load(Ordering::SeqCst))
    }
}

struct StubApi {
    address: String,
}

#[async_trait]
impl WalletApi for StubApi {
    async fn state(&self) -> Result<WalletState, ProviderError> {
        Ok(WalletState {
            shield_address: Some(self.address.clone()),
            api_version: Some("stub-1".into()),
            ..WalletState::default()
        })
    }

    fn supports(&self, capability: Capability) -> bool {
        matches!(capability, Capability::SignData)
    }

    async fn sign_data(
        &self,
        address: &str,
        payload: &str,
    ) -> Result<SignDataResult, ProviderError> {
        if address != self.address {
            return Err(ProviderError::Rejected(format!("unknown address {address}")));
        }
        Ok(SignDataResult {
            signature: payload.chars().rev().collect(),
            key: format!("key-of-{address}"),
        })
    }
}

// ---------------------------------------------------------------------------
// Demo flow
// ---------------------------------------------------------------------------

const ADDRESS: &str = "mn_shield_addr_demo1q9x8c7v6b5n4m3";

fn print_event(event: &LifecycleEvent) {
    match event {
        LifecycleEvent::Connected(wallet) => eprintln!(
            "[{}] {}",
            event.name(),
            wallet.primary_address().unwrap_or("?")
        ),
        LifecycleEvent::Disconnected => eprintln!("[{}]", event.name()),
    }
}

fn metadata(value: Value) -> Metadata {
    value.as_object().cloned().unwrap_or_default()
}

async fn run(auth: &WalletAuth) -> Result<(), WalletgateError> {
    auth.connect().await;
    if let Some(err) = auth.state().error {
        eprintln!("connect failed: {err}");
        return Ok(());
    }

    let wallet = auth.wallet_view();
    let session = auth.session_view();
    eprintln!(
        "connected as {} via {}",
        wallet.short_address()?.unwrap_or_default(),
        wallet.provider()?.unwrap_or_default()
    );
    eprintln!(
        "session: {} left",
        session.format_remaining()?.unwrap_or_default()
    );

    let signed = wallet.sign_data(ADDRESS, "login-challenge-42").await?;
    eprintln!("signature: {} (key {})", signed.signature, signed.key);

    auth.update_session_metadata(metadata(json!({ "theme": "dark" })));
    session.refresh_session()?;

    match wallet.submit_transaction(&json!({ "to": "nobody" })).await {
        Ok(tx) => eprintln!("submitted {}", tx.tx_hash),
        Err(e) => eprintln!("submit not available: {e}"),
    }

    auth.disconnect();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let slot = InjectedSlot::new();
    slot.inject(Arc::new(StubLace::new(ADDRESS)));

    let dir = std::env::temp_dir().join("walletgate-stub-wallet");
    let auth = walletgate::file_backed(&dir)?
        .config(AuthConfig {
            session_timeout: Duration::from_secs(15 * 60),
            ..AuthConfig::default()
        })
        .locator(slot)
        .build();

    let mut events = auth.events();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            print_event(&event);
        }
    });

    run(&auth).await?;

    // Closing the channel ends the printer.
    drop(auth);
    printer.await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build() -> WalletAuth {
        let slot = InjectedSlot::new();
        slot.inject(Arc::new(StubLace::new(ADDRESS)));
        WalletAuth::builder()
            .config(AuthConfig {
                auto_connect: false,
                ..AuthConfig::default()
            })
            .locator(slot)
            .build()
    }

    #[tokio::test(start_paused = true)]
    async fn test_stub_wallet_connects_after_prompt() {
        let auth = build();

        auth.connect().await;

        let state = auth.state();
        assert!(state.is_connected);
        assert_eq!(state.session.unwrap().address, ADDRESS);
        assert!(auth.is_provider_enabled().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stub_wallet_signs_only_its_own_address() {
        let auth = build();
        auth.connect().await;

        let ok = auth.sign_data(ADDRESS, "abc").await.unwrap();
        let err = auth.sign_data("someone-else", "abc").await.unwrap_err();

        assert_eq!(ok.signature, "cba");
        assert!(matches!(err, AuthError::Provider(ProviderError::Rejected(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_demo_flow_ends_disconnected() {
        let auth = build();

        run(&auth).await.unwrap();

        assert!(!auth.state().is_connected);
        assert!(auth.stored_session().is_none());
    }
}
