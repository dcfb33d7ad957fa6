//! End-to-end flows through the `walletgate` prelude: a file-backed
//! manager, a mock wallet, and the views a UI would use.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use walletgate::prelude::*;
use walletgate::session::SESSION_STORAGE_KEY;
use walletgate_provider::MockProvider;

const START: u64 = 1_700_000_000_000;

fn temp_dir() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("walletgate-e2e-{}", uuid::Uuid::new_v4()))
}

fn config() -> AuthConfig {
    AuthConfig {
        session_timeout: Duration::from_secs(30 * 60),
        expiry_check_interval: Duration::from_secs(60),
        ..AuthConfig::default()
    }
}

// =========================================================================
// Full lifecycle
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_sign_in_persist_restart_expire() {
    let dir = temp_dir();
    let clock = ManualClock::new(START);
    let slot = InjectedSlot::new();
    let provider = MockProvider::new("mn_shield_e2e_0001").with_signing();
    slot.inject(Arc::new(provider.clone()));

    // First run: explicit sign-in.
    let first = walletgate::file_backed(&dir)
        .unwrap()
        .config(config())
        .locator(slot.clone())
        .clock(clock.clone())
        .build();
    first.connect().await;
    assert_eq!(first.view().gate().unwrap(), AccessGate::Granted);
    first.update_session_metadata(
        json!({"lastPage": "/vault"}).as_object().cloned().unwrap(),
    );
    assert!(dir.join(format!("{SESSION_STORAGE_KEY}.json")).exists());
    drop(first);

    // Second run, ten minutes later: silent reconnect.
    clock.advance(Duration::from_secs(10 * 60));
    let second = walletgate::file_backed(&dir)
        .unwrap()
        .config(config())
        .locator(slot)
        .clock(clock.clone())
        .build();
    let mut events = second.events();
    tokio::time::sleep(Duration::from_millis(1)).await;

    assert!(matches!(events.try_recv(), Ok(LifecycleEvent::Connected(_))));
    assert_eq!(provider.enable_calls(), 2);
    let signed = second
        .wallet_view()
        .sign_data("mn_shield_e2e_0001", "challenge")
        .await
        .unwrap();
    assert_eq!(signed.signature, "sig:mn_shield_e2e_0001:challenge");

    // Let the fresh 30-minute session run out.
    clock.advance(Duration::from_secs(31 * 60));
    tokio::time::sleep(Duration::from_secs(61)).await;

    assert_eq!(events.try_recv().unwrap(), LifecycleEvent::Disconnected);
    assert_eq!(second.view().gate().unwrap(), AccessGate::Denied);
    assert!(!dir.join(format!("{SESSION_STORAGE_KEY}.json")).exists());

    std::fs::remove_dir_all(dir).unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_errors_convert_into_walletgate_error() {
    async fn sign(auth: &WalletAuth) -> Result<SignDataResult, WalletgateError> {
        Ok(auth.sign_data("addr", "payload").await?)
    }

    let auth = WalletAuth::builder()
        .config(config())
        .locator(NoProvider)
        .build();

    let err = sign(&auth).await.unwrap_err();

    assert!(matches!(
        err,
        WalletgateError::Auth(AuthError::CapabilityUnavailable(_))
    ));
}

#[test]
fn test_file_backed_rejects_unusable_directory() {
    // A regular file can't be turned into a storage directory.
    let file = std::env::temp_dir().join(format!("walletgate-e2e-file-{}", uuid::Uuid::new_v4()));
    std::fs::write(&file, b"occupied").unwrap();

    let result = walletgate::file_backed(&file);

    assert!(matches!(result, Err(WalletgateError::Session(_))));
    std::fs::remove_file(file).unwrap();
}
