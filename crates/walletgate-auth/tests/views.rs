//! Integration tests for the auth, session and wallet views.

use std::sync::Arc;
use std::time::Duration;

use walletgate_auth::{
    AUTO_REFRESH_THRESHOLD, AccessGate, AuthConfig, AuthError, WARNING_THRESHOLD, WalletAuth,
};
use walletgate_protocol::WalletState;
use walletgate_provider::{InjectedSlot, MockProvider};
use walletgate_session::{ManualClock, MemoryStorage};

const START: u64 = 1_700_000_000_000;
const TWO_HOURS: Duration = Duration::from_secs(2 * 3600);

fn build(provider: MockProvider, clock: &ManualClock) -> WalletAuth {
    let slot = InjectedSlot::new();
    slot.inject(Arc::new(provider));
    WalletAuth::builder()
        .config(AuthConfig {
            session_timeout: TWO_HOURS,
            auto_connect: false,
            ..AuthConfig::default()
        })
        .locator(slot)
        .storage(MemoryStorage::new())
        .clock(clock.clone())
        .build()
}

fn wallet() -> WalletState {
    WalletState {
        shield_address: Some("mn_shield_addr_test1qqqqqqqqzzzz".into()),
        address: Some("mn_addr_plain".into()),
        legacy_address: Some("legacy_addr".into()),
        ..WalletState::default()
    }
}

// =========================================================================
// Scope
// =========================================================================

#[tokio::test]
async fn test_views_fail_after_manager_dropped() {
    let clock = ManualClock::new(START);
    let auth = build(MockProvider::new("shield1"), &clock);
    let view = auth.view();
    let session = auth.session_view();
    let wallet = auth.wallet_view();

    drop(auth);

    assert!(matches!(view.state(), Err(AuthError::NotInitialized)));
    assert!(matches!(view.connect().await, Err(AuthError::NotInitialized)));
    assert!(matches!(session.is_expired(), Err(AuthError::NotInitialized)));
    assert!(matches!(wallet.address(), Err(AuthError::NotInitialized)));
}

#[tokio::test]
async fn test_changed_errors_once_manager_is_gone() {
    let clock = ManualClock::new(START);
    let auth = build(MockProvider::new("shield1"), &clock);
    let mut view = auth.view();

    drop(auth);

    assert!(matches!(view.changed().await, Err(AuthError::NotInitialized)));
}

// =========================================================================
// AuthView
// =========================================================================

#[tokio::test]
async fn test_gate_follows_lifecycle() {
    let clock = ManualClock::new(START);
    let auth = build(MockProvider::new("shield1"), &clock);
    let view = auth.view();
    assert_eq!(view.gate().unwrap(), AccessGate::Denied);

    view.connect().await.unwrap();
    assert_eq!(view.gate().unwrap(), AccessGate::Granted);
    assert!(view.is_connected().unwrap());

    view.disconnect().unwrap();
    assert_eq!(view.gate().unwrap(), AccessGate::Denied);
}

#[tokio::test]
async fn test_changed_returns_latest_state() {
    let clock = ManualClock::new(START);
    let auth = build(MockProvider::new("shield1"), &clock);
    let mut view = auth.view();

    auth.connect().await;

    let state = view.changed().await.unwrap();
    assert!(state.is_connected);
    assert!(!state.is_connecting);
}

#[tokio::test]
async fn test_view_reports_and_clears_error() {
    let clock = ManualClock::new(START);
    let auth = build(MockProvider::new("shield1").rejecting("user declined"), &clock);
    let view = auth.view();

    view.connect().await.unwrap();
    assert!(view.error().unwrap().is_some());

    view.clear_error().unwrap();
    assert_eq!(view.error().unwrap(), None);
}

// =========================================================================
// SessionView
// =========================================================================

#[tokio::test]
async fn test_session_view_without_session() {
    let clock = ManualClock::new(START);
    let auth = build(MockProvider::new("shield1"), &clock);
    let session = auth.session_view();

    assert_eq!(session.session().unwrap(), None);
    assert!(!session.is_expired().unwrap());
    assert_eq!(session.time_remaining().unwrap(), Duration::ZERO);
    assert!(!session.is_warning().unwrap());
    assert_eq!(session.format_remaining().unwrap(), None);
}

#[tokio::test]
async fn test_session_view_counts_down() {
    let clock = ManualClock::new(START);
    let auth = build(MockProvider::new("shield1"), &clock);
    let session = auth.session_view();
    auth.connect().await;

    assert_eq!(session.time_remaining().unwrap(), TWO_HOURS);
    assert_eq!(session.format_remaining().unwrap().as_deref(), Some("2h 0m"));
    assert!(!session.is_warning().unwrap());

    clock.advance(TWO_HOURS - Duration::from_secs(5 * 60));
    assert_eq!(session.format_remaining().unwrap().as_deref(), Some("5m 0s"));
    assert!(session.is_warning().unwrap());
    assert!(!session.is_expiring_soon(AUTO_REFRESH_THRESHOLD).unwrap());

    clock.advance(Duration::from_secs(4 * 60 + 30));
    assert_eq!(session.format_remaining().unwrap().as_deref(), Some("30s"));
}

#[tokio::test]
async fn test_refresh_if_expiring_only_inside_threshold() {
    let clock = ManualClock::new(START);
    let auth = build(MockProvider::new("shield1"), &clock);
    let session = auth.session_view();
    auth.connect().await;

    clock.advance(Duration::from_secs(3600));
    assert!(!session.refresh_if_expiring(AUTO_REFRESH_THRESHOLD).unwrap());

    clock.advance(Duration::from_secs(3600) - Duration::from_secs(60));
    assert!(session.refresh_if_expiring(AUTO_REFRESH_THRESHOLD).unwrap());
    assert_eq!(session.time_remaining().unwrap(), TWO_HOURS);
}

#[tokio::test]
async fn test_expired_session_formats_as_expired() {
    let clock = ManualClock::new(START);
    let auth = build(MockProvider::new("shield1"), &clock);
    let session = auth.session_view();
    auth.connect().await;

    // Past expiry, before the watchdog's next check.
    clock.advance(TWO_HOURS + Duration::from_secs(1));

    assert!(session.is_expired().unwrap());
    assert!(!session.is_expiring_soon(WARNING_THRESHOLD).unwrap());
    assert!(!session.refresh_if_expiring(WARNING_THRESHOLD).unwrap());
    assert_eq!(session.time_remaining().unwrap(), Duration::ZERO);
    assert_eq!(session.format_remaining().unwrap().as_deref(), Some("Expired"));
}

// =========================================================================
// WalletView
// =========================================================================

#[tokio::test]
async fn test_wallet_view_addresses() {
    let clock = ManualClock::new(START);
    let auth = build(MockProvider::with_state(wallet()), &clock);
    let view = auth.wallet_view();
    assert_eq!(view.address().unwrap(), None);

    auth.connect().await;

    assert_eq!(
        view.address().unwrap().as_deref(),
        Some("mn_shield_addr_test1qqqqqqqqzzzz")
    );
    assert_eq!(view.short_address().unwrap().as_deref(), Some("mn_shi...zzzz"));
    assert_eq!(view.legacy_address().unwrap().as_deref(), Some("legacy_addr"));
    assert_eq!(view.provider().unwrap().as_deref(), Some("Lace (Midnight)"));
    assert_eq!(view.balance().unwrap(), None);
}

#[tokio::test]
async fn test_wallet_view_address_falls_back_to_plain() {
    let clock = ManualClock::new(START);
    let auth = build(
        MockProvider::with_state(WalletState {
            address: Some("mn_addr_plain".into()),
            address_legacy: Some("alt_legacy".into()),
            ..WalletState::default()
        }),
        &clock,
    );
    let view = auth.wallet_view();

    auth.connect().await;

    assert_eq!(view.address().unwrap().as_deref(), Some("mn_addr_plain"));
    assert_eq!(view.legacy_address().unwrap().as_deref(), Some("alt_legacy"));
}

#[tokio::test]
async fn test_refresh_balance_extends_session() {
    let clock = ManualClock::new(START);
    let auth = build(MockProvider::new("shield1"), &clock);
    let view = auth.wallet_view();
    auth.connect().await;

    clock.advance(Duration::from_secs(600));
    let balance = view.refresh_balance().unwrap();

    assert_eq!(balance, None);
    let session = auth.state().session.unwrap();
    assert_eq!(
        session.expires_at,
        Some(START + 600_000 + TWO_HOURS.as_millis() as u64)
    );
}

#[tokio::test]
async fn test_wallet_view_signs_through_manager() {
    let clock = ManualClock::new(START);
    let auth = build(MockProvider::new("shield1").with_signing(), &clock);
    let view = auth.wallet_view();
    auth.connect().await;

    let signed = view.sign_data("shield1", "payload").await.unwrap();

    assert_eq!(signed.signature, "sig:shield1:payload");
}
