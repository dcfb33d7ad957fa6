//! Locators: where a provider is looked up.
//!
//! In a browser the wallet extension drops its provider object into a
//! well-known global slot. [`InjectedSlot`] is that slot as a value you can
//! pass around, so tests and embedders can inject (or withhold) a provider
//! without touching process-wide state.

use std::sync::{Arc, OnceLock, RwLock};

use crate::{ProviderLocator, WalletProvider};

/// A shared slot a wallet provider can be injected into.
///
/// Cloning the slot shares it: an extension bridge can hold one clone and
/// inject the provider whenever it shows up, while the lifecycle manager
/// holds another and locates through it.
#[derive(Clone, Default)]
pub struct InjectedSlot {
    provider: Arc<RwLock<Option<Arc<dyn WalletProvider>>>>,
}

impl InjectedSlot {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide slot, for hosts that want one global injection
    /// point like the browser's `window.midnight`.
    pub fn global() -> &'static InjectedSlot {
        static GLOBAL: OnceLock<InjectedSlot> = OnceLock::new();
        GLOBAL.get_or_init(InjectedSlot::new)
    }

    /// Places `provider` in the slot, replacing whatever was there.
    pub fn inject(&self, provider: Arc<dyn WalletProvider>) {
        tracing::debug!(provider = provider.name(), "wallet provider injected");
        match self.provider.write() {
            Ok(mut guard) => *guard = Some(provider),
            Err(poisoned) => *poisoned.into_inner() = Some(provider),
        }
    }

    /// Empties the slot (the extension was disabled or uninstalled).
    pub fn remove(&self) {
        match self.provider.write() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }
}

impl ProviderLocator for InjectedSlot {
    fn locate(&self) -> Option<Arc<dyn WalletProvider>> {
        // A poisoned lock only means a writer panicked mid-assignment of an
        // `Option<Arc<_>>`, which can't leave a torn value behind.
        match self.provider.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl std::fmt::Debug for InjectedSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InjectedSlot")
            .field("occupied", &self.locate().is_some())
            .finish()
    }
}

/// Locator for contexts where no wallet can ever be injected (servers,
/// CLIs, headless tests). Always returns `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProvider;

impl ProviderLocator for NoProvider {
    fn locate(&self) -> Option<Arc<dyn WalletProvider>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockProvider;

    #[test]
    fn test_locate_empty_slot_returns_none() {
        let slot = InjectedSlot::new();
        assert!(slot.locate().is_none());
    }

    #[test]
    fn test_inject_then_locate_returns_provider() {
        let slot = InjectedSlot::new();
        slot.inject(Arc::new(MockProvider::new("addr1")));

        let provider = slot.locate().expect("provider should be present");
        assert_eq!(provider.name(), "mock");
    }

    #[test]
    fn test_clones_share_the_slot() {
        let slot = InjectedSlot::new();
        let bridge = slot.clone();

        bridge.inject(Arc::new(MockProvider::new("addr1")));
        assert!(slot.locate().is_some());

        bridge.remove();
        assert!(slot.locate().is_none(), "removal should be visible to all clones");
    }

    #[test]
    fn test_no_provider_never_locates() {
        assert!(NoProvider.locate().is_none());
    }
}
