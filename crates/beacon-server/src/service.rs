//! Shared engine state.

use std::sync::Arc;

use crate::config::PresenceConfig;
use crate::entitlement::{ClaimedEntitlement, EntitlementVerifier};
use crate::presence::store::PresenceStore;
use crate::websocket::registry::ConnectionRegistry;

/// Presence store, connection registry, and policy, shared by `Arc` between
/// the broadcast scheduler and every session.
pub struct PresenceService {
    store: PresenceStore,
    connections: ConnectionRegistry,
    entitlements: Arc<dyn EntitlementVerifier>,
    config: PresenceConfig,
}

impl PresenceService {
    /// Create a service with empty registries.
    pub fn new(config: PresenceConfig, entitlements: Arc<dyn EntitlementVerifier>) -> Self {
        Self {
            store: PresenceStore::new(),
            connections: ConnectionRegistry::new(),
            entitlements,
            config,
        }
    }

    /// Default configuration, trusting client capability claims.
    pub fn with_defaults() -> Self {
        Self::new(PresenceConfig::default(), Arc::new(ClaimedEntitlement))
    }

    /// Presence records.
    pub fn store(&self) -> &PresenceStore {
        &self.store
    }

    /// Open connections.
    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    /// Capability verifier.
    pub fn entitlements(&self) -> &dyn EntitlementVerifier {
        self.entitlements.as_ref()
    }

    /// Engine tuning.
    pub fn config(&self) -> &PresenceConfig {
        &self.config
    }
}

impl std::fmt::Debug for PresenceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceService")
            .field("records", &self.store.len())
            .field("connections", &self.connections.connection_count())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
