//! Entitlement seam for the tracking capability.
//!
//! Whether an identity may publish and receive coordinates is decided
//! outside this crate (tokens are issued and checked upstream). The engine
//! only asks a yes/no question whenever a client declares the capability.

use std::collections::HashSet;

use async_trait::async_trait;
use beacon_core::IdentityId;

/// Decides whether a declared tracking capability is granted.
#[async_trait]
pub trait EntitlementVerifier: Send + Sync {
    /// Resolve the capability for `identity` given what the client `claimed`.
    ///
    /// `identity` is `None` when the connection has not sent `hello` yet.
    async fn has_tracking_capability(&self, identity: Option<&IdentityId>, claimed: bool) -> bool;
}

/// Trusts the client's claim as-is.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClaimedEntitlement;

#[async_trait]
impl EntitlementVerifier for ClaimedEntitlement {
    async fn has_tracking_capability(&self, _identity: Option<&IdentityId>, claimed: bool) -> bool {
        claimed
    }
}

/// Grants the capability only to listed identities that also claim it.
#[derive(Clone, Debug, Default)]
pub struct AllowListEntitlement {
    allowed: HashSet<IdentityId>,
}

impl AllowListEntitlement {
    /// Build from the set of entitled identities.
    pub fn new(allowed: impl IntoIterator<Item = IdentityId>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }
}

#[async_trait]
impl EntitlementVerifier for AllowListEntitlement {
    async fn has_tracking_capability(&self, identity: Option<&IdentityId>, claimed: bool) -> bool {
        claimed && identity.is_some_and(|id| self.allowed.contains(id))
    }
}
