//! Permission resolution: GLOBAL, OWNED or DENY for a caller, resource and action.

use std::sync::Arc;
use std::time::Instant;

use resource_gate_sdk::{Action, CallerIdentity, Grants, PublicGrantSource};

use super::public_cache::PublicPermissionCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// Any row of the resource.
    Global,
    /// Only rows the caller owns.
    Owned,
    Deny,
}

/// Pure decision over a grant set. The global code always wins over its owned variant.
#[must_use]
pub fn decide(grants: &Grants, resource: &str, action: Action) -> AccessDecision {
    if grants.holds(resource, action.code()) {
        AccessDecision::Global
    } else if action
        .own_code()
        .is_some_and(|code| grants.holds(resource, code))
    {
        AccessDecision::Owned
    } else {
        AccessDecision::Deny
    }
}

pub struct PermissionResolver {
    admin_role: Option<String>,
    cache: Arc<PublicPermissionCache>,
    source: Arc<dyn PublicGrantSource>,
}

impl PermissionResolver {
    #[must_use]
    pub fn new(
        admin_role: Option<String>,
        cache: Arc<PublicPermissionCache>,
        source: Arc<dyn PublicGrantSource>,
    ) -> Self {
        Self {
            admin_role,
            cache,
            source,
        }
    }

    #[must_use]
    pub fn is_admin(&self, caller: &CallerIdentity) -> bool {
        self.admin_role.as_deref() == Some(caller.role.as_str())
    }

    /// Public role grants, served from the cache.
    pub async fn public_grants(&self) -> Arc<Grants> {
        let source = Arc::clone(&self.source);
        self.cache
            .get_or_populate(Instant::now(), || async move {
                source.fetch_public_grants().await
            })
            .await
    }

    pub async fn resolve(
        &self,
        caller: Option<&CallerIdentity>,
        resource: &str,
        action: Action,
    ) -> AccessDecision {
        let decision = match caller {
            Some(caller) if self.is_admin(caller) => AccessDecision::Global,
            Some(caller) => decide(&caller.permissions, resource, action),
            None => decide(&*self.public_grants().await, resource, action),
        };
        tracing::debug!(
            resource,
            action = %action,
            caller = caller.map(|c| c.id.as_str()),
            ?decision,
            "Resolved permission"
        );
        decision
    }
}
