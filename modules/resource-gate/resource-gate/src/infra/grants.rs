use async_trait::async_trait;
use resource_gate_sdk::{Grants, PublicGrantSource};

use crate::config::ResourceGateConfig;

/// Public grants fixed at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticPublicGrants {
    grants: Grants,
}

impl StaticPublicGrants {
    #[must_use]
    pub fn new(grants: Grants) -> Self {
        Self { grants }
    }

    #[must_use]
    pub fn from_config(config: &ResourceGateConfig) -> Self {
        Self::new(config.public_grants())
    }
}

#[async_trait]
impl PublicGrantSource for StaticPublicGrants {
    async fn fetch_public_grants(&self) -> anyhow::Result<Grants> {
        Ok(self.grants.clone())
    }
}
