//! Static bearer tokens for machine callers, stored as SHA-256 digests.

use std::collections::HashMap;

use async_trait::async_trait;
use resource_gate_sdk::{AccessError, CallerIdentity, CallerResolver, Credentials};
use sha2::{Digest, Sha256};

use crate::config::AgentTokenConfig;

/// Lowercase hex SHA-256 of a raw token, as written in configuration.
#[must_use]
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[derive(Debug, Default)]
pub struct AgentTokenResolver {
    by_digest: HashMap<String, CallerIdentity>,
}

impl AgentTokenResolver {
    #[must_use]
    pub fn from_config(tokens: &[AgentTokenConfig]) -> Self {
        let by_digest = tokens
            .iter()
            .map(|t| {
                let identity = CallerIdentity::new(t.id.clone(), t.role.clone())
                    .with_grants(t.permissions.iter().collect());
                (t.token_sha256.to_ascii_lowercase(), identity)
            })
            .collect();
        Self { by_digest }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_digest.is_empty()
    }
}

#[async_trait]
impl CallerResolver for AgentTokenResolver {
    async fn current_caller(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<CallerIdentity>, AccessError> {
        let Some(token) = credentials.bearer.as_deref() else {
            return Ok(None);
        };
        self.by_digest
            .get(&hash_token(token))
            .cloned()
            .map(Some)
            .ok_or(AccessError::AuthenticationRequired)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn resolver() -> AgentTokenResolver {
        AgentTokenResolver::from_config(&[AgentTokenConfig {
            token_sha256: hash_token("agent-secret").to_ascii_uppercase(),
            id: "indexer".to_owned(),
            role: "agent".to_owned(),
            permissions: BTreeMap::from([("posts".to_owned(), vec!["list".to_owned()])]),
        }])
    }

    #[test]
    fn hash_is_hex_sha256() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn known_token_resolves_identity() {
        let caller = resolver()
            .current_caller(&Credentials::bearer("agent-secret"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(caller.id, "indexer");
        assert!(caller.permissions.holds("posts", "list"));
    }

    #[tokio::test]
    async fn unknown_token_requires_authentication() {
        assert!(matches!(
            resolver().current_caller(&Credentials::bearer("guess")).await,
            Err(AccessError::AuthenticationRequired)
        ));
    }
}
