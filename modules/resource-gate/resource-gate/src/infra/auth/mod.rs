//! Bearer credential resolution: hashed agent tokens first, then session tokens.

pub mod agent_tokens;
pub mod chain;
pub mod jwt;

use std::sync::Arc;

use resource_gate_sdk::CallerResolver;

pub use agent_tokens::{AgentTokenResolver, hash_token};
pub use chain::CallerResolverChain;
pub use jwt::{JwtCallerResolver, SessionClaims};

use crate::config::ResourceGateConfig;

/// Builds the resolver chain described by `config`.
#[must_use]
pub fn resolver_from_config(config: &ResourceGateConfig) -> Arc<dyn CallerResolver> {
    let mut chain = CallerResolverChain::new();
    let agents = AgentTokenResolver::from_config(&config.agent_tokens);
    if !agents.is_empty() {
        chain = chain.with(Arc::new(agents));
    }
    if let Some(jwt) = &config.jwt {
        chain = chain.with(Arc::new(JwtCallerResolver::new(
            &jwt.secret,
            jwt.issuer.as_deref(),
        )));
    }
    tracing::debug!(resolvers = chain.len(), "Caller resolver chain built");
    Arc::new(chain)
}
