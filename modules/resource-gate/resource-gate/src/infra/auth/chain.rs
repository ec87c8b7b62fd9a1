use std::sync::Arc;

use async_trait::async_trait;
use resource_gate_sdk::{AccessError, CallerIdentity, CallerResolver, Credentials};

/// Tries each resolver in order; the first one that recognizes the credential wins.
///
/// A bearer nobody recognizes is rejected, never downgraded to anonymous.
#[derive(Default)]
pub struct CallerResolverChain {
    resolvers: Vec<Arc<dyn CallerResolver>>,
}

impl CallerResolverChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, resolver: Arc<dyn CallerResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

#[async_trait]
impl CallerResolver for CallerResolverChain {
    async fn current_caller(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<CallerIdentity>, AccessError> {
        if credentials.bearer.is_none() {
            return Ok(None);
        }
        for resolver in &self.resolvers {
            match resolver.current_caller(credentials).await {
                Ok(Some(caller)) => return Ok(Some(caller)),
                Ok(None) | Err(AccessError::AuthenticationRequired) => {}
                Err(e) => return Err(e),
            }
        }
        Err(AccessError::AuthenticationRequired)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    struct Fixed(&'static str, &'static str);

    #[async_trait]
    impl CallerResolver for Fixed {
        async fn current_caller(
            &self,
            credentials: &Credentials,
        ) -> Result<Option<CallerIdentity>, AccessError> {
            match credentials.bearer.as_deref() {
                None => Ok(None),
                Some(token) if token == self.0 => Ok(Some(CallerIdentity::new(self.1, "user"))),
                Some(_) => Err(AccessError::AuthenticationRequired),
            }
        }
    }

    fn chain() -> CallerResolverChain {
        CallerResolverChain::new()
            .with(Arc::new(Fixed("a", "alice")))
            .with(Arc::new(Fixed("b", "bob")))
    }

    #[tokio::test]
    async fn later_resolver_can_match() {
        let caller = chain()
            .current_caller(&Credentials::bearer("b"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(caller.id, "bob");
    }

    #[tokio::test]
    async fn unrecognized_bearer_is_rejected() {
        assert!(matches!(
            chain().current_caller(&Credentials::bearer("c")).await,
            Err(AccessError::AuthenticationRequired)
        ));
        assert!(matches!(
            CallerResolverChain::new()
                .current_caller(&Credentials::bearer("c"))
                .await,
            Err(AccessError::AuthenticationRequired)
        ));
    }

    #[tokio::test]
    async fn no_bearer_is_anonymous() {
        assert!(
            chain()
                .current_caller(&Credentials::anonymous())
                .await
                .unwrap()
                .is_none()
        );
    }
}
