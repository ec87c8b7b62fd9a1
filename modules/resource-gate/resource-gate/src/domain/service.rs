//! Resource service: the CRUD and discovery facade over guard and engine.

use std::collections::BTreeMap;
use std::sync::Arc;

use resource_gate_sdk::{
    AccessError, Action, CallerIdentity, CallerResolver, Credentials, PublicGrantSource,
    ResourceSchema, Row, Storage,
};

use super::catalog::{Catalog, relation_map};
use super::fields::FieldPolicy;
use super::guard::{AccessGuard, AccessRequest, DiscoveryScope};
use super::ownership::OwnershipVerifier;
use super::permissions::PermissionResolver;
use super::public_cache::PublicPermissionCache;
use super::query::ScopedQueryEngine;
use crate::config::{ConfigError, ResourceGateConfig};

/// Resource gate entry point: one method per CRUD verb plus discovery.
///
/// Each call runs the access guard first and hands the resulting context to
/// the scoped query engine. Nothing reaches storage without passing the guard.
pub struct ResourceService {
    guard: AccessGuard,
    engine: ScopedQueryEngine,
    catalog: Arc<Catalog>,
    fields: Arc<FieldPolicy>,
}

impl ResourceService {
    /// Wires the engine from configuration and collaborators.
    ///
    /// # Errors
    /// Returns `ConfigError` when the configuration is inconsistent.
    pub fn new(
        config: &ResourceGateConfig,
        catalog: Arc<Catalog>,
        storage: Arc<dyn Storage>,
        callers: Arc<dyn CallerResolver>,
        public_grants: Arc<dyn PublicGrantSource>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let fields = Arc::new(config.field_policy());
        let public_cache = Arc::new(PublicPermissionCache::new(config.public_grants_ttl));
        let resolver = PermissionResolver::new(
            config.admin_role.clone(),
            public_cache,
            public_grants,
        );
        let verifier = OwnershipVerifier::new(Arc::clone(&storage), config.users_resource.clone());
        let guard = AccessGuard::new(
            config.auth_mode(),
            Arc::clone(&catalog),
            Arc::clone(&fields),
            resolver,
            verifier,
            callers,
        );
        let engine = ScopedQueryEngine::new(storage, Arc::clone(&fields));

        tracing::info!(
            mode = ?config.auth_mode(),
            resources = catalog.model_names().len(),
            "Resource gate initialized"
        );

        Ok(Self {
            guard,
            engine,
            catalog,
            fields,
        })
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// # Errors
    /// `AuthenticationRequired` when a presented credential is invalid.
    pub async fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<CallerIdentity>, AccessError> {
        self.guard.authenticate(credentials).await
    }

    /// # Errors
    /// Any guard denial, `ResourceNotFound`, or a storage failure.
    pub async fn list(
        &self,
        caller: Option<&CallerIdentity>,
        resource: &str,
    ) -> Result<Vec<Row>, AccessError> {
        let ctx = self
            .guard
            .authorize(caller, AccessRequest::new(resource, Action::List))
            .await?;
        self.engine.list(ctx).await
    }

    /// # Errors
    /// Any guard denial, `ResourceNotFound`, `RecordNotFound`, or a storage failure.
    pub async fn read(
        &self,
        caller: Option<&CallerIdentity>,
        resource: &str,
        id: &str,
    ) -> Result<Row, AccessError> {
        let ctx = self
            .guard
            .authorize(caller, AccessRequest::new(resource, Action::Read).target(id))
            .await?;
        self.engine.read(ctx).await
    }

    /// # Errors
    /// Any guard denial, `ValidationFailed`, or a storage failure.
    pub async fn create(
        &self,
        caller: Option<&CallerIdentity>,
        resource: &str,
        payload: &Row,
    ) -> Result<Row, AccessError> {
        let ctx = self
            .guard
            .authorize(
                caller,
                AccessRequest::new(resource, Action::Create).payload(payload),
            )
            .await?;
        self.engine.create(ctx, payload).await
    }

    /// # Errors
    /// Any guard denial, `RecordNotFound`, `ValidationFailed`, or a storage failure.
    pub async fn update(
        &self,
        caller: Option<&CallerIdentity>,
        resource: &str,
        id: &str,
        payload: &Row,
    ) -> Result<Row, AccessError> {
        let ctx = self
            .guard
            .authorize(
                caller,
                AccessRequest::new(resource, Action::Update)
                    .target(id)
                    .payload(payload),
            )
            .await?;
        self.engine.update(ctx, payload).await
    }

    /// # Errors
    /// Any guard denial, `RecordNotFound`, or a storage failure.
    pub async fn delete(
        &self,
        caller: Option<&CallerIdentity>,
        resource: &str,
        id: &str,
    ) -> Result<Row, AccessError> {
        let ctx = self
            .guard
            .authorize(caller, AccessRequest::new(resource, Action::Delete).target(id))
            .await?;
        self.engine.delete(ctx).await
    }

    /// Schema of one resource as the caller may see it.
    ///
    /// # Errors
    /// `Forbidden` when the resource is outside the caller's discovery scope,
    /// `ResourceNotFound` when it is inside but undeclared.
    pub async fn schema(
        &self,
        caller: Option<&CallerIdentity>,
        resource: &str,
    ) -> Result<ResourceSchema, AccessError> {
        let scope = self.guard.authorize_discovery(caller).await?;
        if !scope.allows(resource) {
            tracing::debug!(resource, "Schema hidden from caller");
            return Err(AccessError::Forbidden);
        }
        let schema = self.catalog.schema(resource)?;
        Ok(self.fields.visible_schema(&schema))
    }

    /// All schemas the caller may discover, ordered by resource name.
    ///
    /// # Errors
    /// `AuthenticationRequired` when discovery needs a caller.
    pub async fn schemas(
        &self,
        caller: Option<&CallerIdentity>,
    ) -> Result<Vec<ResourceSchema>, AccessError> {
        let scope = self.guard.authorize_discovery(caller).await?;
        Ok(self.visible_schemas(&scope))
    }

    /// Relation map restricted to resources the caller may discover.
    ///
    /// # Errors
    /// `AuthenticationRequired` when discovery needs a caller.
    pub async fn relations(
        &self,
        caller: Option<&CallerIdentity>,
    ) -> Result<BTreeMap<String, BTreeMap<String, String>>, AccessError> {
        let scope = self.guard.authorize_discovery(caller).await?;
        Ok(relation_map(&self.visible_schemas(&scope)))
    }

    fn visible_schemas(&self, scope: &DiscoveryScope) -> Vec<ResourceSchema> {
        self.catalog
            .schemas()
            .filter(|s| scope.allows(&s.resource))
            .map(|s| self.fields.visible_schema(s))
            .collect()
    }
}
