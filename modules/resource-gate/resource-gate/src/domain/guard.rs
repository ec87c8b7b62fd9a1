//! Access guard: authentication, permission resolution, ownership verification
//! and payload inspection, ending in a [`QueryContext`] or a caller-visible error.

use std::collections::BTreeSet;
use std::sync::Arc;

use resource_gate_sdk::{
    AccessError, Action, CallerIdentity, CallerResolver, Credentials, Restriction, Row,
};

use super::catalog::Catalog;
use super::fields::FieldPolicy;
use super::ownership::{Ownership, OwnershipVerifier};
use super::permissions::{AccessDecision, PermissionResolver};
use super::query::QueryContext;
use crate::config::AuthMode;

/// Single operation as seen by the guard.
#[derive(Debug, Clone, Copy)]
pub struct AccessRequest<'a> {
    pub resource: &'a str,
    pub action: Action,
    pub target_id: Option<&'a str>,
    /// Write payload, inspected for hidden keys before anything is written.
    pub payload: Option<&'a Row>,
}

impl<'a> AccessRequest<'a> {
    #[must_use]
    pub fn new(resource: &'a str, action: Action) -> Self {
        Self {
            resource,
            action,
            target_id: None,
            payload: None,
        }
    }

    #[must_use]
    pub fn target(mut self, id: &'a str) -> Self {
        self.target_id = Some(id);
        self
    }

    #[must_use]
    pub fn payload(mut self, payload: &'a Row) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Resources a caller may discover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryScope {
    All,
    Only(BTreeSet<String>),
}

impl DiscoveryScope {
    #[must_use]
    pub fn allows(&self, resource: &str) -> bool {
        match self {
            DiscoveryScope::All => true,
            DiscoveryScope::Only(resources) => resources.contains(resource),
        }
    }
}

pub struct AccessGuard {
    mode: AuthMode,
    catalog: Arc<Catalog>,
    fields: Arc<FieldPolicy>,
    resolver: PermissionResolver,
    verifier: OwnershipVerifier,
    callers: Arc<dyn CallerResolver>,
}

impl AccessGuard {
    #[must_use]
    pub fn new(
        mode: AuthMode,
        catalog: Arc<Catalog>,
        fields: Arc<FieldPolicy>,
        resolver: PermissionResolver,
        verifier: OwnershipVerifier,
        callers: Arc<dyn CallerResolver>,
    ) -> Self {
        Self {
            mode,
            catalog,
            fields,
            resolver,
            verifier,
            callers,
        }
    }

    /// Resolves the caller behind `credentials`. `None` means anonymous.
    ///
    /// With authentication disabled nothing is resolved and everybody is anonymous.
    ///
    /// # Errors
    /// `AuthenticationRequired` when a presented credential is invalid.
    pub async fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<CallerIdentity>, AccessError> {
        if self.mode == AuthMode::Disabled {
            return Ok(None);
        }
        self.callers.current_caller(credentials).await
    }

    /// Authorizes one operation and returns the scope the engine must apply.
    ///
    /// Permission is decided before the resource is looked up, so a denied
    /// caller learns nothing about which resources exist.
    ///
    /// # Errors
    /// `AuthenticationRequired`, `Forbidden` or `ResourceNotFound`; storage
    /// failures during ownership verification propagate.
    pub async fn authorize(
        &self,
        caller: Option<&CallerIdentity>,
        request: AccessRequest<'_>,
    ) -> Result<QueryContext, AccessError> {
        let AccessRequest {
            resource,
            action,
            target_id,
            payload,
        } = request;
        let caller_id = caller.map(|c| c.id.clone());

        let decision = match (self.mode, caller) {
            (AuthMode::AuthenticateOnly, None) => return Err(AccessError::AuthenticationRequired),
            (AuthMode::Enforced, _) => self.resolver.resolve(caller, resource, action).await,
            (AuthMode::Disabled | AuthMode::AuthenticateOnly, _) => AccessDecision::Global,
        };
        if decision == AccessDecision::Deny {
            tracing::debug!(resource, action = %action, "Denied: no matching grant");
            return Err(AccessError::Forbidden);
        }

        let schema = self.catalog.schema(resource)?;

        if action.is_write()
            && let Some(payload) = payload
        {
            let hidden = self.fields.hidden_keys_in(&schema, payload);
            if !hidden.is_empty() {
                tracing::warn!(
                    resource,
                    action = %action,
                    fields = ?hidden,
                    "Denied: write payload carries hidden fields"
                );
                return Err(AccessError::Forbidden);
            }
        }

        let ctx = QueryContext::global(Arc::clone(&schema), action, caller_id).with_target(target_id);
        if decision == AccessDecision::Global {
            return Ok(ctx);
        }

        // OWNED from here on
        let Some(caller) = caller else {
            tracing::debug!(resource, action = %action, "Denied: owned grant without caller");
            return Err(AccessError::Forbidden);
        };
        let self_update = target_id
            .is_some_and(|id| self.verifier.is_self_update(&schema, action, id, &caller.id));
        if schema.owner_field().is_none() && !self_update {
            tracing::debug!(resource, action = %action, "Denied: resource has no ownership column");
            return Err(AccessError::Forbidden);
        }

        let Some(target_id) = target_id else {
            if action == Action::List {
                return Ok(QueryContext {
                    restriction: Restriction::Own,
                    ..ctx
                });
            }
            return Err(AccessError::Forbidden);
        };

        let projection = if action == Action::Read {
            self.fields.read_projection(&schema)
        } else {
            Vec::new()
        };
        match self
            .verifier
            .verify(&schema, action, target_id, &caller.id, &projection)
            .await?
        {
            Ownership::Owned(record) => Ok(QueryContext {
                restriction: Restriction::Own,
                target_record: record.filter(|_| action == Action::Read),
                ..ctx
            }),
            Ownership::NotOwned => {
                tracing::warn!(
                    resource,
                    action = %action,
                    target_id,
                    caller = %caller.id,
                    "Denied: caller does not own the record"
                );
                Err(AccessError::Forbidden)
            }
        }
    }

    /// Decides which resources a caller may discover.
    ///
    /// Discovery is not authorized per action: any grant on a resource,
    /// global or owned, makes it visible.
    ///
    /// # Errors
    /// `AuthenticationRequired` when authentication is mandatory for this
    /// caller and no public resource is available to an anonymous one.
    pub async fn authorize_discovery(
        &self,
        caller: Option<&CallerIdentity>,
    ) -> Result<DiscoveryScope, AccessError> {
        match (self.mode, caller) {
            (AuthMode::AuthenticateOnly, None) => Err(AccessError::AuthenticationRequired),
            (AuthMode::Enforced, None) => {
                let public = self.resolver.public_grants().await;
                if public.is_empty() {
                    return Err(AccessError::AuthenticationRequired);
                }
                Ok(DiscoveryScope::Only(
                    public.resources().map(str::to_owned).collect(),
                ))
            }
            (AuthMode::Enforced, Some(caller)) if !self.resolver.is_admin(caller) => {
                Ok(DiscoveryScope::Only(
                    caller.permissions.resources().map(str::to_owned).collect(),
                ))
            }
            _ => Ok(DiscoveryScope::All),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::domain::catalog::CatalogOptions;
    use crate::domain::public_cache::PublicPermissionCache;
    use crate::infra::grants::StaticPublicGrants;
    use crate::infra::storage::InMemoryStorage;
    use resource_gate_sdk::{DeclaredColumn, DeclaredTable, Grants, StorageType, TableDefinition};
    use serde_json::json;
    use std::time::Duration;

    struct NoCallers;

    #[async_trait::async_trait]
    impl CallerResolver for NoCallers {
        async fn current_caller(
            &self,
            credentials: &Credentials,
        ) -> Result<Option<CallerIdentity>, AccessError> {
            match credentials.bearer {
                Some(_) => Err(AccessError::AuthenticationRequired),
                None => Ok(None),
            }
        }
    }

    fn column(name: &str, storage_type: StorageType, primary_key: bool) -> DeclaredColumn {
        DeclaredColumn {
            name: name.to_owned(),
            column: None,
            storage_type,
            not_null: false,
            has_default: false,
            primary_key,
            enum_values: None,
            references: None,
        }
    }

    fn tables() -> Vec<DeclaredTable> {
        vec![
            DeclaredTable {
                name: "posts".to_owned(),
                table: None,
                columns: vec![
                    column("id", StorageType::Integer, true),
                    column("title", StorageType::Text, false),
                    column("secret", StorageType::Text, false),
                    column("createdBy", StorageType::Integer, false),
                ],
            },
            DeclaredTable {
                name: "tags".to_owned(),
                table: None,
                columns: vec![
                    column("id", StorageType::Integer, true),
                    column("name", StorageType::Text, false),
                ],
            },
            DeclaredTable {
                name: "users".to_owned(),
                table: None,
                columns: vec![
                    column("id", StorageType::Integer, true),
                    column("email", StorageType::Text, false),
                ],
            },
        ]
    }

    fn build_guard(mode: AuthMode, public: Grants) -> (AccessGuard, Arc<InMemoryStorage>) {
        let tables = tables();
        let catalog = Arc::new(
            Catalog::build(
                tables.iter().map(|t| t as &dyn TableDefinition),
                &CatalogOptions::default(),
            )
            .unwrap(),
        );
        let storage = Arc::new(InMemoryStorage::for_catalog(&catalog));
        storage.seed(
            "posts",
            [json!({"id": 1, "title": "a", "createdBy": 7})
                .as_object()
                .cloned()
                .unwrap()],
        );
        let fields = Arc::new(FieldPolicy::new(["secret".to_owned()], Vec::new()));
        let resolver = PermissionResolver::new(
            Some("admin".to_owned()),
            Arc::new(PublicPermissionCache::new(Duration::from_secs(60))),
            Arc::new(StaticPublicGrants::new(public)),
        );
        let verifier = OwnershipVerifier::new(storage.clone(), "users");
        let guard = AccessGuard::new(mode, catalog, fields, resolver, verifier, Arc::new(NoCallers));
        (guard, storage)
    }

    fn editor(grants: Grants) -> CallerIdentity {
        CallerIdentity::new("7", "editor").with_grants(grants)
    }

    #[tokio::test]
    async fn denied_resource_is_forbidden_even_when_unknown() {
        let (guard, _) = build_guard(AuthMode::Enforced, Grants::new());
        let caller = editor(Grants::new());
        let result = guard
            .authorize(Some(&caller), AccessRequest::new("nope", Action::List))
            .await;
        assert!(matches!(result, Err(AccessError::Forbidden)));
    }

    #[tokio::test]
    async fn admin_sees_unknown_model_hint() {
        let (guard, _) = build_guard(AuthMode::Enforced, Grants::new());
        let admin = CallerIdentity::new("1", "admin");
        let result = guard
            .authorize(Some(&admin), AccessRequest::new("nope", Action::List))
            .await;
        let Err(AccessError::ResourceNotFound { known, .. }) = result else {
            panic!("expected not found");
        };
        assert_eq!(known, vec!["posts", "tags", "users"]);
    }

    #[tokio::test]
    async fn owned_list_is_restricted_not_denied() {
        let (guard, _) = build_guard(AuthMode::Enforced, Grants::new());
        let caller = editor(Grants::new().with("posts", ["list_own"]));
        let ctx = guard
            .authorize(Some(&caller), AccessRequest::new("posts", Action::List))
            .await
            .unwrap();
        assert_eq!(ctx.restriction, Restriction::Own);
        assert_eq!(ctx.caller_id.as_deref(), Some("7"));
    }

    #[tokio::test]
    async fn global_grant_beats_owned_grant() {
        let (guard, _) = build_guard(AuthMode::Enforced, Grants::new());
        let caller = editor(Grants::new().with("posts", ["list", "list_own"]));
        let ctx = guard
            .authorize(Some(&caller), AccessRequest::new("posts", Action::List))
            .await
            .unwrap();
        assert_eq!(ctx.restriction, Restriction::Unrestricted);
    }

    #[tokio::test]
    async fn owned_grant_without_owner_column_is_forbidden() {
        let (guard, _) = build_guard(AuthMode::Enforced, Grants::new());
        let caller = editor(Grants::new().with("tags", ["list_own"]));
        let result = guard
            .authorize(Some(&caller), AccessRequest::new("tags", Action::List))
            .await;
        assert!(matches!(result, Err(AccessError::Forbidden)));
    }

    #[tokio::test]
    async fn owned_read_passes_verified_record_through() {
        let (guard, _) = build_guard(AuthMode::Enforced, Grants::new());
        let caller = editor(Grants::new().with("posts", ["read_own"]));
        let ctx = guard
            .authorize(
                Some(&caller),
                AccessRequest::new("posts", Action::Read).target("1"),
            )
            .await
            .unwrap();
        let record = ctx.target_record.unwrap();
        assert_eq!(record["title"], json!("a"));
        assert!(!record.contains_key("secret"));
    }

    #[tokio::test]
    async fn ownership_mismatch_is_forbidden() {
        let (guard, _) = build_guard(AuthMode::Enforced, Grants::new());
        let other = CallerIdentity::new("8", "editor")
            .with_grants(Grants::new().with("posts", ["update_own"]));
        let payload = json!({"title": "x"}).as_object().cloned().unwrap();
        let result = guard
            .authorize(
                Some(&other),
                AccessRequest::new("posts", Action::Update)
                    .target("1")
                    .payload(&payload),
            )
            .await;
        assert!(matches!(result, Err(AccessError::Forbidden)));
    }

    #[tokio::test]
    async fn hidden_key_write_is_forbidden_even_for_admin() {
        let (guard, _) = build_guard(AuthMode::Enforced, Grants::new());
        let admin = CallerIdentity::new("1", "admin");
        let payload = json!({"title": "x", "secret": "s"}).as_object().cloned().unwrap();
        let result = guard
            .authorize(
                Some(&admin),
                AccessRequest::new("posts", Action::Create).payload(&payload),
            )
            .await;
        assert!(matches!(result, Err(AccessError::Forbidden)));
    }

    #[tokio::test]
    async fn unknown_payload_keys_are_ignored() {
        let (guard, _) = build_guard(AuthMode::Enforced, Grants::new());
        let admin = CallerIdentity::new("1", "admin");
        let payload = json!({"title": "x", "token": "t"}).as_object().cloned().unwrap();
        assert!(
            guard
                .authorize(
                    Some(&admin),
                    AccessRequest::new("posts", Action::Create).payload(&payload),
                )
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn users_self_update_is_owned() {
        let (guard, _) = build_guard(AuthMode::Enforced, Grants::new());
        let caller = editor(Grants::new().with("users", ["update_own"]));
        let ctx = guard
            .authorize(
                Some(&caller),
                AccessRequest::new("users", Action::Update).target("7"),
            )
            .await
            .unwrap();
        assert_eq!(ctx.target_id.as_deref(), Some("7"));
        assert_eq!(ctx.restriction, Restriction::Own);
    }

    #[tokio::test]
    async fn users_self_identity_does_not_extend_past_updates() {
        let (guard, _) = build_guard(AuthMode::Enforced, Grants::new());
        let caller = editor(Grants::new().with("users", ["read_own", "delete_own", "list_own"]));
        for action in [Action::Read, Action::Delete] {
            let result = guard
                .authorize(Some(&caller), AccessRequest::new("users", action).target("7"))
                .await;
            assert!(matches!(result, Err(AccessError::Forbidden)));
        }
        let result = guard
            .authorize(Some(&caller), AccessRequest::new("users", Action::List))
            .await;
        assert!(matches!(result, Err(AccessError::Forbidden)));
    }

    #[tokio::test]
    async fn users_update_of_another_row_is_forbidden() {
        let (guard, _) = build_guard(AuthMode::Enforced, Grants::new());
        let caller = editor(Grants::new().with("users", ["update_own"]));
        let result = guard
            .authorize(
                Some(&caller),
                AccessRequest::new("users", Action::Update).target("8"),
            )
            .await;
        assert!(matches!(result, Err(AccessError::Forbidden)));
    }

    #[tokio::test]
    async fn disabled_mode_is_global_for_everybody() {
        let (guard, _) = build_guard(AuthMode::Disabled, Grants::new());
        let ctx = guard
            .authorize(None, AccessRequest::new("posts", Action::Delete).target("1"))
            .await
            .unwrap();
        assert_eq!(ctx.restriction, Restriction::Unrestricted);
        assert!(
            guard
                .authenticate(&Credentials::bearer("garbage"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn authenticate_only_requires_a_caller() {
        let (guard, _) = build_guard(AuthMode::AuthenticateOnly, Grants::new());
        let result = guard
            .authorize(None, AccessRequest::new("posts", Action::List))
            .await;
        assert!(matches!(result, Err(AccessError::AuthenticationRequired)));

        let caller = editor(Grants::new());
        let ctx = guard
            .authorize(Some(&caller), AccessRequest::new("posts", Action::Delete).target("1"))
            .await
            .unwrap();
        assert_eq!(ctx.restriction, Restriction::Unrestricted);
    }

    #[tokio::test]
    async fn anonymous_discovery_follows_public_grants() {
        let (guard, _) = build_guard(AuthMode::Enforced, Grants::new().with("posts", ["read"]));
        let scope = guard.authorize_discovery(None).await.unwrap();
        assert!(scope.allows("posts"));
        assert!(!scope.allows("users"));

        let (guard, _) = build_guard(AuthMode::Enforced, Grants::new());
        assert!(matches!(
            guard.authorize_discovery(None).await,
            Err(AccessError::AuthenticationRequired)
        ));
    }

    #[tokio::test]
    async fn discovery_counts_owned_grants() {
        let (guard, _) = build_guard(AuthMode::Enforced, Grants::new());
        let caller = editor(Grants::new().with("posts", ["read_own"]));
        let scope = guard.authorize_discovery(Some(&caller)).await.unwrap();
        assert_eq!(scope, DiscoveryScope::Only(BTreeSet::from(["posts".to_owned()])));
    }
}
