//! Configuration for the resource gate module.

use std::collections::BTreeMap;
use std::time::Duration;

use resource_gate_sdk::{Action, DeclaredTable, Grants, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::domain::catalog::{Catalog, CatalogError, CatalogOptions};
use crate::domain::fields::FieldPolicy;

/// Authentication / authorization strategy, resolved once per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Authentication switched off explicitly: every caller gets global access.
    Disabled,
    /// Callers must authenticate; any authenticated caller gets global access.
    AuthenticateOnly,
    /// Callers are authenticated (or anonymous) and every action is authorized.
    Enforced,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct ResourceGateConfig {
    /// Authentication is on unless explicitly disabled.
    pub authentication: bool,

    /// Per-resource authorization; only meaningful with authentication on.
    pub authorization: bool,

    /// Super-role that short-circuits every permission check.
    pub admin_role: Option<String>,

    /// Preferred ownership column name.
    pub owner_key: String,

    /// Primary key property name shared by all resources.
    pub primary_key: String,

    /// Resource whose rows are callers themselves (self-identity ownership).
    pub users_resource: String,

    /// Never returned to any caller, never accepted on write.
    pub hidden_fields: Vec<String>,

    /// Returned, but silently dropped from write payloads.
    pub protected_fields: Vec<String>,

    /// Grants of the anonymous role, keyed by resource.
    pub public_grants: BTreeMap<String, Vec<String>>,

    /// How long fetched public grants stay valid.
    #[serde(with = "humantime_serde")]
    pub public_grants_ttl: Duration,

    pub jwt: Option<JwtConfig>,

    /// Static bearer tokens for machine / agent callers.
    pub agent_tokens: Vec<AgentTokenConfig>,

    pub tables: Vec<DeclaredTable>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct JwtConfig {
    /// HMAC secret for HS256 session tokens.
    #[serde(skip_serializing, default)]
    pub secret: String,

    /// Required `iss` claim, if set.
    #[serde(default)]
    pub issuer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct AgentTokenConfig {
    /// Lowercase hex SHA-256 of the bearer token.
    pub token_sha256: String,
    pub id: String,
    pub role: String,
    #[serde(default)]
    pub permissions: BTreeMap<String, Vec<String>>,
}

fn default_hidden_fields() -> Vec<String> {
    [
        "password",
        "passwordHash",
        "token",
        "refreshToken",
        "secret",
        "deletedAt",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}

fn default_protected_fields() -> Vec<String> {
    ["id", "createdAt", "updatedAt", "createdBy", "updatedBy"]
        .into_iter()
        .map(str::to_owned)
        .collect()
}

impl Default for ResourceGateConfig {
    fn default() -> Self {
        Self {
            authentication: true,
            authorization: true,
            admin_role: Some("admin".to_owned()),
            owner_key: "createdBy".to_owned(),
            primary_key: "id".to_owned(),
            users_resource: "users".to_owned(),
            hidden_fields: default_hidden_fields(),
            protected_fields: default_protected_fields(),
            public_grants: BTreeMap::new(),
            public_grants_ttl: Duration::from_secs(60),
            jwt: None,
            agent_tokens: Vec::new(),
            tables: Vec::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config value for '{field}': {message}")]
    Invalid { field: String, message: String },

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl ConfigError {
    fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

const ACTIONS: [Action; 5] = [
    Action::List,
    Action::Read,
    Action::Create,
    Action::Update,
    Action::Delete,
];

fn is_known_action_code(code: &str) -> bool {
    ACTIONS
        .iter()
        .any(|a| a.code() == code || a.own_code() == Some(code))
}

fn validate_grants(field: &str, grants: &BTreeMap<String, Vec<String>>) -> Result<(), ConfigError> {
    for (resource, codes) in grants {
        if let Some(code) = codes.iter().find(|c| !is_known_action_code(c)) {
            return Err(ConfigError::invalid(
                format!("{field}.{resource}"),
                format!("unknown action code '{code}'"),
            ));
        }
    }
    Ok(())
}

impl ResourceGateConfig {
    #[must_use]
    pub fn auth_mode(&self) -> AuthMode {
        match (self.authentication, self.authorization) {
            (false, _) => AuthMode::Disabled,
            (true, false) => AuthMode::AuthenticateOnly,
            (true, true) => AuthMode::Enforced,
        }
    }

    #[must_use]
    pub fn field_policy(&self) -> FieldPolicy {
        FieldPolicy::new(
            self.hidden_fields.iter().cloned(),
            self.protected_fields.iter().cloned(),
        )
    }

    #[must_use]
    pub fn catalog_options(&self) -> CatalogOptions {
        CatalogOptions {
            owner_key: self.owner_key.clone(),
            primary_key: self.primary_key.clone(),
            protected_fields: self.protected_fields.iter().cloned().collect(),
        }
    }

    /// Reflects the tables declared in this configuration.
    ///
    /// # Errors
    /// Returns `ConfigError::Catalog` when a model is declared twice.
    pub fn build_catalog(&self) -> Result<Catalog, ConfigError> {
        let tables = self.tables.iter().map(|t| t as &dyn TableDefinition);
        Ok(Catalog::build(tables, &self.catalog_options())?)
    }

    #[must_use]
    pub fn public_grants(&self) -> Grants {
        self.public_grants.iter().collect()
    }

    /// Validate the configuration for consistency.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.owner_key.trim().is_empty() {
            return Err(ConfigError::invalid("ownerKey", "must not be empty"));
        }
        if self.primary_key.trim().is_empty() {
            return Err(ConfigError::invalid("primaryKey", "must not be empty"));
        }
        if self.public_grants_ttl.is_zero() {
            return Err(ConfigError::invalid("publicGrantsTtl", "must be positive"));
        }
        if let Some(hidden) = self
            .hidden_fields
            .iter()
            .find(|f| self.protected_fields.contains(f))
        {
            return Err(ConfigError::invalid(
                "hiddenFields",
                format!("'{hidden}' is also listed in protectedFields"),
            ));
        }
        if self.jwt.as_ref().is_some_and(|jwt| jwt.secret.is_empty()) {
            return Err(ConfigError::invalid("jwt.secret", "must not be empty"));
        }
        validate_grants("publicGrants", &self.public_grants)?;
        for (idx, token) in self.agent_tokens.iter().enumerate() {
            let field = format!("agentTokens[{idx}]");
            if token.token_sha256.len() != 64
                || !token.token_sha256.chars().all(|c| c.is_ascii_hexdigit())
            {
                return Err(ConfigError::invalid(
                    format!("{field}.tokenSha256"),
                    "expected 64 hex characters",
                ));
            }
            validate_grants(&format!("{field}.permissions"), &token.permissions)?;
        }
        Ok(())
    }
}
