//! Resource Gate Module Implementation
//!
//! Authorization and scoped access for table-backed REST resources. Every
//! request is authenticated, checked against per-resource grants (global or
//! ownership-scoped), and only then turned into a scoped storage query with
//! hidden and protected fields enforced.
//!
//! The collaborator contract lives in `resource-gate-sdk` and is re-exported here.

pub use resource_gate_sdk::{
    AccessError, Action, CallerIdentity, CallerResolver, Credentials, DeclaredTable, FieldViolation,
    Grants, PublicGrantSource, ResourceSchema, Row, Storage, StorageError, TableDefinition,
};

pub use api::rest::router;
pub use config::{AuthMode, ConfigError, ResourceGateConfig};
pub use domain::catalog::Catalog;
pub use domain::service::ResourceService;

pub mod api;
pub mod config;
pub mod domain;
pub mod infra;
