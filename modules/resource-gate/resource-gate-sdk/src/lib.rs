//! Resource Gate SDK
//!
//! Shared contract between the authorization engine and the collaborators it
//! consumes (storage, session resolution, public grant source):
//! - [`models`]: resource schemas, caller identities, grants, actions, row filters
//! - [`table`]: the table-definition capability the schema catalog reflects over
//! - [`api`]: collaborator traits
//! - [`error`]: the caller-visible error taxonomy

pub mod api;
pub mod error;
pub mod models;
pub mod table;

pub use api::{CallerResolver, PublicGrantSource, Storage};
pub use error::{AccessError, FieldViolation, StorageError};
pub use models::{
    Action, CallerIdentity, Credentials, Field, FieldType, Grants, ResourceSchema, Restriction,
    Row, RowFilter, identity_value, same_identity,
};
pub use table::{ColumnDef, DeclaredColumn, DeclaredTable, ForeignKeyDef, StorageType, TableDefinition};
