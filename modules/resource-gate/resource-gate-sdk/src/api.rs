//! Collaborator traits consumed by the engine.

use async_trait::async_trait;

use crate::error::{AccessError, StorageError};
use crate::models::{CallerIdentity, Credentials, Grants, Row, RowFilter};

/// Row storage and query execution.
///
/// The engine always supplies the projection and the filter; it never issues
/// an unscoped query on its own. An empty projection selects every column.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn select_row(
        &self,
        resource: &str,
        projection: &[String],
        filter: &RowFilter,
    ) -> Result<Option<Row>, StorageError>;

    async fn select_rows(
        &self,
        resource: &str,
        projection: &[String],
        filter: &RowFilter,
    ) -> Result<Vec<Row>, StorageError>;

    async fn insert(&self, resource: &str, payload: Row) -> Result<Row, StorageError>;

    async fn update(
        &self,
        resource: &str,
        id: &str,
        payload: Row,
    ) -> Result<Option<Row>, StorageError>;

    async fn delete(&self, resource: &str, id: &str) -> Result<Option<Row>, StorageError>;
}

/// Session / credential resolution.
///
/// Returns `Ok(None)` when the request carries no credential (anonymous) and
/// [`AccessError::AuthenticationRequired`] when a credential is present but
/// cannot be validated. A presented-but-invalid credential is never downgraded
/// to anonymous.
#[async_trait]
pub trait CallerResolver: Send + Sync {
    async fn current_caller(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<CallerIdentity>, AccessError>;
}

/// Source of the anonymous (public) role's grants.
#[async_trait]
pub trait PublicGrantSource: Send + Sync {
    async fn fetch_public_grants(&self) -> anyhow::Result<Grants>;
}
