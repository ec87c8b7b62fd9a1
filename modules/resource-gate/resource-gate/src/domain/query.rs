//! Scoped query engine: the only component that talks to storage on behalf of a request.
//!
//! Every call consumes the [`QueryContext`] emitted by the access guard and
//! applies exactly the scope it carries. Permissions are never re-derived here.

use std::sync::Arc;

use resource_gate_sdk::{
    AccessError, Action, ResourceSchema, Restriction, Row, RowFilter, Storage, StorageType,
    identity_value,
};
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::fields::FieldPolicy;
use super::validation::validate_payload;

/// Authorization outcome handed from the guard to the engine.
///
/// Produced per request and consumed by value, so it cannot be reused.
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub schema: Arc<ResourceSchema>,
    pub action: Action,
    pub restriction: Restriction,
    pub caller_id: Option<String>,
    pub target_id: Option<String>,
    /// Record already fetched while verifying ownership of a read.
    pub target_record: Option<Row>,
}

impl QueryContext {
    /// Unrestricted context for `action` on `schema`.
    #[must_use]
    pub fn global(schema: Arc<ResourceSchema>, action: Action, caller_id: Option<String>) -> Self {
        Self {
            schema,
            action,
            restriction: Restriction::Unrestricted,
            caller_id,
            target_id: None,
            target_record: None,
        }
    }

    #[must_use]
    pub fn with_target(mut self, target_id: Option<&str>) -> Self {
        self.target_id = target_id.map(str::to_owned);
        self
    }

    fn require_target(&self) -> Result<&str, AccessError> {
        self.target_id.as_deref().ok_or_else(|| {
            AccessError::Internal(format!(
                "{} on '{}' requires a record id",
                self.action, self.schema.resource
            ))
        })
    }
}

pub struct ScopedQueryEngine {
    storage: Arc<dyn Storage>,
    fields: Arc<FieldPolicy>,
}

impl ScopedQueryEngine {
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, fields: Arc<FieldPolicy>) -> Self {
        Self { storage, fields }
    }

    /// # Errors
    /// `Internal` when an owner-restricted context carries no ownership column
    /// or no caller, which the guard never emits; storage failures propagate.
    pub async fn list(&self, ctx: QueryContext) -> Result<Vec<Row>, AccessError> {
        let schema = &ctx.schema;
        let filter = match ctx.restriction {
            Restriction::Unrestricted => RowFilter::all(),
            Restriction::Own => {
                let (Some(owner), Some(caller_id)) = (schema.owner_field(), ctx.caller_id.as_deref())
                else {
                    return Err(AccessError::Internal(format!(
                        "owner-restricted list on '{}' cannot be scoped",
                        schema.resource
                    )));
                };
                RowFilter::eq(owner, identity_value(caller_id))
            }
        };

        let projection = self.fields.read_projection(schema);
        let rows = self
            .storage
            .select_rows(&schema.resource, &projection, &filter)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| self.fields.strip_hidden(row))
            .collect())
    }

    /// # Errors
    /// `RecordNotFound` when the row does not exist.
    pub async fn read(&self, ctx: QueryContext) -> Result<Row, AccessError> {
        let id = ctx.require_target()?.to_owned();
        let schema = &ctx.schema;

        if let Some(record) = ctx.target_record {
            return Ok(self.fields.strip_hidden(record));
        }

        let projection = self.fields.read_projection(schema);
        let filter = RowFilter::eq(schema.primary_key.clone(), identity_value(&id));
        self.storage
            .select_row(&schema.resource, &projection, &filter)
            .await?
            .map(|row| self.fields.strip_hidden(row))
            .ok_or_else(|| AccessError::record_not_found(&schema.resource, &id))
    }

    /// # Errors
    /// `ValidationFailed` when the sanitized payload does not fit the schema.
    pub async fn create(&self, ctx: QueryContext, payload: &Row) -> Result<Row, AccessError> {
        let schema = &ctx.schema;
        let row = self.prepare_write(&ctx, payload)?;
        let inserted = self.storage.insert(&schema.resource, row).await?;
        tracing::debug!(resource = %schema.resource, "Record created");
        Ok(self.fields.strip_hidden(inserted))
    }

    /// # Errors
    /// `RecordNotFound` when the row does not exist, `ValidationFailed` on bad payloads.
    pub async fn update(&self, ctx: QueryContext, payload: &Row) -> Result<Row, AccessError> {
        let id = ctx.require_target()?.to_owned();
        let schema = &ctx.schema;
        let row = self.prepare_write(&ctx, payload)?;
        self.storage
            .update(&schema.resource, &id, row)
            .await?
            .map(|row| self.fields.strip_hidden(row))
            .ok_or_else(|| AccessError::record_not_found(&schema.resource, &id))
    }

    /// Returns the deleted row.
    ///
    /// # Errors
    /// `RecordNotFound` when the row does not exist.
    pub async fn delete(&self, ctx: QueryContext) -> Result<Row, AccessError> {
        let id = ctx.require_target()?.to_owned();
        let schema = &ctx.schema;
        self.storage
            .delete(&schema.resource, &id)
            .await?
            .map(|row| self.fields.strip_hidden(row))
            .ok_or_else(|| AccessError::record_not_found(&schema.resource, &id))
    }

    /// Sanitizes, validates and stamps a write payload.
    fn prepare_write(&self, ctx: &QueryContext, payload: &Row) -> Result<Row, AccessError> {
        let schema = &ctx.schema;
        let is_create = ctx.action == Action::Create;
        let writable = self.fields.classify(schema).writable;

        let mut row = self.fields.writable_payload(schema, payload);
        validate_payload(schema, &row, &writable, is_create)?;
        stamp(schema, &mut row, ctx.caller_id.as_deref(), is_create)?;
        Ok(row)
    }
}

/// Writes server-computed audit and ownership values.
///
/// Timestamps are written whenever the column exists; caller columns only when
/// a caller id is known. The ownership column is stamped on create only.
fn stamp(
    schema: &ResourceSchema,
    row: &mut Row,
    caller_id: Option<&str>,
    is_create: bool,
) -> Result<(), AccessError> {
    let now = OffsetDateTime::now_utc();

    let mut stamp_time = |name: &str| -> Result<(), AccessError> {
        if let Some(field) = schema.field(name) {
            row.insert(name.to_owned(), timestamp_value(field.storage_type, now)?);
        }
        Ok(())
    };
    if is_create {
        stamp_time("createdAt")?;
    }
    stamp_time("updatedAt")?;

    let Some(caller_id) = caller_id else {
        return Ok(());
    };
    let caller = identity_value(caller_id);
    if is_create {
        for name in schema.owner_field().into_iter().chain(["createdBy"]) {
            if schema.has_field(name) {
                row.insert(name.to_owned(), caller.clone());
            }
        }
    }
    if schema.has_field("updatedBy") {
        row.insert("updatedBy".to_owned(), caller);
    }
    Ok(())
}

fn timestamp_value(storage_type: StorageType, now: OffsetDateTime) -> Result<Value, AccessError> {
    if storage_type == StorageType::Integer {
        let millis = now.unix_timestamp() * 1000 + i64::from(now.millisecond());
        return Ok(Value::from(millis));
    }
    now.format(&Rfc3339)
        .map(Value::String)
        .map_err(|e| AccessError::Internal(format!("timestamp formatting failed: {e}")))
}
