//! Field classification: which columns a caller may see and which it may write.

use std::collections::BTreeSet;

use resource_gate_sdk::{ResourceSchema, Row};

/// Audit columns. Always read-only; only the query engine writes them.
pub const AUDIT_FIELDS: [&str; 4] = ["createdAt", "updatedAt", "createdBy", "updatedBy"];

/// Whether callers may never write a column: protected names, audit columns,
/// the ownership column and the primary key.
///
/// Shared by discovery (`Field::is_read_only`) and write sanitizing.
#[must_use]
pub fn is_read_only_column(
    name: &str,
    protected: bool,
    primary_key: &str,
    owner_field: Option<&str>,
) -> bool {
    protected || AUDIT_FIELDS.contains(&name) || owner_field == Some(name) || primary_key == name
}

/// Deployment-wide hidden / protected name sets.
#[derive(Debug, Clone, Default)]
pub struct FieldPolicy {
    hidden: BTreeSet<String>,
    protected: BTreeSet<String>,
}

/// Disjoint partition of a schema's field names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPartition {
    pub hidden: BTreeSet<String>,
    pub read_only: BTreeSet<String>,
    pub writable: BTreeSet<String>,
}

impl FieldPolicy {
    #[must_use]
    pub fn new(
        hidden: impl IntoIterator<Item = String>,
        protected: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            hidden: hidden.into_iter().collect(),
            protected: protected.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn is_hidden(&self, name: &str) -> bool {
        self.hidden.contains(name)
    }

    fn is_read_only(&self, schema: &ResourceSchema, name: &str) -> bool {
        is_read_only_column(
            name,
            self.protected.contains(name),
            &schema.primary_key,
            schema.owner_field(),
        )
    }

    /// Hidden wins over read-only: a column both hidden and audit is never shown.
    #[must_use]
    pub fn classify(&self, schema: &ResourceSchema) -> FieldPartition {
        let mut partition = FieldPartition::default();
        for field in &schema.fields {
            let name = field.name.clone();
            if self.is_hidden(&field.name) {
                partition.hidden.insert(name);
            } else if self.is_read_only(schema, &field.name) {
                partition.read_only.insert(name);
            } else {
                partition.writable.insert(name);
            }
        }
        partition
    }

    /// Every non-hidden column of the schema.
    #[must_use]
    pub fn read_projection(&self, schema: &ResourceSchema) -> Vec<String> {
        schema
            .fields
            .iter()
            .filter(|f| !self.is_hidden(&f.name))
            .map(|f| f.name.clone())
            .collect()
    }

    /// Minimal projection for an ownership check: primary key plus owner column.
    #[must_use]
    pub fn owner_projection(schema: &ResourceSchema) -> Vec<String> {
        let mut projection = vec![schema.primary_key.clone()];
        if let Some(owner) = schema.owner_field()
            && owner != schema.primary_key
        {
            projection.push(owner.to_owned());
        }
        projection
    }

    /// Removes hidden keys from a row about to leave the engine.
    #[must_use]
    pub fn strip_hidden(&self, mut row: Row) -> Row {
        row.retain(|key, _| !self.is_hidden(key));
        row
    }

    /// Schema-known hidden keys present in a write payload. Unknown keys never count.
    #[must_use]
    pub fn hidden_keys_in(&self, schema: &ResourceSchema, payload: &Row) -> Vec<String> {
        payload
            .keys()
            .filter(|key| self.is_hidden(key) && schema.has_field(key))
            .cloned()
            .collect()
    }

    /// Keeps only writable, schema-known keys; protected and audit values are dropped silently.
    #[must_use]
    pub fn writable_payload(&self, schema: &ResourceSchema, payload: &Row) -> Row {
        payload
            .iter()
            .filter(|(key, _)| {
                schema.has_field(key) && !self.is_hidden(key) && !self.is_read_only(schema, key)
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Schema as served by discovery: hidden fields removed.
    #[must_use]
    pub fn visible_schema(&self, schema: &ResourceSchema) -> ResourceSchema {
        let mut visible = schema.clone();
        visible.fields.retain(|f| !self.is_hidden(&f.name));
        visible
    }
}
