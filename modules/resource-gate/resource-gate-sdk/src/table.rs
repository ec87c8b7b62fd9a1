//! Table-definition capability.
//!
//! The schema catalog never looks at a concrete storage technology. Anything
//! that can enumerate its columns and foreign-key constraints can be reflected
//! into a [`ResourceSchema`](crate::ResourceSchema). [`DeclaredTable`] is the
//! serde-backed adapter used for tables declared in configuration.

use serde::{Deserialize, Serialize};

/// Physical column type as declared by the storage layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    #[default]
    Text,
    Integer,
    Real,
    Boolean,
    Timestamp,
    Date,
    Json,
    Blob,
}

impl StorageType {
    #[must_use]
    pub const fn is_temporal(self) -> bool {
        matches!(self, StorageType::Timestamp | StorageType::Date)
    }

    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, StorageType::Integer | StorageType::Real)
    }
}

/// A single column of a table definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Declared property name, the name callers see.
    pub property: String,
    /// Storage column name, the name constraints refer to.
    pub column: String,
    pub storage_type: StorageType,
    pub not_null: bool,
    pub has_default: bool,
    pub primary_key: bool,
    /// Declared value list; present for enum columns only.
    pub enum_values: Option<Vec<String>>,
}

/// Foreign-key constraint expressed in storage names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyDef {
    /// Constrained storage column.
    pub column: String,
    /// Referenced storage table.
    pub foreign_table: String,
}

/// Capability every table-definition adapter exposes to the schema catalog.
pub trait TableDefinition: Send + Sync {
    /// Canonical resource (model) name, e.g. `posts`.
    fn resource_name(&self) -> &str;

    /// Physical table name, as referenced by foreign-key constraints.
    fn table_name(&self) -> &str;

    fn columns(&self) -> Vec<ColumnDef>;

    fn foreign_keys(&self) -> Vec<ForeignKeyDef>;
}

/// Table declared in configuration.
///
/// ```yaml
/// - name: posts
///   table: blog_posts
///   columns:
///     - { name: id, type: integer, primaryKey: true }
///     - { name: authorId, column: author_id, type: integer, notNull: true, references: app_users }
///     - { name: status, enum: [draft, published] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeclaredTable {
    pub name: String,
    /// Storage table name; defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    pub columns: Vec<DeclaredColumn>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeclaredColumn {
    pub name: String,
    /// Storage column name; defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default, rename = "type")]
    pub storage_type: StorageType,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default)]
    pub has_default: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    /// Referenced storage table name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
}

impl DeclaredColumn {
    fn storage_column(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }
}

impl TableDefinition for DeclaredTable {
    fn resource_name(&self) -> &str {
        &self.name
    }

    fn table_name(&self) -> &str {
        self.table.as_deref().unwrap_or(&self.name)
    }

    fn columns(&self) -> Vec<ColumnDef> {
        self.columns
            .iter()
            .map(|c| ColumnDef {
                property: c.name.clone(),
                column: c.storage_column().to_owned(),
                storage_type: c.storage_type,
                not_null: c.not_null,
                has_default: c.has_default,
                primary_key: c.primary_key,
                enum_values: c.enum_values.clone(),
            })
            .collect()
    }

    fn foreign_keys(&self) -> Vec<ForeignKeyDef> {
        self.columns
            .iter()
            .filter_map(|c| {
                c.references.as_ref().map(|target| ForeignKeyDef {
                    column: c.storage_column().to_owned(),
                    foreign_table: target.clone(),
                })
            })
            .collect()
    }
}
