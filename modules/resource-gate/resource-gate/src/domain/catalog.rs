//! Schema catalog: reflects table definitions into [`ResourceSchema`]s.
//!
//! Reflection runs once when the catalog is built. Schemas are immutable
//! afterwards and shared behind `Arc`; nothing here runs per request.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use resource_gate_sdk::{
    AccessError, ColumnDef, Field, FieldType, ResourceSchema, StorageType, TableDefinition,
};
use thiserror::Error;

use super::fields::is_read_only_column;

/// Column names rendered as multi-line text.
const LONG_TEXT_NAMES: [&str; 4] = ["content", "description", "bio", "message"];

/// Name suffixes that mark a column as a point in time, whatever its storage type.
const TIMESTAMP_SUFFIXES: [&str; 4] = ["At", "_at", "Date", "_date"];

/// Candidates for the human-readable label of a row, in priority order.
const LABEL_CANDIDATES: [&str; 5] = ["name", "title", "email", "label", "subject"];

/// Ownership column fallbacks tried after the configured owner key.
const OWNER_FALLBACKS: [&str; 3] = ["createdBy", "userId", "ownerId"];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Model '{name}' not found. Known models: {}", .known.join(", "))]
    ModelNotFound { name: String, known: Vec<String> },

    #[error("Model '{0}' is declared more than once")]
    DuplicateModel(String),
}

impl From<CatalogError> for AccessError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::ModelNotFound { name, known } => AccessError::ResourceNotFound {
                resource: name,
                known,
            },
            CatalogError::DuplicateModel(_) => AccessError::Internal(err.to_string()),
        }
    }
}

/// Catalog-wide reflection settings.
#[derive(Debug, Clone)]
pub struct CatalogOptions {
    pub owner_key: String,
    pub primary_key: String,
    pub protected_fields: HashSet<String>,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            owner_key: "createdBy".to_owned(),
            primary_key: "id".to_owned(),
            protected_fields: HashSet::new(),
        }
    }
}

impl CatalogOptions {
    /// Ownership column candidates: the configured key first, then the fixed fallbacks.
    fn owner_candidates(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.owner_key.as_str())
            .chain(OWNER_FALLBACKS.iter().copied().filter(|c| *c != self.owner_key))
    }
}

#[derive(Debug, Default)]
pub struct Catalog {
    schemas: BTreeMap<String, Arc<ResourceSchema>>,
}

impl Catalog {
    /// Reflects every table definition.
    ///
    /// Foreign keys may reference any table in the same set, so table names are
    /// indexed before any schema is derived.
    ///
    /// # Errors
    /// Returns `CatalogError::DuplicateModel` when two definitions share a resource name.
    pub fn build<'a, I>(tables: I, options: &CatalogOptions) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = &'a dyn TableDefinition>,
    {
        let tables: Vec<&dyn TableDefinition> = tables.into_iter().collect();
        let table_index: HashMap<&str, &str> = tables
            .iter()
            .map(|t| (t.table_name(), t.resource_name()))
            .collect();

        let mut schemas = BTreeMap::new();
        for table in tables {
            let schema = reflect(table, &table_index, options);
            tracing::debug!(
                resource = %schema.resource,
                fields = schema.fields.len(),
                owner_field = ?schema.owner_field,
                "Reflected resource schema"
            );
            if schemas
                .insert(schema.resource.clone(), Arc::new(schema))
                .is_some()
            {
                return Err(CatalogError::DuplicateModel(
                    table.resource_name().to_owned(),
                ));
            }
        }
        Ok(Self { schemas })
    }

    /// Looks up a schema by model name.
    ///
    /// # Errors
    /// Returns `CatalogError::ModelNotFound` with the known model names as a hint.
    pub fn schema(&self, name: &str) -> Result<Arc<ResourceSchema>, CatalogError> {
        self.schemas
            .get(name)
            .cloned()
            .ok_or_else(|| CatalogError::ModelNotFound {
                name: name.to_owned(),
                known: self.model_names(),
            })
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// All schemas, ordered by resource name.
    pub fn schemas(&self) -> impl Iterator<Item = &Arc<ResourceSchema>> {
        self.schemas.values()
    }

    #[must_use]
    pub fn model_names(&self) -> Vec<String> {
        self.schemas.keys().cloned().collect()
    }
}

/// Cross-resource relation map: `{resource: {field: targetResource}}`.
///
/// Resources without foreign keys are omitted.
#[must_use]
pub fn relation_map<'a>(
    schemas: impl IntoIterator<Item = &'a ResourceSchema>,
) -> BTreeMap<String, BTreeMap<String, String>> {
    schemas
        .into_iter()
        .map(|s| (s.resource.clone(), s.relations()))
        .filter(|(_, rel)| !rel.is_empty())
        .collect()
}

/// Derives the schema of a single table.
///
/// `table_index` maps storage table names to canonical resource names.
#[must_use]
pub fn reflect(
    table: &dyn TableDefinition,
    table_index: &HashMap<&str, &str>,
    options: &CatalogOptions,
) -> ResourceSchema {
    let columns = table.columns();

    // constrained storage column -> declared property, referenced table -> resource
    let references: HashMap<String, String> = table
        .foreign_keys()
        .into_iter()
        .map(|fk| {
            let property = columns
                .iter()
                .find(|c| c.column == fk.column)
                .map_or_else(|| fk.column.clone(), |c| c.property.clone());
            let target = table_index
                .get(fk.foreign_table.as_str())
                .map_or_else(|| fk.foreign_table.clone(), |r| (*r).to_owned());
            (property, target)
        })
        .collect();

    let names: Vec<&str> = columns.iter().map(|c| c.property.as_str()).collect();
    let owner_field = options
        .owner_candidates()
        .find(|candidate| names.contains(candidate))
        .map(str::to_owned);

    let primary_key = columns
        .iter()
        .find(|c| c.primary_key)
        .map_or_else(|| options.primary_key.clone(), |c| c.property.clone());

    let fields = columns
        .iter()
        .map(|column| Field {
            name: column.property.clone(),
            field_type: infer_type(column),
            required: column.not_null && !column.has_default && !column.primary_key,
            select_options: column.enum_values.clone(),
            references: references.get(&column.property).cloned(),
            is_read_only: is_read_only_column(
                &column.property,
                options.protected_fields.contains(&column.property),
                &primary_key,
                owner_field.as_deref(),
            ),
            storage_type: column.storage_type,
        })
        .collect();

    ResourceSchema {
        resource: table.resource_name().to_owned(),
        label_field: resolve_label_field(&names, &primary_key),
        fields,
        table: table.table_name().to_owned(),
        primary_key,
        owner_field,
    }
}

fn infer_type(column: &ColumnDef) -> FieldType {
    let name = column.property.as_str();
    if column.enum_values.is_some() {
        return FieldType::Enum;
    }
    if column.storage_type == StorageType::Boolean {
        return FieldType::Boolean;
    }
    if column.storage_type.is_temporal() || TIMESTAMP_SUFFIXES.iter().any(|s| name.ends_with(s))
    {
        return FieldType::Date;
    }
    if column.storage_type.is_numeric() {
        return FieldType::Number;
    }
    if LONG_TEXT_NAMES.iter().any(|n| name.eq_ignore_ascii_case(n)) {
        return FieldType::Textarea;
    }
    FieldType::String
}

fn resolve_label_field(names: &[&str], primary_key: &str) -> String {
    LABEL_CANDIDATES
        .iter()
        .find(|candidate| names.contains(candidate))
        .map_or_else(|| primary_key.to_owned(), |c| (*c).to_owned())
}
