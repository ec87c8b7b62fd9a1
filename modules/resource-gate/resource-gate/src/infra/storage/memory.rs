use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use resource_gate_sdk::{Row, RowFilter, Storage, StorageError, identity_value, same_identity};
use serde_json::Value;

use crate::domain::catalog::Catalog;

#[derive(Debug)]
struct Table {
    primary_key: String,
    rows: Vec<Row>,
    next_id: i64,
}

impl Table {
    fn new(primary_key: &str) -> Self {
        Self {
            primary_key: primary_key.to_owned(),
            rows: Vec::new(),
            next_id: 1,
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        let id = identity_value(id);
        self.rows.iter().position(|row| {
            row.get(&self.primary_key)
                .is_some_and(|value| same_identity(value, &id))
        })
    }

    /// Stores `row`, assigning the next integer key when none is given.
    fn push(&mut self, mut row: Row) -> Row {
        match row.get(&self.primary_key).and_then(Value::as_i64) {
            Some(id) => self.next_id = self.next_id.max(id.saturating_add(1)),
            None if row.get(&self.primary_key).is_none_or(Value::is_null) => {
                row.insert(self.primary_key.clone(), Value::from(self.next_id));
                self.next_id += 1;
            }
            None => {}
        }
        self.rows.push(row.clone());
        row
    }
}

fn project(row: &Row, projection: &[String]) -> Row {
    if projection.is_empty() {
        return row.clone();
    }
    projection
        .iter()
        .filter_map(|column| row.get(column).map(|v| (column.clone(), v.clone())))
        .collect()
}

/// Process-local storage backend, one row list per resource.
///
/// Integer primary keys are auto-assigned on insert. Suitable for tests and
/// for running the server without a database.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    tables: RwLock<HashMap<String, Table>>,
}

impl InMemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty table for every resource of the catalog.
    #[must_use]
    pub fn for_catalog(catalog: &Catalog) -> Self {
        let storage = Self::new();
        for schema in catalog.schemas() {
            storage.register(&schema.resource, &schema.primary_key);
        }
        storage
    }

    /// Creates an empty table; an existing one is kept as is.
    pub fn register(&self, resource: &str, primary_key: &str) {
        self.tables
            .write()
            .entry(resource.to_owned())
            .or_insert_with(|| Table::new(primary_key));
    }

    /// Stores rows verbatim, bypassing any scoping. Unknown resources get an `id` keyed table.
    pub fn seed(&self, resource: &str, rows: impl IntoIterator<Item = Row>) {
        let mut tables = self.tables.write();
        let table = tables
            .entry(resource.to_owned())
            .or_insert_with(|| Table::new("id"));
        for row in rows {
            table.push(row);
        }
    }

    /// Snapshot of every stored row of `resource`, unprojected.
    #[must_use]
    pub fn rows(&self, resource: &str) -> Vec<Row> {
        self.tables
            .read()
            .get(resource)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn select_row(
        &self,
        resource: &str,
        projection: &[String],
        filter: &RowFilter,
    ) -> Result<Option<Row>, StorageError> {
        let tables = self.tables.read();
        let table = tables
            .get(resource)
            .ok_or_else(|| StorageError::UnknownTable(resource.to_owned()))?;
        Ok(table
            .rows
            .iter()
            .find(|row| filter.matches(row))
            .map(|row| project(row, projection)))
    }

    async fn select_rows(
        &self,
        resource: &str,
        projection: &[String],
        filter: &RowFilter,
    ) -> Result<Vec<Row>, StorageError> {
        let tables = self.tables.read();
        let table = tables
            .get(resource)
            .ok_or_else(|| StorageError::UnknownTable(resource.to_owned()))?;
        Ok(table
            .rows
            .iter()
            .filter(|row| filter.matches(row))
            .map(|row| project(row, projection))
            .collect())
    }

    async fn insert(&self, resource: &str, payload: Row) -> Result<Row, StorageError> {
        let mut tables = self.tables.write();
        let table = tables
            .get_mut(resource)
            .ok_or_else(|| StorageError::UnknownTable(resource.to_owned()))?;
        Ok(table.push(payload))
    }

    async fn update(
        &self,
        resource: &str,
        id: &str,
        payload: Row,
    ) -> Result<Option<Row>, StorageError> {
        let mut tables = self.tables.write();
        let table = tables
            .get_mut(resource)
            .ok_or_else(|| StorageError::UnknownTable(resource.to_owned()))?;
        let Some(idx) = table.position(id) else {
            return Ok(None);
        };
        let row = &mut table.rows[idx];
        row.extend(payload);
        Ok(Some(row.clone()))
    }

    async fn delete(&self, resource: &str, id: &str) -> Result<Option<Row>, StorageError> {
        let mut tables = self.tables.write();
        let table = tables
            .get_mut(resource)
            .ok_or_else(|| StorageError::UnknownTable(resource.to_owned()))?;
        Ok(table.position(id).map(|idx| table.rows.remove(idx)))
    }
}
