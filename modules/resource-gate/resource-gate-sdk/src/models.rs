use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::table::StorageType;

/// A single stored row, keyed by declared property name.
pub type Row = serde_json::Map<String, Value>;

/// CRUD action performed on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    List,
    Read,
    Create,
    Update,
    Delete,
}

impl Action {
    /// Global action code, e.g. `read`.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Action::List => "list",
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }

    /// Ownership-scoped action code, e.g. `read_own`.
    ///
    /// `create` has no owned variant: a row that does not exist yet has no owner.
    #[must_use]
    pub const fn own_code(self) -> Option<&'static str> {
        match self {
            Action::List => Some("list_own"),
            Action::Read => Some("read_own"),
            Action::Update => Some("update_own"),
            Action::Delete => Some("delete_own"),
            Action::Create => None,
        }
    }

    #[must_use]
    pub const fn is_write(self) -> bool {
        matches!(self, Action::Create | Action::Update | Action::Delete)
    }

    /// Maps an HTTP method to the action it performs on a list-style endpoint.
    ///
    /// `GET` without identifier is `list`, with identifier `read`; `POST` is
    /// `create`, `PUT`/`PATCH` are `update`, `DELETE` is `delete`.
    #[must_use]
    pub fn from_method(method: &http::Method, has_id: bool) -> Option<Self> {
        match *method {
            http::Method::GET if has_id => Some(Action::Read),
            http::Method::GET => Some(Action::List),
            http::Method::POST => Some(Action::Create),
            http::Method::PUT | http::Method::PATCH => Some(Action::Update),
            http::Method::DELETE => Some(Action::Delete),
            _ => None,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Action codes granted per resource name.
///
/// A global code (`update`) and its owned variant (`update_own`) are independent
/// grants; holding one says nothing about the other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grants(BTreeMap<String, BTreeSet<String>>);

impl Grants {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `codes` for `resource`, builder style.
    #[must_use]
    pub fn with<I, S>(mut self, resource: &str, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for code in codes {
            self.grant(resource, code);
        }
        self
    }

    pub fn grant(&mut self, resource: &str, code: impl Into<String>) {
        self.0
            .entry(resource.to_owned())
            .or_default()
            .insert(code.into());
    }

    #[must_use]
    pub fn holds(&self, resource: &str, code: &str) -> bool {
        self.0
            .get(resource)
            .is_some_and(|codes| codes.contains(code))
    }

    /// Resources with at least one granted code.
    pub fn resources(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(|(_, codes)| !codes.is_empty())
            .map(|(resource, _)| resource.as_str())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeSet::is_empty)
    }
}

impl<R, C> FromIterator<(R, C)> for Grants
where
    R: AsRef<str>,
    C: IntoIterator,
    C::Item: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (R, C)>>(iter: T) -> Self {
        let mut grants = Grants::new();
        for (resource, codes) in iter {
            for code in codes {
                grants.grant(resource.as_ref(), code);
            }
        }
        grants
    }
}

/// Authenticated caller. Anonymous callers are represented by `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub id: String,
    pub role: String,
    #[serde(default)]
    pub permissions: Grants,
}

impl CallerIdentity {
    #[must_use]
    pub fn new(id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            permissions: Grants::new(),
        }
    }

    #[must_use]
    pub fn with_grants(mut self, permissions: Grants) -> Self {
        self.permissions = permissions;
        self
    }
}

/// Raw credentials extracted from an inbound request by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub bearer: Option<String>,
}

impl Credentials {
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            bearer: Some(token.into()),
        }
    }
}

/// Semantic field type exposed to UI collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Enum,
    Textarea,
}

impl FieldType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Enum => "enum",
            FieldType::Textarea => "textarea",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select_options: Option<Vec<String>>,
    /// Target resource name; set iff this is a foreign-key column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
    pub is_read_only: bool,
    /// Physical storage type, used when stamping server-computed values.
    #[serde(skip)]
    pub storage_type: StorageType,
}

/// Uniform description of a resource derived from its table definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSchema {
    pub resource: String,
    pub label_field: String,
    pub fields: Vec<Field>,
    #[serde(skip)]
    pub table: String,
    #[serde(skip)]
    pub primary_key: String,
    /// Column recording the owning caller, resolved once at catalog build.
    #[serde(skip)]
    pub owner_field: Option<String>,
}

impl ResourceSchema {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    #[must_use]
    pub fn owner_field(&self) -> Option<&str> {
        self.owner_field.as_deref()
    }

    /// Foreign-key fields mapped to their target resource.
    #[must_use]
    pub fn relations(&self) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .filter_map(|f| f.references.as_ref().map(|r| (f.name.clone(), r.clone())))
            .collect()
    }
}

/// Row restriction resolved by the access guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Restriction {
    #[serde(rename = "none")]
    Unrestricted,
    #[serde(rename = "own")]
    Own,
}

/// Conjunction of equality conditions handed to the storage collaborator.
///
/// An empty filter matches every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowFilter {
    conditions: Vec<(String, Value)>,
}

impl RowFilter {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn eq(column: impl Into<String>, value: Value) -> Self {
        Self::all().and_eq(column, value)
    }

    #[must_use]
    pub fn and_eq(mut self, column: impl Into<String>, value: Value) -> Self {
        self.conditions.push((column.into(), value));
        self
    }

    #[must_use]
    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    /// Evaluates the filter against an in-memory row using identity semantics.
    #[must_use]
    pub fn matches(&self, row: &Row) -> bool {
        self.conditions.iter().all(|(column, expected)| {
            row.get(column)
                .is_some_and(|actual| same_identity(actual, expected))
        })
    }
}

/// Converts a textual identifier into the value stored for it: integers become
/// JSON numbers, anything else stays an opaque string.
#[must_use]
pub fn identity_value(raw: &str) -> Value {
    raw.parse::<i64>()
        .map_or_else(|_| Value::String(raw.to_owned()), Value::from)
}

/// Compares two identifier values.
///
/// Identifiers that parse as integers compare numerically (`"7"` equals `7`);
/// everything else compares as an opaque string.
#[must_use]
pub fn same_identity(a: &Value, b: &Value) -> bool {
    match (identity_text(a), identity_text(b)) {
        (Some(a), Some(b)) => match (a.parse::<i64>(), b.parse::<i64>()) {
            (Ok(a), Ok(b)) => a == b,
            _ => a == b,
        },
        _ => false,
    }
}

fn identity_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
