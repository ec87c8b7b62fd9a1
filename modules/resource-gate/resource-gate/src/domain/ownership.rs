//! Ownership verification for OWNED single-row operations.

use std::sync::Arc;

use resource_gate_sdk::{
    Action, ResourceSchema, Row, RowFilter, Storage, StorageError, identity_value, same_identity,
};

use super::fields::FieldPolicy;

/// Outcome of an ownership check.
#[derive(Debug, Clone, PartialEq)]
pub enum Ownership {
    /// Caller owns the row. Carries the fetched record, if one was fetched.
    Owned(Option<Row>),
    NotOwned,
}

pub struct OwnershipVerifier {
    storage: Arc<dyn Storage>,
    users_resource: String,
}

impl OwnershipVerifier {
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, users_resource: impl Into<String>) -> Self {
        Self {
            storage,
            users_resource: users_resource.into(),
        }
    }

    /// A caller updating its own row on the users resource.
    #[must_use]
    pub fn is_self_update(
        &self,
        schema: &ResourceSchema,
        action: Action,
        target_id: &str,
        caller_id: &str,
    ) -> bool {
        action == Action::Update
            && schema.resource == self.users_resource
            && same_identity(&identity_value(target_id), &identity_value(caller_id))
    }

    /// Checks whether `caller_id` owns row `target_id` for `action`.
    ///
    /// `projection` is what to fetch; it is extended with the ownership column
    /// when missing. A self update on the users resource is owned without a fetch.
    ///
    /// # Errors
    /// Storage failures propagate; they are never treated as "not owned".
    pub async fn verify(
        &self,
        schema: &ResourceSchema,
        action: Action,
        target_id: &str,
        caller_id: &str,
        projection: &[String],
    ) -> Result<Ownership, StorageError> {
        if self.is_self_update(schema, action, target_id, caller_id) {
            tracing::debug!(resource = %schema.resource, "Self-identity ownership");
            return Ok(Ownership::Owned(None));
        }

        let Some(owner) = schema.owner_field() else {
            return Ok(Ownership::NotOwned);
        };

        let mut projection = if projection.is_empty() {
            FieldPolicy::owner_projection(schema)
        } else {
            projection.to_vec()
        };
        if !projection.iter().any(|p| p == owner) {
            projection.push(owner.to_owned());
        }

        let filter = RowFilter::eq(schema.primary_key.clone(), identity_value(target_id));
        let record = self
            .storage
            .select_row(&schema.resource, &projection, &filter)
            .await?;

        Ok(match record {
            Some(row) if Self::verify_record(schema, &row, caller_id) => {
                Ownership::Owned(Some(row))
            }
            _ => Ownership::NotOwned,
        })
    }

    /// Checks an already-fetched record.
    #[must_use]
    pub fn verify_record(schema: &ResourceSchema, record: &Row, caller_id: &str) -> bool {
        schema
            .owner_field()
            .and_then(|owner| record.get(owner))
            .is_some_and(|value| same_identity(value, &identity_value(caller_id)))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use resource_gate_sdk::{Field, FieldType, StorageType};
    use serde_json::json;

    /// Serves a single fixed row and records every projection it was asked for.
    #[derive(Default)]
    struct FixedRow {
        row: Option<Row>,
        fail: bool,
        seen: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait::async_trait]
    impl Storage for FixedRow {
        async fn select_row(
            &self,
            _resource: &str,
            projection: &[String],
            filter: &RowFilter,
        ) -> Result<Option<Row>, StorageError> {
            self.seen.lock().push(projection.to_vec());
            if self.fail {
                return Err(StorageError::Backend("connection reset".to_owned()));
            }
            Ok(self.row.clone().filter(|r| filter.matches(r)))
        }

        async fn select_rows(
            &self,
            _resource: &str,
            _projection: &[String],
            _filter: &RowFilter,
        ) -> Result<Vec<Row>, StorageError> {
            Ok(Vec::new())
        }

        async fn insert(&self, _resource: &str, payload: Row) -> Result<Row, StorageError> {
            Ok(payload)
        }

        async fn update(
            &self,
            _resource: &str,
            _id: &str,
            _payload: Row,
        ) -> Result<Option<Row>, StorageError> {
            Ok(None)
        }

        async fn delete(&self, _resource: &str, _id: &str) -> Result<Option<Row>, StorageError> {
            Ok(None)
        }
    }

    fn schema(resource: &str, owner: Option<&str>) -> ResourceSchema {
        let mut names = vec!["id", "title"];
        names.extend(owner);
        ResourceSchema {
            resource: resource.to_owned(),
            label_field: "title".to_owned(),
            fields: names
                .into_iter()
                .map(|name| Field {
                    name: name.to_owned(),
                    field_type: FieldType::String,
                    required: false,
                    select_options: None,
                    references: None,
                    is_read_only: false,
                    storage_type: StorageType::Text,
                })
                .collect(),
            table: resource.to_owned(),
            primary_key: "id".to_owned(),
            owner_field: owner.map(str::to_owned),
        }
    }

    fn storage_with(row: serde_json::Value) -> Arc<FixedRow> {
        Arc::new(FixedRow {
            row: serde_json::from_value(row).ok(),
            ..FixedRow::default()
        })
    }

    #[tokio::test]
    async fn owner_matches_with_numeric_normalization() {
        let storage = storage_with(json!({"id": 5, "title": "t", "createdBy": "7"}));
        let verifier = OwnershipVerifier::new(storage.clone(), "users");
        let outcome = verifier
            .verify(&schema("posts", Some("createdBy")), Action::Update, "5", "7", &[])
            .await
            .unwrap();
        assert!(matches!(outcome, Ownership::Owned(Some(_))));
        assert_eq!(
            storage.seen.lock()[0],
            vec!["id".to_owned(), "createdBy".to_owned()]
        );
    }

    #[tokio::test]
    async fn different_owner_is_not_owned() {
        let storage = storage_with(json!({"id": 5, "createdBy": 8}));
        let verifier = OwnershipVerifier::new(storage, "users");
        let outcome = verifier
            .verify(&schema("posts", Some("createdBy")), Action::Update, "5", "7", &[])
            .await
            .unwrap();
        assert_eq!(outcome, Ownership::NotOwned);
    }

    #[tokio::test]
    async fn missing_row_is_not_owned() {
        let storage = storage_with(json!({"id": 5, "createdBy": 7}));
        let verifier = OwnershipVerifier::new(storage, "users");
        let outcome = verifier
            .verify(&schema("posts", Some("createdBy")), Action::Update, "6", "7", &[])
            .await
            .unwrap();
        assert_eq!(outcome, Ownership::NotOwned);
    }

    #[tokio::test]
    async fn no_owner_column_is_never_owned() {
        let storage = storage_with(json!({"id": 5}));
        let verifier = OwnershipVerifier::new(storage.clone(), "users");
        let outcome = verifier
            .verify(&schema("tags", None), Action::Update, "5", "7", &[])
            .await
            .unwrap();
        assert_eq!(outcome, Ownership::NotOwned);
        assert!(storage.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn users_self_update_skips_fetch() {
        let storage = Arc::new(FixedRow::default());
        let verifier = OwnershipVerifier::new(storage.clone(), "users");
        let outcome = verifier
            .verify(&schema("users", None), Action::Update, "42", "42", &[])
            .await
            .unwrap();
        assert_eq!(outcome, Ownership::Owned(None));
        assert!(storage.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn users_self_identity_only_covers_updates() {
        let storage = Arc::new(FixedRow::default());
        let verifier = OwnershipVerifier::new(storage, "users");
        let users = schema("users", None);
        for action in [Action::Read, Action::Delete] {
            let outcome = verifier
                .verify(&users, action, "42", "42", &[])
                .await
                .unwrap();
            assert_eq!(outcome, Ownership::NotOwned);
        }
        assert!(!verifier.is_self_update(&users, Action::Update, "41", "42"));
    }

    #[tokio::test]
    async fn storage_failure_propagates() {
        let storage = Arc::new(FixedRow {
            fail: true,
            ..FixedRow::default()
        });
        let verifier = OwnershipVerifier::new(storage, "users");
        let result = verifier
            .verify(&schema("posts", Some("createdBy")), Action::Update, "5", "7", &[])
            .await;
        assert!(matches!(result, Err(StorageError::Backend(_))));
    }

    #[tokio::test]
    async fn read_projection_is_extended_with_owner() {
        let storage = storage_with(json!({"id": 5, "title": "t", "createdBy": 7}));
        let verifier = OwnershipVerifier::new(storage.clone(), "users");
        let outcome = verifier
            .verify(
                &schema("posts", Some("createdBy")),
                Action::Read,
                "5",
                "7",
                &["id".to_owned(), "title".to_owned()],
            )
            .await
            .unwrap();
        let Ownership::Owned(Some(record)) = outcome else {
            panic!("expected fetched record");
        };
        assert_eq!(record["title"], json!("t"));
        assert_eq!(
            storage.seen.lock()[0],
            vec!["id".to_owned(), "title".to_owned(), "createdBy".to_owned()]
        );
    }

    #[test]
    fn verify_record_uses_identity_semantics() {
        let schema = schema("posts", Some("createdBy"));
        let record = json!({"createdBy": 7});
        assert!(OwnershipVerifier::verify_record(
            &schema,
            record.as_object().unwrap(),
            "7"
        ));
        assert!(!OwnershipVerifier::verify_record(
            &schema,
            record.as_object().unwrap(),
            "8"
        ));
    }
}
