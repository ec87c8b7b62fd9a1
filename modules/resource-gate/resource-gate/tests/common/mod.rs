#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

//! Shared fixtures for resource gate integration tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use jsonwebtoken::{EncodingKey, Header, encode};
use parking_lot::Mutex;
use resource_gate::infra::auth::{SessionClaims, resolver_from_config};
use resource_gate::infra::grants::StaticPublicGrants;
use resource_gate::infra::storage::InMemoryStorage;
use resource_gate::{ResourceGateConfig, ResourceService, Row, Storage, StorageError};
use resource_gate_sdk::RowFilter;
use serde_json::{Value, json};

pub const JWT_SECRET: &str = "integration-secret";

/// Blog-shaped deployment: users, owned posts, comments, and an unowned tags table.
pub fn config() -> ResourceGateConfig {
    serde_json::from_value(json!({
        "publicGrants": { "posts": ["read"] },
        "jwt": { "secret": JWT_SECRET },
        "tables": [
            {
                "name": "users",
                "columns": [
                    { "name": "id", "type": "integer", "primaryKey": true },
                    { "name": "name", "notNull": true },
                    { "name": "email" },
                    { "name": "password" },
                    { "name": "role" }
                ]
            },
            {
                "name": "posts",
                "columns": [
                    { "name": "id", "type": "integer", "primaryKey": true },
                    { "name": "title", "notNull": true },
                    { "name": "body" },
                    { "name": "published", "type": "boolean" },
                    { "name": "createdBy", "type": "integer", "references": "users" },
                    { "name": "createdAt", "type": "timestamp" },
                    { "name": "updatedAt", "type": "timestamp" }
                ]
            },
            {
                "name": "comments",
                "columns": [
                    { "name": "id", "type": "integer", "primaryKey": true },
                    { "name": "postId", "type": "integer", "references": "posts" },
                    { "name": "text" },
                    { "name": "userId", "type": "integer", "references": "users" }
                ]
            },
            {
                "name": "tags",
                "columns": [
                    { "name": "id", "type": "integer", "primaryKey": true },
                    { "name": "label" }
                ]
            }
        ]
    }))
    .unwrap()
}

/// Storage wrapper that counts single-row selects per resource.
#[derive(Default)]
pub struct CountingStorage {
    pub inner: InMemoryStorage,
    single_selects: Mutex<HashMap<String, usize>>,
}

impl CountingStorage {
    pub fn single_selects(&self, resource: &str) -> usize {
        self.single_selects
            .lock()
            .get(resource)
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Storage for CountingStorage {
    async fn select_row(
        &self,
        resource: &str,
        projection: &[String],
        filter: &RowFilter,
    ) -> Result<Option<Row>, StorageError> {
        *self
            .single_selects
            .lock()
            .entry(resource.to_owned())
            .or_default() += 1;
        self.inner.select_row(resource, projection, filter).await
    }

    async fn select_rows(
        &self,
        resource: &str,
        projection: &[String],
        filter: &RowFilter,
    ) -> Result<Vec<Row>, StorageError> {
        self.inner.select_rows(resource, projection, filter).await
    }

    async fn insert(&self, resource: &str, payload: Row) -> Result<Row, StorageError> {
        self.inner.insert(resource, payload).await
    }

    async fn update(
        &self,
        resource: &str,
        id: &str,
        payload: Row,
    ) -> Result<Option<Row>, StorageError> {
        self.inner.update(resource, id, payload).await
    }

    async fn delete(&self, resource: &str, id: &str) -> Result<Option<Row>, StorageError> {
        self.inner.delete(resource, id).await
    }
}

pub struct Harness {
    pub service: Arc<ResourceService>,
    pub storage: Arc<CountingStorage>,
}

impl Harness {
    pub fn rows(&self, resource: &str) -> Vec<Row> {
        self.storage.inner.rows(resource)
    }
}

pub fn harness_with(config: &ResourceGateConfig) -> Harness {
    let catalog = Arc::new(config.build_catalog().unwrap());
    let storage = Arc::new(CountingStorage {
        inner: InMemoryStorage::for_catalog(&catalog),
        ..CountingStorage::default()
    });
    let service = ResourceService::new(
        config,
        catalog,
        Arc::clone(&storage) as Arc<dyn Storage>,
        resolver_from_config(config),
        Arc::new(StaticPublicGrants::from_config(config)),
    )
    .unwrap();
    Harness {
        service: Arc::new(service),
        storage,
    }
}

/// Default deployment seeded with two users and one post by user 1.
pub fn harness() -> Harness {
    let h = harness_with(&config());
    h.storage.inner.seed(
        "users",
        [
            row(json!({"id": 1, "name": "Ada", "email": "ada@example.com", "password": "h1", "role": "editor"})),
            row(json!({"id": 2, "name": "Bob", "email": "bob@example.com", "password": "h2", "role": "editor"})),
        ],
    );
    h.storage.inner.seed(
        "posts",
        [row(json!({"id": 1, "title": "Hello", "body": "first", "createdBy": 1}))],
    );
    h
}

pub fn row(value: Value) -> Row {
    serde_json::from_value(value).unwrap()
}

/// Mints an HS256 session token valid for one hour.
pub fn token(id: &str, role: &str, permissions: Value) -> String {
    let exp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
        + 3600;
    let claims = SessionClaims {
        sub: id.to_owned(),
        role: role.to_owned(),
        permissions: serde_json::from_value(permissions).unwrap(),
        exp,
        iss: None,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}
