use std::sync::Arc;

use axum::extract::{Extension, Path, Query};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use resource_gate_sdk::Row;
use serde::Deserialize;

use super::auth::Caller;
use super::error::ApiResult;
use crate::domain::markdown;
use crate::domain::service::ResourceService;

const TEXT_MARKDOWN: &str = "text/markdown; charset=utf-8";

#[derive(Debug, Default, Deserialize)]
pub struct DiscoveryQuery {
    pub format: Option<String>,
}

/// Markdown when asked for via `?format=markdown|md` or `Accept: text/markdown`.
fn wants_markdown(query: &DiscoveryQuery, headers: &HeaderMap) -> bool {
    if let Some(format) = &query.format {
        return format.eq_ignore_ascii_case("markdown") || format.eq_ignore_ascii_case("md");
    }
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/markdown"))
}

fn markdown_response(body: String) -> Response {
    ([(header::CONTENT_TYPE, TEXT_MARKDOWN)], body).into_response()
}

pub async fn list_records(
    caller: Caller,
    Extension(svc): Extension<Arc<ResourceService>>,
    Path(resource): Path<String>,
) -> ApiResult<Json<Vec<Row>>> {
    let rows = svc.list(caller.identity(), &resource).await?;
    Ok(Json(rows))
}

pub async fn create_record(
    caller: Caller,
    Extension(svc): Extension<Arc<ResourceService>>,
    Path(resource): Path<String>,
    Json(payload): Json<Row>,
) -> ApiResult<impl IntoResponse> {
    let row = svc.create(caller.identity(), &resource, &payload).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn read_record(
    caller: Caller,
    Extension(svc): Extension<Arc<ResourceService>>,
    Path((resource, id)): Path<(String, String)>,
) -> ApiResult<Json<Row>> {
    let row = svc.read(caller.identity(), &resource, &id).await?;
    Ok(Json(row))
}

pub async fn update_record(
    caller: Caller,
    Extension(svc): Extension<Arc<ResourceService>>,
    Path((resource, id)): Path<(String, String)>,
    Json(payload): Json<Row>,
) -> ApiResult<Json<Row>> {
    let row = svc
        .update(caller.identity(), &resource, &id, &payload)
        .await?;
    Ok(Json(row))
}

pub async fn delete_record(
    caller: Caller,
    Extension(svc): Extension<Arc<ResourceService>>,
    Path((resource, id)): Path<(String, String)>,
) -> ApiResult<Json<Row>> {
    let row = svc.delete(caller.identity(), &resource, &id).await?;
    Ok(Json(row))
}

pub async fn list_schemas(
    caller: Caller,
    Extension(svc): Extension<Arc<ResourceService>>,
    Query(query): Query<DiscoveryQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let schemas = svc.schemas(caller.identity()).await?;
    if wants_markdown(&query, &headers) {
        return Ok(markdown_response(markdown::render_catalog(&schemas)));
    }
    Ok(Json(schemas).into_response())
}

pub async fn get_schema(
    caller: Caller,
    Extension(svc): Extension<Arc<ResourceService>>,
    Path(resource): Path<String>,
    Query(query): Query<DiscoveryQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let schema = svc.schema(caller.identity(), &resource).await?;
    if wants_markdown(&query, &headers) {
        return Ok(markdown_response(markdown::render_schema(&schema)));
    }
    Ok(Json(schema).into_response())
}

pub async fn get_relations(
    caller: Caller,
    Extension(svc): Extension<Arc<ResourceService>>,
    Query(query): Query<DiscoveryQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let relations = svc.relations(caller.identity()).await?;
    if wants_markdown(&query, &headers) {
        return Ok(markdown_response(markdown::render_relations(&relations)));
    }
    Ok(Json(relations).into_response())
}
