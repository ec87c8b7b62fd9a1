use std::sync::Arc;

use axum::routing::get;
use axum::{Extension, Router, middleware};

use super::{auth, handlers};
use crate::domain::service::ResourceService;

/// Mount point of every resource and discovery route.
pub const API_PREFIX: &str = "/api";

/// Builds the resource gate router.
///
/// Discovery routes use a `_` prefix, which static-segment priority keeps
/// apart from `/{resource}` even if a model were named the same.
pub fn router(service: Arc<ResourceService>) -> Router {
    let api = Router::new()
        .route("/_schema", get(handlers::list_schemas))
        .route("/_schema/{resource}", get(handlers::get_schema))
        .route("/_relations", get(handlers::get_relations))
        .route(
            "/{resource}",
            get(handlers::list_records).post(handlers::create_record),
        )
        .route(
            "/{resource}/{id}",
            get(handlers::read_record)
                .put(handlers::update_record)
                .patch(handlers::update_record)
                .delete(handlers::delete_record),
        )
        .layer(middleware::from_fn_with_state(
            Arc::clone(&service),
            auth::authenticate,
        ))
        .layer(Extension(service));

    Router::new().nest(API_PREFIX, api)
}
