//! Authentication middleware and caller extractor.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use resource_gate_sdk::{AccessError, Action, CallerIdentity, Credentials};

use super::error::Problem;
use crate::domain::service::ResourceService;

/// Resolved caller of the current request; `None` is anonymous.
///
/// Inserted by [`authenticate`]; extracting it without the middleware is a
/// server misconfiguration.
#[derive(Debug, Clone)]
pub struct Caller(pub Option<CallerIdentity>);

impl Caller {
    #[must_use]
    pub fn identity(&self) -> Option<&CallerIdentity> {
        self.0.as_ref()
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = Problem;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Caller>().cloned().ok_or_else(|| {
            Problem::from(AccessError::Internal(
                "Caller not found - auth middleware not configured".to_owned(),
            ))
        })
    }
}

/// Resolves the bearer credential into a [`Caller`].
///
/// Anonymous requests pass through; whether anonymity is acceptable is
/// decided per operation by the access guard. A presented but invalid
/// credential is rejected here with 401.
pub async fn authenticate(
    State(service): State<Arc<ResourceService>>,
    mut request: Request,
    next: Next,
) -> Response {
    if is_preflight_request(request.method(), request.headers()) {
        return next.run(request).await;
    }

    let credentials = extract_bearer_token(request.headers())
        .map_or_else(Credentials::anonymous, Credentials::bearer);

    match service.authenticate(&credentials).await {
        Ok(caller) => {
            tracing::debug!(
                caller = caller.as_ref().map_or("anonymous", |c| c.id.as_str()),
                action = ?request_action(request.method(), request.uri().path()),
                "Request authenticated"
            );
            request.extensions_mut().insert(Caller(caller));
            next.run(request).await
        }
        Err(err) => {
            tracing::debug!(error = %err, "Rejected request credentials");
            Problem::from(err).into_response()
        }
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .filter(|t| !t.is_empty())
}

/// Action implied by a request on `/{resource}[/{id}]`; `None` for discovery routes.
fn request_action(method: &Method, path: &str) -> Option<Action> {
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    let resource = segments.next()?;
    if resource.starts_with('_') {
        return None;
    }
    Action::from_method(method, segments.next().is_some())
}

fn is_preflight_request(method: &Method, headers: &HeaderMap) -> bool {
    method == Method::OPTIONS
        && headers.contains_key(header::ORIGIN)
        && headers.contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
}
