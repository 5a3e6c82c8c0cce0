//! services/api/src/web/middleware.rs
//!
//! Identity middleware for protecting routes.

use axum::{
    extract::{Query, Request},
    http::{HeaderMap, StatusCode, Uri},
    middleware::Next,
    response::Response,
};
use panchakarma_core::{Actor, Role};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::error::Rejection;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Browsers cannot set headers on a WebSocket handshake, so the progress feed
/// also takes the identity as `?user_id=..&user_role=..`.
#[derive(Debug, Default, Deserialize)]
pub struct IdentityQuery {
    pub user_id: Option<String>,
    pub user_role: Option<String>,
}

fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, Rejection> {
    value.ok_or_else(|| (StatusCode::UNAUTHORIZED, format!("{} is required", name)))
}

fn parse_actor(
    id: Option<&str>,
    role: Option<&str>,
    (id_name, role_name): (&str, &str),
) -> Result<Actor, Rejection> {
    let id = Uuid::parse_str(required(id, id_name)?)
        .map_err(|_| (StatusCode::BAD_REQUEST, format!("Invalid {} format", id_name)))?;
    let role = required(role, role_name)?
        .parse::<Role>()
        .map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    Ok(Actor { id, role })
}

/// Reads the caller's identity from the request headers.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, Rejection> {
    let value = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    parse_actor(
        value(USER_ID_HEADER),
        value(USER_ROLE_HEADER),
        (USER_ID_HEADER, USER_ROLE_HEADER),
    )
}

/// Reads the caller's identity from the query string.
pub fn actor_from_query(uri: &Uri) -> Result<Actor, Rejection> {
    let Query(identity) = Query::<IdentityQuery>::try_from_uri(uri)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.body_text()))?;
    parse_actor(
        identity.user_id.as_deref(),
        identity.user_role.as_deref(),
        ("user_id", "user_role"),
    )
}

/// Middleware that resolves the acting user and inserts it into the request
/// extensions for handlers to use.
///
/// A missing header yields 401 Unauthorized, a malformed one 400 Bad Request.
pub async fn require_actor(mut req: Request, next: Next) -> Result<Response, Rejection> {
    let actor = actor_from_headers(req.headers()).map_err(|rejection| {
        warn!("Rejected request to {}: {}", req.uri().path(), rejection.1);
        rejection
    })?;

    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}

/// Like `require_actor`, but falls back to the query string when the identity
/// headers are absent.
pub async fn require_feed_actor(mut req: Request, next: Next) -> Result<Response, Rejection> {
    let resolved = if req.headers().contains_key(USER_ID_HEADER) {
        actor_from_headers(req.headers())
    } else {
        actor_from_query(req.uri())
    };
    let actor = resolved.map_err(|rejection| {
        warn!("Rejected feed connection to {}: {}", req.uri().path(), rejection.1);
        rejection
    })?;

    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::HeaderValue,
        middleware::from_fn,
        routing::get,
        Extension, Router,
    };
    use tower::ServiceExt;

    #[test]
    fn parses_practitioner_identity() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_str(&id.to_string()).unwrap());
        headers.insert(USER_ROLE_HEADER, HeaderValue::from_static("Practitioner"));
        assert_eq!(actor_from_headers(&headers).unwrap(), Actor::practitioner(id));
    }

    #[test]
    fn missing_and_malformed_headers_are_rejected() {
        let mut headers = HeaderMap::new();
        assert_eq!(actor_from_headers(&headers).unwrap_err().0, StatusCode::UNAUTHORIZED);

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("not-a-uuid"));
        headers.insert(USER_ROLE_HEADER, HeaderValue::from_static("patient"));
        assert_eq!(actor_from_headers(&headers).unwrap_err().0, StatusCode::BAD_REQUEST);

        headers.insert(USER_ID_HEADER, HeaderValue::from_str(&Uuid::nil().to_string()).unwrap());
        headers.insert(USER_ROLE_HEADER, HeaderValue::from_static("admin"));
        assert_eq!(actor_from_headers(&headers).unwrap_err().0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn identity_can_come_from_the_query_string() {
        let id = Uuid::new_v4();
        let uri: Uri = format!("/ws/progress?user_id={}&user_role=patient", id).parse().unwrap();
        assert_eq!(actor_from_query(&uri).unwrap(), Actor::patient(id));

        let uri: Uri = "/ws/progress".parse().unwrap();
        assert_eq!(actor_from_query(&uri).unwrap_err().0, StatusCode::UNAUTHORIZED);

        let uri: Uri = "/ws/progress?user_id=nope&user_role=patient".parse().unwrap();
        assert_eq!(actor_from_query(&uri).unwrap_err().0, StatusCode::BAD_REQUEST);
    }

    fn whoami() -> Router {
        Router::new()
            .route("/feed", get(|Extension(actor): Extension<Actor>| async move { actor.id.to_string() }))
            .layer(from_fn(require_feed_actor))
    }

    async fn status_of(request: axum::http::Request<Body>) -> StatusCode {
        whoami().oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn feed_accepts_headers_or_query() {
        let id = Uuid::new_v4();
        let by_query = axum::http::Request::get(format!("/feed?user_id={}&user_role=practitioner", id))
            .body(Body::empty())
            .unwrap();
        assert_eq!(status_of(by_query).await, StatusCode::OK);

        let by_header = axum::http::Request::get("/feed")
            .header(USER_ID_HEADER, id.to_string())
            .header(USER_ROLE_HEADER, "patient")
            .body(Body::empty())
            .unwrap();
        assert_eq!(status_of(by_header).await, StatusCode::OK);

        let anonymous = axum::http::Request::get("/feed").body(Body::empty()).unwrap();
        assert_eq!(status_of(anonymous).await, StatusCode::UNAUTHORIZED);
    }
}
