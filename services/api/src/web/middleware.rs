//! services/api/src/web/middleware.rs
//!
//! Identity middleware for protecting routes.
//!
//! Authentication itself is delegated to the identity provider sitting in
//! front of this service; by the time a request arrives here it carries a
//! verified `x-user-id` header. This middleware only parses that header and
//! makes the user id available to handlers.

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

/// Middleware that extracts the verified user id from the `x-user-id` header.
///
/// If present and a valid UUID, inserts the user_id into request extensions
/// for handlers to use. If missing or malformed, returns 401 Unauthorized.
pub async fn require_identity(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let user_id = req
        .headers()
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(user_id);

    Ok(next.run(req).await)
}
