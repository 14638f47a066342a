use axum::{
    body::Body,
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::errors::AppError;

/// Verified caller identity. Identity verification itself happens in a
/// fronting proxy, which injects the uid as a request header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub uid: String,
}

const USER_ID_HEADER: &str = "x-user-id";

/// Routes reached by machine-to-machine delivery rather than end users.
fn is_public(path: &str) -> bool {
    path.starts_with("/payments/")
}

pub async fn require_auth(mut req: Request<Body>, next: Next) -> Response {
    if is_public(req.uri().path()) {
        return next.run(req).await;
    }

    let uid = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|uid| !uid.is_empty())
        .map(str::to_string);

    match uid {
        Some(uid) => {
            req.extensions_mut().insert(AuthUser { uid });
            next.run(req).await
        }
        None => AppError::Unauthenticated("Authentication required".into()).into_response(),
    }
}
