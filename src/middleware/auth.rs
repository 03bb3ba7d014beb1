use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::AppState;

/// Requires `Authorization: Bearer <ADMIN_API_KEY>`. With no key configured
/// every admin request is refused.
pub async fn admin_auth(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next<Body>,
) -> Result<Response, StatusCode> {
    let Some(admin_api_key) = state.config.admin_api_key.as_deref() else {
        tracing::warn!("Admin request refused: ADMIN_API_KEY is not configured");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) if token == admin_api_key => Ok(next.run(req).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}
