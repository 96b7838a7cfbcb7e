use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use jsonwebtoken::{DecodingKey, Validation, decode};
use quad_policy::Error;
use quad_types::api::Claims;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

/// Validates the bearer JWT and resolves the caller's capability set.
///
/// Handlers behind this layer read `Extension<Viewer>`. A valid token for a
/// user who is no longer in the directory is treated like no token at all.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Authorization(bearer) = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(Error::Unauthorized)?;

    let claims = decode::<Claims>(
        bearer.token(),
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        debug!("Rejected bearer token: {}", e);
        Error::Unauthorized
    })?
    .claims;

    let user_id = claims.sub;
    let db = state.clone();
    let viewer = crate::blocking(move || {
        db.db.load_viewer(user_id)?.ok_or(Error::Unauthorized)
    })
    .await?;

    req.extensions_mut().insert(claims);
    req.extensions_mut().insert(viewer);
    Ok(next.run(req).await)
}
