//! Admin-token gate for the chapter write route.
//!
//! Use as an extractor in handlers that mutate data:
//!
//! ```ignore
//! async fn handler(_admin: AdminToken, ...) -> impl IntoResponse { ... }
//! ```

use axum::extract::FromRequestParts;
use http::request::Parts;

use crate::state::AppState;
use crate::web::error::ApiError;
use crate::web::middleware::client_ip::header_str;

/// Proof that the request carried a valid `x-admin-token` header.
pub struct AdminToken;

impl FromRequestParts<AppState> for AdminToken {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match header_str(&parts.headers, "x-admin-token") {
            None => Err(ApiError::Forbidden(
                "Missing x-admin-token header. Only admins can perform this action.".to_owned(),
            )),
            Some(token) if token == state.admin_token.as_ref() => Ok(AdminToken),
            Some(_) => Err(ApiError::Forbidden(
                "Invalid x-admin-token. Only admins can perform this action.".to_owned(),
            )),
        }
    }
}
