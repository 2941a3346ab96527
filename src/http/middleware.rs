//! Operator authentication middleware

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::app::AppState;
use crate::util::secret::secrets_match;

/// Extract the token from an Authorization header value
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ")
}

/// Operator authentication errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingHeader,

    #[error("Invalid authorization header format")]
    InvalidFormat,

    #[error("Invalid operator token")]
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::MissingHeader => StatusCode::UNAUTHORIZED,
            AuthError::InvalidFormat => StatusCode::BAD_REQUEST,
            AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
        };

        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Check a request's Authorization header against the configured operator token
pub fn check_operator(auth_header: Option<&str>, expected: Option<&str>) -> Result<(), AuthError> {
    let Some(expected) = expected else {
        return Ok(());
    };

    let auth_header = auth_header.ok_or(AuthError::MissingHeader)?;
    let token = extract_bearer_token(auth_header).ok_or(AuthError::InvalidFormat)?;

    if secrets_match(token, expected) {
        Ok(())
    } else {
        Err(AuthError::InvalidToken)
    }
}

/// Middleware guarding operator commands; open when no token is configured
pub async fn require_operator(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    if let Err(e) = check_operator(auth_header, state.config.operator_token.as_deref()) {
        warn!(path = %request.uri().path(), error = %e, "Rejected operator request");
        return Err(e);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_when_no_token_configured() {
        assert!(check_operator(None, None).is_ok());
        assert!(check_operator(Some("Bearer anything"), None).is_ok());
    }

    #[test]
    fn token_must_match() {
        let expected = Some("s3cret");
        assert!(check_operator(Some("Bearer s3cret"), expected).is_ok());
        assert!(matches!(
            check_operator(None, expected),
            Err(AuthError::MissingHeader)
        ));
        assert!(matches!(
            check_operator(Some("s3cret"), expected),
            Err(AuthError::InvalidFormat)
        ));
        assert!(matches!(
            check_operator(Some("Bearer s3cre"), expected),
            Err(AuthError::InvalidToken)
        ));
    }
}
