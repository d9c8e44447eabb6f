use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use crate::app::App;

/// HTTP Basic auth guard mounted in front of `/api`. A no-op passthrough when
/// `HN_USER`/`HN_PASSWORD` aren't configured; otherwise rejects with 401 unless the request
/// carries matching Basic credentials, compared in constant time.
pub async fn require_basic_auth(
    State(app): State<App>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(creds) = app.config.basic_auth.as_ref() else {
        return Ok(next.run(request).await);
    };

    let Some(header) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Err(unauthorized());
    };

    let Ok(header) = header.to_str() else {
        return Err(unauthorized());
    };

    let Some(encoded) = header.strip_prefix("Basic ") else {
        return Err(unauthorized());
    };

    let decoded = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok());

    let Some(decoded) = decoded else {
        return Err(unauthorized());
    };

    let Some((user, password)) = decoded.split_once(':') else {
        return Err(unauthorized());
    };

    if constant_time_eq(user.as_bytes(), creds.user.as_bytes())
        && constant_time_eq(password.as_bytes(), creds.password.as_bytes())
    {
        Ok(next.run(request).await)
    } else {
        Err(unauthorized())
    }
}

fn unauthorized() -> StatusCode {
    StatusCode::UNAUTHORIZED
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
