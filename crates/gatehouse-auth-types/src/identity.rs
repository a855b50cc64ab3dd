//! Gateway-injected identity headers extractor.

use axum::extract::FromRequestParts;
use http::StatusCode;
use http::request::Parts;
use uuid::Uuid;

pub const X_GATEHOUSE_USER_ID: &str = "x-gatehouse-user-id";
pub const X_GATEHOUSE_USER_EMAIL: &str = "x-gatehouse-user-email";

/// Already-authenticated user, as forwarded by the gateway.
///
/// Returns 401 if `x-gatehouse-user-id` is absent or cannot be parsed as UUID.
/// `x-gatehouse-user-email` is optional; handlers that need the registered
/// address decide how to react when it is missing.
#[derive(Debug, Clone)]
pub struct IdentityHeaders {
    pub user_id: Uuid,
    pub user_email: Option<String>,
}

impl<S> FromRequestParts<S> for IdentityHeaders
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    // Read the headers synchronously and hand back a 'static future; an `async fn`
    // here would capture the `parts` borrow.
    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let user_id = parts
            .headers
            .get(X_GATEHOUSE_USER_ID)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<Uuid>().ok());

        let user_email = parts
            .headers
            .get(X_GATEHOUSE_USER_EMAIL)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned);

        async move {
            let user_id = user_id.ok_or(StatusCode::UNAUTHORIZED)?;
            Ok(Self {
                user_id,
                user_email,
            })
        }
    }
}
