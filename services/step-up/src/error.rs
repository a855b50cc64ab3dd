use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, SecondsFormat, Utc};

/// Step-up verification error variants.
///
/// `kind()` strings are stable: clients branch their messaging on them.
#[derive(Debug, thiserror::Error)]
pub enum StepUpError {
    #[error("{0}")]
    BadRequest(String),
    #[error("a verification code was sent recently")]
    ResendCooldown { resend_available_at: DateTime<Utc> },
    #[error("daily verification code limit reached")]
    DailyLimitExceeded {
        resend_available_at: Option<DateTime<Utc>>,
    },
    #[error("verification code is invalid or expired")]
    InvalidOrExpired,
    #[error("too many verification attempts")]
    AttemptsExceeded,
    #[error("route verification required")]
    VerificationRequired,
    #[error("email provider is not configured")]
    EmailProviderNotConfigured,
    #[error("email delivery failed")]
    EmailDeliveryFailed(#[source] anyhow::Error),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl StepUpError {
    pub fn unsupported_route() -> Self {
        Self::BadRequest("route does not support email OTP verification".to_owned())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::ResendCooldown { .. } => "ROUTE_OTP_COOLDOWN",
            Self::DailyLimitExceeded { .. } => "ROUTE_OTP_DAILY_LIMIT",
            Self::InvalidOrExpired => "ROUTE_OTP_INVALID_OR_EXPIRED",
            Self::AttemptsExceeded => "ROUTE_OTP_ATTEMPTS_EXCEEDED",
            Self::VerificationRequired => "ROUTE_VERIFICATION_REQUIRED",
            Self::EmailProviderNotConfigured => "EMAIL_PROVIDER_NOT_CONFIGURED",
            Self::EmailDeliveryFailed(_) => "EMAIL_DELIVERY_FAILED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::InvalidOrExpired => StatusCode::BAD_REQUEST,
            Self::ResendCooldown { .. }
            | Self::DailyLimitExceeded { .. }
            | Self::AttemptsExceeded => StatusCode::TOO_MANY_REQUESTS,
            Self::VerificationRequired => StatusCode::FORBIDDEN,
            Self::EmailProviderNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            Self::EmailDeliveryFailed(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// When the caller may request a new code, for rate-limit errors.
    pub fn resend_available_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::ResendCooldown {
                resend_available_at,
            } => Some(*resend_available_at),
            Self::DailyLimitExceeded {
                resend_available_at,
            } => *resend_available_at,
            _ => None,
        }
    }
}

impl IntoResponse for StepUpError {
    fn into_response(self) -> Response {
        let status = self.status();
        // 4xx are expected outcomes and already logged by the use cases.
        // Server-side failures need the anyhow chain for the root cause.
        match &self {
            Self::Internal(e) => {
                tracing::error!(error = ?e, kind = self.kind(), "internal error");
            }
            Self::EmailDeliveryFailed(e) => {
                tracing::error!(error = ?e, kind = self.kind(), "email delivery failed");
            }
            _ => {}
        }
        let mut body = serde_json::json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        if let Some(at) = self.resend_available_at() {
            body["resend_available_at"] =
                serde_json::Value::String(at.to_rfc3339_opts(SecondsFormat::Millis, true));
        }
        (status, axum::Json(body)).into_response()
    }
}
