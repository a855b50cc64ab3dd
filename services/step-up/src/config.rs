use crate::domain::policy::RoutePolicyTable;
use crate::infra::email::EmailProviderConfig;

/// Step-up service configuration loaded from environment variables.
#[derive(Debug)]
pub struct StepUpConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// TCP port to listen on (default 3114). Env var: `STEP_UP_PORT`.
    pub step_up_port: u16,
    /// Routes gated by step-up verification. Env var: `ROUTE_OTP_POLICIES`
    /// (JSON object keyed by route); the built-in table when unset.
    pub policies: RoutePolicyTable,
    /// Email API settings. `None` unless `EMAIL_API_URL`, `EMAIL_API_TOKEN`
    /// and `EMAIL_FROM` are all set.
    pub email_provider: Option<EmailProviderConfig>,
}

impl StepUpConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL").expect("DATABASE_URL"),
            step_up_port: std::env::var("STEP_UP_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3114),
            policies: std::env::var("ROUTE_OTP_POLICIES")
                .ok()
                .map(|raw| {
                    RoutePolicyTable::from_json(&raw).expect("invalid ROUTE_OTP_POLICIES")
                })
                .unwrap_or_else(RoutePolicyTable::builtin),
            email_provider: email_provider_from(
                std::env::var("EMAIL_API_URL").ok(),
                std::env::var("EMAIL_API_TOKEN").ok(),
                std::env::var("EMAIL_FROM").ok(),
            ),
        }
    }
}

fn email_provider_from(
    api_url: Option<String>,
    api_token: Option<String>,
    from: Option<String>,
) -> Option<EmailProviderConfig> {
    match (api_url, api_token, from) {
        (Some(api_url), Some(api_token), Some(from))
            if !api_url.is_empty() && !api_token.is_empty() && !from.is_empty() =>
        {
            Some(EmailProviderConfig {
                api_url,
                api_token,
                from,
            })
        }
        _ => None,
    }
}
