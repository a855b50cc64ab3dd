use std::collections::HashMap;

use chrono::Duration;
use serde::Deserialize;

use crate::domain::types::VerificationMethod;
use crate::error::StepUpError;

/// Verification rules for one protected route.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RoutePolicy {
    pub ttl_hours: i64,
    pub max_attempts: i32,
    pub resend_cooldown_seconds: i64,
    pub max_sends_per_24_hours: i64,
    /// Falls back to `ttl_hours` when unset.
    #[serde(default)]
    pub grant_ttl_hours: Option<i64>,
    #[serde(default)]
    pub grant_never_expires: bool,
    #[serde(default = "default_methods")]
    pub methods: Vec<VerificationMethod>,
}

fn default_methods() -> Vec<VerificationMethod> {
    vec![VerificationMethod::EmailOtp]
}

/// Upper bound for every hour-valued setting (100 years), so expiries stay
/// far inside `DateTime<Utc>` range.
pub const MAX_POLICY_HOURS: i64 = 24 * 365 * 100;

/// Rejected `ROUTE_OTP_POLICIES` input.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("route policies are not valid JSON")]
    Json(#[from] serde_json::Error),
    #[error("route {route_key:?}: {reason}")]
    Invalid {
        route_key: String,
        reason: &'static str,
    },
}

fn hours_in_range(hours: i64) -> bool {
    (1..=MAX_POLICY_HOURS).contains(&hours)
}

impl RoutePolicy {
    /// Check the ranges every duration and counter is used with.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !hours_in_range(self.ttl_hours) {
            return Err("ttl_hours must be between 1 and MAX_POLICY_HOURS");
        }
        if self.grant_ttl_hours.is_some_and(|h| !hours_in_range(h)) {
            return Err("grant_ttl_hours must be between 1 and MAX_POLICY_HOURS");
        }
        if self.max_attempts <= 0 {
            return Err("max_attempts must be positive");
        }
        if !(0..=MAX_POLICY_HOURS * 3600).contains(&self.resend_cooldown_seconds) {
            return Err("resend_cooldown_seconds must not be negative or exceed MAX_POLICY_HOURS");
        }
        if self.max_sends_per_24_hours < 0 {
            return Err("max_sends_per_24_hours must not be negative");
        }
        Ok(())
    }

    pub fn code_ttl(&self) -> Duration {
        Duration::hours(self.ttl_hours)
    }

    pub fn resend_cooldown(&self) -> Duration {
        Duration::seconds(self.resend_cooldown_seconds)
    }

    pub fn grant_ttl(&self) -> Duration {
        Duration::hours(self.grant_ttl_hours.unwrap_or(self.ttl_hours))
    }

    pub fn supports(&self, method: VerificationMethod) -> bool {
        self.methods.contains(&method)
    }
}

/// Route key → policy lookup. Read-only after startup.
#[derive(Debug, Clone, Default)]
pub struct RoutePolicyTable {
    routes: HashMap<String, RoutePolicy>,
}

impl RoutePolicyTable {
    /// Build a table, rejecting any policy outside the supported ranges.
    pub fn new(routes: HashMap<String, RoutePolicy>) -> Result<Self, PolicyError> {
        for (route_key, policy) in &routes {
            policy.validate().map_err(|reason| PolicyError::Invalid {
                route_key: route_key.clone(),
                reason,
            })?;
        }
        Ok(Self { routes })
    }

    /// Parse and validate a JSON object keyed by route.
    pub fn from_json(raw: &str) -> Result<Self, PolicyError> {
        let routes: HashMap<String, RoutePolicy> = serde_json::from_str(raw)?;
        Self::new(routes)
    }

    /// Table shipped with the service when no override is configured.
    pub fn builtin() -> Self {
        let mut routes = HashMap::new();
        routes.insert(
            "comparison".to_owned(),
            RoutePolicy {
                ttl_hours: 4,
                max_attempts: 5,
                resend_cooldown_seconds: 60,
                max_sends_per_24_hours: 5,
                grant_ttl_hours: Some(24),
                grant_never_expires: false,
                methods: default_methods(),
            },
        );
        Self { routes }
    }

    /// Add a route from trusted code; runtime input goes through [`Self::from_json`].
    pub fn with_route(mut self, route_key: impl Into<String>, policy: RoutePolicy) -> Self {
        self.routes.insert(route_key.into(), policy);
        self
    }

    pub fn get(&self, route_key: &str) -> Option<&RoutePolicy> {
        self.routes.get(route_key)
    }

    /// Policy for a route gated by email OTP, or `BadRequest` for any other route.
    pub fn resolve_email_otp(&self, route_key: &str) -> Result<&RoutePolicy, StepUpError> {
        self.get(route_key)
            .filter(|p| p.supports(VerificationMethod::EmailOtp))
            .ok_or_else(StepUpError::unsupported_route)
    }
}
