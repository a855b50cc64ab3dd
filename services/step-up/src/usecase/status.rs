use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::clock::Clock;
use crate::domain::policy::RoutePolicyTable;
use crate::domain::repository::StepUpStore;
use crate::error::StepUpError;
use crate::usecase::{remaining_sends, send_window_start};

/// Advisory view of a user's step-up state for one route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteAccessStatus {
    pub route_key: String,
    pub verified: bool,
    pub verification_expires_at: Option<DateTime<Utc>>,
    pub challenge_active: bool,
    pub challenge_expires_at: Option<DateTime<Utc>>,
    pub remaining_sends_24h: i64,
    /// Only set while the resend cooldown is still running.
    pub resend_available_at: Option<DateTime<Utc>>,
}

/// Reads outside a unit of work: the result only drives UI hints, so a read
/// racing a concurrent send is acceptable.
pub struct GetRouteAccessStatusUseCase<S, C>
where
    S: StepUpStore,
    C: Clock,
{
    pub store: S,
    pub clock: C,
    pub policies: Arc<RoutePolicyTable>,
}

impl<S, C> GetRouteAccessStatusUseCase<S, C>
where
    S: StepUpStore,
    C: Clock,
{
    pub async fn execute(
        &self,
        owner_user_id: Uuid,
        route_key: &str,
    ) -> Result<RouteAccessStatus, StepUpError> {
        let policy = self.policies.resolve_email_otp(route_key)?;
        let now = self.clock.now();

        let grant = self
            .store
            .get_active_grant(owner_user_id, route_key, now, policy.grant_never_expires)
            .await?;
        let active = self
            .store
            .get_latest_active_challenge(owner_user_id, route_key, now)
            .await?;
        let latest = self
            .store
            .get_latest_challenge(owner_user_id, route_key)
            .await?;
        let sent = self
            .store
            .count_challenges_since(owner_user_id, route_key, send_window_start(now))
            .await?;

        Ok(RouteAccessStatus {
            route_key: route_key.to_owned(),
            verified: grant.is_some(),
            verification_expires_at: grant.map(|g| g.expires_at),
            challenge_active: active.is_some(),
            challenge_expires_at: active.map(|c| c.expires_at),
            remaining_sends_24h: remaining_sends(policy, sent),
            resend_available_at: latest
                .map(|c| c.created_at + policy.resend_cooldown())
                .filter(|at| *at > now),
        })
    }
}
