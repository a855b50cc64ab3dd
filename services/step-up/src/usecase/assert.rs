use std::sync::Arc;

use uuid::Uuid;

use crate::domain::clock::Clock;
use crate::domain::policy::RoutePolicyTable;
use crate::domain::repository::StepUpStore;
use crate::error::StepUpError;

/// Guard for protected routes: passes only with a valid grant. Never writes.
pub struct AssertRouteAccessUseCase<S, C>
where
    S: StepUpStore,
    C: Clock,
{
    pub store: S,
    pub clock: C,
    pub policies: Arc<RoutePolicyTable>,
}

impl<S, C> AssertRouteAccessUseCase<S, C>
where
    S: StepUpStore,
    C: Clock,
{
    pub async fn execute(&self, owner_user_id: Uuid, route_key: &str) -> Result<(), StepUpError> {
        let policy = self.policies.resolve_email_otp(route_key)?;
        let now = self.clock.now();

        self.store
            .get_active_grant(owner_user_id, route_key, now, policy.grant_never_expires)
            .await?
            .ok_or(StepUpError::VerificationRequired)?;
        Ok(())
    }
}
