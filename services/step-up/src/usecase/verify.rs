use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::clock::Clock;
use crate::domain::code::{hash_code, hashes_match, is_well_formed};
use crate::domain::policy::RoutePolicyTable;
use crate::domain::repository::{StepUpRepository, StepUpStore, StepUpTransaction};
use crate::domain::types::{GrantUpsert, VerificationMethod, never_expires_at};
use crate::error::StepUpError;

pub struct VerifyRouteEmailOtpInput {
    pub owner_user_id: Uuid,
    pub route_key: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyRouteEmailOtpOutput {
    pub route_key: String,
    pub verified: bool,
    pub verification_expires_at: DateTime<Utc>,
}

pub struct VerifyRouteEmailOtpUseCase<R, C>
where
    R: StepUpRepository,
    C: Clock,
{
    pub repo: R,
    pub clock: C,
    pub policies: Arc<RoutePolicyTable>,
}

impl<R, C> VerifyRouteEmailOtpUseCase<R, C>
where
    R: StepUpRepository,
    C: Clock,
{
    pub async fn execute(
        &self,
        input: VerifyRouteEmailOtpInput,
    ) -> Result<VerifyRouteEmailOtpOutput, StepUpError> {
        let policy = self.policies.resolve_email_otp(&input.route_key)?;
        let owner = input.owner_user_id;
        let route = input.route_key.as_str();

        // Malformed input gets the same answer as a wrong code.
        if !is_well_formed(&input.code) {
            return Err(StepUpError::InvalidOrExpired);
        }

        let now = self.clock.now();
        let tx = self.repo.begin(owner, route).await?;

        // 1. No active challenge → 400 (missing, expired, consumed and superseded look alike)
        let challenge = tx
            .get_latest_active_challenge(owner, route, now)
            .await?
            .ok_or(StepUpError::InvalidOrExpired)?;

        // 2. Already at the limit → burn it → 429
        if challenge.attempt_count >= challenge.max_attempts {
            tx.update_challenge_attempts(challenge.id, challenge.attempt_count, now, Some(now))
                .await?;
            tx.commit().await?;
            warn!(
                owner_user_id = %owner,
                route_key = route,
                challenge_id = %challenge.id,
                "route otp attempts exhausted"
            );
            return Err(StepUpError::AttemptsExceeded);
        }

        // 3. Wrong code: the attempt sticks even though the call fails
        let expected = hash_code(&challenge.code_salt, &input.code);
        if !hashes_match(&challenge.code_hash, &expected) {
            let attempt_count = challenge.attempt_count + 1;
            // Backstop for rows written under a different limit; step 2 normally exhausts first.
            let exhausted = attempt_count > challenge.max_attempts;
            tx.update_challenge_attempts(
                challenge.id,
                attempt_count,
                now,
                exhausted.then_some(now),
            )
            .await?;
            tx.commit().await?;
            if exhausted {
                warn!(
                    owner_user_id = %owner,
                    route_key = route,
                    challenge_id = %challenge.id,
                    "route otp attempts exhausted"
                );
                return Err(StepUpError::AttemptsExceeded);
            }
            return Err(StepUpError::InvalidOrExpired);
        }

        // 4. Correct code: consume once, then issue or refresh the grant
        tx.consume_challenge(challenge.id, now).await?;
        let expires_at = if policy.grant_never_expires {
            never_expires_at()
        } else {
            now + policy.grant_ttl()
        };
        let grant = tx
            .upsert_grant(
                &GrantUpsert {
                    owner_user_id: owner,
                    route_key: route.to_owned(),
                    method: VerificationMethod::EmailOtp,
                    verified_at: now,
                    expires_at,
                },
                now,
            )
            .await?;
        tx.commit().await?;

        info!(
            owner_user_id = %owner,
            route_key = route,
            challenge_id = %challenge.id,
            grant_id = %grant.id,
            "route access granted"
        );

        Ok(VerifyRouteEmailOtpOutput {
            route_key: input.route_key.clone(),
            verified: true,
            verification_expires_at: grant.expires_at,
        })
    }
}
