use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::clock::Clock;
use crate::domain::code::{generate_code, generate_salt, hash_code};
use crate::domain::policy::RoutePolicyTable;
use crate::domain::repository::{EmailSender, StepUpRepository, StepUpStore, StepUpTransaction};
use crate::domain::types::{NewChallenge, RouteOtpEmail, SEND_WINDOW_HOURS};
use crate::error::StepUpError;
use crate::usecase::{remaining_sends, send_window_start};

pub struct SendRouteEmailOtpInput {
    pub owner_user_id: Uuid,
    pub email: String,
    pub route_key: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRouteEmailOtpOutput {
    pub route_key: String,
    pub challenge_id: Uuid,
    pub challenge_expires_at: DateTime<Utc>,
    pub resend_available_at: DateTime<Utc>,
    pub remaining_sends_24h: i64,
}

pub struct SendRouteEmailOtpUseCase<R, E, C>
where
    R: StepUpRepository,
    E: EmailSender,
    C: Clock,
{
    pub repo: R,
    pub email: E,
    pub clock: C,
    pub policies: Arc<RoutePolicyTable>,
}

impl<R, E, C> SendRouteEmailOtpUseCase<R, E, C>
where
    R: StepUpRepository,
    E: EmailSender,
    C: Clock,
{
    pub async fn execute(
        &self,
        input: SendRouteEmailOtpInput,
    ) -> Result<SendRouteEmailOtpOutput, StepUpError> {
        let policy = self.policies.resolve_email_otp(&input.route_key)?;
        let owner = input.owner_user_id;
        let route = input.route_key.as_str();
        let now = self.clock.now();

        // Rejections below return before commit; the dropped unit of work writes nothing.
        let tx = self.repo.begin(owner, route).await?;

        // 1. Rolling 24h quota → 429
        let sent = tx
            .count_challenges_since(owner, route, send_window_start(now))
            .await?;
        if remaining_sends(policy, sent) == 0 {
            let resend_available_at = tx
                .oldest_challenge_since(owner, route, send_window_start(now))
                .await?
                .map(|at| at + Duration::hours(SEND_WINDOW_HOURS));
            warn!(
                owner_user_id = %owner,
                route_key = route,
                sent,
                "route otp daily limit reached"
            );
            return Err(StepUpError::DailyLimitExceeded {
                resend_available_at,
            });
        }

        // 2. Cooldown since the latest challenge, whatever its state → 429
        if let Some(latest) = tx.get_latest_challenge(owner, route).await? {
            let resend_available_at = latest.created_at + policy.resend_cooldown();
            if now < resend_available_at {
                warn!(
                    owner_user_id = %owner,
                    route_key = route,
                    "route otp resend cooldown active"
                );
                return Err(StepUpError::ResendCooldown {
                    resend_available_at,
                });
            }
        }

        // 3. At most one live code: supersede whatever is still active
        tx.invalidate_active_challenges(owner, route, now).await?;

        // 4. Persist the new challenge; the plaintext code stays in memory
        let code = generate_code();
        let code_salt = generate_salt();
        let challenge = tx
            .create_challenge(&NewChallenge {
                owner_user_id: owner,
                route_key: route.to_owned(),
                code_hash: hash_code(&code_salt, &code),
                code_salt,
                max_attempts: policy.max_attempts,
                expires_at: now + policy.code_ttl(),
                ip_address: input.ip_address.clone(),
                user_agent: input.user_agent.clone(),
                now,
            })
            .await?;
        tx.commit().await?;

        info!(
            owner_user_id = %owner,
            route_key = route,
            challenge_id = %challenge.id,
            "route otp challenge issued"
        );

        // 5. Deliver after commit: a failed delivery still counts against the
        //    cooldown and quota, and the provider's error reaches the caller as-is.
        self.email
            .send_route_otp(&RouteOtpEmail {
                owner_user_id: owner,
                email: input.email.clone(),
                route_key: route.to_owned(),
                challenge_id: challenge.id,
                code,
            })
            .await
            .inspect_err(|e| {
                error!(
                    owner_user_id = %owner,
                    route_key = route,
                    challenge_id = %challenge.id,
                    kind = e.kind(),
                    "route otp email not delivered"
                );
            })?;

        Ok(SendRouteEmailOtpOutput {
            route_key: input.route_key.clone(),
            challenge_id: challenge.id,
            challenge_expires_at: challenge.expires_at,
            resend_available_at: now + policy.resend_cooldown(),
            remaining_sends_24h: remaining_sends(policy, sent.saturating_add(1)),
        })
    }
}
