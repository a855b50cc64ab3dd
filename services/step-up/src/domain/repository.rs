#![allow(async_fn_in_trait)]

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::types::{Challenge, Grant, GrantUpsert, NewChallenge, RouteOtpEmail};
use crate::error::StepUpError;

/// Challenge and grant storage for step-up verification.
///
/// Every query is scoped to one (owner, route) pair.
pub trait StepUpStore: Send + Sync {
    /// Most recent challenge in any state.
    async fn get_latest_challenge(
        &self,
        owner_user_id: Uuid,
        route_key: &str,
    ) -> Result<Option<Challenge>, StepUpError>;

    /// Most recent challenge that is not invalidated, consumed or expired at `now`.
    async fn get_latest_active_challenge(
        &self,
        owner_user_id: Uuid,
        route_key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Challenge>, StepUpError>;

    /// Challenges created at or after `since`.
    async fn count_challenges_since(
        &self,
        owner_user_id: Uuid,
        route_key: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, StepUpError>;

    /// `created_at` of the oldest challenge created at or after `since`.
    async fn oldest_challenge_since(
        &self,
        owner_user_id: Uuid,
        route_key: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, StepUpError>;

    /// Stamp `invalidated_at = now` on every active challenge.
    async fn invalidate_active_challenges(
        &self,
        owner_user_id: Uuid,
        route_key: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StepUpError>;

    async fn create_challenge(&self, challenge: &NewChallenge) -> Result<Challenge, StepUpError>;

    async fn update_challenge_attempts(
        &self,
        challenge_id: Uuid,
        attempt_count: i32,
        now: DateTime<Utc>,
        invalidated_at: Option<DateTime<Utc>>,
    ) -> Result<(), StepUpError>;

    async fn consume_challenge(
        &self,
        challenge_id: Uuid,
        consumed_at: DateTime<Utc>,
    ) -> Result<(), StepUpError>;

    /// Unrevoked email-OTP grant; expiry is skipped when `ignore_expiry` is set.
    async fn get_active_grant(
        &self,
        owner_user_id: Uuid,
        route_key: &str,
        now: DateTime<Utc>,
        ignore_expiry: bool,
    ) -> Result<Option<Grant>, StepUpError>;

    /// Insert, or overwrite `verified_at`/`expires_at` and clear `revoked_at`.
    async fn upsert_grant(
        &self,
        grant: &GrantUpsert,
        now: DateTime<Utc>,
    ) -> Result<Grant, StepUpError>;
}

/// Store that can open a unit of work over one (owner, route) pair.
///
/// Concurrent units of work for the same pair are serialized.
pub trait StepUpRepository: StepUpStore {
    type Tx: StepUpTransaction;

    async fn begin(&self, owner_user_id: Uuid, route_key: &str) -> Result<Self::Tx, StepUpError>;
}

/// Open unit of work. Dropping it without `commit` discards every write.
pub trait StepUpTransaction: StepUpStore {
    async fn commit(self) -> Result<(), StepUpError>;
}

/// Port for delivering codes by email.
///
/// Errors are returned to callers unchanged, so providers should pick the
/// specific variant (`EmailProviderNotConfigured`, `EmailDeliveryFailed`).
pub trait EmailSender: Send + Sync {
    async fn send_route_otp(&self, message: &RouteOtpEmail) -> Result<(), StepUpError>;
}
