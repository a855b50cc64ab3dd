//! In-process step-up store for tests and single-node tooling.

use std::sync::Arc;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::repository::{StepUpRepository, StepUpStore, StepUpTransaction};
use crate::domain::types::{Challenge, Grant, GrantUpsert, NewChallenge, VerificationMethod};
use crate::error::StepUpError;

#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub challenges: Vec<Challenge>,
    pub grants: Vec<Grant>,
}

impl MemoryState {
    fn scoped<'a>(
        &'a self,
        owner_user_id: Uuid,
        route_key: &'a str,
    ) -> impl Iterator<Item = &'a Challenge> + 'a {
        self.challenges
            .iter()
            .filter(move |c| c.owner_user_id == owner_user_id && c.route_key == route_key)
    }

    // `max_by_key` keeps the last of equal keys, i.e. the latest insert.
    fn latest_challenge(&self, owner_user_id: Uuid, route_key: &str) -> Option<Challenge> {
        self.scoped(owner_user_id, route_key)
            .max_by_key(|c| c.created_at)
            .cloned()
    }

    fn latest_active_challenge(
        &self,
        owner_user_id: Uuid,
        route_key: &str,
        now: DateTime<Utc>,
    ) -> Option<Challenge> {
        self.scoped(owner_user_id, route_key)
            .filter(|c| c.is_active(now))
            .max_by_key(|c| c.created_at)
            .cloned()
    }

    fn count_since(&self, owner_user_id: Uuid, route_key: &str, since: DateTime<Utc>) -> u64 {
        self.scoped(owner_user_id, route_key)
            .filter(|c| c.created_at >= since)
            .count() as u64
    }

    fn oldest_since(
        &self,
        owner_user_id: Uuid,
        route_key: &str,
        since: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        self.scoped(owner_user_id, route_key)
            .map(|c| c.created_at)
            .filter(|at| *at >= since)
            .min()
    }

    fn invalidate_active(&mut self, owner_user_id: Uuid, route_key: &str, now: DateTime<Utc>) {
        for c in self.challenges.iter_mut().filter(|c| {
            c.owner_user_id == owner_user_id && c.route_key == route_key && c.is_active(now)
        }) {
            c.invalidated_at = Some(now);
            c.updated_at = now;
        }
    }

    fn create(&mut self, new: &NewChallenge) -> Challenge {
        let challenge = Challenge {
            id: Uuid::now_v7(),
            owner_user_id: new.owner_user_id,
            route_key: new.route_key.clone(),
            code_hash: new.code_hash.clone(),
            code_salt: new.code_salt.clone(),
            attempt_count: 0,
            max_attempts: new.max_attempts,
            expires_at: new.expires_at,
            invalidated_at: None,
            consumed_at: None,
            ip_address: new.ip_address.clone(),
            user_agent: new.user_agent.clone(),
            created_at: new.now,
            updated_at: new.now,
        };
        self.challenges.push(challenge.clone());
        challenge
    }

    fn challenge_mut(&mut self, challenge_id: Uuid) -> Result<&mut Challenge, StepUpError> {
        self.challenges
            .iter_mut()
            .find(|c| c.id == challenge_id)
            .ok_or_else(|| anyhow!("challenge {challenge_id} not found").into())
    }

    fn active_grant(
        &self,
        owner_user_id: Uuid,
        route_key: &str,
        now: DateTime<Utc>,
        ignore_expiry: bool,
    ) -> Option<Grant> {
        self.grants
            .iter()
            .find(|g| {
                g.owner_user_id == owner_user_id
                    && g.route_key == route_key
                    && g.method == VerificationMethod::EmailOtp
                    && g.is_valid(now, ignore_expiry)
            })
            .cloned()
    }

    fn upsert_grant(&mut self, upsert: &GrantUpsert, now: DateTime<Utc>) -> Grant {
        let existing = self.grants.iter_mut().find(|g| {
            g.owner_user_id == upsert.owner_user_id
                && g.route_key == upsert.route_key
                && g.method == upsert.method
        });
        match existing {
            Some(grant) => {
                grant.verified_at = upsert.verified_at;
                grant.expires_at = upsert.expires_at;
                grant.revoked_at = None;
                grant.updated_at = now;
                grant.clone()
            }
            None => {
                let grant = Grant {
                    id: Uuid::now_v7(),
                    owner_user_id: upsert.owner_user_id,
                    route_key: upsert.route_key.clone(),
                    method: upsert.method,
                    verified_at: upsert.verified_at,
                    expires_at: upsert.expires_at,
                    revoked_at: None,
                    created_at: now,
                    updated_at: now,
                };
                self.grants.push(grant.clone());
                grant
            }
        }
    }
}

/// Shared in-memory store. Clones see the same state.
///
/// A unit of work holds the whole store, so it serializes every pair, not
/// just its own.
#[derive(Clone, Default)]
pub struct MemoryStepUpRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStepUpRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }

    /// Replace grants wholesale, e.g. to seed a revoked or stale grant.
    pub async fn set_grants(&self, grants: Vec<Grant>) {
        self.state.lock().await.grants = grants;
    }
}

/// Open unit of work over [`MemoryStepUpRepository`]. Writes land in `working`
/// and replace the guarded state on commit.
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: Mutex<MemoryState>,
}

impl StepUpRepository for MemoryStepUpRepository {
    type Tx = MemoryTransaction;

    async fn begin(
        &self,
        _owner_user_id: Uuid,
        _route_key: &str,
    ) -> Result<Self::Tx, StepUpError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = Mutex::new(guard.clone());
        Ok(MemoryTransaction { guard, working })
    }
}

impl StepUpTransaction for MemoryTransaction {
    async fn commit(self) -> Result<(), StepUpError> {
        let MemoryTransaction { mut guard, working } = self;
        *guard = working.into_inner();
        Ok(())
    }
}

// Both the shared store and an open transaction answer the same queries,
// each against its own `MemoryState`.
macro_rules! impl_memory_store {
    ($ty:ty, $field:ident) => {
        impl StepUpStore for $ty {
            async fn get_latest_challenge(
                &self,
                owner_user_id: Uuid,
                route_key: &str,
            ) -> Result<Option<Challenge>, StepUpError> {
                Ok(self
                    .$field
                    .lock()
                    .await
                    .latest_challenge(owner_user_id, route_key))
            }

            async fn get_latest_active_challenge(
                &self,
                owner_user_id: Uuid,
                route_key: &str,
                now: DateTime<Utc>,
            ) -> Result<Option<Challenge>, StepUpError> {
                Ok(self
                    .$field
                    .lock()
                    .await
                    .latest_active_challenge(owner_user_id, route_key, now))
            }

            async fn count_challenges_since(
                &self,
                owner_user_id: Uuid,
                route_key: &str,
                since: DateTime<Utc>,
            ) -> Result<u64, StepUpError> {
                Ok(self
                    .$field
                    .lock()
                    .await
                    .count_since(owner_user_id, route_key, since))
            }

            async fn oldest_challenge_since(
                &self,
                owner_user_id: Uuid,
                route_key: &str,
                since: DateTime<Utc>,
            ) -> Result<Option<DateTime<Utc>>, StepUpError> {
                Ok(self
                    .$field
                    .lock()
                    .await
                    .oldest_since(owner_user_id, route_key, since))
            }

            async fn invalidate_active_challenges(
                &self,
                owner_user_id: Uuid,
                route_key: &str,
                now: DateTime<Utc>,
            ) -> Result<(), StepUpError> {
                self.$field
                    .lock()
                    .await
                    .invalidate_active(owner_user_id, route_key, now);
                Ok(())
            }

            async fn create_challenge(
                &self,
                challenge: &NewChallenge,
            ) -> Result<Challenge, StepUpError> {
                Ok(self.$field.lock().await.create(challenge))
            }

            async fn update_challenge_attempts(
                &self,
                challenge_id: Uuid,
                attempt_count: i32,
                now: DateTime<Utc>,
                invalidated_at: Option<DateTime<Utc>>,
            ) -> Result<(), StepUpError> {
                let mut state = self.$field.lock().await;
                let challenge = state.challenge_mut(challenge_id)?;
                challenge.attempt_count = attempt_count;
                challenge.updated_at = now;
                if invalidated_at.is_some() {
                    challenge.invalidated_at = invalidated_at;
                }
                Ok(())
            }

            async fn consume_challenge(
                &self,
                challenge_id: Uuid,
                consumed_at: DateTime<Utc>,
            ) -> Result<(), StepUpError> {
                let mut state = self.$field.lock().await;
                let challenge = state.challenge_mut(challenge_id)?;
                challenge.consumed_at = Some(consumed_at);
                challenge.updated_at = consumed_at;
                Ok(())
            }

            async fn get_active_grant(
                &self,
                owner_user_id: Uuid,
                route_key: &str,
                now: DateTime<Utc>,
                ignore_expiry: bool,
            ) -> Result<Option<Grant>, StepUpError> {
                Ok(self
                    .$field
                    .lock()
                    .await
                    .active_grant(owner_user_id, route_key, now, ignore_expiry))
            }

            async fn upsert_grant(
                &self,
                grant: &GrantUpsert,
                now: DateTime<Utc>,
            ) -> Result<Grant, StepUpError> {
                Ok(self.$field.lock().await.upsert_grant(grant, now))
            }
        }
    };
}

impl_memory_store!(MemoryStepUpRepository, state);
impl_memory_store!(MemoryTransaction, working);
