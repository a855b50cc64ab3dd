use anyhow::{Context as _, anyhow};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, DbBackend, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Select,
    Statement, TransactionTrait, Value,
    sea_query::{Expr, OnConflict},
};
use uuid::Uuid;

use gatehouse_step_up_schema::{route_access_grants, route_otp_challenges};

use crate::domain::repository::{StepUpRepository, StepUpStore, StepUpTransaction};
use crate::domain::types::{Challenge, Grant, GrantUpsert, NewChallenge, VerificationMethod};
use crate::error::StepUpError;

/// Postgres-backed step-up store.
///
/// `C` is the pooled connection outside a unit of work and the open
/// transaction inside one.
#[derive(Clone)]
pub struct DbStepUpRepository<C = DatabaseConnection> {
    pub db: C,
}

impl DbStepUpRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn ping(&self) -> Result<(), StepUpError> {
        self.db.ping().await.context("ping database")?;
        Ok(())
    }
}

// ── Query helpers ─────────────────────────────────────────────────────────────

fn challenges_for(owner_user_id: Uuid, route_key: &str) -> Select<route_otp_challenges::Entity> {
    route_otp_challenges::Entity::find()
        .filter(route_otp_challenges::Column::OwnerUserId.eq(owner_user_id))
        .filter(route_otp_challenges::Column::RouteKey.eq(route_key))
}

fn active_challenges_for(
    owner_user_id: Uuid,
    route_key: &str,
    now: DateTime<Utc>,
) -> Select<route_otp_challenges::Entity> {
    challenges_for(owner_user_id, route_key)
        .filter(route_otp_challenges::Column::InvalidatedAt.is_null())
        .filter(route_otp_challenges::Column::ConsumedAt.is_null())
        .filter(route_otp_challenges::Column::ExpiresAt.gt(now))
}

fn newest_first(
    query: Select<route_otp_challenges::Entity>,
) -> Select<route_otp_challenges::Entity> {
    // v7 ids break ties between rows created in the same instant.
    query
        .order_by_desc(route_otp_challenges::Column::CreatedAt)
        .order_by_desc(route_otp_challenges::Column::Id)
}

// ── Store ─────────────────────────────────────────────────────────────────────

impl<C> StepUpStore for DbStepUpRepository<C>
where
    C: ConnectionTrait + Send + Sync,
{
    async fn get_latest_challenge(
        &self,
        owner_user_id: Uuid,
        route_key: &str,
    ) -> Result<Option<Challenge>, StepUpError> {
        let model = newest_first(challenges_for(owner_user_id, route_key))
            .one(&self.db)
            .await
            .context("get latest challenge")?;
        Ok(model.map(challenge_from_model))
    }

    async fn get_latest_active_challenge(
        &self,
        owner_user_id: Uuid,
        route_key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Challenge>, StepUpError> {
        let model = newest_first(active_challenges_for(owner_user_id, route_key, now))
            .one(&self.db)
            .await
            .context("get latest active challenge")?;
        Ok(model.map(challenge_from_model))
    }

    async fn count_challenges_since(
        &self,
        owner_user_id: Uuid,
        route_key: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, StepUpError> {
        let count = challenges_for(owner_user_id, route_key)
            .filter(route_otp_challenges::Column::CreatedAt.gte(since))
            .count(&self.db)
            .await
            .context("count challenges in window")?;
        Ok(count)
    }

    async fn oldest_challenge_since(
        &self,
        owner_user_id: Uuid,
        route_key: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, StepUpError> {
        let model = challenges_for(owner_user_id, route_key)
            .filter(route_otp_challenges::Column::CreatedAt.gte(since))
            .order_by_asc(route_otp_challenges::Column::CreatedAt)
            .one(&self.db)
            .await
            .context("get oldest challenge in window")?;
        Ok(model.map(|m| m.created_at))
    }

    async fn invalidate_active_challenges(
        &self,
        owner_user_id: Uuid,
        route_key: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StepUpError> {
        route_otp_challenges::Entity::update_many()
            .col_expr(route_otp_challenges::Column::InvalidatedAt, Expr::value(now))
            .col_expr(route_otp_challenges::Column::UpdatedAt, Expr::value(now))
            .filter(route_otp_challenges::Column::OwnerUserId.eq(owner_user_id))
            .filter(route_otp_challenges::Column::RouteKey.eq(route_key))
            .filter(route_otp_challenges::Column::InvalidatedAt.is_null())
            .filter(route_otp_challenges::Column::ConsumedAt.is_null())
            .filter(route_otp_challenges::Column::ExpiresAt.gt(now))
            .exec(&self.db)
            .await
            .context("invalidate active challenges")?;
        Ok(())
    }

    async fn create_challenge(&self, challenge: &NewChallenge) -> Result<Challenge, StepUpError> {
        let model = route_otp_challenges::ActiveModel {
            id: Set(Uuid::now_v7()),
            owner_user_id: Set(challenge.owner_user_id),
            route_key: Set(challenge.route_key.clone()),
            code_hash: Set(challenge.code_hash.clone()),
            code_salt: Set(challenge.code_salt.clone()),
            attempt_count: Set(0),
            max_attempts: Set(challenge.max_attempts),
            expires_at: Set(challenge.expires_at),
            invalidated_at: Set(None),
            consumed_at: Set(None),
            ip_address: Set(challenge.ip_address.clone()),
            user_agent: Set(challenge.user_agent.clone()),
            created_at: Set(challenge.now),
            updated_at: Set(challenge.now),
        }
        .insert(&self.db)
        .await
        .context("create challenge")?;
        Ok(challenge_from_model(model))
    }

    async fn update_challenge_attempts(
        &self,
        challenge_id: Uuid,
        attempt_count: i32,
        now: DateTime<Utc>,
        invalidated_at: Option<DateTime<Utc>>,
    ) -> Result<(), StepUpError> {
        let mut model = route_otp_challenges::ActiveModel {
            id: Set(challenge_id),
            attempt_count: Set(attempt_count),
            updated_at: Set(now),
            ..Default::default()
        };
        if invalidated_at.is_some() {
            model.invalidated_at = Set(invalidated_at);
        }
        model
            .update(&self.db)
            .await
            .context("update challenge attempts")?;
        Ok(())
    }

    async fn consume_challenge(
        &self,
        challenge_id: Uuid,
        consumed_at: DateTime<Utc>,
    ) -> Result<(), StepUpError> {
        route_otp_challenges::ActiveModel {
            id: Set(challenge_id),
            consumed_at: Set(Some(consumed_at)),
            updated_at: Set(consumed_at),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("consume challenge")?;
        Ok(())
    }

    async fn get_active_grant(
        &self,
        owner_user_id: Uuid,
        route_key: &str,
        now: DateTime<Utc>,
        ignore_expiry: bool,
    ) -> Result<Option<Grant>, StepUpError> {
        let mut query = route_access_grants::Entity::find()
            .filter(route_access_grants::Column::OwnerUserId.eq(owner_user_id))
            .filter(route_access_grants::Column::RouteKey.eq(route_key))
            .filter(route_access_grants::Column::Method.eq(VerificationMethod::EmailOtp.as_str()))
            .filter(route_access_grants::Column::RevokedAt.is_null());
        if !ignore_expiry {
            query = query.filter(route_access_grants::Column::ExpiresAt.gt(now));
        }
        let model = query.one(&self.db).await.context("get active grant")?;
        model.map(grant_from_model).transpose()
    }

    async fn upsert_grant(
        &self,
        grant: &GrantUpsert,
        now: DateTime<Utc>,
    ) -> Result<Grant, StepUpError> {
        let model = route_access_grants::ActiveModel {
            id: Set(Uuid::now_v7()),
            owner_user_id: Set(grant.owner_user_id),
            route_key: Set(grant.route_key.clone()),
            method: Set(grant.method.as_str().to_owned()),
            verified_at: Set(grant.verified_at),
            expires_at: Set(grant.expires_at),
            revoked_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let saved = route_access_grants::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    route_access_grants::Column::OwnerUserId,
                    route_access_grants::Column::RouteKey,
                    route_access_grants::Column::Method,
                ])
                .update_columns([
                    route_access_grants::Column::VerifiedAt,
                    route_access_grants::Column::ExpiresAt,
                    route_access_grants::Column::RevokedAt,
                    route_access_grants::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec_with_returning(&self.db)
            .await
            .context("upsert grant")?;
        grant_from_model(saved)
    }
}

// ── Unit of work ──────────────────────────────────────────────────────────────

impl StepUpRepository for DbStepUpRepository<DatabaseConnection> {
    type Tx = DbStepUpRepository<DatabaseTransaction>;

    async fn begin(&self, owner_user_id: Uuid, route_key: &str) -> Result<Self::Tx, StepUpError> {
        let txn = self
            .db
            .begin()
            .await
            .context("begin step-up transaction")?;
        // Row locks cannot cover the first send for a pair (nothing to lock yet),
        // so the whole (owner, route) scope is locked until commit/rollback.
        txn.execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT pg_advisory_xact_lock(hashtextextended($1, 0))",
            [Value::from(format!("route_otp:{owner_user_id}:{route_key}"))],
        ))
        .await
        .context("lock step-up scope")?;
        Ok(DbStepUpRepository { db: txn })
    }
}

impl StepUpTransaction for DbStepUpRepository<DatabaseTransaction> {
    async fn commit(self) -> Result<(), StepUpError> {
        self.db
            .commit()
            .await
            .context("commit step-up transaction")?;
        Ok(())
    }
}

// ── Mapping ───────────────────────────────────────────────────────────────────

fn challenge_from_model(model: route_otp_challenges::Model) -> Challenge {
    Challenge {
        id: model.id,
        owner_user_id: model.owner_user_id,
        route_key: model.route_key,
        code_hash: model.code_hash,
        code_salt: model.code_salt,
        attempt_count: model.attempt_count,
        max_attempts: model.max_attempts,
        expires_at: model.expires_at,
        invalidated_at: model.invalidated_at,
        consumed_at: model.consumed_at,
        ip_address: model.ip_address,
        user_agent: model.user_agent,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

fn grant_from_model(model: route_access_grants::Model) -> Result<Grant, StepUpError> {
    let method = VerificationMethod::parse(&model.method)
        .ok_or_else(|| anyhow!("unknown verification method {:?}", model.method))?;
    Ok(Grant {
        id: model.id,
        owner_user_id: model.owner_user_id,
        route_key: model.route_key,
        method,
        verified_at: model.verified_at,
        expires_at: model.expires_at,
        revoked_at: model.revoked_at,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}
