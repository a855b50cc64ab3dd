use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Step-up verification methods. Only email OTP is implemented here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMethod {
    EmailOtp,
}

impl VerificationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmailOtp => "email_otp",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "email_otp" => Some(Self::EmailOtp),
            _ => None,
        }
    }
}

/// One issued code for a (user, route) pair. The plaintext code is never stored.
#[derive(Debug, Clone)]
pub struct Challenge {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub route_key: String,
    pub code_hash: String,
    pub code_salt: String,
    pub attempt_count: i32,
    pub max_attempts: i32,
    pub expires_at: DateTime<Utc>,
    pub invalidated_at: Option<DateTime<Utc>>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Challenge {
    /// Not invalidated, not consumed, not expired.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.invalidated_at.is_none() && self.consumed_at.is_none() && self.expires_at > now
    }
}

/// Fields for inserting a challenge; counters and terminal stamps start empty.
#[derive(Debug, Clone)]
pub struct NewChallenge {
    pub owner_user_id: Uuid,
    pub route_key: String,
    pub code_hash: String,
    pub code_salt: String,
    pub max_attempts: i32,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub now: DateTime<Utc>,
}

/// Proof that a user passed step-up verification for a route.
#[derive(Debug, Clone)]
pub struct Grant {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub route_key: String,
    pub method: VerificationMethod,
    pub verified_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Grant {
    pub fn is_valid(&self, now: DateTime<Utc>, ignore_expiry: bool) -> bool {
        self.revoked_at.is_none() && (ignore_expiry || self.expires_at > now)
    }
}

/// Insert-or-refresh payload for the grant keyed by (owner, route, method).
#[derive(Debug, Clone)]
pub struct GrantUpsert {
    pub owner_user_id: Uuid,
    pub route_key: String,
    pub method: VerificationMethod,
    pub verified_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Message handed to the email delivery port. `code` is plaintext and lives only in memory.
#[derive(Debug, Clone)]
pub struct RouteOtpEmail {
    pub owner_user_id: Uuid,
    pub email: String,
    pub route_key: String,
    pub challenge_id: Uuid,
    pub code: String,
}

/// `expires_at` stored on grants for routes whose grants never expire.
pub fn never_expires_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Digits in an emailed code.
pub const OTP_CODE_LEN: usize = 6;

/// Random bytes in a per-challenge salt.
pub const OTP_SALT_BYTES: usize = 16;

/// Width of the rolling send-count window, in hours.
pub const SEND_WINDOW_HOURS: i64 = 24;
