//! Usage gate: per-user daily generation quota.
//!
//! DESIGN
//! ======
//! One quota record per user holds a counter and the date string of its last
//! use. The gate never resets the counter eagerly: a record whose date differs
//! from today simply reads as full quota, and the next recorded use writes
//! `1` with today's date. Dates are ISO `YYYY-MM-DD` strings in UTC, compared
//! as plain strings.
//!
//! ERROR HANDLING
//! ==============
//! The gate fails open. A store error while checking is logged and treated
//! as full quota; a store error while recording is returned so the caller can
//! log it without failing an edit that already succeeded.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::warn;

pub const DAILY_LIMIT: i32 = 5;

pub const LIMIT_REACHED_MESSAGE: &str =
    "Daily limit reached! You can generate 5 images per day. Come back tomorrow for more generations.";

#[derive(Debug, thiserror::Error)]
pub enum QuotaError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::error::ErrorCode for QuotaError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        true
    }
}

// =============================================================================
// TYPES
// =============================================================================

/// Per-user usage record. Mirrors the `usage_records` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaRecord {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    pub photo_url: Option<String>,
    pub usage_number: i32,
    pub last_usage_date: Option<String>,
    pub created_at_ms: i64,
    pub last_updated_ms: i64,
}

/// Identity fields forwarded by the upstream identity provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    pub photo_url: Option<String>,
}

/// Answer of the usage gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageCheck {
    pub can_generate: bool,
    pub remaining: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl UsageCheck {
    fn full() -> Self {
        Self { can_generate: true, remaining: DAILY_LIMIT.unsigned_abs(), message: None }
    }
}

/// Today's date string in UTC.
#[must_use]
pub fn today_utc() -> String {
    time::OffsetDateTime::now_utc().date().to_string()
}

fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

// =============================================================================
// PURE RULES
// =============================================================================

/// Evaluate the gate against a fetched record.
#[must_use]
pub fn evaluate(record: Option<&QuotaRecord>, today: &str) -> UsageCheck {
    let Some(record) = record else {
        return UsageCheck::full();
    };
    let last = record.last_usage_date.as_deref().unwrap_or(today);
    if last != today {
        return UsageCheck::full();
    }
    if record.usage_number >= DAILY_LIMIT {
        return UsageCheck { can_generate: false, remaining: 0, message: Some(LIMIT_REACHED_MESSAGE.to_owned()) };
    }
    let remaining = (DAILY_LIMIT - record.usage_number.max(0)).unsigned_abs();
    UsageCheck { can_generate: true, remaining, message: None }
}

/// Counter value after one more use today.
#[must_use]
pub fn next_usage(record: Option<&QuotaRecord>, today: &str) -> i32 {
    match record {
        None => 1,
        Some(r) if r.last_usage_date.as_deref().unwrap_or(today) != today => 1,
        Some(r) => r.usage_number.saturating_add(1),
    }
}

// =============================================================================
// STORE TRAIT
// =============================================================================

/// Backing storage for quota records. Enables mocking in tests.
#[async_trait::async_trait]
pub trait QuotaStore: Send + Sync {
    async fn fetch(&self, uid: &str) -> Result<Option<QuotaRecord>, QuotaError>;

    /// Create the record on first sight (counter 0, today's date) or refresh
    /// the profile fields of an existing one.
    async fn ensure_user(&self, profile: &UserProfile, today: &str) -> Result<(), QuotaError>;

    /// Count one generation for today.
    async fn record_usage(&self, uid: &str, today: &str) -> Result<(), QuotaError>;
}

/// Run the gate for `uid`, failing open on store errors.
pub async fn check_usage(store: &dyn QuotaStore, uid: &str, today: &str) -> UsageCheck {
    match store.fetch(uid).await {
        Ok(record) => evaluate(record.as_ref(), today),
        Err(e) => {
            warn!(user = %uid, error = %e, "quota: check failed, allowing generation");
            UsageCheck::full()
        }
    }
}

// =============================================================================
// MEMORY STORE
// =============================================================================

#[derive(Default)]
pub struct MemoryQuotaStore {
    records: RwLock<HashMap<String, QuotaRecord>>,
}

impl MemoryQuotaStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record directly.
    pub async fn put(&self, record: QuotaRecord) {
        self.records
            .write()
            .await
            .insert(record.uid.clone(), record);
    }
}

#[async_trait::async_trait]
impl QuotaStore for MemoryQuotaStore {
    async fn fetch(&self, uid: &str) -> Result<Option<QuotaRecord>, QuotaError> {
        Ok(self.records.read().await.get(uid).cloned())
    }

    async fn ensure_user(&self, profile: &UserProfile, today: &str) -> Result<(), QuotaError> {
        let now = now_ms();
        let mut records = self.records.write().await;
        records
            .entry(profile.uid.clone())
            .and_modify(|r| {
                r.email.clone_from(&profile.email);
                r.display_name.clone_from(&profile.display_name);
                r.photo_url.clone_from(&profile.photo_url);
                r.last_updated_ms = now;
            })
            .or_insert_with(|| QuotaRecord {
                uid: profile.uid.clone(),
                email: profile.email.clone(),
                display_name: profile.display_name.clone(),
                photo_url: profile.photo_url.clone(),
                usage_number: 0,
                last_usage_date: Some(today.to_owned()),
                created_at_ms: now,
                last_updated_ms: now,
            });
        Ok(())
    }

    async fn record_usage(&self, uid: &str, today: &str) -> Result<(), QuotaError> {
        let now = now_ms();
        let mut records = self.records.write().await;
        let next = next_usage(records.get(uid), today);
        let record = records
            .entry(uid.to_owned())
            .or_insert_with(|| QuotaRecord {
                uid: uid.to_owned(),
                email: String::new(),
                display_name: String::new(),
                photo_url: None,
                usage_number: 0,
                last_usage_date: None,
                created_at_ms: now,
                last_updated_ms: now,
            });
        record.usage_number = next;
        record.last_usage_date = Some(today.to_owned());
        record.last_updated_ms = now;
        Ok(())
    }
}

// =============================================================================
// POSTGRES STORE
// =============================================================================

pub struct PgQuotaStore {
    pool: PgPool,
}

impl PgQuotaStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl QuotaStore for PgQuotaStore {
    async fn fetch(&self, uid: &str) -> Result<Option<QuotaRecord>, QuotaError> {
        let row = sqlx::query_as::<_, (String, String, String, Option<String>, i32, Option<String>, i64, i64)>(
            "SELECT uid, email, display_name, photo_url, usage_number, last_usage_date, \
                    (EXTRACT(EPOCH FROM created_at) * 1000)::BIGINT, \
                    (EXTRACT(EPOCH FROM last_updated) * 1000)::BIGINT \
             FROM usage_records WHERE uid = $1",
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(uid, email, display_name, photo_url, usage_number, last_usage_date, created_at_ms, last_updated_ms)| {
                QuotaRecord {
                    uid,
                    email,
                    display_name,
                    photo_url,
                    usage_number,
                    last_usage_date,
                    created_at_ms,
                    last_updated_ms,
                }
            },
        ))
    }

    async fn ensure_user(&self, profile: &UserProfile, today: &str) -> Result<(), QuotaError> {
        sqlx::query(
            "INSERT INTO usage_records (uid, email, display_name, photo_url, usage_number, last_usage_date)
             VALUES ($1, $2, $3, $4, 0, $5)
             ON CONFLICT (uid) DO UPDATE SET
                 email = EXCLUDED.email,
                 display_name = EXCLUDED.display_name,
                 photo_url = EXCLUDED.photo_url,
                 last_updated = now()",
        )
        .bind(&profile.uid)
        .bind(&profile.email)
        .bind(&profile.display_name)
        .bind(&profile.photo_url)
        .bind(today)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_usage(&self, uid: &str, today: &str) -> Result<(), QuotaError> {
        sqlx::query(
            "INSERT INTO usage_records (uid, usage_number, last_usage_date)
             VALUES ($1, 1, $2)
             ON CONFLICT (uid) DO UPDATE SET
                 usage_number = CASE
                     WHEN COALESCE(usage_records.last_usage_date, $2) = $2 THEN usage_records.usage_number + 1
                     ELSE 1
                 END,
                 last_usage_date = $2,
                 last_updated = now()",
        )
        .bind(uid)
        .bind(today)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "quota_test.rs"]
mod tests;
