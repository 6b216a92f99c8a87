//! Per-customer survey ledger.
//!
//! One row per customer: how many surveys have been issued and when the most
//! recent one went out. Audit/history only — the ledger never gates
//! eligibility.

use crate::errors::{AppError, ResultExt};
use crate::models::LedgerEntry;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

pub struct SurveyLedger {
    pool: PgPool,
}

impl SurveyLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, user_id: Uuid) -> Result<Option<LedgerEntry>, AppError> {
        let entry = sqlx::query_as::<_, LedgerEntry>(
            "SELECT user_id, last_survey_date, surveys_sent FROM survey_ledger WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Record one more issued survey as a single logical update: increments
    /// the counter (absent rows start at 0) and stamps `last_survey_date`.
    ///
    /// Returns the new `surveys_sent` count. Called exactly once per
    /// customer per successful provisioning.
    pub async fn upsert(
        &self,
        user_id: Uuid,
        timestamp: DateTime<Utc>,
    ) -> Result<i32, AppError> {
        let surveys_sent = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO survey_ledger (user_id, last_survey_date, surveys_sent)
            VALUES ($1, $2, 1)
            ON CONFLICT (user_id)
            DO UPDATE SET
                surveys_sent = survey_ledger.surveys_sent + 1,
                last_survey_date = EXCLUDED.last_survey_date
            RETURNING surveys_sent
            "#,
        )
        .bind(user_id)
        .bind(timestamp)
        .fetch_one(&self.pool)
        .await
        .context("failed to record issued survey")?;

        Ok(surveys_sent)
    }
}
