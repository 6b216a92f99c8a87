//! Datastore operations for the survey lifecycle.
//!
//! The pipeline owns the `surveys`, `survey_ledger` (see [`crate::ledger`])
//! and `responses` tables; the `customers` table is read-only.

use crate::errors::AppError;
use crate::models::{
    CustomerRecord, QuestionSet, ResponseRecord, SurveyRecord, SURVEY_STATUS_ACTIVE,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

/// Read-only access to customer records.
pub struct CustomerStore {
    pool: PgPool,
}

impl CustomerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load every customer record, oldest first.
    pub async fn load_all(&self) -> Result<Vec<CustomerRecord>, AppError> {
        let customers = sqlx::query_as::<_, CustomerRecord>(
            "SELECT * FROM customers ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(customers)
    }
}

/// Storage for provisioned surveys and their normalized responses.
pub struct SurveyStorage {
    pool: PgPool,
}

impl SurveyStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist a survey referencing an already-created external resource.
    ///
    /// Only called with a `form_id` obtained from a successful provisioning
    /// call; the row stores the full question set and its metadata.
    pub async fn insert_survey(
        &self,
        form_id: &str,
        title: &str,
        question_set: &QuestionSet,
    ) -> Result<Uuid, AppError> {
        let questions = serde_json::to_value(question_set).map_err(|e| {
            AppError::InternalError(format!("Failed to serialize question set: {}", e))
        })?;
        let metadata = serde_json::to_value(&question_set.metadata).map_err(|e| {
            AppError::InternalError(format!("Failed to serialize metadata: {}", e))
        })?;

        let survey_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO surveys (form_id, title, status, questions, metadata)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(form_id)
        .bind(title)
        .bind(SURVEY_STATUS_ACTIVE)
        .bind(&questions)
        .bind(&metadata)
        .fetch_one(&self.pool)
        .await?;

        Ok(survey_id)
    }

    pub async fn get_survey(&self, id: Uuid) -> Result<SurveyRecord, AppError> {
        let survey = sqlx::query_as::<_, SurveyRecord>("SELECT * FROM surveys WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("survey {} not found", id)))?;

        Ok(survey)
    }

    /// All surveys, most recently created first (the fetch-mode order).
    pub async fn list_surveys(&self) -> Result<Vec<SurveyRecord>, AppError> {
        let surveys = sqlx::query_as::<_, SurveyRecord>(
            "SELECT * FROM surveys ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(surveys)
    }

    /// Flip a survey's status. The only mutation surveys allow.
    pub async fn set_survey_status(&self, id: Uuid, status: &str) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE surveys SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("survey {} not found", id)));
        }
        Ok(())
    }

    /// Persist one normalized answer set, keeping the opaque original
    /// payload alongside it and the submission's own timestamp.
    pub async fn insert_response(
        &self,
        survey_id: Uuid,
        response_data: &Value,
        raw_response: &Value,
        created_at: DateTime<Utc>,
    ) -> Result<Uuid, AppError> {
        let response_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO responses (survey_id, response_data, raw_response, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(survey_id)
        .bind(response_data)
        .bind(raw_response)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(response_id)
    }

    pub async fn list_responses(&self, survey_id: Uuid) -> Result<Vec<ResponseRecord>, AppError> {
        let responses = sqlx::query_as::<_, ResponseRecord>(
            "SELECT * FROM responses WHERE survey_id = $1 ORDER BY created_at ASC",
        )
        .bind(survey_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(responses)
    }
}
