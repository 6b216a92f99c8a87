/// Integration smoke tests for the survey datastore.
/// Marked ignored to avoid running against production by accident; set
/// TEST_DATABASE_URL to run them against a schema-loaded database.
use std::env;

use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use surveus_pipeline::db::Database;
use surveus_pipeline::ledger::SurveyLedger;
use surveus_pipeline::models::{QuestionSet, SURVEY_STATUS_ACTIVE, SURVEY_STATUS_CLOSED};
use surveus_pipeline::storage::SurveyStorage;

async fn test_database() -> anyhow::Result<Database> {
    let db_url = env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL or DATABASE_URL to run this test"))?;
    Database::new(&db_url).await
}

async fn insert_test_customer(pool: &sqlx::PgPool) -> anyhow::Result<Uuid> {
    // Unique address to avoid conflicts on repeated runs
    let email = format!("ledger-test-{}@example.com", Uuid::new_v4());
    let id = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO customers (email) VALUES ($1) RETURNING id",
    )
    .bind(email)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

fn sample_question_set() -> QuestionSet {
    serde_json::from_value(json!({
        "questions": [
            {
                "type": "rating",
                "text": "How satisfied are you overall?",
                "scale": {"min": 1, "max": 5, "lowLabel": "Poor", "highLabel": "Excellent"}
            },
            {
                "type": "multiple_choice",
                "text": "How do you prefer to hear from us?",
                "options": ["Email", "Phone"]
            },
            {
                "type": "open_ended",
                "text": "What could we improve?"
            }
        ],
        "metadata": {"personalization_factors": ["industry"], "language": "English"}
    }))
    .expect("sample question set is well-formed")
}

#[tokio::test]
#[ignore]
async fn survey_round_trips_its_question_set() -> anyhow::Result<()> {
    let db = test_database().await?;
    let storage = SurveyStorage::new(db.pool.clone());

    let question_set = sample_question_set();
    let form_id = format!("form-{}", Uuid::new_v4());
    let survey_id = storage
        .insert_survey(&form_id, "Surveus v1 test", &question_set)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let survey = storage
        .get_survey(survey_id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(survey.form_id, form_id);
    assert_eq!(survey.status, SURVEY_STATUS_ACTIVE);

    // The stored question set reproduces what was supplied
    let read_back = survey.question_set()?;
    assert_eq!(
        serde_json::to_value(&read_back)?,
        serde_json::to_value(&question_set)?
    );

    // Status is the one mutation surveys allow
    storage
        .set_survey_status(survey_id, SURVEY_STATUS_CLOSED)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let closed = storage
        .get_survey(survey_id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(closed.status, SURVEY_STATUS_CLOSED);

    Ok(())
}

#[tokio::test]
#[ignore]
async fn ledger_counts_monotonically() -> anyhow::Result<()> {
    let db = test_database().await?;
    let ledger = SurveyLedger::new(db.pool.clone());
    let user_id = insert_test_customer(&db.pool).await?;

    assert!(ledger
        .get(user_id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .is_none());

    let base = Utc::now();
    for n in 1..=3i32 {
        let timestamp = base + Duration::minutes(n as i64);
        let count = ledger
            .upsert(user_id, timestamp)
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        assert_eq!(count, n);
    }

    let entry = ledger
        .get(user_id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .expect("ledger entry exists after upserts");
    assert_eq!(entry.surveys_sent, 3);
    // last_survey_date tracks the most recent upsert
    assert!((entry.last_survey_date - (base + Duration::minutes(3))).num_seconds().abs() <= 1);

    Ok(())
}

#[tokio::test]
#[ignore]
async fn responses_keep_their_submission_timestamp() -> anyhow::Result<()> {
    let db = test_database().await?;
    let storage = SurveyStorage::new(db.pool.clone());

    let form_id = format!("form-{}", Uuid::new_v4());
    let survey_id = storage
        .insert_survey(&form_id, "Surveus v1 response test", &sample_question_set())
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let submitted_at = Utc::now() - Duration::days(2);
    let response_data = json!({"q1": "Great service", "q2": 4});
    let raw = json!({
        "responseId": "resp_1",
        "lastSubmittedTime": submitted_at.to_rfc3339(),
        "answers": {}
    });

    storage
        .insert_response(survey_id, &response_data, &raw, submitted_at)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let responses = storage
        .list_responses(survey_id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].response_data, response_data);
    // created_at is the submission's own timestamp, not collection time
    assert!((responses[0].created_at - submitted_at).num_seconds().abs() <= 1);

    Ok(())
}
