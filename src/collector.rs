//! Response collection and normalization.
//!
//! Fetches submitted answer sets from the external resource and flattens the
//! heterogeneous answer shapes into one scalar per answered question: the
//! first free-text answer value when present, otherwise the numeric scale
//! value (free-text wins when a submission somehow carries both). Unanswered
//! questions are omitted, not defaulted.

use crate::errors::AppError;
use crate::forms_client::FormsService;
use crate::models::{FormSubmission, SurveyRecord};
use crate::storage::SurveyStorage;
use serde_json::{Map, Value};

/// What one survey's collection pass did.
#[derive(Debug, Clone)]
pub struct CollectionSummary {
    pub fetched: usize,
    pub stored: usize,
}

/// Flatten one submission into a question-identifier -> scalar map.
pub fn flatten_answers(submission: &FormSubmission) -> Map<String, Value> {
    let mut flattened = Map::new();
    for (question_id, answer) in &submission.answers {
        let scalar = answer
            .text_answers
            .as_ref()
            .and_then(|t| t.answers.first())
            .map(|t| Value::String(t.value.clone()))
            .or_else(|| {
                answer
                    .scale_answer
                    .as_ref()
                    .map(|s| Value::Number(s.value.into()))
            });
        if let Some(value) = scalar {
            flattened.insert(question_id.clone(), value);
        }
    }
    flattened
}

/// Fetch and persist every submission for one survey.
///
/// Zero submissions is a normal outcome. A per-submission storage failure is
/// logged and the remaining submissions are still processed; only the fetch
/// itself failing is a collection failure for the survey.
pub async fn collect_survey_responses(
    forms: &FormsService,
    storage: &SurveyStorage,
    survey: &SurveyRecord,
) -> Result<CollectionSummary, AppError> {
    let submissions = forms.list_submissions(&survey.form_id).await?;

    if submissions.is_empty() {
        tracing::info!("No submissions found for survey {}", survey.id);
        return Ok(CollectionSummary {
            fetched: 0,
            stored: 0,
        });
    }

    tracing::info!(
        "Found {} submission(s) for survey {}",
        submissions.len(),
        survey.id
    );

    let mut stored = 0usize;
    for submission in &submissions {
        let flattened = Value::Object(flatten_answers(submission));
        let raw = match serde_json::to_value(submission) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(
                    "✗ Failed to serialize raw submission {} for survey {}: {}",
                    submission.response_id,
                    survey.id,
                    e
                );
                continue;
            }
        };

        match storage
            .insert_response(survey.id, &flattened, &raw, submission.last_submitted_time)
            .await
        {
            Ok(response_id) => {
                tracing::info!(
                    "✓ Stored response {} for survey {}",
                    response_id,
                    survey.id
                );
                stored += 1;
            }
            Err(e) => {
                tracing::error!(
                    "✗ Failed to store submission {} for survey {}: {}",
                    submission.response_id,
                    survey.id,
                    e
                );
            }
        }
    }

    Ok(CollectionSummary {
        fetched: submissions.len(),
        stored,
    })
}
