//! Form provisioning orchestration.
//!
//! Turns a validated question set into a durable, shareable form in five
//! steps, each a distinct external effect with its failure attributable to
//! its step:
//!
//! 1. generate a collision-free title
//! 2. create the external resource shell
//! 3. persist the survey record (status=active, full question set)
//! 4. populate the resource with question items
//! 5. grant writer access to the operator identity
//!
//! A step-2 failure aborts with nothing written. A step-3 failure leaves the
//! created resource orphaned and is surfaced distinctly so the caller
//! declines to proceed to population, sharing, ledger and notification.
//! Step-4/5 failures are non-fatal: the survey exists and is tracked even if
//! incompletely configured, and the degradation is carried on the outcome.

use crate::errors::AppError;
use crate::forms_client::FormsService;
use crate::models::QuestionSet;
use crate::storage::SurveyStorage;
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::fmt;
use uuid::Uuid;

/// Human-readable prefix for provisioned form titles.
const TITLE_PREFIX: &str = "Surveus v1";

/// A successfully provisioned survey, possibly degraded (see `warnings`).
#[derive(Debug)]
pub struct ProvisionedSurvey {
    pub survey_id: Uuid,
    pub form_id: String,
    pub title: String,
    /// Public link respondents use to answer.
    pub responder_url: String,
    /// Non-fatal step failures: the form exists but is incompletely
    /// populated or shared.
    pub warnings: Vec<ProvisionWarning>,
}

#[derive(Debug, Clone)]
pub enum ProvisionWarning {
    /// Question items could not be added to the created form.
    Population(String),
    /// Operator access could not be granted on the created form.
    Sharing(String),
}

impl fmt::Display for ProvisionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionWarning::Population(msg) => write!(f, "population failed: {}", msg),
            ProvisionWarning::Sharing(msg) => write!(f, "sharing failed: {}", msg),
        }
    }
}

/// Provisioning failures that leave no usable survey behind.
#[derive(Debug)]
pub enum ProvisionError {
    /// The external resource shell could not be created; nothing written.
    Create(AppError),
    /// The survey record could not be written; the external resource is
    /// orphaned and identified here for the record.
    Record {
        form_id: String,
        title: String,
        source: AppError,
    },
}

impl fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionError::Create(e) => write!(f, "form creation failed: {}", e),
            ProvisionError::Record {
                form_id, source, ..
            } => write!(
                f,
                "survey record write failed (form {} orphaned): {}",
                form_id, source
            ),
        }
    }
}

/// Title unique per invocation: prefix + current date + short random suffix,
/// so concurrent or repeated runs never collide even within one second.
pub fn unique_title(now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(4)
        .map(char::from)
        .collect::<String>()
        .to_lowercase();
    format!("{} {}-{}", TITLE_PREFIX, now.format("%Y-%m-%d"), suffix)
}

/// Run the five provisioning steps for one question set.
pub async fn provision_survey(
    forms: &FormsService,
    storage: &SurveyStorage,
    operator_email: &str,
    question_set: &QuestionSet,
    now: DateTime<Utc>,
) -> Result<ProvisionedSurvey, ProvisionError> {
    // Step 1: title
    let title = unique_title(now);

    // Step 2: external resource shell
    let form_id = forms
        .create_form(&title)
        .await
        .map_err(ProvisionError::Create)?;

    // Step 3: survey record, before any further configuration of the form
    let survey_id = match storage.insert_survey(&form_id, &title, question_set).await {
        Ok(id) => id,
        Err(source) => {
            tracing::error!(
                "Survey record write failed; form {} is now orphaned: {}",
                form_id,
                source
            );
            return Err(ProvisionError::Record {
                form_id,
                title,
                source,
            });
        }
    };
    tracing::info!("Created survey with ID: {}", survey_id);

    let mut warnings = Vec::new();

    // Step 4: populate items
    if let Err(e) = forms.add_items(&form_id, &question_set.questions).await {
        tracing::warn!("Failed to populate form {}: {}", form_id, e);
        warnings.push(ProvisionWarning::Population(e.to_string()));
    }

    // Step 5: operator access
    if let Err(e) = forms.grant_access(&form_id, operator_email).await {
        tracing::warn!("Failed to share form {} with {}: {}", form_id, operator_email, e);
        warnings.push(ProvisionWarning::Sharing(e.to_string()));
    }

    let responder_url = forms.responder_url(&form_id);
    Ok(ProvisionedSurvey {
        survey_id,
        form_id,
        title,
        responder_url,
        warnings,
    })
}
