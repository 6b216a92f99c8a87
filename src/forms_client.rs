//! Form Provisioning Service client.
//!
//! Wraps the external questionnaire resource API: create a form shell, add
//! question items in bulk, grant access to an operator identity, and list
//! submitted answer sets. Each call is a blocking request-response unit of
//! work; callers attribute failures to their provisioning step.

use crate::config::Config;
use crate::errors::AppError;
use crate::models::{FormSubmission, Question, QuestionType};
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Clone)]
pub struct FormsService {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl FormsService {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create forms client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.forms_base_url.clone(),
            token: config.forms_token.clone(),
        })
    }

    /// Create the external resource shell and return its identifier.
    pub async fn create_form(&self, title: &str) -> Result<String, AppError> {
        let url = format!("{}/v1/forms", self.base_url);
        tracing::info!("Creating form \"{}\"", title);

        let body = json!({
            "info": {
                "title": title,
                "documentTitle": title
            }
        });

        let payload = self.post_json(&url, &body).await?;
        let form_id = payload
            .get("formId")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                AppError::MalformedPayload("form creation response missing formId".to_string())
            })?;

        tracing::info!("Created form with ID: {}", form_id);
        Ok(form_id.to_string())
    }

    /// Populate the form with one required item per question, in order.
    pub async fn add_items(&self, form_id: &str, questions: &[Question]) -> Result<(), AppError> {
        let url = format!("{}/v1/forms/{}:batchUpdate", self.base_url, form_id);
        tracing::info!("Adding {} items to form {}", questions.len(), form_id);

        let requests: Vec<Value> = questions
            .iter()
            .enumerate()
            .map(|(index, question)| item_spec(question, index))
            .collect();

        self.post_json(&url, &json!({ "requests": requests })).await?;
        Ok(())
    }

    /// Grant writer access on the form to the given principal.
    pub async fn grant_access(&self, form_id: &str, principal: &str) -> Result<(), AppError> {
        let url = format!("{}/v1/forms/{}/permissions", self.base_url, form_id);
        tracing::info!("Sharing form {} with {}", form_id, principal);

        let body = json!({
            "role": "writer",
            "type": "user",
            "emailAddress": principal
        });

        self.post_json(&url, &body).await?;
        Ok(())
    }

    /// Fetch submitted answer sets for a form. A form nobody has answered
    /// yields an empty list, not an error.
    pub async fn list_submissions(&self, form_id: &str) -> Result<Vec<FormSubmission>, AppError> {
        let url = format!("{}/v1/forms/{}/responses", self.base_url, form_id);
        tracing::info!("Fetching submissions for form {}", form_id);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Forms API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Forms API returned status {}: {}",
                status, error_text
            )));
        }

        let payload: Value = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse forms API response: {}", e))
        })?;

        let submissions = match payload.get("responses") {
            Some(raw) => serde_json::from_value(raw.clone()).map_err(|e| {
                AppError::MalformedPayload(format!("unreadable submission list: {}", e))
            })?,
            None => Vec::new(),
        };
        Ok(submissions)
    }

    /// Public link a respondent uses to answer the form.
    pub fn responder_url(&self, form_id: &str) -> String {
        format!("{}/v1/forms/{}/viewform", self.base_url, form_id)
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, AppError> {
        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.token))
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Forms API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Forms API returned status {}: {}",
                status, error_text
            )));
        }

        response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse forms API response: {}", e))
        })
    }
}

/// One createItem request: rating becomes a bounded 1-5 scale labeled
/// Poor/Excellent, open-ended a paragraph text question, multiple choice a
/// single-select radio. Every item is required.
fn item_spec(question: &Question, index: usize) -> Value {
    let question_item = match question.question_type {
        QuestionType::Rating => json!({
            "question": {
                "required": true,
                "scaleQuestion": {
                    "low": 1,
                    "high": 5,
                    "lowLabel": "Poor",
                    "highLabel": "Excellent"
                }
            }
        }),
        QuestionType::OpenEnded => json!({
            "question": {
                "required": true,
                "textQuestion": {
                    "paragraph": true
                }
            }
        }),
        QuestionType::MultipleChoice => {
            let options: Vec<Value> = question
                .options
                .as_deref()
                .unwrap_or(&[])
                .iter()
                .map(|opt| json!({ "value": opt }))
                .collect();
            json!({
                "question": {
                    "required": true,
                    "choiceQuestion": {
                        "type": "RADIO",
                        "options": options
                    }
                }
            })
        }
    };

    json!({
        "createItem": {
            "item": {
                "title": question.text,
                "questionItem": question_item
            },
            "location": {
                "index": index
            }
        }
    })
}
