//! Content Generation Service client.
//!
//! Speaks the chat-completions JSON-object contract: a role-tagged prompt
//! pair plus an instruction to return a single JSON object, parsed strictly.
//! Any shape deviation in the response is a generation failure the caller
//! converts into a per-customer skip.

use crate::config::Config;
use crate::errors::AppError;
use crate::models::{CustomerContext, QuestionSet, QuestionType};
use serde_json::{json, Value};
use std::time::Duration;

pub struct ContentService {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ContentService {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create content client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.content_base_url.clone(),
            api_key: config.content_api_key.clone(),
            model: config.content_model.clone(),
        })
    }

    /// Generate a personalized question set for one customer context.
    ///
    /// The returned payload is validated against the question-set contract
    /// before being handed back; a malformed set never reaches provisioning.
    pub async fn generate_question_set(
        &self,
        context: &CustomerContext,
    ) -> Result<QuestionSet, AppError> {
        let system_prompt = question_system_prompt(context);
        let context_json = serde_json::to_string_pretty(context).map_err(|e| {
            AppError::InternalError(format!("Failed to serialize customer context: {}", e))
        })?;
        let user_prompt = format!(
            "Create survey based on context:\n{}\n\n\
             Key requirements:\n\
             1. Only ask about unknown data\n\
             2. Focus on quality/satisfaction for known interactions\n\
             3. Include basic data collection where missing\n\
             4. End with NPS/future intent",
            context_json
        );

        let payload = self.complete_json(&system_prompt, &user_prompt).await?;
        let set: QuestionSet = serde_json::from_value(payload).map_err(|e| {
            AppError::MalformedPayload(format!("generated question set has invalid shape: {}", e))
        })?;

        validate_question_set(&set, context.first_name())?;
        Ok(set)
    }

    /// Single-call survey body for the trigger passthrough: plain text, no
    /// schema beyond "a short survey".
    pub async fn simple_survey(&self, user_email: &str) -> Result<String, AppError> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "user", "content": format!("Generate a survey for {}", user_email)}
            ]
        });
        let payload = self.post_completion(&body).await?;
        extract_message_content(&payload).map(str::to_string)
    }

    /// Role-tagged prompt pair, strict single-JSON-object response.
    async fn complete_json(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<Value, AppError> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt}
            ],
            "response_format": {"type": "json_object"}
        });

        let payload = self.post_completion(&body).await?;
        let content = extract_message_content(&payload)?;
        serde_json::from_str(content).map_err(|e| {
            AppError::MalformedPayload(format!("completion content is not valid JSON: {}", e))
        })
    }

    async fn post_completion(&self, body: &Value) -> Result<Value, AppError> {
        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!("Requesting completion from {} ({})", url, self.model);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                AppError::ExternalApiError(format!("Content API request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("Content API returned error {}: {}", status, error_text);
            return Err(AppError::ExternalApiError(format!(
                "Content API returned status {}: {}",
                status, error_text
            )));
        }

        response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse content API response: {}", e))
        })
    }
}

fn extract_message_content(payload: &Value) -> Result<&str, AppError> {
    payload
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            AppError::MalformedPayload(
                "completion missing choices[0].message.content".to_string(),
            )
        })
}

/// Data-driven system prompt: each known data category shifts the focus away
/// from re-asking what is already recorded.
fn question_system_prompt(context: &CustomerContext) -> String {
    let purchase_rule = if context.purchase_history.is_some() {
        "- Purchase data exists: Focus on satisfaction and future needs"
    } else if context.total_purchases == 0 {
        "- No purchases yet: Ask about browsing interests and purchase barriers"
    } else {
        "- Purchase data missing: Include basic purchase history questions"
    };

    let service_rule = if context.service_interactions.is_some() {
        "- Known interactions: Focus on resolution satisfaction"
    } else {
        "- No interaction data: Include service experience questions"
    };

    let engagement_rule = if context.marketing_engagement.is_some() {
        "- Engagement data exists: Focus on content preferences"
    } else {
        "- No engagement data: Ask about preferred channels and frequency"
    };

    let personalization = match context.first_name() {
        Some(name) => format!(
            "- Include \"{}\" in first question\n- Maintain personal touch throughout",
            name
        ),
        None => "- Use general friendly tone".to_string(),
    };

    format!(
        "You are an advanced survey design expert creating personalized surveys.\n\n\
         DATA-DRIVEN QUESTION RULES:\n\
         1. Purchase History:\n{purchase_rule}\n\n\
         2. Service Interactions:\n{service_rule}\n\n\
         3. Communication Preferences:\n{engagement_rule}\n\n\
         QUESTION STRUCTURE:\n\
         1. Order:\n\
         - Start with satisfaction/feedback\n\
         - Include missing data questions only if needed\n\
         - End with NPS/future intent\n\n\
         2. Question Types:\n\
         - multiple_choice\n\
         - rating (1-5 scale)\n\
         - open_ended (max 50%)\n\n\
         3. Focus Areas:\n\
         - Why over what\n\
         - Future preferences\n\
         - Improvement suggestions\n\
         - Emotional aspects\n\n\
         PERSONALIZATION:\n\
         {personalization}\n\
         - Industry context: {industry}\n\
         - Language: {language}\n\n\
         Return JSON with:\n\
         {{\n\
          \"questions\": [\n\
            {{\n\
              \"type\": \"multiple_choice|rating|open_ended\",\n\
              \"text\": \"question text\",\n\
              \"options\": [\"option1\", \"option2\"],\n\
              \"scale\": {{\"min\": 1, \"max\": 5, \"lowLabel\": \"Poor\", \"highLabel\": \"Excellent\"}}\n\
            }}\n\
          ],\n\
          \"metadata\": {{\n\
            \"personalization_factors\": [\"list used factors\"],\n\
            \"language\": \"{language}\"\n\
          }}\n\
         }}",
        purchase_rule = purchase_rule,
        service_rule = service_rule,
        engagement_rule = engagement_rule,
        personalization = personalization,
        industry = context.industry.as_deref().unwrap_or("unknown"),
        language = context.language,
    )
}

/// Enforce the question-set contract on a generated payload.
///
/// Violations are [`AppError::MalformedPayload`] — the caller aborts
/// provisioning for that customer without crashing the batch.
pub fn validate_question_set(
    set: &QuestionSet,
    first_name: Option<&str>,
) -> Result<(), AppError> {
    if set.questions.is_empty() {
        return Err(AppError::MalformedPayload(
            "question set contains no questions".to_string(),
        ));
    }

    let mut open_ended = 0usize;
    for (idx, question) in set.questions.iter().enumerate() {
        if question.text.trim().is_empty() {
            return Err(AppError::MalformedPayload(format!(
                "question {} has empty text",
                idx
            )));
        }
        match question.question_type {
            QuestionType::MultipleChoice => {
                let has_options = question
                    .options
                    .as_ref()
                    .map(|opts| !opts.is_empty())
                    .unwrap_or(false);
                if !has_options {
                    return Err(AppError::MalformedPayload(format!(
                        "multiple_choice question {} has no options",
                        idx
                    )));
                }
            }
            QuestionType::Rating => {
                if question.scale.is_none() {
                    return Err(AppError::MalformedPayload(format!(
                        "rating question {} has no scale",
                        idx
                    )));
                }
            }
            QuestionType::OpenEnded => open_ended += 1,
        }
    }

    // Open-ended questions capped at half the set
    if open_ended * 2 > set.questions.len() {
        return Err(AppError::MalformedPayload(format!(
            "{} of {} questions are open-ended, exceeding the 50% cap",
            open_ended,
            set.questions.len()
        )));
    }

    if let Some(name) = first_name {
        let first_text = set.questions[0].text.to_lowercase();
        if !first_text.contains(&name.to_lowercase()) {
            return Err(AppError::MalformedPayload(format!(
                "first question does not reference the customer's first name \"{}\"",
                name
            )));
        }
    }

    Ok(())
}
