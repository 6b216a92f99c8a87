//! Survey notification delivery.
//!
//! Composes the survey invitation mail and hands it to the notification
//! service. Delivery is gated by the caller: the decision's `send_email`
//! flag AND the live consent flag must both hold before this module is ever
//! invoked.

use crate::config::Config;
use crate::errors::AppError;
use regex::Regex;
use serde_json::{json, Value};
use std::time::Duration;

pub struct MailService {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    from: String,
}

impl MailService {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create mail client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.mail_base_url.clone(),
            api_key: config.mail_api_key.clone(),
            from: config.mail_from.clone(),
        })
    }

    /// Send a formatted message; returns the delivery id on success.
    pub async fn send(
        &self,
        recipient: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<String, AppError> {
        let url = format!("{}/emails", self.base_url);
        tracing::info!("Sending \"{}\" to {}", subject, recipient);

        let body = json!({
            "from": self.from,
            "to": [recipient],
            "subject": subject,
            "html": html_body
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Mail API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Mail API returned status {}: {}",
                status, error_text
            )));
        }

        let payload: Value = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse mail API response: {}", e))
        })?;

        let delivery_id = payload
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        tracing::info!("✓ Mail delivered to {} (delivery id: {})", recipient, delivery_id);
        Ok(delivery_id)
    }
}

/// Validate a recipient address before attempting delivery.
///
/// Checks basic structure, minimum length, and an RFC 5322 simplified
/// format. An invalid address is a notification failure for that customer,
/// not a batch failure.
pub fn is_valid_email(email: &str) -> bool {
    if email.len() < 5 || !email.contains('@') || !email.contains('.') {
        return false;
    }

    // RFC 5322 simplified email regex, local@domain.tld
    let email_regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap();

    if !email_regex.is_match(email) {
        tracing::warn!("Invalid recipient address: {}", email);
        return false;
    }

    true
}

/// Subject line for a survey invitation.
pub fn survey_subject(title: &str) -> String {
    format!("Survey: {}", title)
}

/// Invitation body: heading, greeting (personalized when the first name is
/// known), the survey title, a button-styled call-to-action link, and a
/// footer repeating the raw URL for clients that strip markup.
pub fn survey_email_html(title: &str, survey_url: &str, first_name: Option<&str>) -> String {
    let greeting = match first_name {
        Some(name) => format!("<p>Hi {},</p>", name),
        None => "<p>Hello,</p>".to_string(),
    };

    format!(
        r#"<!DOCTYPE html>
<html>
  <body style="font-family: Arial, sans-serif; line-height: 1.6; max-width: 600px; margin: 0 auto; padding: 20px;">
    <div style="background-color: #f8f9fa; padding: 20px; border-radius: 5px;">
      <h2 style="color: #2c3e50; margin-bottom: 20px;">Your Opinion Matters</h2>
      {greeting}
      <p>We'd love to hear your thoughts in our latest survey: <strong>{title}</strong></p>
      <div style="margin: 30px 0;">
        <a href="{url}"
           style="background-color: #3498db;
                  color: white;
                  padding: 12px 25px;
                  text-decoration: none;
                  border-radius: 5px;
                  display: inline-block;">
          Take the Survey
        </a>
      </div>
      <p>Thank you for your valuable feedback!</p>
      <hr style="border: 1px solid #eee; margin: 20px 0;">
      <p style="color: #7f8c8d; font-size: 12px;">
        If you're having trouble with the button above, copy and paste this link into your browser:
        <br>{url}
      </p>
    </div>
  </body>
</html>"#,
        greeting = greeting,
        title = title,
        url = survey_url,
    )
}
