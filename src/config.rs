use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub content_api_key: String,
    pub content_base_url: String,
    pub content_model: String,
    pub forms_base_url: String,
    pub forms_token: String,
    pub mail_base_url: String,
    pub mail_api_key: String,
    pub mail_from: String,
    /// Identity granted writer access on every provisioned form.
    pub operator_email: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DATABASE_URL")
                .or_else(|_| std::env::var("DB_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DATABASE_URL or DB_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DATABASE_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            content_api_key: std::env::var("CONTENT_API_KEY")
                .or_else(|_| std::env::var("OPENAI_API_KEY"))
                .map_err(|_| {
                    anyhow::anyhow!("CONTENT_API_KEY or OPENAI_API_KEY environment variable required")
                })
                .and_then(|key| {
                    if key.trim().is_empty() {
                        anyhow::bail!("CONTENT_API_KEY cannot be empty");
                    }
                    Ok(key)
                })?,
            content_base_url: std::env::var("CONTENT_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            content_model: std::env::var("CONTENT_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            forms_base_url: std::env::var("FORMS_BASE_URL")
                .map_err(|_| anyhow::anyhow!("FORMS_BASE_URL environment variable required"))
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("FORMS_BASE_URL cannot be empty");
                    }
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("FORMS_BASE_URL must start with http:// or https://");
                    }
                    Ok(url)
                })?,
            forms_token: std::env::var("FORMS_TOKEN")
                .map_err(|_| anyhow::anyhow!("FORMS_TOKEN environment variable required"))
                .and_then(|token| {
                    if token.trim().is_empty() {
                        anyhow::bail!("FORMS_TOKEN cannot be empty");
                    }
                    Ok(token)
                })?,
            mail_base_url: std::env::var("MAIL_BASE_URL")
                .unwrap_or_else(|_| "https://api.resend.com".to_string()),
            mail_api_key: std::env::var("MAIL_API_KEY")
                .or_else(|_| std::env::var("RESEND_API_KEY"))
                .map_err(|_| {
                    anyhow::anyhow!("MAIL_API_KEY or RESEND_API_KEY environment variable required")
                })
                .and_then(|key| {
                    if key.trim().is_empty() {
                        anyhow::bail!("MAIL_API_KEY cannot be empty");
                    }
                    Ok(key)
                })?,
            mail_from: std::env::var("MAIL_FROM")
                .unwrap_or_else(|_| "Surveus <onboarding@resend.dev>".to_string()),
            operator_email: std::env::var("OPERATOR_EMAIL")
                .map_err(|_| anyhow::anyhow!("OPERATOR_EMAIL environment variable required"))
                .and_then(|email| {
                    if email.trim().is_empty() {
                        anyhow::bail!("OPERATOR_EMAIL cannot be empty");
                    }
                    if !email.contains('@') {
                        anyhow::bail!("OPERATOR_EMAIL must be an email address");
                    }
                    Ok(email)
                })?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database URL: {}...",
            &config.database_url[..20.min(config.database_url.len())]
        );
        tracing::debug!("Content base URL: {}", config.content_base_url);
        tracing::debug!("Content model: {}", config.content_model);
        tracing::debug!("Forms base URL: {}", config.forms_base_url);
        tracing::debug!("Mail base URL: {}", config.mail_base_url);
        tracing::debug!("Server port: {}", config.port);

        Ok(config)
    }
}
