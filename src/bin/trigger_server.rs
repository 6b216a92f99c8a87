//! Thin single-call trigger surface.
//!
//! `POST /api/v1/surveys/trigger {"email": ...}` generates a minimal
//! one-question survey for the given address, creates the external form, and
//! returns the responder link. Deliberately shallow: no eligibility, no
//! ledger, no notification — the batch runner owns the real pipeline.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use moka::future::Cache;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use surveus_pipeline::config::Config;
use surveus_pipeline::content::ContentService;
use surveus_pipeline::errors::AppError;
use surveus_pipeline::forms_client::FormsService;
use surveus_pipeline::models::{Question, QuestionType};
use surveus_pipeline::notifier::is_valid_email;

/// Shared state for the trigger surface.
struct TriggerState {
    content: ContentService,
    forms: FormsService,
    /// Deduplication cache: addresses with a trigger in flight or recently
    /// completed, to absorb double-submits.
    recent_triggers: Cache<String, i64>,
}

#[derive(Debug, Deserialize)]
struct TriggerRequest {
    email: String,
}

async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "surveus-trigger",
            "version": "0.1.0"
        })),
    )
}

async fn trigger_survey(
    State(state): State<Arc<TriggerState>>,
    Json(request): Json<TriggerRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!("POST /api/v1/surveys/trigger - {}", request.email);

    if !is_valid_email(&request.email) {
        return Err(AppError::BadRequest("invalid email address".to_string()));
    }

    if state.recent_triggers.get(&request.email).await.is_some() {
        return Err(AppError::BadRequest(format!(
            "a survey trigger for {} is already in flight",
            request.email
        )));
    }
    state.recent_triggers.insert(request.email.clone(), 1).await;

    let survey_text = state.content.simple_survey(&request.email).await?;

    let title = format!("Survey for {}", request.email);
    let form_id = state.forms.create_form(&title).await?;
    let question = Question {
        question_type: QuestionType::OpenEnded,
        text: survey_text,
        options: None,
        scale: None,
    };
    state.forms.add_items(&form_id, &[question]).await?;

    Ok(Json(json!({
        "success": true,
        "formLink": state.forms.responder_url(&form_id)
    })))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "surveus_pipeline=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    // Trigger dedup cache: 5 minutes covers request processing plus a
    // cool-down against accidental double-submits.
    let recent_triggers = Cache::builder()
        .time_to_live(Duration::from_secs(300))
        .max_capacity(10_000)
        .build();
    tracing::info!("Trigger deduplication cache initialized");

    let state = Arc::new(TriggerState {
        content: ContentService::new(&config).map_err(|e| anyhow::anyhow!("{}", e))?,
        forms: FormsService::new(&config).map_err(|e| anyhow::anyhow!("{}", e))?,
        recent_triggers,
    });

    // Rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .unwrap(),
    );

    let protected_routes = Router::new()
        .route("/api/v1/surveys/trigger", post(trigger_survey))
        .layer(
            ServiceBuilder::new()
                // 1MB max payload; trigger bodies are a single address
                .layer(RequestBodyLimitLayer::new(1024 * 1024))
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    let app = Router::new()
        .route("/health", get(health))
        .merge(protected_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Trigger server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
