//! Batch runner entry point.
//!
//! The mode directive comes from the first CLI argument, falling back to the
//! `MODE` environment variable. Exactly two values are recognized, `create`
//! and `fetch`; anything else is a no-op with a diagnostic.

use std::str::FromStr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use surveus_pipeline::config::Config;
use surveus_pipeline::db::Database;
use surveus_pipeline::runner::{BatchRunner, Mode};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "surveus_pipeline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Resolve the mode directive before touching any external service
    let directive = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("MODE").ok())
        .unwrap_or_default();
    let mode = match Mode::from_str(&directive) {
        Ok(mode) => mode,
        Err(diagnostic) => {
            tracing::error!("{}", diagnostic);
            return Ok(());
        }
    };

    // Initialize database connection pool
    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    let runner =
        BatchRunner::new(&config, db.pool.clone()).map_err(|e| anyhow::anyhow!("{}", e))?;
    let report = runner.run(mode).await.map_err(|e| anyhow::anyhow!("{}", e))?;

    match mode {
        Mode::Create => {
            println!("\n=== Survey Creation Complete ===");
            println!("Customers evaluated: {}", report.customers.len());
            println!("✓ Surveys created: {}", report.surveyed());
            println!("✉ Notifications sent: {}", report.notified());
            println!("— Not eligible: {}", report.ineligible());
            println!("✗ Failed: {}", report.failed_customers());
        }
        Mode::Fetch => {
            println!("\n=== Response Collection Complete ===");
            println!("Surveys processed: {}", report.surveys.len());
            println!("✓ Responses stored: {}", report.collected_responses());
            println!("✗ Failed: {}", report.failed_surveys());
        }
    }

    Ok(())
}
