//! Batch runner: the top-level control loop.
//!
//! Two mutually exclusive modes. `create` walks every customer through
//! eligibility, generation, provisioning, ledger update and gated
//! notification; `fetch` walks every provisioned survey through response
//! collection. One item is fully processed before the next begins, and a
//! per-item failure becomes a typed outcome in the batch report instead of
//! aborting the loop. Only a failure to load the initial customer/survey
//! list is fatal.

use crate::collector;
use crate::config::Config;
use crate::content::ContentService;
use crate::eligibility;
use crate::errors::{AppError, ResultExt};
use crate::forms_client::FormsService;
use crate::ledger::SurveyLedger;
use crate::models::{CustomerContext, CustomerRecord};
use crate::notifier::{self, MailService};
use crate::provisioner::{self, ProvisionError, ProvisionWarning};
use crate::storage::{CustomerStore, SurveyStorage};
use chrono::Utc;
use sqlx::PgPool;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The external directive selecting what a run does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Create,
    Fetch,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Mode::Create),
            "fetch" => Ok(Mode::Fetch),
            other => Err(format!(
                "unrecognized mode '{}'; use 'create' or 'fetch'",
                other
            )),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Create => write!(f, "create"),
            Mode::Fetch => write!(f, "fetch"),
        }
    }
}

/// Where in the pipeline a per-item failure (or degradation) originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Decision,
    Generation,
    ProvisionCreate,
    ProvisionRecord,
    Population,
    Sharing,
    Ledger,
    Notification,
    Collection,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Decision => "decision",
            Stage::Generation => "generation",
            Stage::ProvisionCreate => "provision-create",
            Stage::ProvisionRecord => "provision-record",
            Stage::Population => "population",
            Stage::Sharing => "sharing",
            Stage::Ledger => "ledger",
            Stage::Notification => "notification",
            Stage::Collection => "collection",
        };
        write!(f, "{}", s)
    }
}

/// Result of one customer in create mode.
#[derive(Debug)]
pub enum CustomerOutcome {
    /// No eligibility rule fired; nothing was created.
    Ineligible { reason: String },
    /// A survey exists for this customer. `warnings` carries non-fatal
    /// degradations (population, sharing, ledger, notification).
    Surveyed {
        survey_id: Uuid,
        form_id: String,
        title: String,
        /// New ledger count; absent when the ledger update itself failed.
        surveys_sent: Option<i32>,
        notified: bool,
        warnings: Vec<(Stage, String)>,
    },
    /// The customer was skipped before any survey record existed.
    Failed { stage: Stage, error: String },
}

/// Result of one survey in fetch mode.
#[derive(Debug)]
pub enum SurveyOutcome {
    Collected { fetched: usize, stored: usize },
    Failed { error: String },
}

/// End-of-run summary: one outcome per processed item.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Create mode: outcomes keyed by customer email.
    pub customers: Vec<(String, CustomerOutcome)>,
    /// Fetch mode: outcomes keyed by survey id.
    pub surveys: Vec<(Uuid, SurveyOutcome)>,
}

impl BatchReport {
    pub fn surveyed(&self) -> usize {
        self.customers
            .iter()
            .filter(|(_, o)| matches!(o, CustomerOutcome::Surveyed { .. }))
            .count()
    }

    pub fn notified(&self) -> usize {
        self.customers
            .iter()
            .filter(|(_, o)| matches!(o, CustomerOutcome::Surveyed { notified: true, .. }))
            .count()
    }

    pub fn ineligible(&self) -> usize {
        self.customers
            .iter()
            .filter(|(_, o)| matches!(o, CustomerOutcome::Ineligible { .. }))
            .count()
    }

    pub fn failed_customers(&self) -> usize {
        self.customers
            .iter()
            .filter(|(_, o)| matches!(o, CustomerOutcome::Failed { .. }))
            .count()
    }

    pub fn collected_responses(&self) -> usize {
        self.surveys
            .iter()
            .map(|(_, o)| match o {
                SurveyOutcome::Collected { stored, .. } => *stored,
                SurveyOutcome::Failed { .. } => 0,
            })
            .sum()
    }

    pub fn failed_surveys(&self) -> usize {
        self.surveys
            .iter()
            .filter(|(_, o)| matches!(o, SurveyOutcome::Failed { .. }))
            .count()
    }
}

/// Owns the injectable service handles and sequences the pipeline.
pub struct BatchRunner {
    customers: CustomerStore,
    storage: SurveyStorage,
    ledger: SurveyLedger,
    content: ContentService,
    forms: FormsService,
    mail: MailService,
    operator_email: String,
}

impl BatchRunner {
    pub fn new(config: &Config, pool: PgPool) -> Result<Self, AppError> {
        Ok(Self {
            customers: CustomerStore::new(pool.clone()),
            storage: SurveyStorage::new(pool.clone()),
            ledger: SurveyLedger::new(pool),
            content: ContentService::new(config)?,
            forms: FormsService::new(config)?,
            mail: MailService::new(config)?,
            operator_email: config.operator_email.clone(),
        })
    }

    pub async fn run(&self, mode: Mode) -> Result<BatchReport, AppError> {
        tracing::info!("Running in mode: {}", mode);
        match mode {
            Mode::Create => self.run_create().await,
            Mode::Fetch => self.run_fetch().await,
        }
    }

    /// Create mode: evaluate every customer, provision surveys for the
    /// eligible ones.
    pub async fn run_create(&self) -> Result<BatchReport, AppError> {
        // The only fatal failure in a run
        let customers = self
            .customers
            .load_all()
            .await
            .context("failed to load customer list")?;
        tracing::info!("Found {} customer(s) to evaluate", customers.len());

        let mut report = BatchReport::default();
        for record in &customers {
            tracing::info!("Evaluating customer: {}", record.email);
            let outcome = self.process_customer(record).await;
            match &outcome {
                CustomerOutcome::Ineligible { reason } => {
                    tracing::info!("Customer {} not eligible: {}", record.email, reason);
                }
                CustomerOutcome::Surveyed {
                    survey_id,
                    notified,
                    warnings,
                    ..
                } => {
                    tracing::info!(
                        "Survey {} created for {} (notified: {})",
                        survey_id,
                        record.email,
                        notified
                    );
                    for (stage, warning) in warnings {
                        tracing::warn!(
                            "Customer {} degraded at {}: {}",
                            record.email,
                            stage,
                            warning
                        );
                    }
                }
                CustomerOutcome::Failed { stage, error } => {
                    tracing::error!(
                        "Customer {} failed at {}: {}",
                        record.email,
                        stage,
                        error
                    );
                }
            }
            report.customers.push((record.email.clone(), outcome));
        }

        tracing::info!("Survey creation process completed");
        Ok(report)
    }

    /// Fetch mode: harvest responses for every provisioned survey, most
    /// recently created first.
    pub async fn run_fetch(&self) -> Result<BatchReport, AppError> {
        // The only fatal failure in a run
        let surveys = self
            .storage
            .list_surveys()
            .await
            .context("failed to load survey list")?;

        let mut report = BatchReport::default();
        if surveys.is_empty() {
            tracing::info!("No surveys found");
            return Ok(report);
        }

        tracing::info!("Found {} survey(s). Fetching responses for all...", surveys.len());
        for survey in &surveys {
            tracing::info!("Processing survey with ID: {}", survey.id);
            let outcome =
                match collector::collect_survey_responses(&self.forms, &self.storage, survey)
                    .await
                {
                    Ok(summary) => SurveyOutcome::Collected {
                        fetched: summary.fetched,
                        stored: summary.stored,
                    },
                    Err(e) => {
                        tracing::error!("Collection failed for survey {}: {}", survey.id, e);
                        SurveyOutcome::Failed {
                            error: e.to_string(),
                        }
                    }
                };
            report.surveys.push((survey.id, outcome));
        }

        Ok(report)
    }

    /// Walk one customer through the create pipeline. Never returns an
    /// error: every failure is converted into an outcome variant.
    async fn process_customer(&self, record: &CustomerRecord) -> CustomerOutcome {
        let now = Utc::now();

        let decision = match eligibility::evaluate(record, now) {
            Ok(decision) => decision,
            Err(e) => {
                return CustomerOutcome::Failed {
                    stage: Stage::Decision,
                    error: e.to_string(),
                }
            }
        };

        if !decision.eligible {
            return CustomerOutcome::Ineligible {
                reason: decision.reason,
            };
        }
        tracing::info!(
            "Customer {} is eligible (priority {}, trigger {:?}): {}",
            record.email,
            decision.priority,
            decision.trigger_type,
            decision.reason
        );

        let context = CustomerContext::from_record(record);
        let question_set = match self.content.generate_question_set(&context).await {
            Ok(set) => set,
            Err(e) => {
                return CustomerOutcome::Failed {
                    stage: Stage::Generation,
                    error: e.to_string(),
                }
            }
        };

        let provisioned = match provisioner::provision_survey(
            &self.forms,
            &self.storage,
            &self.operator_email,
            &question_set,
            now,
        )
        .await
        {
            Ok(p) => p,
            Err(ProvisionError::Create(e)) => {
                return CustomerOutcome::Failed {
                    stage: Stage::ProvisionCreate,
                    error: e.to_string(),
                }
            }
            Err(e @ ProvisionError::Record { .. }) => {
                return CustomerOutcome::Failed {
                    stage: Stage::ProvisionRecord,
                    error: e.to_string(),
                }
            }
        };

        let mut warnings: Vec<(Stage, String)> = provisioned
            .warnings
            .iter()
            .map(|w| match w {
                ProvisionWarning::Population(msg) => (Stage::Population, msg.clone()),
                ProvisionWarning::Sharing(msg) => (Stage::Sharing, msg.clone()),
            })
            .collect();

        // Ledger update: exactly once, right after successful provisioning.
        let surveys_sent = match self.ledger.upsert(record.id, now).await {
            Ok(count) => {
                tracing::info!(
                    "Survey history updated for {}. Total surveys sent: {}",
                    record.email,
                    count
                );
                Some(count)
            }
            Err(e) => {
                warnings.push((Stage::Ledger, e.to_string()));
                None
            }
        };

        // Notification gate: the decision flag re-validated against the live
        // consent flag.
        let mut notified = false;
        if decision.send_email && record.marketing_opt_in {
            if !notifier::is_valid_email(&record.email) {
                warnings.push((
                    Stage::Notification,
                    format!("invalid recipient address: {}", record.email),
                ));
            } else {
                let subject = notifier::survey_subject(&provisioned.title);
                let html = notifier::survey_email_html(
                    &provisioned.title,
                    &provisioned.responder_url,
                    record.first_name(),
                );
                match self.mail.send(&record.email, &subject, &html).await {
                    Ok(_) => {
                        tracing::info!("Survey email sent to {}", record.email);
                        notified = true;
                    }
                    Err(e) => warnings.push((Stage::Notification, e.to_string())),
                }
            }
        } else {
            tracing::info!(
                "Survey created but email not sent for {}. Send email: {}, Marketing opt-in: {}",
                record.email,
                decision.send_email,
                record.marketing_opt_in
            );
        }

        CustomerOutcome::Surveyed {
            survey_id: provisioned.survey_id,
            form_id: provisioned.form_id,
            title: provisioned.title,
            surveys_sent,
            notified,
            warnings,
        }
    }
}
