use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

// ============ Database Models ============

/// A customer record as created by the intake surface.
///
/// The pipeline reads these rows and never writes them back. The scalar
/// columns carry everything the eligibility rules need; the jsonb aggregates
/// (`personal_info`, `purchase_history`, `service_interactions`,
/// `marketing_engagement`) hold the full best-effort summaries used to build
/// the generation context.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CustomerRecord {
    /// Unique identifier for the customer.
    pub id: Uuid,
    /// Contact address used for survey delivery.
    pub email: String,
    /// Preferred language, if known.
    pub language: Option<String>,
    /// Inferred gender, best-effort and non-authoritative.
    pub gender: Option<String>,
    /// Industry the customer operates in.
    pub industry: Option<String>,
    /// Business type classification.
    pub business_type: Option<String>,
    /// Lifetime purchase count.
    pub total_purchases: i32,
    /// Purchase frequency trend: "increasing", "stable" or "decreasing".
    pub purchase_frequency: Option<String>,
    /// Timestamp of the most recent purchase, if any.
    pub last_purchase_date: Option<DateTime<Utc>>,
    /// Consent flag for marketing contact.
    pub marketing_opt_in: bool,
    /// Number of recorded marketing email opens.
    pub email_opens: i32,
    /// Name parts, age, location.
    pub personal_info: Option<Value>,
    /// Purchase aggregate summary.
    pub purchase_history: Option<Value>,
    /// Service interaction summary (complaints, resolutions).
    pub service_interactions: Option<Value>,
    /// Marketing engagement summary.
    pub marketing_engagement: Option<Value>,
    /// Timestamp of record creation.
    pub created_at: DateTime<Utc>,
}

impl CustomerRecord {
    /// First name from `personal_info`, when present.
    pub fn first_name(&self) -> Option<&str> {
        self.personal_info
            .as_ref()?
            .get("first_name")?
            .as_str()
            .filter(|s| !s.trim().is_empty())
    }
}

/// A provisioned survey, created exactly once per successful provisioning.
///
/// Immutable after creation except for `status`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SurveyRecord {
    /// Unique identifier for the survey row.
    pub id: Uuid,
    /// External resource identifier returned by the provisioning service.
    pub form_id: String,
    /// Globally unique, human-legible title.
    pub title: String,
    /// Lifecycle status: "active" or "closed".
    pub status: String,
    /// The full question set supplied at provisioning time.
    pub questions: Value,
    /// Question set metadata (personalization factors, language).
    pub metadata: Option<Value>,
    /// Timestamp of creation.
    pub created_at: DateTime<Utc>,
}

impl SurveyRecord {
    /// Decode the stored question set back into its typed form.
    pub fn question_set(&self) -> Result<QuestionSet, serde_json::Error> {
        serde_json::from_value(self.questions.clone())
    }
}

pub const SURVEY_STATUS_ACTIVE: &str = "active";
pub const SURVEY_STATUS_CLOSED: &str = "closed";

/// Per-customer survey issuance counter.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// The customer this entry belongs to (unique).
    pub user_id: Uuid,
    /// Timestamp of the most recent survey issued.
    pub last_survey_date: DateTime<Utc>,
    /// Count of surveys issued, monotonically increasing.
    pub surveys_sent: i32,
}

/// A normalized submitted answer set, created once and never updated.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ResponseRecord {
    /// Unique identifier for the response row.
    pub id: Uuid,
    /// The survey this response belongs to.
    pub survey_id: Uuid,
    /// Flattened question-identifier -> scalar answer map.
    pub response_data: Value,
    /// The opaque original submission payload, kept for audit.
    pub raw_response: Value,
    /// The submission's own timestamp (not collection time).
    pub created_at: DateTime<Utc>,
}

// ============ Eligibility ============

/// The categorical reason a customer became eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    ComplaintFollowup,
    PurchaseDecrease,
    Inactivity,
    FirstTime,
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TriggerType::ComplaintFollowup => "complaint_followup",
            TriggerType::PurchaseDecrease => "purchase_decrease",
            TriggerType::Inactivity => "inactivity",
            TriggerType::FirstTime => "first_time",
        };
        write!(f, "{}", s)
    }
}

/// Classification of whether a customer should receive a survey this run.
///
/// Ephemeral: computed per run, informs downstream branching only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityDecision {
    /// Whether any eligibility rule fired.
    pub eligible: bool,
    /// Short human-readable justification.
    pub reason: String,
    /// 1 or 2 for fired rules, 3 when nothing fired.
    pub priority: u8,
    /// Delivery gate, computed from consent and engagement alone.
    pub send_email: bool,
    /// Which rule fired; `None` when ineligible.
    pub trigger_type: Option<TriggerType>,
}

// ============ Question Set ============

/// Supported question kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    Rating,
    OpenEnded,
}

/// Bounds and labels for a rating question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaleSpec {
    pub min: i32,
    pub max: i32,
    #[serde(rename = "lowLabel")]
    pub low_label: String,
    #[serde(rename = "highLabel")]
    pub high_label: String,
}

/// A single generated question.
///
/// `options` is required iff the question is multiple choice; `scale` iff it
/// is a rating. Both are optional at the serde layer — presence is enforced
/// by [`crate::content::validate_question_set`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<ScaleSpec>,
}

/// Metadata attached to a generated question set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionSetMetadata {
    #[serde(default)]
    pub personalization_factors: Vec<String>,
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for QuestionSetMetadata {
    fn default() -> Self {
        Self {
            personalization_factors: Vec::new(),
            language: default_language(),
        }
    }
}

fn default_language() -> String {
    "English".to_string()
}

/// An ordered question sequence plus its metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionSet {
    pub questions: Vec<Question>,
    #[serde(default)]
    pub metadata: QuestionSetMetadata,
}

// ============ Generation Context ============

/// Projection of a [`CustomerRecord`] handed to the question generator.
///
/// Absent aggregates are omitted from the serialized payload so the
/// generator can distinguish "no data" from "empty data".
#[derive(Debug, Clone, Serialize)]
pub struct CustomerContext {
    pub industry: Option<String>,
    pub business_type: Option<String>,
    pub language: String,
    pub gender: Option<String>,
    pub total_purchases: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_history: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_interactions: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marketing_engagement: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personal_info: Option<Value>,
}

impl CustomerContext {
    pub fn from_record(record: &CustomerRecord) -> Self {
        Self {
            industry: record.industry.clone(),
            business_type: record.business_type.clone(),
            language: record
                .language
                .clone()
                .unwrap_or_else(|| "English".to_string()),
            gender: record.gender.clone(),
            total_purchases: record.total_purchases,
            purchase_history: record.purchase_history.clone(),
            service_interactions: record.service_interactions.clone(),
            marketing_engagement: record.marketing_engagement.clone(),
            personal_info: record.personal_info.clone(),
        }
    }

    /// First name from the projected `personal_info`, when present.
    pub fn first_name(&self) -> Option<&str> {
        self.personal_info
            .as_ref()?
            .get("first_name")?
            .as_str()
            .filter(|s| !s.trim().is_empty())
    }
}

// ============ Form Provisioning Wire Models ============

/// One submitted answer set fetched from the external resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSubmission {
    pub response_id: String,
    /// When the respondent submitted, per the provisioning service.
    pub last_submitted_time: DateTime<Utc>,
    /// Per-question answer map keyed by question identifier.
    #[serde(default)]
    pub answers: BTreeMap<String, SubmittedAnswer>,
}

/// The heterogeneous answer shape for a single question.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_answers: Option<TextAnswers>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_answer: Option<ScaleAnswer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextAnswers {
    #[serde(default)]
    pub answers: Vec<TextAnswerValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextAnswerValue {
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaleAnswer {
    pub value: i64,
}
