//! Deterministic survey eligibility rules.
//!
//! The decision policy is a fixed precedence table evaluated over the
//! customer row and the run's reference time:
//!
//! - Priority 1: unresolved service complaint older than 7 days and not yet
//!   followed up; or lifetime purchase count of exactly 1.
//! - Priority 2: decreasing purchase frequency; or no purchase recorded in
//!   the trailing 90 days.
//!
//! Priority 1 rules short-circuit, and within a priority the first listed
//! rule wins. The `send_email` gate is computed from the consent flag and
//! email-open count alone — never from purchase or eligibility reasoning, so
//! a survey is generated for every eligible customer regardless of consent.

use crate::errors::AppError;
use crate::models::{CustomerRecord, EligibilityDecision, TriggerType};
use chrono::{DateTime, Duration, Utc};

/// Days an unresolved complaint must age before a follow-up survey fires.
pub const COMPLAINT_FOLLOWUP_AGE_DAYS: i64 = 7;

/// Trailing window without a purchase that counts as inactivity.
pub const INACTIVITY_WINDOW_DAYS: i64 = 90;

/// Evaluate one customer record against the rule table.
///
/// Returns an error only when a behavioral aggregate is structurally invalid
/// (e.g. an unparseable complaint date); the caller treats that as a decision
/// failure and skips the customer for this run.
pub fn evaluate(
    record: &CustomerRecord,
    now: DateTime<Utc>,
) -> Result<EligibilityDecision, AppError> {
    let send_email = send_email_gate(record);

    // Priority 1: complaint follow-up takes precedence over first-time.
    if let Some(opened_at) = pending_complaint(record, now)? {
        let age_days = (now - opened_at).num_days();
        return Ok(EligibilityDecision {
            eligible: true,
            reason: format!(
                "unresolved service complaint from {} days ago has no follow-up",
                age_days
            ),
            priority: 1,
            send_email,
            trigger_type: Some(TriggerType::ComplaintFollowup),
        });
    }

    if record.total_purchases == 1 {
        return Ok(EligibilityDecision {
            eligible: true,
            reason: "first recorded purchase".to_string(),
            priority: 1,
            send_email,
            trigger_type: Some(TriggerType::FirstTime),
        });
    }

    // Priority 2
    if record.purchase_frequency.as_deref() == Some("decreasing") {
        return Ok(EligibilityDecision {
            eligible: true,
            reason: "purchase frequency is decreasing".to_string(),
            priority: 2,
            send_email,
            trigger_type: Some(TriggerType::PurchaseDecrease),
        });
    }

    let inactive = match record.last_purchase_date {
        Some(last) => now - last > Duration::days(INACTIVITY_WINDOW_DAYS),
        // Never purchased counts as "no purchase in the trailing window".
        None => true,
    };
    if inactive {
        return Ok(EligibilityDecision {
            eligible: true,
            reason: format!(
                "no purchase recorded in the last {} days",
                INACTIVITY_WINDOW_DAYS
            ),
            priority: 2,
            send_email,
            trigger_type: Some(TriggerType::Inactivity),
        });
    }

    Ok(EligibilityDecision {
        eligible: false,
        reason: "no eligibility rule matched".to_string(),
        priority: 3,
        send_email,
        trigger_type: None,
    })
}

/// Delivery gate: consent plus at least one recorded email open.
///
/// Deliberately reads nothing else from the record.
pub fn send_email_gate(record: &CustomerRecord) -> bool {
    record.marketing_opt_in && record.email_opens > 0
}

/// Opening timestamp of a complaint that qualifies for follow-up: unresolved,
/// not yet followed up, and older than [`COMPLAINT_FOLLOWUP_AGE_DAYS`].
fn pending_complaint(
    record: &CustomerRecord,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, AppError> {
    let Some(interactions) = record.service_interactions.as_ref() else {
        return Ok(None);
    };
    let Some(raw_date) = interactions.get("last_complaint_date") else {
        return Ok(None);
    };
    if raw_date.is_null() {
        return Ok(None);
    }

    let date_str = raw_date.as_str().ok_or_else(|| {
        AppError::MalformedPayload(format!(
            "customer {}: service_interactions.last_complaint_date is not a string",
            record.id
        ))
    })?;
    let opened_at = DateTime::parse_from_rfc3339(date_str)
        .map_err(|e| {
            AppError::MalformedPayload(format!(
                "customer {}: unparseable complaint date '{}': {}",
                record.id, date_str, e
            ))
        })?
        .with_timezone(&Utc);

    let resolved = interactions
        .get("complaint_resolved")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let followed_up = interactions
        .get("complaint_followed_up")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    if !resolved && !followed_up && now - opened_at > Duration::days(COMPLAINT_FOLLOWUP_AGE_DAYS) {
        Ok(Some(opened_at))
    } else {
        Ok(None)
    }
}
