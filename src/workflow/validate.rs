use chrono::NaiveDate;

use crate::errors::DeskError;
use crate::models::{
    ContactInfo, DataClassification, NewExceptionRequest, SubmitExceptionPayload, VulnerabilityRef,
};

const DEFAULT_EXCEPTION_TYPE: &str = "Standard";

/// Validates a raw submission and produces the typed record to persist.
///
/// Missing required fields are collected across the whole payload so the
/// dashboard can highlight every offending field in a single round trip.
pub fn validate_submission(
    payload: &SubmitExceptionPayload,
    requested_by: &str,
    today: NaiveDate,
) -> Result<NewExceptionRequest, DeskError> {
    let mut missing = Vec::new();

    let server_name = required(&mut missing, "serverName", &payload.server_name);
    let requester_first = required(
        &mut missing,
        "requesterFirstName",
        &payload.requester_first_name,
    );
    let requester_last = required(
        &mut missing,
        "requesterLastName",
        &payload.requester_last_name,
    );
    let requester_job = required(
        &mut missing,
        "requesterJobTitle",
        &payload.requester_job_title,
    );
    let requester_email = required(&mut missing, "requesterEmail", &payload.requester_email);
    let head_username = required(
        &mut missing,
        "departmentHeadUsername",
        &payload.department_head_username,
    );
    let head_first = required(
        &mut missing,
        "departmentHeadFirstName",
        &payload.department_head_first_name,
    );
    let head_last = required(
        &mut missing,
        "departmentHeadLastName",
        &payload.department_head_last_name,
    );
    let head_job = required(
        &mut missing,
        "departmentHeadJobTitle",
        &payload.department_head_job_title,
    );
    let head_email = required(
        &mut missing,
        "departmentHeadEmail",
        &payload.department_head_email,
    );
    let classification_raw = required(
        &mut missing,
        "dataClassification",
        &payload.data_classification,
    );
    let duration_type = required(
        &mut missing,
        "exceptionDurationType",
        &payload.exception_duration_type,
    );
    let users_affected = required(&mut missing, "usersAffected", &payload.users_affected);
    let data_at_risk = required(&mut missing, "dataAtRisk", &payload.data_at_risk);
    let justification = required(&mut missing, "justification", &payload.justification);
    let mitigation = required(&mut missing, "mitigation", &payload.mitigation);
    if payload.terms_accepted != Some(true) {
        missing.push("termsAccepted".to_string());
    }

    if !missing.is_empty() {
        return Err(DeskError::MissingFields(missing));
    }

    let data_classification = DataClassification::parse(&classification_raw)?;
    let expiration_date =
        resolve_expiration(&duration_type, payload.custom_expiration_date, today)?;
    let vulnerabilities = normalize_vulnerabilities(payload);

    Ok(NewExceptionRequest {
        server_name,
        requester: ContactInfo {
            first_name: requester_first,
            last_name: requester_last,
            department: optional(&payload.requester_department),
            job_title: requester_job,
            email: requester_email,
            phone: optional(&payload.requester_phone),
        },
        department_head: ContactInfo {
            first_name: head_first,
            last_name: head_last,
            department: optional(&payload.department_head_department),
            job_title: head_job,
            email: head_email,
            phone: optional(&payload.department_head_phone),
        },
        department_head_username: head_username,
        data_classification,
        duration_type,
        expiration_date,
        users_affected,
        data_at_risk,
        vulnerabilities,
        justification,
        mitigation,
        requested_by: requested_by.to_string(),
        exception_type: optional(&payload.exception_type)
            .unwrap_or_else(|| DEFAULT_EXCEPTION_TYPE.to_string()),
    })
}

fn required(missing: &mut Vec<String>, wire_name: &str, value: &Option<String>) -> String {
    match value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => v.to_string(),
        None => {
            missing.push(wire_name.to_string());
            String::new()
        }
    }
}

fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Expiration is either the caller-supplied date (duration `"custom"`) or
/// the submission date plus thirty days per month of duration.
fn resolve_expiration(
    duration_type: &str,
    custom: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<NaiveDate, DeskError> {
    if duration_type.eq_ignore_ascii_case("custom") {
        return custom.ok_or(DeskError::MissingCustomDate);
    }
    let months: u32 = duration_type
        .parse()
        .map_err(|_| DeskError::InvalidDurationType(duration_type.to_string()))?;
    if months == 0 {
        return Err(DeskError::InvalidDurationType(duration_type.to_string()));
    }
    today
        .checked_add_signed(chrono::Duration::days(30 * i64::from(months)))
        .ok_or_else(|| DeskError::InvalidDurationType(duration_type.to_string()))
}

/// Each entry collapses to a display string; blank entries are dropped so
/// the stored list never contains empty strings.
fn normalize_vulnerabilities(payload: &SubmitExceptionPayload) -> Vec<String> {
    payload
        .vulnerabilities
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(VulnerabilityRef::display_name)
        .filter(|name| !name.is_empty())
        .collect()
}
