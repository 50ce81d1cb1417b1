use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;

use crate::errors::DeskError;
use crate::models::{ContactInfo, ExceptionRequest, NewExceptionRequest, RequestStatus};
use super::Database;

/// Single source of truth for column order; every query selects this list and
/// the row mapper addresses columns by name.
const COLUMNS: &str = "id, server_name, requester_first_name, requester_last_name, \
    requester_department, requester_job_title, requester_email, requester_phone, \
    department_head_username, department_head_first_name, department_head_last_name, \
    department_head_department, department_head_job_title, department_head_email, \
    department_head_phone, approver_username, data_classification, duration_type, \
    expiration_date, users_affected, data_at_risk, vulnerabilities, justification, \
    mitigation, status, decline_reason, requested_by, exception_type, created_at, updated_at";

impl Database {
    /// Insert a validated request with status `Pending` and return the stored
    /// row. The insert and the read-back share one transaction.
    pub fn insert_exception(&self, new: &NewExceptionRequest) -> Result<ExceptionRequest, DeskError> {
        let vulnerabilities = serde_json::to_string(&new.vulnerabilities)?;
        let now = Utc::now().to_rfc3339();

        let conn = self.conn.lock().unwrap();
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| DeskError::Database(format!("Failed to begin transaction: {}", e)))?;

        tx.execute(
            "INSERT INTO exception_requests (
                server_name, requester_first_name, requester_last_name, requester_department,
                requester_job_title, requester_email, requester_phone,
                department_head_username, department_head_first_name, department_head_last_name,
                department_head_department, department_head_job_title, department_head_email,
                department_head_phone, data_classification, duration_type, expiration_date,
                users_affected, data_at_risk, vulnerabilities, justification, mitigation,
                status, requested_by, exception_type, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                      ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27)",
            rusqlite::params![
                new.server_name,
                new.requester.first_name,
                new.requester.last_name,
                new.requester.department,
                new.requester.job_title,
                new.requester.email,
                new.requester.phone,
                new.department_head_username,
                new.department_head.first_name,
                new.department_head.last_name,
                new.department_head.department,
                new.department_head.job_title,
                new.department_head.email,
                new.department_head.phone,
                new.data_classification.as_str(),
                new.duration_type,
                new.expiration_date.to_string(),
                new.users_affected,
                new.data_at_risk,
                vulnerabilities,
                new.justification,
                new.mitigation,
                RequestStatus::Pending.as_str(),
                new.requested_by,
                new.exception_type,
                now,
                now,
            ],
        )
        .map_err(|e| DeskError::Database(format!("Failed to insert exception request: {}", e)))?;

        let id = tx.last_insert_rowid();
        let record = tx
            .query_row(
                &format!("SELECT {COLUMNS} FROM exception_requests WHERE id = ?1"),
                rusqlite::params![id],
                row_to_request,
            )
            .map_err(|e| DeskError::Database(format!("Failed to read inserted request: {}", e)))?;

        tx.commit()
            .map_err(|e| DeskError::Database(format!("Failed to commit insert: {}", e)))?;
        Ok(record)
    }

    pub fn get_exception(&self, id: i64) -> Result<Option<ExceptionRequest>, DeskError> {
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            &format!("SELECT {COLUMNS} FROM exception_requests WHERE id = ?1"),
            rusqlite::params![id],
            row_to_request,
        );

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DeskError::Database(format!("Query error: {}", e))),
        }
    }

    /// Rows the caller may see: their own submissions, plus rows whose
    /// requester email contains their identity. The second arm keeps records
    /// findable that predate username capture.
    pub fn list_exceptions_for(&self, username: &str) -> Result<Vec<ExceptionRequest>, DeskError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {COLUMNS} FROM exception_requests \
                 WHERE requested_by = ?1 OR instr(lower(requester_email), lower(?1)) > 0 \
                 ORDER BY created_at DESC, id DESC"
            ))
            .map_err(|e| DeskError::Database(format!("Query failed: {}", e)))?;

        let rows = stmt
            .query_map(rusqlite::params![username], row_to_request)
            .map_err(|e| DeskError::Database(format!("Query error: {}", e)))?;

        collect_rows(rows)
    }

    pub fn list_all_exceptions(&self) -> Result<Vec<ExceptionRequest>, DeskError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {COLUMNS} FROM exception_requests ORDER BY created_at DESC, id DESC"
            ))
            .map_err(|e| DeskError::Database(format!("Query failed: {}", e)))?;

        let rows = stmt
            .query_map([], row_to_request)
            .map_err(|e| DeskError::Database(format!("Query error: {}", e)))?;

        collect_rows(rows)
    }

    /// Apply a decision in one atomic update and return the updated row, or
    /// `None` when the id does not exist. Only status, decline reason,
    /// reviewer identity and the updated timestamp ever change.
    pub fn update_exception_decision(
        &self,
        id: i64,
        status: RequestStatus,
        decline_reason: Option<&str>,
        approver_username: Option<&str>,
    ) -> Result<Option<ExceptionRequest>, DeskError> {
        let conn = self.conn.lock().unwrap();
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| DeskError::Database(format!("Failed to begin transaction: {}", e)))?;

        let affected = tx
            .execute(
                "UPDATE exception_requests SET status = ?2, decline_reason = ?3, \
                 approver_username = COALESCE(?4, approver_username), updated_at = ?5 \
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    status.as_str(),
                    decline_reason,
                    approver_username,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| DeskError::Database(format!("Update failed: {}", e)))?;

        if affected == 0 {
            return Ok(None);
        }

        let record = tx
            .query_row(
                &format!("SELECT {COLUMNS} FROM exception_requests WHERE id = ?1"),
                rusqlite::params![id],
                row_to_request,
            )
            .map_err(|e| DeskError::Database(format!("Failed to read updated request: {}", e)))?;

        tx.commit()
            .map_err(|e| DeskError::Database(format!("Failed to commit update: {}", e)))?;
        Ok(Some(record))
    }
}

fn collect_rows(
    rows: rusqlite::MappedRows<'_, impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<ExceptionRequest>>,
) -> Result<Vec<ExceptionRequest>, DeskError> {
    let mut results = Vec::new();
    for row in rows {
        results.push(row.map_err(|e| DeskError::Database(format!("Row error: {}", e)))?);
    }
    Ok(results)
}

fn row_to_request(row: &rusqlite::Row<'_>) -> rusqlite::Result<ExceptionRequest> {
    let status_raw: String = row.get("status")?;
    let status = RequestStatus::parse(&status_raw).map_err(conversion_err)?;

    let classification_raw: String = row.get("data_classification")?;
    let data_classification =
        crate::models::DataClassification::parse(&classification_raw).map_err(conversion_err)?;

    let vulnerabilities_raw: String = row.get("vulnerabilities")?;
    let vulnerabilities: Vec<String> =
        serde_json::from_str(&vulnerabilities_raw).map_err(conversion_err)?;

    let expiration_raw: String = row.get("expiration_date")?;
    let expiration_date =
        NaiveDate::parse_from_str(&expiration_raw, "%Y-%m-%d").map_err(conversion_err)?;

    Ok(ExceptionRequest {
        id: row.get("id")?,
        server_name: row.get("server_name")?,
        requester: ContactInfo {
            first_name: row.get("requester_first_name")?,
            last_name: row.get("requester_last_name")?,
            department: row.get("requester_department")?,
            job_title: row.get("requester_job_title")?,
            email: row.get("requester_email")?,
            phone: row.get("requester_phone")?,
        },
        department_head: ContactInfo {
            first_name: row.get("department_head_first_name")?,
            last_name: row.get("department_head_last_name")?,
            department: row.get("department_head_department")?,
            job_title: row.get("department_head_job_title")?,
            email: row.get("department_head_email")?,
            phone: row.get("department_head_phone")?,
        },
        department_head_username: row.get("department_head_username")?,
        approver_username: row.get("approver_username")?,
        data_classification,
        duration_type: row.get("duration_type")?,
        expiration_date,
        users_affected: row.get("users_affected")?,
        data_at_risk: row.get("data_at_risk")?,
        vulnerabilities,
        justification: row.get("justification")?,
        mitigation: row.get("mitigation")?,
        status,
        decline_reason: row.get("decline_reason")?,
        requested_by: row.get("requested_by")?,
        exception_type: row.get("exception_type")?,
        created_at: parse_timestamp(&row.get::<_, String>("created_at")?)?,
        updated_at: parse_timestamp(&row.get::<_, String>("updated_at")?)?,
    })
}

fn parse_timestamp(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(conversion_err)
}

fn conversion_err<E>(e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e))
}
