use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use crate::db::Database;
use crate::errors::DeskError;
use crate::models::{Caller, ExceptionRequest, RequestStatus, SubmitExceptionPayload};
use crate::notify::{Notice, Notifier};

use super::validate;

/// Drives the exception request lifecycle: validated submission, owner and
/// admin listings, and the admin decision transitions.
///
/// Storage writes are the source of truth. Notification dispatch is
/// best-effort and never changes an operation's outcome.
pub struct ExceptionWorkflow {
    db: Database,
    notifier: Arc<Notifier>,
}

impl ExceptionWorkflow {
    pub fn new(db: Database, notifier: Arc<Notifier>) -> Self {
        Self { db, notifier }
    }

    pub fn submit(
        &self,
        caller: &Caller,
        payload: &SubmitExceptionPayload,
    ) -> Result<ExceptionRequest, DeskError> {
        let new = validate::validate_submission(payload, &caller.username, Utc::now().date_naive())?;
        let record = self.db.insert_exception(&new)?;
        info!(
            id = record.id,
            server = %record.server_name,
            requested_by = %record.requested_by,
            "Exception request submitted"
        );
        self.notify_submission(&record);
        Ok(record)
    }

    /// Requests visible to the caller: rows they submitted, plus rows whose
    /// requester email contains their identity.
    pub fn list(&self, caller: &Caller) -> Result<Vec<ExceptionRequest>, DeskError> {
        self.db.list_exceptions_for(&caller.username)
    }

    pub fn list_all(&self, caller: &Caller) -> Result<Vec<ExceptionRequest>, DeskError> {
        self.ensure_admin(caller, "list all exception requests")?;
        self.db.list_all_exceptions()
    }

    pub fn get(&self, caller: &Caller, id: i64) -> Result<ExceptionRequest, DeskError> {
        let record = self.fetch(id)?;
        if record.requested_by != caller.username && !caller.admin {
            return Err(DeskError::Forbidden(
                "Only the requester or a reviewer may view this request".to_string(),
            ));
        }
        Ok(record)
    }

    /// Applies a reviewer decision. Only `Approved` and `Declined` are legal
    /// decision statuses, a decline must carry a reason, and requests
    /// already past `Pending` reject further transitions.
    pub fn decide(
        &self,
        caller: &Caller,
        id: i64,
        status: RequestStatus,
        reason: Option<&str>,
    ) -> Result<ExceptionRequest, DeskError> {
        self.ensure_admin(caller, "decide exception requests")?;

        if !matches!(status, RequestStatus::Approved | RequestStatus::Declined) {
            return Err(DeskError::InvalidStatus(status.to_string()));
        }
        let reason = match status {
            RequestStatus::Declined => Some(
                reason
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .ok_or(DeskError::MissingDeclineReason)?,
            ),
            _ => None,
        };

        let current = self.fetch(id)?;
        if current.status.is_terminal() {
            return Err(DeskError::InvalidTransition {
                from: current.status.to_string(),
                to: status.to_string(),
            });
        }

        let updated = self
            .db
            .update_exception_decision(id, status, reason, Some(&caller.username))?
            .ok_or_else(|| DeskError::NotFound(format!("Exception request {} not found", id)))?;
        info!(
            id,
            status = %updated.status,
            reviewer = %caller.username,
            "Exception request decided"
        );
        self.notify_decision(&updated);
        Ok(updated)
    }

    /// Flags a request as needing more information from the requester. This
    /// is a notification loopback, not a reopen: the record leaves `Pending`
    /// and a fresh submission continues the cycle.
    pub fn request_more_info(
        &self,
        caller: &Caller,
        id: i64,
        comments: &str,
    ) -> Result<ExceptionRequest, DeskError> {
        self.ensure_admin(caller, "request more information")?;

        let comments = comments.trim();
        if comments.is_empty() {
            return Err(DeskError::MalformedInput("comments are required".to_string()));
        }

        let current = self.fetch(id)?;
        if current.status.is_terminal() {
            return Err(DeskError::InvalidTransition {
                from: current.status.to_string(),
                to: RequestStatus::NeedMoreInfo.to_string(),
            });
        }

        let updated = self
            .db
            .update_exception_decision(id, RequestStatus::NeedMoreInfo, None, None)?
            .ok_or_else(|| DeskError::NotFound(format!("Exception request {} not found", id)))?;
        info!(id, reviewer = %caller.username, "More information requested");

        self.notifier.dispatch(
            Notice::NeedMoreInfo,
            &updated.requester.email,
            json!({
                "serverName": updated.server_name,
                "requestId": updated.id,
                "requesterName": requester_name(&updated),
                "comments": comments,
            }),
        );
        Ok(updated)
    }

    fn fetch(&self, id: i64) -> Result<ExceptionRequest, DeskError> {
        self.db
            .get_exception(id)?
            .ok_or_else(|| DeskError::NotFound(format!("Exception request {} not found", id)))
    }

    fn ensure_admin(&self, caller: &Caller, action: &str) -> Result<(), DeskError> {
        if caller.admin {
            return Ok(());
        }
        warn!(username = %caller.username, action, "Rejected non-admin workflow call");
        Err(DeskError::Forbidden(format!(
            "Administrator role is required to {}",
            action
        )))
    }

    /// Submission fan-out: confirmation to the requester, review-needed to
    /// the department head. The head's address comes from the directory when
    /// the username resolves, else from the submitted form.
    fn notify_submission(&self, record: &ExceptionRequest) {
        self.notifier.dispatch(
            Notice::SubmissionConfirmation,
            &record.requester.email,
            json!({
                "serverName": record.server_name,
                "requestId": record.id,
                "requesterName": requester_name(record),
            }),
        );

        let head_email = match self.db.lookup_directory_user(&record.department_head_username) {
            Ok(Some(user)) => user.email,
            Ok(None) => record.department_head.email.clone(),
            Err(e) => {
                warn!(
                    username = %record.department_head_username,
                    error = %e,
                    "Directory lookup failed, using the address from the form"
                );
                record.department_head.email.clone()
            }
        };
        self.notifier.dispatch(
            Notice::ReviewNeeded,
            &head_email,
            json!({
                "serverName": record.server_name,
                "requestId": record.id,
                "requesterName": requester_name(record),
            }),
        );
    }

    fn notify_decision(&self, record: &ExceptionRequest) {
        let approver = record.approver_username.clone().unwrap_or_default();
        match record.status {
            RequestStatus::Approved => self.notifier.dispatch(
                Notice::Approved,
                &record.requester.email,
                json!({
                    "serverName": record.server_name,
                    "requestId": record.id,
                    "requesterName": requester_name(record),
                    "approver": approver,
                    "expirationDate": record.expiration_date.to_string(),
                }),
            ),
            RequestStatus::Declined => self.notifier.dispatch(
                Notice::Declined,
                &record.requester.email,
                json!({
                    "serverName": record.server_name,
                    "requestId": record.id,
                    "requesterName": requester_name(record),
                    "approver": approver,
                    "declineReason": record.decline_reason.clone().unwrap_or_default(),
                }),
            ),
            _ => {}
        }

        // The sponsoring department head receives the generic outcome notice.
        self.notifier.dispatch(
            Notice::StatusUpdate,
            &record.department_head.email,
            json!({
                "serverName": record.server_name,
                "requestId": record.id,
                "status": record.status.as_str(),
                "approver": approver,
            }),
        );
    }
}

fn requester_name(record: &ExceptionRequest) -> String {
    format!(
        "{} {}",
        record.requester.first_name, record.requester.last_name
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DirectoryUser, SubmitExceptionPayload, VulnerabilityRef};
    use crate::notify::MailTransport;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct RecordingMailer {
        sent: mpsc::UnboundedSender<(String, String)>,
    }

    #[async_trait]
    impl MailTransport for RecordingMailer {
        async fn send(&self, to: &str, subject: &str, _html_body: &str) -> Result<(), DeskError> {
            let _ = self.sent.send((to.to_string(), subject.to_string()));
            Ok(())
        }

        fn transport_name(&self) -> &str {
            "recording"
        }
    }

    fn test_engine() -> (
        ExceptionWorkflow,
        Database,
        mpsc::UnboundedReceiver<(String, String)>,
    ) {
        let db = Database::in_memory().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let notifier =
            Notifier::with_transport(Arc::new(RecordingMailer { sent: tx }), "http://dash.test")
                .unwrap();
        let engine = ExceptionWorkflow::new(db.clone(), Arc::new(notifier));
        (engine, db, rx)
    }

    fn payload() -> SubmitExceptionPayload {
        SubmitExceptionPayload {
            server_name: Some("web01".to_string()),
            requester_first_name: Some("Ada".to_string()),
            requester_last_name: Some("Lovelace".to_string()),
            requester_department: Some("Math".to_string()),
            requester_job_title: Some("Analyst".to_string()),
            requester_email: Some("ada@example.edu".to_string()),
            requester_phone: None,
            department_head_username: Some("ghopper".to_string()),
            department_head_first_name: Some("Grace".to_string()),
            department_head_last_name: Some("Hopper".to_string()),
            department_head_department: None,
            department_head_job_title: Some("Director".to_string()),
            department_head_email: Some("grace@example.edu".to_string()),
            department_head_phone: None,
            data_classification: Some("controlled".to_string()),
            exception_duration_type: Some("3".to_string()),
            custom_expiration_date: None,
            users_affected: Some("Campus staff".to_string()),
            data_at_risk: Some("Directory records".to_string()),
            vulnerabilities: Some(vec![VulnerabilityRef::Name("CVE-2024-1234".to_string())]),
            justification: Some("Vendor app pinned to an old TLS stack".to_string()),
            mitigation: Some("Host is firewalled to campus ranges".to_string()),
            terms_accepted: Some(true),
            exception_type: None,
        }
    }

    fn requester() -> Caller {
        Caller {
            username: "ada".to_string(),
            admin: false,
        }
    }

    fn reviewer() -> Caller {
        Caller {
            username: "reviewer1".to_string(),
            admin: true,
        }
    }

    async fn next_message(
        rx: &mut mpsc::UnboundedReceiver<(String, String)>,
    ) -> (String, String) {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for notification")
            .expect("notification channel closed")
    }

    #[tokio::test]
    async fn test_submit_persists_pending_and_notifies() {
        let (engine, _db, mut rx) = test_engine();

        let record = engine.submit(&requester(), &payload()).unwrap();
        assert_eq!(record.status, RequestStatus::Pending);
        assert!(record.approver_username.is_none());
        assert_eq!(record.requested_by, "ada");

        let first = next_message(&mut rx).await;
        let second = next_message(&mut rx).await;
        let recipients: Vec<&str> = vec![&first.0, &second.0]
            .into_iter()
            .map(String::as_str)
            .collect();
        assert!(recipients.contains(&"ada@example.edu"));
        assert!(recipients.contains(&"grace@example.edu"));
    }

    #[tokio::test]
    async fn test_submit_review_notice_prefers_directory_address() {
        let (engine, db, mut rx) = test_engine();
        db.upsert_directory_user(&DirectoryUser {
            username: "ghopper".to_string(),
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            department: Some("IT".to_string()),
            email: "hopper@directory.example.edu".to_string(),
            phone: None,
        })
        .unwrap();

        engine.submit(&requester(), &payload()).unwrap();

        let first = next_message(&mut rx).await;
        let second = next_message(&mut rx).await;
        let recipients = [first.0, second.0];
        assert!(recipients.contains(&"hopper@directory.example.edu".to_string()));
        assert!(!recipients.contains(&"grace@example.edu".to_string()));
    }

    #[tokio::test]
    async fn test_submit_invalid_persists_nothing() {
        let (engine, db, _rx) = test_engine();

        let err = engine
            .submit(&requester(), &SubmitExceptionPayload::default())
            .unwrap_err();
        assert!(matches!(err, DeskError::MissingFields(_)));
        assert!(db.list_all_exceptions().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_decide_approves_and_records_reviewer() {
        let (engine, _db, mut rx) = test_engine();
        let record = engine.submit(&requester(), &payload()).unwrap();

        let updated = engine
            .decide(&reviewer(), record.id, RequestStatus::Approved, None)
            .unwrap();
        assert_eq!(updated.status, RequestStatus::Approved);
        assert_eq!(updated.approver_username.as_deref(), Some("reviewer1"));
        assert!(updated.decline_reason.is_none());

        // Two submission notices, then approval and status update.
        for _ in 0..4 {
            next_message(&mut rx).await;
        }
    }

    #[tokio::test]
    async fn test_decide_requires_admin() {
        let (engine, _db, _rx) = test_engine();
        let record = engine.submit(&requester(), &payload()).unwrap();

        let err = engine
            .decide(&requester(), record.id, RequestStatus::Approved, None)
            .unwrap_err();
        assert!(matches!(err, DeskError::Forbidden(_)));

        let unchanged = engine.get(&requester(), record.id).unwrap();
        assert_eq!(unchanged.status, RequestStatus::Pending);
    }

    #[tokio::test]
    async fn test_decline_requires_reason() {
        let (engine, _db, _rx) = test_engine();
        let record = engine.submit(&requester(), &payload()).unwrap();

        for reason in [None, Some(""), Some("   ")] {
            let err = engine
                .decide(&reviewer(), record.id, RequestStatus::Declined, reason)
                .unwrap_err();
            assert!(matches!(err, DeskError::MissingDeclineReason));
        }

        let unchanged = engine.get(&reviewer(), record.id).unwrap();
        assert_eq!(unchanged.status, RequestStatus::Pending);
    }

    #[tokio::test]
    async fn test_decline_records_reason() {
        let (engine, _db, _rx) = test_engine();
        let record = engine.submit(&requester(), &payload()).unwrap();

        let updated = engine
            .decide(
                &reviewer(),
                record.id,
                RequestStatus::Declined,
                Some("Patch is available"),
            )
            .unwrap();
        assert_eq!(updated.status, RequestStatus::Declined);
        assert_eq!(updated.decline_reason.as_deref(), Some("Patch is available"));
    }

    #[tokio::test]
    async fn test_decide_rejects_non_decision_status() {
        let (engine, _db, _rx) = test_engine();
        let record = engine.submit(&requester(), &payload()).unwrap();

        let err = engine
            .decide(&reviewer(), record.id, RequestStatus::Pending, None)
            .unwrap_err();
        assert!(matches!(err, DeskError::InvalidStatus(_)));
    }

    #[tokio::test]
    async fn test_decide_unknown_id() {
        let (engine, _db, _rx) = test_engine();
        let err = engine
            .decide(&reviewer(), 4242, RequestStatus::Approved, None)
            .unwrap_err();
        assert!(matches!(err, DeskError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_decided_request_rejects_second_decision() {
        let (engine, _db, _rx) = test_engine();
        let record = engine.submit(&requester(), &payload()).unwrap();
        engine
            .decide(&reviewer(), record.id, RequestStatus::Approved, None)
            .unwrap();

        let err = engine
            .decide(
                &reviewer(),
                record.id,
                RequestStatus::Declined,
                Some("changed my mind"),
            )
            .unwrap_err();
        match err {
            DeskError::InvalidTransition { from, to } => {
                assert_eq!(from, "Approved");
                assert_eq!(to, "Declined");
            }
            other => panic!("expected InvalidTransition, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_request_more_info_marks_and_notifies() {
        let (engine, _db, mut rx) = test_engine();
        let record = engine.submit(&requester(), &payload()).unwrap();
        next_message(&mut rx).await;
        next_message(&mut rx).await;

        let updated = engine
            .request_more_info(&reviewer(), record.id, "Which TLS versions are still enabled?")
            .unwrap();
        assert_eq!(updated.status, RequestStatus::NeedMoreInfo);
        // Reviewer identity is only recorded by approve and decline.
        assert!(updated.approver_username.is_none());

        let (to, subject) = next_message(&mut rx).await;
        assert_eq!(to, "ada@example.edu");
        assert!(subject.contains("More Information Needed"));
    }

    #[tokio::test]
    async fn test_request_more_info_requires_comments() {
        let (engine, _db, _rx) = test_engine();
        let record = engine.submit(&requester(), &payload()).unwrap();

        let err = engine
            .request_more_info(&reviewer(), record.id, "  ")
            .unwrap_err();
        assert!(matches!(err, DeskError::MalformedInput(_)));
    }

    #[tokio::test]
    async fn test_request_more_info_is_terminal() {
        let (engine, _db, _rx) = test_engine();
        let record = engine.submit(&requester(), &payload()).unwrap();
        engine
            .request_more_info(&reviewer(), record.id, "More detail please")
            .unwrap();

        let err = engine
            .decide(&reviewer(), record.id, RequestStatus::Approved, None)
            .unwrap_err();
        assert!(matches!(err, DeskError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_get_enforces_ownership() {
        let (engine, _db, _rx) = test_engine();
        let record = engine.submit(&requester(), &payload()).unwrap();

        assert!(engine.get(&requester(), record.id).is_ok());
        assert!(engine.get(&reviewer(), record.id).is_ok());

        let stranger = Caller {
            username: "mallory".to_string(),
            admin: false,
        };
        let err = engine.get(&stranger, record.id).unwrap_err();
        assert!(matches!(err, DeskError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_list_all_requires_admin() {
        let (engine, _db, _rx) = test_engine();
        let err = engine.list_all(&requester()).unwrap_err();
        assert!(matches!(err, DeskError::Forbidden(_)));
        assert!(engine.list_all(&reviewer()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_is_idempotent() {
        let (engine, _db, _rx) = test_engine();
        engine.submit(&requester(), &payload()).unwrap();
        let mut second = payload();
        second.server_name = Some("web02".to_string());
        engine.submit(&requester(), &second).unwrap();

        let first_read = engine.list(&requester()).unwrap();
        let second_read = engine.list(&requester()).unwrap();
        assert_eq!(first_read.len(), 2);
        let ids: Vec<i64> = first_read.iter().map(|r| r.id).collect();
        let ids_again: Vec<i64> = second_read.iter().map(|r| r.id).collect();
        assert_eq!(ids, ids_again);
    }
}
