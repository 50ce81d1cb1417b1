use handlebars::Handlebars;

use crate::errors::DeskError;

/// The fixed set of outbound notices. Each owns a subject template and an
/// HTML body template, registered under stable names at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// To the requester, right after their submission is stored.
    SubmissionConfirmation,
    /// To the department head named on the request.
    ReviewNeeded,
    /// To the requester when a reviewer asks for more information.
    NeedMoreInfo,
    /// To the requester on approval.
    Approved,
    /// To the requester on decline, carrying the reason.
    Declined,
    /// To the department head when a decision lands on a request they sponsor.
    StatusUpdate,
}

impl Notice {
    pub const ALL: [Notice; 6] = [
        Notice::SubmissionConfirmation,
        Notice::ReviewNeeded,
        Notice::NeedMoreInfo,
        Notice::Approved,
        Notice::Declined,
        Notice::StatusUpdate,
    ];

    pub fn template_name(&self) -> &'static str {
        match self {
            Self::SubmissionConfirmation => "submission_confirmation",
            Self::ReviewNeeded => "review_needed",
            Self::NeedMoreInfo => "need_more_info",
            Self::Approved => "approved",
            Self::Declined => "declined",
            Self::StatusUpdate => "status_update",
        }
    }

    pub fn subject_name(&self) -> String {
        format!("{}_subject", self.template_name())
    }
}

/// Build the registry with every subject and body template compiled.
pub fn registry() -> Result<Handlebars<'static>, DeskError> {
    let mut hb = Handlebars::new();
    for notice in Notice::ALL {
        hb.register_template_string(notice.template_name(), body_template(notice))
            .map_err(|e| DeskError::Template(format!("{}: {}", notice.template_name(), e)))?;
        hb.register_template_string(&notice.subject_name(), subject_template(notice))
            .map_err(|e| DeskError::Template(format!("{}: {}", notice.subject_name(), e)))?;
    }
    Ok(hb)
}

fn subject_template(notice: Notice) -> &'static str {
    match notice {
        Notice::SubmissionConfirmation => {
            "Vulnerability Exception Request Submitted - {{serverName}}"
        }
        Notice::ReviewNeeded => "Vulnerability Exception Request Pending Review - {{serverName}}",
        Notice::NeedMoreInfo => "More Information Needed - Exception Request #{{requestId}}",
        Notice::Approved => "Vulnerability Exception Request Approved - {{serverName}}",
        Notice::Declined => "Vulnerability Exception Request Declined - {{serverName}}",
        Notice::StatusUpdate => "Exception Request #{{requestId}} - {{status}}",
    }
}

fn body_template(notice: Notice) -> &'static str {
    match notice {
        Notice::SubmissionConfirmation => {
            "<html><body>\
             <h2>Exception Request Received</h2>\
             <p>Your vulnerability exception request for <strong>{{serverName}}</strong> \
             has been submitted and is pending review by the Information Security Office.</p>\
             <p>Request ID: {{requestId}}</p>\
             <p>You can track its status at \
             <a href=\"{{dashboardUrl}}/exception-requests\">{{dashboardUrl}}/exception-requests</a>.</p>\
             </body></html>"
        }
        Notice::ReviewNeeded => {
            "<html><body>\
             <h2>Exception Request Awaiting Review</h2>\
             <p>{{requesterName}} has submitted a vulnerability exception request for \
             <strong>{{serverName}}</strong> naming you as the responsible department head.</p>\
             <p>Request ID: {{requestId}}</p>\
             <p>Review it at \
             <a href=\"{{dashboardUrl}}/admin/exception-requests\">{{dashboardUrl}}/admin/exception-requests</a>.</p>\
             </body></html>"
        }
        Notice::NeedMoreInfo => {
            "<html><body>\
             <h2>More Information Needed</h2>\
             <p>A reviewer needs more information before deciding your exception request \
             for <strong>{{serverName}}</strong> (request #{{requestId}}):</p>\
             <blockquote>{{comments}}</blockquote>\
             <p>Please submit a new request with the missing details at \
             <a href=\"{{dashboardUrl}}/exception-requests\">{{dashboardUrl}}/exception-requests</a>.</p>\
             </body></html>"
        }
        Notice::Approved => {
            "<html><body>\
             <h2>Exception Request Approved</h2>\
             <p>Your vulnerability exception request for <strong>{{serverName}}</strong> \
             (request #{{requestId}}) was approved by {{approver}}.</p>\
             <p>The exception expires on {{expirationDate}}. Remediation remains your \
             responsibility after that date.</p>\
             </body></html>"
        }
        Notice::Declined => {
            "<html><body>\
             <h2>Exception Request Declined</h2>\
             <p>Your vulnerability exception request for <strong>{{serverName}}</strong> \
             (request #{{requestId}}) was declined by {{approver}}.</p>\
             <p>Reason:</p>\
             <blockquote>{{declineReason}}</blockquote>\
             <p>Please remediate the listed vulnerabilities promptly.</p>\
             </body></html>"
        }
        Notice::StatusUpdate => {
            "<html><body>\
             <h2>Exception Request Update</h2>\
             <p>The exception request for <strong>{{serverName}}</strong> \
             (request #{{requestId}}), sponsored by your department, moved to \
             status <strong>{{status}}</strong>.</p>\
             </body></html>"
        }
    }
}
