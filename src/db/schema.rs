pub const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS exception_requests (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    server_name TEXT NOT NULL,
    requester_first_name TEXT NOT NULL,
    requester_last_name TEXT NOT NULL,
    requester_department TEXT,
    requester_job_title TEXT NOT NULL,
    requester_email TEXT NOT NULL,
    requester_phone TEXT,
    department_head_username TEXT NOT NULL,
    department_head_first_name TEXT NOT NULL,
    department_head_last_name TEXT NOT NULL,
    department_head_department TEXT,
    department_head_job_title TEXT NOT NULL,
    department_head_email TEXT NOT NULL,
    department_head_phone TEXT,
    approver_username TEXT,
    data_classification TEXT NOT NULL,
    duration_type TEXT NOT NULL,
    expiration_date TEXT NOT NULL,
    users_affected TEXT NOT NULL,
    data_at_risk TEXT NOT NULL,
    vulnerabilities TEXT NOT NULL DEFAULT '[]',
    justification TEXT NOT NULL,
    mitigation TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'Pending',
    decline_reason TEXT,
    requested_by TEXT NOT NULL,
    exception_type TEXT NOT NULL DEFAULT 'Standard',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS directory_users (
    username TEXT PRIMARY KEY,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    department TEXT,
    email TEXT NOT NULL,
    phone TEXT
);

CREATE INDEX IF NOT EXISTS idx_exceptions_requested_by ON exception_requests(requested_by);
CREATE INDEX IF NOT EXISTS idx_exceptions_status ON exception_requests(status);
";
