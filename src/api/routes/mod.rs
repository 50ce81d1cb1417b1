pub mod auth;
pub mod exceptions;
pub mod external;
pub mod folders;
pub mod groups;
pub mod health;
pub mod reports;
pub mod scans;
pub mod vulns;
