use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::{ScanTemplates, ScannerConfig};
use crate::errors::DeskError;

/// Folder names the appliance may use for external scans. The first
/// entry is the name used when the folder has to be created.
const EXTERNAL_FOLDER_NAMES: [&str; 2] = ["ExternalScans", "External Scans"];
const MY_SCANS_FOLDER: &str = "My Scans";

const EXPORT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const EXPORT_POLL_ATTEMPTS: u32 = 30;

/// HTTP client for the vulnerability scanner appliance.
///
/// Every call carries the caller's appliance session token, so requests
/// run with the caller's own permissions rather than a service account.
#[derive(Debug, Clone)]
pub struct ScannerClient {
    http: Client,
    base_url: String,
    admin_group_id: i64,
    templates: ScanTemplates,
}

impl ScannerClient {
    pub fn new(config: &ScannerConfig) -> Result<Self, DeskError> {
        let http = Client::builder()
            .danger_accept_invalid_certs(config.insecure)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DeskError::Network(format!("Failed to build scanner HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            admin_group_id: config.admin_group_id,
            templates: config.templates.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn transport_err(context: &str, err: reqwest::Error) -> DeskError {
        if err.is_timeout() {
            DeskError::ScannerTimeout(format!("{} timed out", context))
        } else {
            DeskError::Network(format!("{}: {}", context, err))
        }
    }

    async fn check(resp: Response) -> Result<Response, DeskError> {
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(DeskError::Unauthorized(
                "Scanner session is invalid or expired".to_string(),
            ));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DeskError::Scanner(format!(
                "Scanner returned {}: {}",
                status, body
            )));
        }
        Ok(resp)
    }

    async fn into_json(resp: Response) -> Result<Value, DeskError> {
        let resp = Self::check(resp).await?;
        resp.json()
            .await
            .map_err(|e| DeskError::Scanner(format!("Invalid scanner response: {}", e)))
    }

    async fn get(
        &self,
        token: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Value, DeskError> {
        let mut req = self
            .http
            .get(self.endpoint(path))
            .header("X-Cookie", format!("token={}", token));
        if !query.is_empty() {
            req = req.query(query);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| Self::transport_err("Scanner request", e))?;
        Self::into_json(resp).await
    }

    async fn post_json(&self, token: &str, path: &str, body: &Value) -> Result<Value, DeskError> {
        let resp = self
            .http
            .post(self.endpoint(path))
            .header("X-Cookie", format!("token={}", token))
            .json(body)
            .send()
            .await
            .map_err(|e| Self::transport_err("Scanner request", e))?;
        Self::into_json(resp).await
    }

    /// POST without a body, for launch and stop style actions whose
    /// responses carry nothing the dashboard needs.
    async fn post_action(&self, token: &str, path: &str) -> Result<(), DeskError> {
        let resp = self
            .http
            .post(self.endpoint(path))
            .header("X-Cookie", format!("token={}", token))
            .send()
            .await
            .map_err(|e| Self::transport_err("Scanner request", e))?;
        Self::check(resp).await.map(|_| ())
    }

    async fn delete_action(&self, token: &str, path: &str) -> Result<(), DeskError> {
        let resp = self
            .http
            .delete(self.endpoint(path))
            .header("X-Cookie", format!("token={}", token))
            .send()
            .await
            .map_err(|e| Self::transport_err("Scanner request", e))?;
        Self::check(resp).await.map(|_| ())
    }

    // --- sessions ---

    /// Authenticates against the appliance and returns its session token.
    pub async fn login(&self, username: &str, password: &str) -> Result<String, DeskError> {
        let resp = self
            .http
            .post(self.endpoint("/session"))
            .json(&json!({"username": username, "password": password}))
            .send()
            .await
            .map_err(|e| Self::transport_err("Scanner login", e))?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(DeskError::Unauthorized("Invalid credentials".to_string()));
        }

        let body = Self::into_json(resp).await?;
        body.get("token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                DeskError::Scanner("Scanner login response did not include a token".to_string())
            })
    }

    pub async fn logout(&self, token: &str) -> Result<(), DeskError> {
        self.delete_action(token, "/session").await
    }

    pub async fn session_details(&self, token: &str) -> Result<Value, DeskError> {
        self.get(token, "/session", &[]).await
    }

    /// Reviewer standing is the caller's live membership in the
    /// configured admin group, checked on every call.
    pub async fn is_admin(&self, token: &str) -> Result<bool, DeskError> {
        let session = self.session_details(token).await?;
        Ok(group_ids(&session).contains(&self.admin_group_id))
    }

    // --- folders ---

    pub async fn list_folders(&self, token: &str) -> Result<Vec<Value>, DeskError> {
        let body = self.get(token, "/folders", &[]).await?;
        Ok(body
            .get("folders")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    pub async fn my_scans_folder(&self, token: &str) -> Result<Value, DeskError> {
        self.list_folders(token)
            .await?
            .into_iter()
            .find(|f| f.get("name").and_then(Value::as_str) == Some(MY_SCANS_FOLDER))
            .ok_or_else(|| DeskError::NotFound("My Scans folder not found".to_string()))
    }

    pub async fn external_folder(&self, token: &str) -> Result<Option<Value>, DeskError> {
        Ok(self.list_folders(token).await?.into_iter().find(|f| {
            matches!(
                f.get("name").and_then(Value::as_str),
                Some(name) if EXTERNAL_FOLDER_NAMES.contains(&name)
            )
        }))
    }

    pub async fn ensure_external_folder(&self, token: &str) -> Result<Value, DeskError> {
        if let Some(folder) = self.external_folder(token).await? {
            return Ok(folder);
        }
        debug!(name = EXTERNAL_FOLDER_NAMES[0], "Creating external scan folder");
        self.post_json(token, "/folders", &json!({"name": EXTERNAL_FOLDER_NAMES[0]}))
            .await
    }

    // --- agent groups ---

    pub async fn list_agent_groups(&self, token: &str) -> Result<Vec<Value>, DeskError> {
        let body = self.get(token, "/agent-groups", &[]).await?;
        Ok(body
            .get("groups")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    /// Exact name match, used to surface the caller's own agent group.
    pub async fn find_agent_group(
        &self,
        token: &str,
        name: &str,
    ) -> Result<Option<Value>, DeskError> {
        Ok(self
            .list_agent_groups(token)
            .await?
            .into_iter()
            .find(|g| g.get("name").and_then(Value::as_str) == Some(name)))
    }

    pub async fn agent_group_details(
        &self,
        token: &str,
        group_id: i64,
    ) -> Result<Value, DeskError> {
        self.get(token, &format!("/agent-groups/{}", group_id), &[])
            .await
    }

    /// Returns the existing group when one matches the name
    /// case-insensitively, otherwise creates it.
    pub async fn ensure_agent_group(&self, token: &str, name: &str) -> Result<Value, DeskError> {
        let existing = self.list_agent_groups(token).await?.into_iter().find(|g| {
            g.get("name")
                .and_then(Value::as_str)
                .map(|n| n.eq_ignore_ascii_case(name))
                .unwrap_or(false)
        });
        if let Some(group) = existing {
            return Ok(group);
        }

        debug!(name = name, "Creating agent group");
        let payload = json!({
            "name": name,
            "description": format!("Agent group for {}", name),
        });
        self.post_json(token, "/agent-groups", &payload).await
    }

    pub async fn remove_agent(
        &self,
        token: &str,
        group_id: i64,
        agent_id: i64,
    ) -> Result<(), DeskError> {
        self.delete_action(token, &format!("/agent-groups/{}/agents/{}", group_id, agent_id))
            .await
    }

    // --- scans ---

    pub async fn list_scans(
        &self,
        token: &str,
        folder_id: Option<i64>,
    ) -> Result<Vec<Value>, DeskError> {
        let mut query = Vec::new();
        if let Some(id) = folder_id {
            query.push(("folder_id", id.to_string()));
        }
        let body = self.get(token, "/scans", &query).await?;
        Ok(body
            .get("scans")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    pub async fn scan_details(&self, token: &str, scan_id: i64) -> Result<Value, DeskError> {
        self.get(token, &format!("/scans/{}", scan_id), &[]).await
    }

    /// Host findings for a scan, optionally pinned to a history snapshot.
    pub async fn host_details(
        &self,
        token: &str,
        scan_id: i64,
        host_id: i64,
        history_id: Option<i64>,
    ) -> Result<Value, DeskError> {
        let mut query = Vec::new();
        if let Some(id) = history_id {
            query.push(("history_id", id.to_string()));
        }
        self.get(token, &format!("/scans/{}/hosts/{}", scan_id, host_id), &query)
            .await
    }

    pub async fn plugin_details(
        &self,
        token: &str,
        scan_id: i64,
        host_id: i64,
        plugin_id: i64,
    ) -> Result<Value, DeskError> {
        self.get(
            token,
            &format!("/scans/{}/hosts/{}/plugins/{}", scan_id, host_id, plugin_id),
            &[],
        )
        .await
    }

    pub async fn launch_scan(&self, token: &str, scan_id: i64) -> Result<(), DeskError> {
        self.post_action(token, &format!("/scans/{}/launch", scan_id))
            .await
    }

    pub async fn stop_scan(&self, token: &str, scan_id: i64) -> Result<(), DeskError> {
        self.post_action(token, &format!("/scans/{}/stop", scan_id))
            .await
    }

    /// Case-insensitive substring match over scan names, the lookup the
    /// dashboard uses when it only knows a server name.
    pub async fn find_scan_by_name(
        &self,
        token: &str,
        folder_id: Option<i64>,
        server_name: &str,
    ) -> Result<Option<Value>, DeskError> {
        let needle = server_name.to_lowercase();
        Ok(self
            .list_scans(token, folder_id)
            .await?
            .into_iter()
            .find(|s| {
                s.get("name")
                    .and_then(Value::as_str)
                    .map(|n| n.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            }))
    }

    /// Case-insensitive exact name match, used to spot duplicates before
    /// creating a scan.
    pub async fn find_scan_exact(
        &self,
        token: &str,
        folder_id: i64,
        name: &str,
    ) -> Result<Option<Value>, DeskError> {
        Ok(self
            .list_scans(token, Some(folder_id))
            .await?
            .into_iter()
            .find(|s| {
                s.get("name")
                    .and_then(Value::as_str)
                    .map(|n| n.eq_ignore_ascii_case(name))
                    .unwrap_or(false)
            }))
    }

    /// Creates an on-demand agent scan targeting `server_name`, bound to
    /// the caller's agent group.
    pub async fn create_internal_scan(
        &self,
        token: &str,
        username: &str,
        server_name: &str,
        folder_id: i64,
        agent_group_id: i64,
    ) -> Result<Value, DeskError> {
        let payload = json!({
            "uuid": self.templates.internal_uuid,
            "settings": {
                "name": server_name,
                "description": format!("{} created scan for {}", username, server_name),
                "emails": "",
                "enabled": true,
                "launch": "ON_DEMAND",
                "folder_id": folder_id,
                "policy_id": self.templates.internal_policy_id,
                "scanner_id": 1,
                "text_targets": server_name,
                "agent_group_id": [agent_group_id],
            }
        });
        self.post_json(token, "/scans", &payload).await
    }

    /// Creates an on-demand network vulnerability scan in the external
    /// scan folder.
    pub async fn create_external_scan(
        &self,
        token: &str,
        username: &str,
        server_name: &str,
        folder_id: i64,
    ) -> Result<Value, DeskError> {
        let payload = json!({
            "uuid": self.templates.external_uuid,
            "settings": {
                "name": server_name,
                "description": format!("{} created vulnerability scan for {}", username, server_name),
                "enabled": true,
                "launch": "ON_DEMAND",
                "folder_id": folder_id,
                "policy_id": self.templates.external_policy_id,
                "scanner_id": 1,
                "text_targets": server_name,
                "type": "vulnerability",
            }
        });
        self.post_json(token, "/scans", &payload).await
    }

    // --- report export ---

    /// Exports a scan as PDF. Initiates the export, polls the appliance
    /// until the file is ready, then downloads it.
    pub async fn export_report(&self, token: &str, scan_id: i64) -> Result<Vec<u8>, DeskError> {
        let body = json!({
            "format": "pdf",
            "template_id": self.templates.report_template_id,
            "chapters": "vuln_hosts_summary",
        });
        let initiated = self
            .post_json(token, &format!("/scans/{}/export", scan_id), &body)
            .await?;
        let file_id = initiated
            .get("file")
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                DeskError::Scanner("Scanner did not return an export file id".to_string())
            })?;

        let status_path = format!("/scans/{}/export/{}/status", scan_id, file_id);
        let mut ready = false;
        for attempt in 0..EXPORT_POLL_ATTEMPTS {
            let status = self.get(token, &status_path, &[]).await?;
            match status.get("status").and_then(Value::as_str) {
                Some("ready") => {
                    ready = true;
                    break;
                }
                Some("error") => {
                    return Err(DeskError::Scanner(
                        "Report generation failed on the scanner".to_string(),
                    ));
                }
                other => {
                    debug!(scan_id, attempt, status = ?other, "Report not ready yet");
                    tokio::time::sleep(EXPORT_POLL_INTERVAL).await;
                }
            }
        }
        if !ready {
            return Err(DeskError::ScannerTimeout(
                "Timed out waiting for report generation".to_string(),
            ));
        }

        let resp = self
            .http
            .get(self.endpoint(&format!("/scans/{}/export/{}/download", scan_id, file_id)))
            .header("X-Cookie", format!("token={}", token))
            .send()
            .await
            .map_err(|e| Self::transport_err("Report download", e))?;
        let resp = Self::check(resp).await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| DeskError::Network(format!("Failed to read report body: {}", e)))?;
        Ok(bytes.to_vec())
    }
}

fn group_ids(session: &Value) -> Vec<i64> {
    session
        .get("groups")
        .and_then(Value::as_array)
        .map(|groups| {
            groups
                .iter()
                .filter_map(|g| g.get("id").and_then(Value::as_i64))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn test_client(url: &str) -> ScannerClient {
        let config = ScannerConfig {
            url: url.to_string(),
            ..ScannerConfig::default()
        };
        ScannerClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_login_returns_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/session")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"token": "abc123"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let token = client.login("alice", "secret").await.unwrap();

        mock.assert_async().await;
        assert_eq!(token, "abc123");
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/session")
            .with_status(401)
            .with_body(r#"{"error": "Invalid credentials"}"#)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let err = client.login("alice", "wrong").await.unwrap_err();
        assert!(matches!(err, DeskError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_is_admin_checks_group_membership() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/session")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"username": "alice", "groups": [{"id": 2}, {"id": 4}]}"#)
            .create_async()
            .await;

        let client = test_client(&server.url());
        assert!(client.is_admin("tok").await.unwrap());
    }

    #[tokio::test]
    async fn test_is_admin_false_without_group() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/session")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"username": "bob", "groups": [{"id": 7}]}"#)
            .create_async()
            .await;

        let client = test_client(&server.url());
        assert!(!client.is_admin("tok").await.unwrap());
    }

    #[tokio::test]
    async fn test_my_scans_folder_not_found() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/folders")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"folders": [{"id": 9, "name": "Trash"}]}"#)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let err = client.my_scans_folder("tok").await.unwrap_err();
        assert!(matches!(err, DeskError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_external_folder_accepts_both_names() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/folders")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"folders": [{"id": 3, "name": "External Scans"}]}"#)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let folder = client.external_folder("tok").await.unwrap().unwrap();
        assert_eq!(folder["id"], 3);
    }

    #[tokio::test]
    async fn test_ensure_agent_group_reuses_existing() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/agent-groups")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"groups": [{"id": 11, "name": "WEB01"}]}"#)
            .create_async()
            .await;
        let create = server
            .mock("POST", "/agent-groups")
            .expect(0)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let group = client.ensure_agent_group("tok", "web01").await.unwrap();

        create.assert_async().await;
        assert_eq!(group["id"], 11);
    }

    #[tokio::test]
    async fn test_find_scan_by_name_substring() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/scans")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"scans": [{"id": 5, "name": "Weekly WEB01 audit"}, {"id": 6, "name": "db02"}]}"#)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let scan = client
            .find_scan_by_name("tok", None, "web01")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(scan["id"], 5);
    }

    #[tokio::test]
    async fn test_find_scan_exact_ignores_substrings() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/scans")
            .match_query(mockito::Matcher::UrlEncoded(
                "folder_id".into(),
                "3".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"scans": [{"id": 5, "name": "web01-extended"}, {"id": 6, "name": "WEB01"}]}"#)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let scan = client
            .find_scan_exact("tok", 3, "web01")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(scan["id"], 6);
    }

    #[tokio::test]
    async fn test_list_scans_handles_null_scans() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/scans")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"scans": null}"#)
            .create_async()
            .await;

        let client = test_client(&server.url());
        assert!(client.list_scans("tok", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_host_details_passes_history_id() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/scans/5/hosts/2")
            .match_query(mockito::Matcher::UrlEncoded(
                "history_id".into(),
                "318".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"info": {"operating-system": "Linux"}, "vulnerabilities": []}"#)
            .expect(1)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let details = client.host_details("tok", 5, 2, Some(318)).await.unwrap();

        mock.assert_async().await;
        assert_eq!(details["info"]["operating-system"], "Linux");
    }

    #[tokio::test]
    async fn test_export_report_ready_immediately() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/scans/7/export")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"file": 42}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/scans/7/export/42/status")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status": "ready"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/scans/7/export/42/download")
            .with_status(200)
            .with_header("content-type", "application/pdf")
            .with_body("%PDF-1.4 fake")
            .create_async()
            .await;

        let client = test_client(&server.url());
        let bytes = client.export_report("tok", 7).await.unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_export_report_generation_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/scans/7/export")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"file": 42}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/scans/7/export/42/status")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status": "error"}"#)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let err = client.export_report("tok", 7).await.unwrap_err();
        assert!(matches!(err, DeskError::Scanner(_)));
    }

    #[tokio::test]
    async fn test_export_report_missing_file_id() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/scans/7/export")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{}"#)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let err = client.export_report("tok", 7).await.unwrap_err();
        assert!(matches!(err, DeskError::Scanner(_)));
    }

    #[tokio::test]
    async fn test_scanner_error_carries_status() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/scans/99")
            .with_status(500)
            .with_body("internal appliance error")
            .create_async()
            .await;

        let client = test_client(&server.url());
        let err = client.scan_details("tok", 99).await.unwrap_err();
        match err {
            DeskError::Scanner(msg) => assert!(msg.contains("500")),
            other => panic!("expected scanner error, got {:?}", other),
        }
    }
}
