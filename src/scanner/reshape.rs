//! Reshapes raw appliance JSON into the payloads the dashboard renders.
//!
//! Everything here is a pure function over `serde_json::Value`, so the
//! appliance's loosely typed responses never leak shape assumptions into
//! the route handlers.

use chrono::DateTime;
use serde_json::{json, Value};

pub fn severity_name(severity: i64) -> &'static str {
    match severity {
        4 => "Critical",
        3 => "High",
        2 => "Medium",
        1 => "Low",
        0 => "Info",
        _ => "Unknown",
    }
}

/// Unix seconds to a display timestamp, "N/A" when absent or unparseable.
/// The appliance sends these as either numbers or numeric strings.
pub fn format_timestamp(value: Option<&Value>) -> String {
    let secs = value.and_then(|v| {
        v.as_i64()
            .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
    });
    match secs.and_then(|t| DateTime::from_timestamp(t, 0)) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "N/A".to_string(),
    }
}

/// The appliance reports freshly launched scans as running at zero
/// progress; the dashboard shows those as pending.
pub fn effective_status(info: &Value) -> (String, i64) {
    let status = info
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let progress = info.get("progress").and_then(Value::as_i64).unwrap_or(0);
    if status == "running" && progress == 0 {
        ("pending".to_string(), progress)
    } else {
        (status, progress)
    }
}

/// Poll payload for the scan status route.
pub fn status_report(details: &Value) -> Value {
    let info = details.get("info").cloned().unwrap_or_else(|| json!({}));
    let (status, progress) = effective_status(&info);
    json!({
        "status": status,
        "progress": progress,
        "timestamp": info.get("timestamp").cloned().unwrap_or(Value::Null),
        "raw_status": info,
    })
}

fn count(value: &Value, key: &str) -> i64 {
    value.get(key).and_then(Value::as_i64).unwrap_or(0)
}

fn str_or<'a>(value: &'a Value, key: &str, fallback: &'a str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or(fallback)
}

/// Host row for the external scan listing.
pub fn host_summary(host: &Value) -> Value {
    let hostname = str_or(host, "hostname", "N/A");
    json!({
        "hostname": hostname,
        "ip": str_or(host, "host-ip", hostname),
        "critical": count(host, "critical"),
        "high": count(host, "high"),
        "medium": count(host, "medium"),
        "low": count(host, "low"),
        "info": count(host, "info"),
    })
}

/// Row for the external scan listing, combining the scan list entry with
/// the per-scan detail fetch.
pub fn scan_overview(scan: &Value, details: &Value) -> Value {
    let info = details.get("info").cloned().unwrap_or_else(|| json!({}));
    let hosts: Vec<Value> = details
        .get("hosts")
        .and_then(Value::as_array)
        .map(|hs| hs.iter().map(host_summary).collect())
        .unwrap_or_default();
    json!({
        "id": scan.get("id").cloned().unwrap_or(Value::Null),
        "name": scan.get("name").cloned().unwrap_or(Value::Null),
        "status": str_or(&info, "status", "unknown"),
        "start_time": info.get("scan_start").cloned().unwrap_or(Value::Null),
        "end_time": info.get("scan_end").cloned().unwrap_or(Value::Null),
        "hosts": hosts,
    })
}

/// Skeleton of the vulnerability listing for one scan. Host blocks are
/// appended as their detail fetches complete.
pub fn scan_report_shell(scan: &Value, details: &Value) -> Value {
    let info = details.get("info").cloned().unwrap_or_else(|| json!({}));
    json!({
        "id": scan.get("id").cloned().unwrap_or(Value::Null),
        "name": scan.get("name").cloned().unwrap_or(Value::Null),
        "status": str_or(&info, "status", "unknown"),
        "start_time": format_timestamp(info.get("scan_start")),
        "end_time": format_timestamp(info.get("scan_end")),
        "targets": str_or(&info, "targets", ""),
        "hosts": [],
    })
}

fn vulnerability_row(vuln: &Value) -> Value {
    let severity = vuln.get("severity").and_then(Value::as_i64).unwrap_or(0);
    json!({
        "plugin_id": vuln.get("plugin_id").cloned().unwrap_or(Value::Null),
        "plugin_name": vuln.get("plugin_name").cloned().unwrap_or(Value::Null),
        "severity": severity,
        "severity_name": severity_name(severity),
        "count": vuln.get("count").and_then(Value::as_i64).unwrap_or(1),
    })
}

/// Per-host block for the vulnerability listing, combining the host row
/// from the scan detail with that host's own detail fetch.
pub fn host_report(host: &Value, host_details: &Value) -> Value {
    let info = host_details.get("info").cloned().unwrap_or_else(|| json!({}));
    let hostname = str_or(host, "hostname", "N/A");
    let vulnerabilities: Vec<Value> = host_details
        .get("vulnerabilities")
        .and_then(Value::as_array)
        .map(|vs| vs.iter().map(vulnerability_row).collect())
        .unwrap_or_default();
    json!({
        "id": host.get("host_id").cloned().unwrap_or(Value::Null),
        "hostname": hostname,
        "ip": str_or(host, "host-ip", hostname),
        "os": str_or(&info, "operating-system", "Unknown"),
        "critical": count(host, "critical"),
        "high": count(host, "high"),
        "medium": count(host, "medium"),
        "low": count(host, "low"),
        "info": count(host, "info"),
        "vulnerabilities": vulnerabilities,
    })
}

/// Condenses a full vulnerability listing into the dashboard's summary
/// card: per-host counts plus severity totals across the scan.
pub fn vulnerability_summary(report: &Value) -> Value {
    let hosts = report
        .get("hosts")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let total = |key: &str| hosts.iter().map(|h| count(h, key)).sum::<i64>();
    let host_rows: Vec<Value> = hosts
        .iter()
        .map(|h| {
            json!({
                "hostname": str_or(h, "hostname", "N/A"),
                "ip": str_or(h, "ip", "N/A"),
                "critical": count(h, "critical"),
                "high": count(h, "high"),
                "medium": count(h, "medium"),
                "low": count(h, "low"),
                "info": count(h, "info"),
            })
        })
        .collect();
    json!({
        "scan_id": report.get("id").cloned().unwrap_or(Value::Null),
        "name": report.get("name").cloned().unwrap_or(Value::Null),
        "status": report.get("status").cloned().unwrap_or(Value::Null),
        "start_time": report.get("start_time").cloned().unwrap_or(Value::Null),
        "end_time": report.get("end_time").cloned().unwrap_or(Value::Null),
        "host_count": hosts.len(),
        "severity_counts": {
            "critical": total("critical"),
            "high": total("high"),
            "medium": total("medium"),
            "low": total("low"),
            "info": total("info"),
        },
        "hosts": host_rows,
    })
}

fn nested(value: &Value, outer: &str, inner: &str) -> Value {
    value
        .get(outer)
        .and_then(|v| v.get(inner))
        .cloned()
        .unwrap_or(Value::Null)
}

/// Flattens the appliance's deeply nested plugin detail response into a
/// single-level record. Returns `None` when the response carries no
/// plugin info at all.
pub fn plugin_report(plugin_data: &Value) -> Option<Value> {
    let info = plugin_data.get("info")?;
    let description = info
        .get("plugindescription")
        .cloned()
        .unwrap_or_else(|| json!({}));
    let attributes = description
        .get("pluginattributes")
        .cloned()
        .unwrap_or_else(|| json!({}));
    let outputs: Vec<Value> = plugin_data
        .get("output")
        .and_then(Value::as_array)
        .map(|os| {
            os.iter()
                .filter_map(|o| match o {
                    Value::String(_) => Some(o.clone()),
                    Value::Object(map) => map.get("plugin_output").cloned(),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    Some(json!({
        "plugin_id": description.get("pluginid").cloned().unwrap_or(Value::Null),
        "name": description.get("pluginname").cloned().unwrap_or(Value::Null),
        "family": description.get("pluginfamily").cloned().unwrap_or(Value::Null),
        "severity": description.get("severity").cloned().unwrap_or(Value::Null),
        "risk_factor": nested(&attributes, "risk_information", "risk_factor"),
        "plugin_type": nested(&attributes, "plugin_information", "plugin_type"),
        "plugin_modification_date": nested(&attributes, "plugin_information", "plugin_modification_date"),
        "synopsis": attributes.get("synopsis").cloned().unwrap_or(Value::Null),
        "description": attributes.get("description").cloned().unwrap_or(Value::Null),
        "solution": attributes.get("solution").cloned().unwrap_or(Value::Null),
        "see_also": attributes.get("see_also").cloned().unwrap_or(Value::Null),
        "cve": attributes.get("cve").cloned().unwrap_or(Value::Null),
        "cvss_base_score": attributes.get("cvss_base_score").cloned().unwrap_or(Value::Null),
        "cvss3_base_score": attributes.get("cvss3_base_score").cloned().unwrap_or(Value::Null),
        "outputs": outputs,
    }))
}

/// Attachment filename for downloaded reports.
pub fn report_filename(prefix: &str, server_name: &str) -> String {
    format!(
        "{}_{}_{}.pdf",
        prefix,
        server_name,
        chrono::Utc::now().format("%Y%m%d_%H%M%S")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_name_mapping() {
        assert_eq!(severity_name(4), "Critical");
        assert_eq!(severity_name(3), "High");
        assert_eq!(severity_name(2), "Medium");
        assert_eq!(severity_name(1), "Low");
        assert_eq!(severity_name(0), "Info");
        assert_eq!(severity_name(9), "Unknown");
        assert_eq!(severity_name(-1), "Unknown");
    }

    #[test]
    fn test_format_timestamp_variants() {
        assert_eq!(
            format_timestamp(Some(&json!(1609459200))),
            "2021-01-01 00:00:00"
        );
        assert_eq!(
            format_timestamp(Some(&json!("1609459200"))),
            "2021-01-01 00:00:00"
        );
        assert_eq!(format_timestamp(Some(&json!("soon"))), "N/A");
        assert_eq!(format_timestamp(None), "N/A");
        assert_eq!(format_timestamp(Some(&Value::Null)), "N/A");
    }

    #[test]
    fn test_effective_status_pending_rule() {
        let launched = json!({"status": "running", "progress": 0});
        assert_eq!(effective_status(&launched).0, "pending");

        let underway = json!({"status": "running", "progress": 40});
        assert_eq!(effective_status(&underway), ("running".to_string(), 40));

        let done = json!({"status": "completed", "progress": 100});
        assert_eq!(effective_status(&done).0, "completed");
    }

    #[test]
    fn test_status_report_shape() {
        let details = json!({
            "info": {"status": "running", "progress": 0, "timestamp": 1700000000}
        });
        let report = status_report(&details);
        assert_eq!(report["status"], "pending");
        assert_eq!(report["progress"], 0);
        assert_eq!(report["timestamp"], 1700000000);
        assert_eq!(report["raw_status"]["status"], "running");
    }

    #[test]
    fn test_status_report_missing_info() {
        let report = status_report(&json!({}));
        assert_eq!(report["status"], "unknown");
        assert_eq!(report["progress"], 0);
        assert!(report["timestamp"].is_null());
    }

    #[test]
    fn test_host_summary_defaults() {
        let row = host_summary(&json!({}));
        assert_eq!(row["hostname"], "N/A");
        assert_eq!(row["ip"], "N/A");
        assert_eq!(row["critical"], 0);
    }

    #[test]
    fn test_host_summary_ip_falls_back_to_hostname() {
        let row = host_summary(&json!({"hostname": "web01", "critical": 2}));
        assert_eq!(row["ip"], "web01");
        assert_eq!(row["critical"], 2);
    }

    #[test]
    fn test_scan_overview_combines_sources() {
        let scan = json!({"id": 12, "name": "web01"});
        let details = json!({
            "info": {"status": "completed", "scan_start": 100, "scan_end": 200},
            "hosts": [{"hostname": "web01", "high": 3}]
        });
        let row = scan_overview(&scan, &details);
        assert_eq!(row["id"], 12);
        assert_eq!(row["status"], "completed");
        assert_eq!(row["start_time"], 100);
        assert_eq!(row["hosts"][0]["high"], 3);
    }

    #[test]
    fn test_host_report_merges_detail() {
        let host = json!({
            "host_id": 2,
            "hostname": "web01",
            "host-ip": "10.0.0.5",
            "critical": 1,
            "info": 5
        });
        let details = json!({
            "info": {"operating-system": "Linux"},
            "vulnerabilities": [
                {"plugin_id": 1234, "plugin_name": "Old TLS", "severity": 3, "count": 2},
                {"plugin_id": 99}
            ]
        });
        let block = host_report(&host, &details);
        assert_eq!(block["id"], 2);
        assert_eq!(block["ip"], "10.0.0.5");
        assert_eq!(block["os"], "Linux");
        assert_eq!(block["critical"], 1);
        assert_eq!(block["vulnerabilities"][0]["severity_name"], "High");
        assert_eq!(block["vulnerabilities"][1]["severity"], 0);
        assert_eq!(block["vulnerabilities"][1]["count"], 1);
    }

    #[test]
    fn test_vulnerability_summary_totals() {
        let report = json!({
            "id": 12,
            "name": "web01",
            "status": "completed",
            "start_time": "2024-01-01 00:00:00",
            "end_time": "2024-01-01 01:00:00",
            "hosts": [
                {"hostname": "a", "ip": "10.0.0.1", "critical": 1, "high": 2, "medium": 0, "low": 0, "info": 4},
                {"hostname": "b", "ip": "10.0.0.2", "critical": 0, "high": 1, "medium": 3, "low": 1, "info": 0}
            ]
        });
        let summary = vulnerability_summary(&report);
        assert_eq!(summary["scan_id"], 12);
        assert_eq!(summary["host_count"], 2);
        assert_eq!(summary["severity_counts"]["critical"], 1);
        assert_eq!(summary["severity_counts"]["high"], 3);
        assert_eq!(summary["severity_counts"]["medium"], 3);
        assert_eq!(summary["hosts"][1]["ip"], "10.0.0.2");
    }

    #[test]
    fn test_plugin_report_missing_info() {
        assert!(plugin_report(&json!({})).is_none());
        assert!(plugin_report(&json!({"output": []})).is_none());
    }

    #[test]
    fn test_plugin_report_flattens() {
        let data = json!({
            "info": {
                "plugindescription": {
                    "pluginid": 51192,
                    "pluginname": "SSL Certificate Cannot Be Trusted",
                    "pluginfamily": "General",
                    "severity": 2,
                    "pluginattributes": {
                        "synopsis": "The SSL certificate for this service cannot be trusted.",
                        "solution": "Purchase or generate a proper certificate.",
                        "risk_information": {"risk_factor": "Medium"},
                        "plugin_information": {
                            "plugin_type": "remote",
                            "plugin_modification_date": "2024/06/10"
                        },
                        "cvss_base_score": "6.4"
                    }
                }
            },
            "output": [
                {"plugin_output": "The following certificate was at the top of the chain"},
                "bare output",
                {"ports": {"443 / tcp / www": []}}
            ]
        });
        let report = plugin_report(&data).unwrap();
        assert_eq!(report["plugin_id"], 51192);
        assert_eq!(report["family"], "General");
        assert_eq!(report["risk_factor"], "Medium");
        assert_eq!(report["plugin_type"], "remote");
        assert_eq!(report["cvss_base_score"], "6.4");
        assert!(report["cve"].is_null());
        assert_eq!(
            report["outputs"][0],
            "The following certificate was at the top of the chain"
        );
        assert_eq!(report["outputs"][1], "bare output");
        assert_eq!(report["outputs"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_report_filename_shape() {
        let name = report_filename("scan_report", "web01");
        assert!(name.starts_with("scan_report_web01_"));
        assert!(name.ends_with(".pdf"));
    }
}
