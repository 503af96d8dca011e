// Wire types for the management center config API.
//
// Field names follow the controller's camelCase JSON. Only the fields the
// orchestrator reads are modelled; object payloads stay `serde_json::Value`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Envelopes ────────────────────────────────────────────────────────

/// One page of a collection listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemPage {
    #[serde(default)]
    pub items: Vec<Value>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub offset: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default)]
    pub pages: Option<usize>,
}

/// `{ id, name, type }` reference used throughout the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

// ── Devices ──────────────────────────────────────────────────────────

/// A managed device record (`devices/devicerecords`, expanded).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub host_name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub sw_version: Option<String>,
    /// `green`, `yellow`, `recovered`, `red`, `blue`, ...
    #[serde(default)]
    pub health_status: Option<String>,
    /// `DEPLOYED` or `NOT_DEPLOYED`.
    #[serde(default)]
    pub deployment_status: Option<String>,
}

impl DeviceRecord {
    /// Health states in which a freshly registered device is usable.
    const READY_HEALTH: [&'static str; 3] = ["green", "yellow", "recovered"];

    /// Registered, healthy and holding its initial policy deployment.
    pub fn is_ready(&self) -> bool {
        let healthy = self
            .health_status
            .as_deref()
            .is_some_and(|h| Self::READY_HEALTH.contains(&h.to_ascii_lowercase().as_str()));
        let deployed = self
            .deployment_status
            .as_deref()
            .is_some_and(|d| d.eq_ignore_ascii_case("DEPLOYED"));
        healthy && deployed
    }
}

/// A physical interface of a device.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalInterface {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub if_name: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

// ── HA pairs ─────────────────────────────────────────────────────────

/// An FTD HA pair record (`devicehapairs/ftddevicehapairs`).
#[derive(Debug, Clone, Deserialize)]
pub struct HaPairRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub primary: Option<NamedRef>,
    #[serde(default)]
    pub secondary: Option<NamedRef>,
    #[serde(default)]
    pub metadata: Option<HaMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HaMetadata {
    #[serde(default)]
    pub primary_status: Option<HaMemberStatus>,
    #[serde(default)]
    pub secondary_status: Option<HaMemberStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HaMemberStatus {
    /// `active`, `standby`, `failed`, `disabled`, ...
    #[serde(default)]
    pub current_status: Option<String>,
    #[serde(default)]
    pub device: Option<NamedRef>,
}

impl HaPairRecord {
    pub fn primary_status(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.primary_status.as_ref())
            .and_then(|s| s.current_status.as_deref())
    }

    pub fn secondary_status(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.secondary_status.as_ref())
            .and_then(|s| s.current_status.as_deref())
    }
}

// ── Deployment ───────────────────────────────────────────────────────

/// An entry of `deployment/deployabledevices`.
#[derive(Debug, Clone, Deserialize)]
pub struct DeployableDevice {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub device: Option<NamedRef>,
}

/// Body of `deployment/deploymentrequests`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRequest {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub version: String,
    pub force_deploy: bool,
    pub ignore_warning: bool,
    pub device_list: Vec<String>,
    pub deployment_note: String,
}

impl DeploymentRequest {
    pub fn new(version: String, device_list: Vec<String>, note: impl Into<String>) -> Self {
        Self {
            kind: "DeploymentRequest",
            version,
            force_deploy: false,
            ignore_warning: true,
            device_list,
            deployment_note: note.into(),
        }
    }
}

/// Response of a deployment submission; the task id lives in metadata.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeploymentAccepted {
    #[serde(default)]
    pub metadata: Option<AcceptedMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AcceptedMetadata {
    #[serde(default)]
    pub task: Option<TaskRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskRef {
    #[serde(default)]
    pub id: Option<String>,
}

impl DeploymentAccepted {
    pub fn task_id(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.task.as_ref())
            .and_then(|t| t.id.as_deref())
    }
}

/// An entry of `deployment/jobhistories` (expanded).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobHistory {
    pub id: String,
    #[serde(default)]
    pub job_type: Option<String>,
    #[serde(default)]
    pub device_list: Vec<JobDevice>,
    /// Epoch milliseconds; some controller versions send a string.
    #[serde(default)]
    pub start_time: Option<Value>,
}

impl JobHistory {
    pub fn start_millis(&self) -> Option<i64> {
        match self.start_time.as_ref()? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDevice {
    #[serde(rename = "deviceUUID")]
    pub device_uuid: String,
    #[serde(default)]
    pub device_name: Option<String>,
    /// `SUCCEEDED`, `FAILED`, `DEPLOYING`, ...
    #[serde(default)]
    pub deployment_status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn device_ready_requires_health_and_deployment() {
        let mut record: DeviceRecord = serde_json::from_value(json!({
            "id": "d1",
            "name": "fw-01",
            "healthStatus": "green",
            "deploymentStatus": "NOT_DEPLOYED"
        }))
        .expect("device record");
        assert!(!record.is_ready());

        record.deployment_status = Some("DEPLOYED".into());
        assert!(record.is_ready());

        record.health_status = Some("red".into());
        assert!(!record.is_ready());
    }

    #[test]
    fn ha_pair_status_reads_metadata() {
        let record: HaPairRecord = serde_json::from_value(json!({
            "id": "ha1",
            "name": "fw-01_HA",
            "metadata": {
                "primaryStatus": { "currentStatus": "active" },
                "secondaryStatus": { "currentStatus": "standby" }
            }
        }))
        .expect("ha record");
        assert_eq!(record.primary_status(), Some("active"));
        assert_eq!(record.secondary_status(), Some("standby"));
    }

    #[test]
    fn job_start_time_accepts_number_or_string() {
        let jobs: Vec<JobHistory> = serde_json::from_value(json!([
            { "id": "a", "startTime": 1_700_000_000_000_i64 },
            { "id": "b", "startTime": "1700000000500" },
            { "id": "c" }
        ]))
        .expect("histories");
        assert_eq!(jobs[0].start_millis(), Some(1_700_000_000_000));
        assert_eq!(jobs[1].start_millis(), Some(1_700_000_000_500));
        assert_eq!(jobs[2].start_millis(), None);
    }

    #[test]
    fn deployment_request_uses_wire_names() {
        let req = DeploymentRequest::new("1700".into(), vec!["a".into(), "b".into()], "note");
        let value = serde_json::to_value(&req).expect("serialize");
        assert_eq!(value["type"], "DeploymentRequest");
        assert_eq!(value["deviceList"], json!(["a", "b"]));
        assert_eq!(value["ignoreWarning"], true);
    }
}
