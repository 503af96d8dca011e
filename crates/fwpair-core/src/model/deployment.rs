// ── Deployment job types ──

use serde::{Deserialize, Serialize};
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Deploying,
    Succeeded,
    Failed,
    /// Some targets succeeded, others failed.
    Partial,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Partial)
    }
}

/// Per-device state inside a deployment job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeployStatus {
    Pending,
    Succeeded,
    Failed,
}

impl DeployStatus {
    /// Map the controller's `deploymentStatus` string.
    pub fn from_remote(raw: Option<&str>) -> Self {
        match raw.map(str::to_ascii_uppercase).as_deref() {
            Some("SUCCEEDED" | "SUCCESS" | "DEPLOYED") => Self::Succeeded,
            Some("FAILED" | "FAILURE" | "ABORTED") => Self::Failed,
            _ => Self::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDeployResult {
    pub device_uuid: String,
    pub device_name: Option<String>,
    pub status: DeployStatus,
    pub message: Option<String>,
}

/// One deployment request and its tracked outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentJob {
    /// Task id returned on submission; `None` when nothing was submitted.
    pub job_id: Option<String>,
    pub target_device_uuids: Vec<String>,
    pub version: Option<String>,
    pub status: JobStatus,
    pub per_device_results: Vec<DeviceDeployResult>,
    pub reason: Option<String>,
}

impl DeploymentJob {
    pub fn new(targets: Vec<String>) -> Self {
        Self {
            job_id: None,
            target_device_uuids: targets,
            version: None,
            status: JobStatus::Queued,
            per_device_results: Vec::new(),
            reason: None,
        }
    }

    /// Terminal job that needed no submission.
    pub fn nothing_to_deploy(targets: Vec<String>) -> Self {
        Self {
            status: JobStatus::Succeeded,
            reason: Some("no pending changes".into()),
            ..Self::new(targets)
        }
    }

    /// Derive the terminal status from per-device results.
    ///
    /// Returns `None` while any target is still pending.
    pub fn aggregate(results: &[DeviceDeployResult]) -> Option<JobStatus> {
        if results.is_empty() || results.iter().any(|r| r.status == DeployStatus::Pending) {
            return None;
        }
        let succeeded = results
            .iter()
            .filter(|r| r.status == DeployStatus::Succeeded)
            .count();
        Some(if succeeded == results.len() {
            JobStatus::Succeeded
        } else if succeeded == 0 {
            JobStatus::Failed
        } else {
            JobStatus::Partial
        })
    }
}
