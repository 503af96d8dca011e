// ── Run result ──
//
// Everything a run learned, serializable for `--save` and the report
// command. Secrets and desired payloads are never part of it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use super::deployment::{DeploymentJob, JobStatus};
use super::device::Device;
use super::ha::HaPair;
use super::object::{ObjectReport, Outcome};

/// Pipeline stages in execution order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Auth,
    Register,
    Pair,
    Reconcile,
    Deploy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionOutcome {
    NotAttempted,
    Authenticated { domain_uuid: String },
    Failed { message: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub blocked: usize,
}

impl OutcomeCounts {
    pub fn tally(objects: &[ObjectReport]) -> Self {
        objects.iter().fold(Self::default(), |mut c, o| {
            match o.outcome {
                Outcome::Created => c.created += 1,
                Outcome::Updated => c.updated += 1,
                Outcome::Unchanged => c.unchanged += 1,
                Outcome::Failed { .. } => c.failed += 1,
                Outcome::Blocked { .. } => c.blocked += 1,
            }
            c
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceHealth {
    pub name: String,
    pub remote_uuid: String,
    pub health_status: Option<String>,
    pub deployment_status: Option<String>,
    pub sw_version: Option<String>,
}

/// Controller view of the pair after deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub taken_at: Option<DateTime<Utc>>,
    pub devices: Vec<DeviceHealth>,
    pub ha_primary_status: Option<String>,
    pub ha_secondary_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub controller: String,
    pub session: SessionOutcome,
    pub stages: Vec<Stage>,
    pub devices: Vec<Device>,
    pub ha_pair: HaPair,
    pub objects: Vec<ObjectReport>,
    pub counts: OutcomeCounts,
    pub deployment: Option<DeploymentJob>,
    pub health: Option<HealthSnapshot>,
    /// Stage at which the run halted; `None` when it ran to the end.
    pub stopped_at: Option<Stage>,
    pub halt_reason: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunResult {
    pub fn halted(&self) -> bool {
        self.stopped_at.is_some()
    }

    /// Ran to the end with every object and the deployment in a good state.
    pub fn is_success(&self) -> bool {
        !self.halted()
            && self.counts.failed == 0
            && self.counts.blocked == 0
            && self
                .deployment
                .as_ref()
                .is_none_or(|job| job.status == JobStatus::Succeeded)
    }

    pub(crate) fn halt(&mut self, stage: Stage, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(%stage, %reason, "run halted");
        self.stopped_at = Some(stage);
        self.halt_reason = Some(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::object::ObjectKind;

    #[test]
    fn counts_every_outcome() {
        let report = |outcome| ObjectReport {
            kind: ObjectKind::Network,
            logical_name: "n".into(),
            remote_uuid: None,
            existed_before: false,
            outcome,
        };
        let objects = [
            report(Outcome::Created),
            report(Outcome::Unchanged),
            report(Outcome::Unchanged),
            report(Outcome::Failed {
                reason: "x".into(),
            }),
            report(Outcome::Blocked {
                dependency: "y".into(),
            }),
        ];
        let counts = OutcomeCounts::tally(&objects);
        assert_eq!(counts.created, 1);
        assert_eq!(counts.unchanged, 2);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.blocked, 1);
    }
}
