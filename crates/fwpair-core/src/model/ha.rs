// ── HA pair domain type ──

use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::info;

use super::device::Failure;
use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PairingStatus {
    NotStarted,
    InProgress,
    Active,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HaPair {
    pub name: String,
    pub primary_uuid: Option<String>,
    pub secondary_uuid: Option<String>,
    pub ha_interface_name: String,
    pub status: PairingStatus,
    pub remote_uuid: Option<String>,
    /// Last `currentStatus` the controller reported for each side.
    pub primary_state: Option<String>,
    pub secondary_state: Option<String>,
    pub failure: Option<Failure>,
}

impl HaPair {
    pub fn new(name: impl Into<String>, ha_interface_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_uuid: None,
            secondary_uuid: None,
            ha_interface_name: ha_interface_name.into(),
            status: PairingStatus::NotStarted,
            remote_uuid: None,
            primary_state: None,
            secondary_state: None,
            failure: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == PairingStatus::Active
    }

    fn transition(&mut self, next: PairingStatus) -> Result<(), CoreError> {
        use PairingStatus::{Active, Failed, InProgress, NotStarted};
        if !matches!(
            (self.status, next),
            (NotStarted, InProgress) | (InProgress, Active | Failed)
        ) {
            return Err(CoreError::Internal(format!(
                "HA pair {}: invalid transition {} -> {next}",
                self.name, self.status
            )));
        }
        info!(pair = %self.name, from = %self.status, to = %next, "HA pair state");
        self.status = next;
        Ok(())
    }

    /// Both members are known; pairing is underway on the controller.
    pub fn begin(&mut self, primary_uuid: String, secondary_uuid: String) -> Result<(), CoreError> {
        self.transition(PairingStatus::InProgress)?;
        self.primary_uuid = Some(primary_uuid);
        self.secondary_uuid = Some(secondary_uuid);
        Ok(())
    }

    pub fn mark_active(&mut self) -> Result<(), CoreError> {
        self.transition(PairingStatus::Active)
    }

    pub fn mark_failed(&mut self, failure: Failure) -> Result<(), CoreError> {
        self.transition(PairingStatus::Failed)?;
        self.failure = Some(failure);
        Ok(())
    }

    /// Fail before any pairing request was sent.
    pub fn fail_precondition(&mut self, failure: Failure) -> Result<(), CoreError> {
        if self.status != PairingStatus::NotStarted {
            return Err(CoreError::Internal(format!(
                "HA pair {}: precondition failure after pairing started",
                self.name
            )));
        }
        info!(pair = %self.name, from = %self.status, to = %PairingStatus::Failed, "HA pair state");
        self.status = PairingStatus::Failed;
        self.failure = Some(failure);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::device::FailureKind;

    #[test]
    fn pair_cannot_become_active_without_starting() {
        let mut pair = HaPair::new("fw-01_HA", "GigabitEthernet0/2");
        assert!(pair.mark_active().is_err());
        assert_eq!(pair.status, PairingStatus::NotStarted);
    }

    #[test]
    fn precondition_failure_only_before_start() {
        let mut pair = HaPair::new("fw-01_HA", "GigabitEthernet0/2");
        pair.begin("p".into(), "s".into()).expect("start");
        assert!(
            pair.fail_precondition(Failure::new(FailureKind::Precondition, "x"))
                .is_err()
        );

        let mut fresh = HaPair::new("fw-01_HA", "GigabitEthernet0/2");
        fresh
            .fail_precondition(Failure::new(FailureKind::Precondition, "interface missing"))
            .expect("not_started -> failed");
        assert_eq!(fresh.status, PairingStatus::Failed);
    }
}
