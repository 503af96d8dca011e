// ── Device domain types ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::info;

use crate::error::CoreError;

/// Position of a device in the HA pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeviceRole {
    Primary,
    Secondary,
}

/// Registration lifecycle of a device on the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RegistrationStatus {
    Pending,
    Registering,
    Registered,
    Failed,
}

impl RegistrationStatus {
    fn can_become(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Registering)
                | (Self::Registering, Self::Registered | Self::Failed)
        )
    }
}

/// Why a device, pair or deployment ended in `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    /// The controller refused the request.
    Rejected,
    /// The wait budget ran out.
    Timeout,
    /// The entity appeared and then vanished from the controller.
    Disappeared,
    /// The controller reported the entity as failed.
    Reported,
    /// A precondition did not hold, no request was sent.
    Precondition,
    /// A call failed while tracking the entity.
    Api,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// One firewall of the pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub role: DeviceRole,
    /// Display name on the controller; also the lookup key.
    pub hostname: String,
    pub management_ip: String,
    pub status: RegistrationStatus,
    /// Set only from a controller response once registered.
    pub remote_uuid: Option<String>,
    pub failure: Option<Failure>,
}

impl Device {
    pub fn new(role: DeviceRole, hostname: impl Into<String>, management_ip: impl Into<String>) -> Self {
        Self {
            role,
            hostname: hostname.into(),
            management_ip: management_ip.into(),
            status: RegistrationStatus::Pending,
            remote_uuid: None,
            failure: None,
        }
    }

    pub fn is_registered(&self) -> bool {
        self.status == RegistrationStatus::Registered
    }

    pub fn is_registering(&self) -> bool {
        self.status == RegistrationStatus::Registering
    }

    fn transition(&mut self, next: RegistrationStatus) -> Result<(), CoreError> {
        if !self.status.can_become(next) {
            return Err(CoreError::Internal(format!(
                "device {}: invalid transition {} -> {next}",
                self.hostname, self.status
            )));
        }
        info!(device = %self.hostname, from = %self.status, to = %next, "device state");
        self.status = next;
        Ok(())
    }

    pub fn begin_registration(&mut self) -> Result<(), CoreError> {
        self.transition(RegistrationStatus::Registering)
    }

    pub fn mark_registered(&mut self, remote_uuid: String) -> Result<(), CoreError> {
        self.transition(RegistrationStatus::Registered)?;
        self.remote_uuid = Some(remote_uuid);
        Ok(())
    }

    pub fn mark_failed(&mut self, failure: Failure) -> Result<(), CoreError> {
        self.transition(RegistrationStatus::Failed)?;
        self.failure = Some(failure);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> Device {
        Device::new(DeviceRole::Primary, "fw-01", "192.0.2.11")
    }

    #[test]
    fn registration_happy_path() {
        let mut d = device();
        d.begin_registration().expect("pending -> registering");
        d.mark_registered("uuid-1".into()).expect("registering -> registered");
        assert!(d.is_registered());
        assert_eq!(d.remote_uuid.as_deref(), Some("uuid-1"));
    }

    #[test]
    fn pending_cannot_skip_to_registered() {
        let mut d = device();
        assert!(d.mark_registered("uuid-1".into()).is_err());
        assert_eq!(d.status, RegistrationStatus::Pending);
        assert!(d.remote_uuid.is_none());
    }

    #[test]
    fn registered_is_terminal() {
        let mut d = device();
        d.begin_registration().expect("registering");
        d.mark_registered("uuid-1".into()).expect("registered");
        assert!(
            d.mark_failed(Failure::new(FailureKind::Timeout, "late"))
                .is_err()
        );
    }
}
