// ── Domain model ──
//
// State of one orchestration run. Stages mutate these through validated
// transitions; the report layer only ever reads them.

pub mod deployment;
pub mod device;
pub mod ha;
pub mod object;
pub mod run;

pub use deployment::{DeployStatus, DeploymentJob, DeviceDeployResult, JobStatus};
pub use device::{Device, DeviceRole, Failure, FailureKind, RegistrationStatus};
pub use ha::{HaPair, PairingStatus};
pub use object::{ObjectKind, ObjectReport, ObjectSpec, Outcome, Reference};
pub use run::{DeviceHealth, HealthSnapshot, OutcomeCounts, RunResult, SessionOutcome, Stage};
