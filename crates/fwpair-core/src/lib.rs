//! Deployment orchestration for a pair of firewalls behind a management
//! controller.
//!
//! A run walks one pipeline against a single authenticated session:
//!
//! - **Registration** ([`registration`]): submit both devices and wait until
//!   the controller reports them healthy with their initial policy deployed.
//! - **Pairing** ([`pairing`]): join the devices into a failover pair over
//!   the configured interface and wait for active/standby.
//! - **Reconciliation** ([`reconcile`]): bring every configuration object of
//!   the rendered plan to its desired state. One generic routine handles all
//!   kinds; kind-specific facts live in a table.
//! - **Deployment** ([`deploy`]): push pending changes to the pair and track
//!   the job until every target reaches a terminal state.
//!
//! [`Orchestrator`] ties the stages together and always produces a
//! [`RunResult`]. Request bodies come from [`template`] documents rendered
//! with run parameters before anything talks to the controller.

pub mod config;
pub mod deploy;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod pairing;
pub mod poll;
pub mod reconcile;
pub mod registration;
pub mod template;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{DEFAULT_ACCESS_POLICY, RunConfig, TlsVerification};
pub use error::CoreError;
pub use orchestrator::Orchestrator;
pub use poll::PollPolicy;
pub use reconcile::ScopeIds;
pub use template::{Parameters, RenderedTemplates, TemplateSet};

pub use model::{
    DeployStatus, DeploymentJob, Device, DeviceDeployResult, DeviceHealth, DeviceRole, Failure,
    FailureKind, HaPair, HealthSnapshot, JobStatus, ObjectKind, ObjectReport, ObjectSpec, Outcome,
    OutcomeCounts, PairingStatus, Reference, RegistrationStatus, RunResult, SessionOutcome, Stage,
};
