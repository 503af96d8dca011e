// ── Runtime run configuration ──
//
// Everything a run needs besides the rendered templates. Built once by the
// CLI (through fwpair-config), then shared read-only by every stage. Core
// never reads config files.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::poll::PollPolicy;

/// Access policy assigned to devices at registration unless configured.
pub const DEFAULT_ACCESS_POLICY: &str = "Initial_policy";

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification. Management centers ship self-signed certificates.
    #[default]
    DangerAcceptInvalid,
}

impl From<&TlsVerification> for fwpair_api::TlsMode {
    fn from(tls: &TlsVerification) -> Self {
        match tls {
            TlsVerification::SystemDefaults => Self::System,
            TlsVerification::CustomCa(path) => Self::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => Self::DangerAcceptInvalid,
        }
    }
}

/// Immutable configuration of one orchestration run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Controller URL (e.g., `https://fmc.example.net`).
    pub url: Url,
    pub username: String,
    pub password: SecretString,
    /// Write-only; injected into registration requests, never logged.
    pub registration_key: SecretString,
    pub tls: TlsVerification,
    /// Per-request timeout.
    pub timeout: Duration,

    /// Access policy assigned at registration.
    pub access_policy: String,
    /// Name of the HA pair on the controller.
    pub ha_name: String,
    /// Physical interface carrying LAN and stateful failover.
    pub ha_interface: String,
    pub deployment_note: String,

    pub registration_poll: PollPolicy,
    pub pairing_poll: PollPolicy,
    pub deployment_poll: PollPolicy,
}

impl RunConfig {
    /// Config with default policies and names; callers override fields.
    pub fn new(
        url: Url,
        username: impl Into<String>,
        password: SecretString,
        registration_key: SecretString,
        ha_name: impl Into<String>,
        ha_interface: impl Into<String>,
    ) -> Self {
        Self {
            url,
            username: username.into(),
            password,
            registration_key,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            access_policy: DEFAULT_ACCESS_POLICY.into(),
            ha_name: ha_name.into(),
            ha_interface: ha_interface.into(),
            deployment_note: "Deployed by fwpair".into(),
            registration_poll: PollPolicy::registration(),
            pairing_poll: PollPolicy::pairing(),
            deployment_poll: PollPolicy::deployment(),
        }
    }

    pub fn transport(&self) -> fwpair_api::TransportConfig {
        fwpair_api::TransportConfig {
            tls: (&self.tls).into(),
            timeout: self.timeout,
        }
    }
}
