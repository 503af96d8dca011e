//! Shared configuration for fwpair.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! template parameter intake, and translation to `fwpair_core::RunConfig`.
//! The CLI adds flag-aware wrappers on top.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use fwpair_core::{DEFAULT_ACCESS_POLICY, Parameters, PollPolicy, RunConfig, TlsVerification};

/// Service name for keyring entries.
pub const KEYRING_SERVICE: &str = "fwpair";

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "FWPAIR_CONFIG";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no {secret} configured for profile '{profile}'")]
    NoCredentials { profile: String, secret: String },

    #[error("profile '{name}' not found (available: {available})")]
    ProfileNotFound { name: String, available: String },

    #[error("keyring error: {0}")]
    Keyring(String),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named controller profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile, listing the known ones on failure.
    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::ProfileNotFound {
                name: name.into(),
                available: self.profile_names(),
            })
    }

    pub fn profile_names(&self) -> String {
        if self.profiles.is_empty() {
            "(none)".into()
        } else {
            self.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Directory for the rolling log file; platform data dir when unset.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            log_dir: None,
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}

/// A named controller profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Controller base URL (e.g., "https://fmc.example.net").
    pub controller: String,

    pub username: Option<String>,

    /// Controller password (plaintext, prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name holding the password.
    pub password_env: Option<String>,

    /// Device registration key (plaintext, prefer keyring or env var).
    pub registration_key: Option<String>,

    pub registration_key_env: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// `true` skips verification, `false` enforces the system store.
    pub insecure: Option<bool>,

    /// Per-request timeout in seconds.
    pub timeout: Option<u64>,

    /// Access policy assigned at registration.
    pub access_policy: Option<String>,

    /// HA pair name; falls back to the `HA_NAME` parameter.
    pub ha_name: Option<String>,

    /// Failover interface; falls back to the `HA_INTERFACE` parameter.
    pub ha_interface: Option<String>,

    pub deployment_note: Option<String>,

    /// Directory of template overrides.
    pub templates: Option<PathBuf>,

    #[serde(default)]
    pub poll: PollSettings,

    /// Template parameters.
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,

    pub email: Option<EmailSettings>,
}

/// Per-stage overrides of the built-in poll policies.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PollSettings {
    pub registration: Option<PollOverride>,
    pub pairing: Option<PollOverride>,
    pub deployment: Option<PollOverride>,
}

/// Poll timings in seconds; unset fields keep the stage default.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
pub struct PollOverride {
    pub interval: Option<u64>,
    pub max_wait: Option<u64>,
    pub backoff: Option<f64>,
    pub max_interval: Option<u64>,
}

impl PollOverride {
    fn apply(self, stage: &str, mut policy: PollPolicy) -> Result<PollPolicy, ConfigError> {
        let invalid = |key: &str, reason: &str| ConfigError::Validation {
            field: format!("poll.{stage}.{key}"),
            reason: reason.into(),
        };
        let secs = |key: &str, value: u64| {
            if value == 0 {
                Err(invalid(key, "must be at least one second"))
            } else {
                Ok(Duration::from_secs(value))
            }
        };

        if let Some(s) = self.interval {
            policy.interval = secs("interval", s)?;
            policy.max_interval = policy.max_interval.max(policy.interval);
        }
        if let Some(s) = self.max_wait {
            policy.max_wait = secs("max_wait", s)?;
        }
        if let Some(b) = self.backoff {
            if !b.is_finite() || b < 1.0 {
                return Err(invalid("backoff", "must be a finite number >= 1.0"));
            }
            policy.backoff = b;
        }
        if let Some(s) = self.max_interval {
            policy.max_interval = secs("max_interval", s)?;
        }
        Ok(policy)
    }
}

fn poll_policy(
    stage: &str,
    default: PollPolicy,
    o: Option<&PollOverride>,
) -> Result<PollPolicy, ConfigError> {
    o.map_or(Ok(default), |o| o.apply(stage, default))
}

/// SMTP delivery of run reports.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmailSettings {
    pub smtp_host: String,
    /// STARTTLS submission port when unset.
    pub smtp_port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub password_env: Option<String>,
    pub from: String,
    #[serde(default)]
    pub to: Vec<String>,
    pub subject: Option<String>,
}

impl EmailSettings {
    pub fn smtp_password(&self, profile_name: &str) -> Result<SecretString, ConfigError> {
        resolve_secret(
            SecretKind::SmtpPassword,
            profile_name,
            self.password_env.as_deref(),
            self.password.as_deref(),
        )
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path: `FWPAIR_CONFIG`, then platform conventions.
pub fn config_path() -> PathBuf {
    if let Ok(p) = std::env::var(CONFIG_ENV) {
        return PathBuf::from(p);
    }
    ProjectDirs::from("net", "fwpair", "fwpair").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("fwpair");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default directory for log files.
pub fn log_dir(defaults: &Defaults) -> PathBuf {
    defaults.log_dir.clone().unwrap_or_else(|| {
        ProjectDirs::from("net", "fwpair", "fwpair")
            .map_or_else(|| PathBuf::from("."), |dirs| dirs.data_local_dir().join("logs"))
    })
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(
            Env::prefixed("FWPAIR_")
                .ignore(&["config", "password", "registration_key", "smtp_password", "username"])
                .split("__"),
        );

    let config: Config = figment.extract()?;
    debug!(path = %path.display(), profiles = config.profiles.len(), "config loaded");
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, toml::to_string_pretty(cfg)?)?;
    Ok(())
}

// ── Secret resolution ───────────────────────────────────────────────

/// Write-only secrets a run may need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    Password,
    RegistrationKey,
    SmtpPassword,
}

impl SecretKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Password => "controller password",
            Self::RegistrationKey => "registration key",
            Self::SmtpPassword => "SMTP password",
        }
    }

    /// Environment variable consulted when the profile names none.
    pub fn default_env(self) -> &'static str {
        match self {
            Self::Password => "FWPAIR_PASSWORD",
            Self::RegistrationKey => "FWPAIR_REGISTRATION_KEY",
            Self::SmtpPassword => "FWPAIR_SMTP_PASSWORD",
        }
    }

    pub fn keyring_key(self, profile_name: &str) -> String {
        let suffix = match self {
            Self::Password => "password",
            Self::RegistrationKey => "registration-key",
            Self::SmtpPassword => "smtp-password",
        };
        format!("{profile_name}/{suffix}")
    }
}

/// Resolve a secret: env var → system keyring → plaintext in config.
pub fn resolve_secret(
    kind: SecretKind,
    profile_name: &str,
    env_name: Option<&str>,
    plaintext: Option<&str>,
) -> Result<SecretString, ConfigError> {
    // 1. Named env var, then the default one
    for var in env_name.into_iter().chain([kind.default_env()]) {
        if let Ok(val) = std::env::var(var) {
            debug!(secret = kind.label(), source = "env", "secret resolved");
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &kind.keyring_key(profile_name)) {
        if let Ok(secret) = entry.get_password() {
            debug!(secret = kind.label(), source = "keyring", "secret resolved");
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(value) = plaintext {
        return Ok(SecretString::from(value.to_owned()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
        secret: kind.label().into(),
    })
}

/// Store a secret in the system keyring.
pub fn store_secret(
    kind: SecretKind,
    profile_name: &str,
    secret: &SecretString,
) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &kind.keyring_key(profile_name))
        .and_then(|entry| entry.set_password(secret.expose_secret()))
        .map_err(|e| ConfigError::Keyring(e.to_string()))
}

// ── Parameters ──────────────────────────────────────────────────────

/// Gather template parameters.
///
/// Precedence: `overrides` (command line) → process environment (only for
/// `required` keys) → the profile's `[parameters]` table. `HA_NAME`
/// defaults to `{FW_HOSTNAME_01}_HA`.
pub fn resolve_parameters(
    profile: Option<&Profile>,
    overrides: &[(String, String)],
    required: &BTreeSet<String>,
) -> Parameters {
    resolve_parameters_with(profile, overrides, required, |k| std::env::var(k).ok())
}

pub fn resolve_parameters_with(
    profile: Option<&Profile>,
    overrides: &[(String, String)],
    required: &BTreeSet<String>,
    env: impl Fn(&str) -> Option<String>,
) -> Parameters {
    let mut params = Parameters::new();
    if let Some(p) = profile {
        for (k, v) in &p.parameters {
            params.insert(k.clone(), v.clone());
        }
    }
    for key in required {
        if let Some(v) = env(key) {
            params.insert(key.clone(), v);
        }
    }
    for (k, v) in overrides {
        params.insert(k.clone(), v.clone());
    }

    if !params.contains("HA_NAME") {
        if let Some(host) = params.get("FW_HOSTNAME_01").map(str::to_owned) {
            params.insert("HA_NAME", format!("{host}_HA"));
        }
    }
    params
}

// ── RunConfig translation ───────────────────────────────────────────

fn tls_for(profile: &Profile) -> TlsVerification {
    match (profile.insecure, &profile.ca_cert) {
        (Some(true), _) => TlsVerification::DangerAcceptInvalid,
        (_, Some(ca)) => TlsVerification::CustomCa(ca.clone()),
        (Some(false), None) => TlsVerification::SystemDefaults,
        // Management centers ship self-signed certificates.
        (None, None) => TlsVerification::DangerAcceptInvalid,
    }
}

/// Build a `RunConfig` from a profile and resolved parameters.
pub fn profile_to_run_config(
    profile: &Profile,
    profile_name: &str,
    params: &Parameters,
) -> Result<RunConfig, ConfigError> {
    let url: url::Url = profile
        .controller
        .parse()
        .map_err(|_| ConfigError::Validation {
            field: "controller".into(),
            reason: format!("invalid URL: '{}'", profile.controller),
        })?;

    let username = profile
        .username
        .clone()
        .or_else(|| std::env::var("FWPAIR_USERNAME").ok())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
            secret: "username".into(),
        })?;
    let password = resolve_secret(
        SecretKind::Password,
        profile_name,
        profile.password_env.as_deref(),
        profile.password.as_deref(),
    )?;
    let registration_key = resolve_secret(
        SecretKind::RegistrationKey,
        profile_name,
        profile.registration_key_env.as_deref(),
        profile.registration_key.as_deref(),
    )?;

    let named = |configured: Option<&str>, param: &str, field: &str| {
        configured
            .or_else(|| params.get(param))
            .map(str::to_owned)
            .ok_or_else(|| ConfigError::Validation {
                field: field.into(),
                reason: format!("set {field} in the profile or pass --param {param}=..."),
            })
    };
    let ha_name = named(profile.ha_name.as_deref(), "HA_NAME", "ha_name")?;
    let ha_interface = named(profile.ha_interface.as_deref(), "HA_INTERFACE", "ha_interface")?;

    let mut config = RunConfig::new(url, username, password, registration_key, ha_name, ha_interface);
    config.tls = tls_for(profile);
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or_else(default_timeout));
    config.access_policy = profile
        .access_policy
        .clone()
        .unwrap_or_else(|| DEFAULT_ACCESS_POLICY.into());
    if let Some(note) = &profile.deployment_note {
        config.deployment_note.clone_from(note);
    }
    config.registration_poll = poll_policy(
        "registration",
        PollPolicy::registration(),
        profile.poll.registration.as_ref(),
    )?;
    config.pairing_poll = poll_policy("pairing", PollPolicy::pairing(), profile.poll.pairing.as_ref())?;
    config.deployment_poll = poll_policy(
        "deployment",
        PollPolicy::deployment(),
        profile.poll.deployment.as_ref(),
    )?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
default_profile = "lab"

[profiles.lab]
controller = "https://fmc.lab.example"
username = "api-user"
password = "plain-pass"
registration_key = "plain-key"
ha_interface = "GigabitEthernet0/2"
templates = "/etc/fwpair/templates"

[profiles.lab.poll.registration]
interval = 5
max_wait = 600

[profiles.lab.parameters]
FW_HOSTNAME_01 = "fw-01"
FW_HOSTNAME_02 = "fw-02"

[profiles.lab.email]
smtp_host = "smtp.example"
from = "fwpair@example"
to = ["netops@example"]
"#;

    fn sample() -> Config {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).expect("write");
        load_config_from(&path).expect("load")
    }

    #[test]
    fn loads_profiles_from_toml() {
        let cfg = sample();
        assert_eq!(cfg.default_profile.as_deref(), Some("lab"));
        let lab = cfg.profile("lab").expect("lab profile");
        assert_eq!(lab.controller, "https://fmc.lab.example");
        assert_eq!(lab.parameters.get("FW_HOSTNAME_01").map(String::as_str), Some("fw-01"));
        assert_eq!(lab.email.as_ref().map(|e| e.to.len()), Some(1));
        assert!(matches!(
            cfg.profile("prod"),
            Err(ConfigError::ProfileNotFound { available, .. }) if available == "lab"
        ));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = load_config_from(&dir.path().join("absent.toml")).expect("defaults");
        assert!(cfg.profiles.is_empty());
        assert_eq!(cfg.defaults.timeout, 30);
    }

    #[test]
    fn parameter_precedence() {
        let cfg = sample();
        let lab = cfg.profile("lab").expect("lab");
        let required: BTreeSet<String> = ["FW_HOSTNAME_01", "FW_HOSTNAME_02", "INSIDE_IP"]
            .into_iter()
            .map(String::from)
            .collect();
        let env = |k: &str| match k {
            "FW_HOSTNAME_02" => Some("fw-02-env".to_owned()),
            "INSIDE_IP" => Some("10.0.0.1".to_owned()),
            _ => None,
        };
        let overrides = vec![("INSIDE_IP".to_owned(), "10.9.9.1".to_owned())];

        let params = resolve_parameters_with(Some(lab), &overrides, &required, env);
        assert_eq!(params.get("FW_HOSTNAME_01"), Some("fw-01"));
        assert_eq!(params.get("FW_HOSTNAME_02"), Some("fw-02-env"));
        assert_eq!(params.get("INSIDE_IP"), Some("10.9.9.1"));
        assert_eq!(params.get("HA_NAME"), Some("fw-01_HA"));
    }

    #[test]
    fn explicit_ha_name_is_kept() {
        let overrides = vec![
            ("FW_HOSTNAME_01".to_owned(), "fw-01".to_owned()),
            ("HA_NAME".to_owned(), "edge-pair".to_owned()),
        ];
        let params = resolve_parameters_with(None, &overrides, &BTreeSet::new(), |_| None);
        assert_eq!(params.get("HA_NAME"), Some("edge-pair"));
    }

    #[test]
    fn poll_overrides_keep_unset_fields() {
        let cfg = sample();
        let lab = cfg.profile("lab").expect("lab");
        let policy = poll_policy("registration", PollPolicy::registration(), lab.poll.registration.as_ref())
            .expect("valid override");
        assert_eq!(policy.interval, Duration::from_secs(5));
        assert_eq!(policy.max_wait, Duration::from_secs(600));
        assert_eq!(
            poll_policy("pairing", PollPolicy::pairing(), lab.poll.pairing.as_ref()).expect("default"),
            PollPolicy::pairing()
        );
    }

    #[test]
    fn unusable_poll_overrides_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[profiles.lab]\ncontroller = \"https://fmc.lab\"\n\n\
             [profiles.lab.poll.deployment]\nbackoff = nan\n\n\
             [profiles.lab.poll.pairing]\ninterval = 0\n",
        )
        .expect("write");
        let cfg = load_config_from(&path).expect("load");
        let lab = cfg.profile("lab").expect("lab");

        assert!(matches!(
            poll_policy("deployment", PollPolicy::deployment(), lab.poll.deployment.as_ref()),
            Err(ConfigError::Validation { field, .. }) if field == "poll.deployment.backoff"
        ));
        assert!(matches!(
            poll_policy("pairing", PollPolicy::pairing(), lab.poll.pairing.as_ref()),
            Err(ConfigError::Validation { field, .. }) if field == "poll.pairing.interval"
        ));

        let shrinking = PollOverride {
            backoff: Some(0.5),
            ..PollOverride::default()
        };
        assert!(poll_policy("registration", PollPolicy::registration(), Some(&shrinking)).is_err());
    }

    #[test]
    fn tls_selection() {
        let mut p = Profile::default();
        assert_eq!(tls_for(&p), TlsVerification::DangerAcceptInvalid);
        p.insecure = Some(false);
        assert_eq!(tls_for(&p), TlsVerification::SystemDefaults);
        p.ca_cert = Some(PathBuf::from("/etc/ssl/fmc.pem"));
        assert_eq!(
            tls_for(&p),
            TlsVerification::CustomCa(PathBuf::from("/etc/ssl/fmc.pem"))
        );
    }

    #[test]
    fn invalid_controller_url_is_rejected() {
        let p = Profile {
            controller: "not a url".into(),
            ..Profile::default()
        };
        assert!(matches!(
            profile_to_run_config(&p, "lab", &Parameters::new()),
            Err(ConfigError::Validation { field, .. }) if field == "controller"
        ));
    }
}
