//! CLI configuration: thin wrapper around `fwpair_config` shared types.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides (--controller,
//! --username, --insecure, --timeout) and the template inputs of a command.

use fwpair_core::{Parameters, RunConfig, TemplateSet};

use crate::cli::{GlobalOpts, TemplateArgs};
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use fwpair_config::{
    Config, EmailSettings, Profile, SecretKind, config_path, load_config, load_config_or_default,
    log_dir, save_config, store_secret,
};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// The active profile with CLI flag overrides applied.
///
/// Without a matching profile, `--controller` alone yields an ad-hoc one.
pub fn resolve_profile(global: &GlobalOpts, config: &Config) -> Result<(String, Profile), CliError> {
    let name = active_profile_name(global, config);
    let mut profile = match config.profiles.get(&name) {
        Some(p) => p.clone(),
        None if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name,
                available: config.profile_names(),
            });
        }
        None if global.controller.is_some() => Profile::default(),
        None => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
    };

    if let Some(url) = &global.controller {
        profile.controller.clone_from(url);
    }
    if let Some(user) = &global.username {
        profile.username = Some(user.clone());
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(secs) = global.timeout {
        profile.timeout = Some(secs);
    }
    Ok((name, profile))
}

/// Built-in templates, overridden by `--templates` or the profile's directory.
pub fn template_set(args: &TemplateArgs, profile: Option<&Profile>) -> Result<TemplateSet, CliError> {
    let dir = args
        .templates
        .as_deref()
        .or_else(|| profile.and_then(|p| p.templates.as_deref()));
    let set = match dir {
        Some(dir) => TemplateSet::from_dir(dir)?,
        None => TemplateSet::builtin()?,
    };
    Ok(set)
}

/// Parameters for `set`: `--param` → process env → profile table.
pub fn parameters(args: &TemplateArgs, profile: Option<&Profile>, set: &TemplateSet) -> Parameters {
    fwpair_config::resolve_parameters(profile, &args.params, &set.placeholders())
}

/// Translate the resolved profile into the immutable run configuration.
pub fn run_config(profile: &Profile, name: &str, params: &Parameters) -> Result<RunConfig, CliError> {
    if profile.controller.is_empty() {
        return Err(CliError::NoConfig {
            path: config_path().display().to_string(),
        });
    }
    Ok(fwpair_config::profile_to_run_config(profile, name, params)?)
}
