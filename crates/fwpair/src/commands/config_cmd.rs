//! Config subcommand handlers.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tabled::Tabled;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, SecretArg};
use crate::config::{self, Config, SecretKind};
use crate::error::CliError;
use crate::output;

const MASK: &str = "****";

// ── Helpers ─────────────────────────────────────────────────────────

/// Copy of the config with every stored secret masked.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    let mask = |v: &mut Option<String>| {
        if v.is_some() {
            *v = Some(MASK.into());
        }
    };
    for profile in cfg.profiles.values_mut() {
        mask(&mut profile.password);
        mask(&mut profile.registration_key);
        if let Some(email) = profile.email.as_mut() {
            mask(&mut email.password);
        }
    }
    cfg
}

fn format_config(cfg: &Config) -> String {
    toml::to_string_pretty(cfg).unwrap_or_else(|e| format!("# cannot display config: {e}"))
}

#[derive(Serialize, Tabled)]
struct ProfileRow {
    #[tabled(rename = "Profile")]
    name: String,
    #[tabled(rename = "Controller")]
    controller: String,
    #[tabled(rename = "Default")]
    default: String,
}

impl From<SecretArg> for SecretKind {
    fn from(arg: SecretArg) -> Self {
        match arg {
            SecretArg::Password => Self::Password,
            SecretArg::RegistrationKey => Self::RegistrationKey,
            SecretArg::SmtpPassword => Self::SmtpPassword,
        }
    }
}

fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config()?);
            let out = output::render_single(&global.output, &cfg, format_config, |c| {
                c.profiles.keys().cloned().collect::<Vec<_>>().join("\n")
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = config::active_profile_name(global, &cfg);
            if cfg.profiles.is_empty() {
                eprintln!(
                    "No profiles configured. Add one to {}",
                    config::config_path().display()
                );
                return Ok(());
            }
            let rows: Vec<ProfileRow> = cfg
                .profiles
                .iter()
                .map(|(name, p)| ProfileRow {
                    name: name.clone(),
                    controller: p.controller.clone(),
                    default: if *name == default { "*" } else { "" }.into(),
                })
                .collect();
            let out = output::render_list(
                &global.output,
                &rows,
                |r| ProfileRow {
                    name: r.name.clone(),
                    controller: r.controller.clone(),
                    default: r.default.clone(),
                },
                |r| r.name.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            cfg.profile(&name)?;
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }

        ConfigCommand::SetSecret { kind, profile } => {
            let cfg = config::load_config_or_default();
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));
            cfg.profile(&profile_name)?;

            let kind = SecretKind::from(kind);
            let secret = SecretString::from(
                rpassword::prompt_password(format!("{}: ", kind.label())).map_err(prompt_err)?,
            );
            if secret.expose_secret().is_empty() {
                return Err(CliError::Validation {
                    field: "secret".into(),
                    reason: "value cannot be empty".into(),
                });
            }
            config::store_secret(kind, &profile_name, &secret)?;
            eprintln!(
                "✓ {} stored in system keyring for profile '{profile_name}'",
                kind.label()
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EmailSettings, Profile};

    #[test]
    fn show_masks_every_secret() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "lab".into(),
            Profile {
                controller: "https://fmc.lab".into(),
                password: Some("hunter2".into()),
                registration_key: Some("cisco123".into()),
                email: Some(EmailSettings {
                    smtp_host: "smtp.lab".into(),
                    smtp_port: None,
                    username: Some("mailer".into()),
                    password: Some("smtp-secret".into()),
                    password_env: None,
                    from: "fwpair@lab".into(),
                    to: vec!["ops@lab".into()],
                    subject: None,
                }),
                ..Profile::default()
            },
        );

        let shown = format_config(&redacted(&cfg));
        for secret in ["hunter2", "cisco123", "smtp-secret"] {
            assert!(!shown.contains(secret), "{secret} leaked:\n{shown}");
        }
        assert!(shown.contains("https://fmc.lab"));
        assert!(shown.contains(MASK));
    }
}
