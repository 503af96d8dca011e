//! Report delivery over SMTP (STARTTLS submission).

use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::ExposeSecret;
use tracing::info;

use fwpair_core::RunResult;

use crate::config::EmailSettings;
use crate::error::CliError;
use crate::report;

const SUBMISSION_PORT: u16 = 587;

fn email_err(reason: impl std::fmt::Display) -> CliError {
    CliError::Email {
        reason: reason.to_string(),
    }
}

fn mailbox(raw: &str) -> Result<Mailbox, CliError> {
    raw.parse()
        .map_err(|e| email_err(format!("invalid address '{raw}': {e}")))
}

/// Build the multipart (text + HTML) report message.
pub fn build_message(settings: &EmailSettings, result: &RunResult) -> Result<Message, CliError> {
    if settings.to.is_empty() {
        return Err(email_err("no recipients configured"));
    }

    let subject = settings
        .subject
        .clone()
        .unwrap_or_else(|| format!("fwpair: {}", report::summary(result)));

    let mut builder = Message::builder()
        .from(mailbox(&settings.from)?)
        .subject(subject);
    for to in &settings.to {
        builder = builder.to(mailbox(to)?);
    }

    builder
        .multipart(MultiPart::alternative_plain_html(
            report::render_text(result, false),
            report::render_html(result),
        ))
        .map_err(|e| email_err(format!("failed to build email: {e}")))
}

/// Send the report of `result` to the profile's recipients.
pub async fn send_report(
    settings: &EmailSettings,
    profile_name: &str,
    result: &RunResult,
) -> Result<(), CliError> {
    let message = build_message(settings, result)?;

    let mut transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.smtp_host)
        .map_err(|e| email_err(format!("SMTP relay error: {e}")))?
        .port(settings.smtp_port.unwrap_or(SUBMISSION_PORT));
    if let Some(user) = &settings.username {
        let password = settings.smtp_password(profile_name)?;
        transport = transport.credentials(Credentials::new(
            user.clone(),
            password.expose_secret().to_owned(),
        ));
    }

    transport
        .build()
        .send(message)
        .await
        .map_err(|e| email_err(format!("failed to send email: {e}")))?;
    info!(recipients = settings.to.len(), host = %settings.smtp_host, "report emailed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use fwpair_core::{HaPair, OutcomeCounts, SessionOutcome};

    use super::*;

    fn settings() -> EmailSettings {
        EmailSettings {
            smtp_host: "smtp.example".into(),
            smtp_port: None,
            username: None,
            password: None,
            password_env: None,
            from: "fwpair <fwpair@example.net>".into(),
            to: vec!["netops@example.net".into()],
            subject: None,
        }
    }

    fn run() -> RunResult {
        RunResult {
            controller: "https://fmc.example/".into(),
            session: SessionOutcome::Failed {
                message: "bad credentials".into(),
            },
            stages: Vec::new(),
            devices: Vec::new(),
            ha_pair: HaPair::new("fw_HA", "GigabitEthernet0/2"),
            objects: Vec::new(),
            counts: OutcomeCounts::default(),
            deployment: None,
            health: None,
            stopped_at: None,
            halt_reason: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    #[test]
    fn message_carries_text_and_html() {
        let msg = build_message(&settings(), &run()).expect("message");
        let raw = String::from_utf8(msg.formatted()).expect("utf8");
        assert!(raw.contains("Subject: fwpair: "));
        assert!(raw.contains("text/plain"));
        assert!(raw.contains("text/html"));
        assert!(raw.contains("netops@example.net"));
    }

    #[test]
    fn recipients_are_required() {
        let mut s = settings();
        s.to.clear();
        assert!(matches!(build_message(&s, &run()), Err(CliError::Email { .. })));
    }

    #[test]
    fn bad_sender_is_rejected() {
        let mut s = settings();
        s.from = "not an address".into();
        assert!(build_message(&s, &run()).is_err());
    }
}
