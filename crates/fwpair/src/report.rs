//! Human-readable rendering of a `RunResult`: terminal text and HTML.

use std::fmt::Write;

use tabled::Tabled;

use fwpair_core::{
    DeploymentJob, Device, HaPair, HealthSnapshot, ObjectReport, Outcome, RunResult,
    SessionOutcome,
};

use crate::output::{Tone, paint, render_table};

const NONE: &str = "-";

/// One-word verdict of a run.
pub fn verdict(result: &RunResult) -> &'static str {
    if result.halted() {
        "halted"
    } else if result.is_success() {
        "success"
    } else {
        "partial"
    }
}

/// Single line suitable for a subject or a closing status.
pub fn summary(result: &RunResult) -> String {
    let c = &result.counts;
    let mut line = format!(
        "{} on {}: {} created, {} updated, {} unchanged, {} failed, {} blocked",
        verdict(result),
        result.controller,
        c.created,
        c.updated,
        c.unchanged,
        c.failed,
        c.blocked
    );
    if let Some(job) = &result.deployment {
        let _ = write!(line, "; deployment {}", job.status);
    }
    if let (Some(stage), Some(reason)) = (result.stopped_at, &result.halt_reason) {
        let _ = write!(line, "; stopped at {stage}: {reason}");
    }
    line
}

// ── Table rows ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Hostname")]
    hostname: String,
    #[tabled(rename = "Mgmt IP")]
    management_ip: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "UUID")]
    uuid: String,
    #[tabled(rename = "Failure")]
    failure: String,
}

impl From<&Device> for DeviceRow {
    fn from(d: &Device) -> Self {
        Self {
            role: d.role.to_string(),
            hostname: d.hostname.clone(),
            management_ip: d.management_ip.clone(),
            status: d.status.to_string(),
            uuid: d.remote_uuid.clone().unwrap_or_else(|| NONE.into()),
            failure: d.failure.as_ref().map_or_else(|| NONE.into(), ToString::to_string),
        }
    }
}

#[derive(Tabled)]
struct ObjectRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
    #[tabled(rename = "Existed")]
    existed: String,
    #[tabled(rename = "UUID")]
    uuid: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

fn outcome_detail(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Failed { reason } => reason.clone(),
        Outcome::Blocked { dependency } => format!("waits on {dependency}"),
        _ => NONE.into(),
    }
}

impl From<&ObjectReport> for ObjectRow {
    fn from(o: &ObjectReport) -> Self {
        Self {
            kind: o.kind.to_string(),
            name: o.logical_name.clone(),
            outcome: o.outcome.label().into(),
            existed: if o.existed_before { "yes" } else { "no" }.into(),
            uuid: o.remote_uuid.clone().unwrap_or_else(|| NONE.into()),
            detail: outcome_detail(&o.outcome),
        }
    }
}

#[derive(Tabled)]
struct DeployRow {
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
}

#[derive(Tabled)]
struct HealthRow {
    #[tabled(rename = "Device")]
    name: String,
    #[tabled(rename = "Health")]
    health: String,
    #[tabled(rename = "Deployment")]
    deployment: String,
    #[tabled(rename = "Version")]
    version: String,
}

fn or_none(v: Option<&String>) -> String {
    v.cloned().unwrap_or_else(|| NONE.into())
}

fn deploy_rows(job: &DeploymentJob) -> Vec<DeployRow> {
    job.per_device_results
        .iter()
        .map(|r| DeployRow {
            device: r.device_name.clone().unwrap_or_else(|| r.device_uuid.clone()),
            status: r.status.to_string(),
            message: or_none(r.message.as_ref()),
        })
        .collect()
}

fn health_rows(health: &HealthSnapshot) -> Vec<HealthRow> {
    health
        .devices
        .iter()
        .map(|d| HealthRow {
            name: d.name.clone(),
            health: or_none(d.health_status.as_ref()),
            deployment: or_none(d.deployment_status.as_ref()),
            version: or_none(d.sw_version.as_ref()),
        })
        .collect()
}

fn session_line(session: &SessionOutcome) -> (String, &'static str) {
    match session {
        SessionOutcome::NotAttempted => ("not attempted".into(), "muted"),
        SessionOutcome::Authenticated { domain_uuid } => {
            (format!("authenticated (domain {domain_uuid})"), "authenticated")
        }
        SessionOutcome::Failed { message } => (format!("failed: {message}"), "failed"),
    }
}

fn pair_line(pair: &HaPair) -> String {
    let mut line = format!("{} over {}", pair.name, pair.ha_interface_name);
    if let (Some(p), Some(s)) = (&pair.primary_state, &pair.secondary_state) {
        let _ = write!(line, " (primary {p}, secondary {s})");
    }
    if let Some(f) = &pair.failure {
        let _ = write!(line, ": {f}");
    }
    line
}

// ── Text ─────────────────────────────────────────────────────────────

/// Terminal report: a header, then one table per stage that produced data.
pub fn render_text(result: &RunResult, color: bool) -> String {
    let mut out = String::new();
    let verdict = verdict(result);
    let (session, session_tone) = session_line(&result.session);

    let _ = writeln!(out, "Run {}", paint(verdict, Tone::of(verdict), color));
    let _ = writeln!(out, "  Controller: {}", result.controller);
    let _ = writeln!(
        out,
        "  Session:    {}",
        paint(&session, Tone::of(session_tone), color)
    );
    let stages: Vec<String> = result.stages.iter().map(ToString::to_string).collect();
    let _ = writeln!(out, "  Stages:     {}", stages.join(", "));
    let _ = writeln!(out, "  Started:    {}", result.started_at.to_rfc3339());
    if let Some(done) = result.finished_at {
        let secs = (done - result.started_at).num_seconds();
        let _ = writeln!(out, "  Finished:   {} ({secs}s)", done.to_rfc3339());
    }
    if let (Some(stage), Some(reason)) = (result.stopped_at, &result.halt_reason) {
        let _ = writeln!(
            out,
            "  Stopped at: {} ({reason})",
            paint(&stage.to_string(), Tone::Bad, color)
        );
    }

    let _ = writeln!(out, "\nDevices");
    let rows: Vec<DeviceRow> = result.devices.iter().map(DeviceRow::from).collect();
    let _ = writeln!(out, "{}", render_table(&rows));

    let status = result.ha_pair.status.to_string();
    let _ = writeln!(
        out,
        "\nHA pair: {} {}",
        paint(&status, Tone::of(&status), color),
        pair_line(&result.ha_pair)
    );

    if !result.objects.is_empty() {
        let c = &result.counts;
        let _ = writeln!(
            out,
            "\nObjects ({} created, {} updated, {} unchanged, {} failed, {} blocked)",
            c.created, c.updated, c.unchanged, c.failed, c.blocked
        );
        let rows: Vec<ObjectRow> = result.objects.iter().map(ObjectRow::from).collect();
        let _ = writeln!(out, "{}", render_table(&rows));
    }

    if let Some(job) = &result.deployment {
        let status = job.status.to_string();
        let _ = write!(
            out,
            "\nDeployment: {}",
            paint(&status, Tone::of(&status), color)
        );
        if let Some(id) = &job.job_id {
            let _ = write!(out, " (job {id})");
        }
        if let Some(reason) = &job.reason {
            let _ = write!(out, ": {reason}");
        }
        let _ = writeln!(out);
        if !job.per_device_results.is_empty() {
            let _ = writeln!(out, "{}", render_table(&deploy_rows(job)));
        }
    }

    if let Some(health) = &result.health {
        let _ = writeln!(out, "\nHealth");
        let _ = writeln!(out, "{}", render_table(&health_rows(health)));
        if let (Some(p), Some(s)) = (&health.ha_primary_status, &health.ha_secondary_status) {
            let _ = writeln!(out, "  HA: primary {p}, secondary {s}");
        }
    }

    out.trim_end().to_owned()
}

// ── HTML ─────────────────────────────────────────────────────────────

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn html_table(out: &mut String, headers: &[&str], rows: &[Vec<String>]) {
    out.push_str("<table>\n<tr>");
    for h in headers {
        let _ = write!(out, "<th>{}</th>", escape(h));
    }
    out.push_str("</tr>\n");
    for row in rows {
        out.push_str("<tr>");
        for cell in row {
            let _ = write!(
                out,
                "<td class=\"{}\">{}</td>",
                tone_class(Tone::of(cell)),
                escape(cell)
            );
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</table>\n");
}

fn tone_class(tone: Tone) -> &'static str {
    match tone {
        Tone::Good => "good",
        Tone::Warn => "warn",
        Tone::Bad => "bad",
        Tone::Muted => "",
    }
}

/// Standalone HTML document for email or archiving.
pub fn render_html(result: &RunResult) -> String {
    let mut out = String::new();
    let verdict = verdict(result);
    let (session, _) = session_line(&result.session);

    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(out, "<title>fwpair run {}</title>", escape(verdict));
    out.push_str(
        "<style>\n\
         body { font-family: sans-serif; }\n\
         table { border-collapse: collapse; margin-bottom: 1em; }\n\
         th, td { border: 1px solid #ccc; padding: 4px 8px; text-align: left; }\n\
         .good { color: #1a7f37; } .warn { color: #9a6700; } .bad { color: #cf222e; }\n\
         </style>\n</head>\n<body>\n",
    );
    let _ = writeln!(
        out,
        "<h1>Run <span class=\"{}\">{}</span></h1>",
        tone_class(Tone::of(verdict)),
        escape(verdict)
    );
    let _ = writeln!(out, "<p>Controller: {}<br>", escape(&result.controller));
    let _ = writeln!(out, "Session: {}<br>", escape(&session));
    let _ = writeln!(out, "Started: {}", result.started_at.to_rfc3339());
    if let Some(done) = result.finished_at {
        let _ = write!(out, "<br>\nFinished: {}", done.to_rfc3339());
    }
    if let (Some(stage), Some(reason)) = (result.stopped_at, &result.halt_reason) {
        let _ = write!(
            out,
            "<br>\nStopped at: <span class=\"bad\">{stage}</span> ({})",
            escape(reason)
        );
    }
    out.push_str("</p>\n");

    out.push_str("<h2>Devices</h2>\n");
    let rows: Vec<Vec<String>> = result
        .devices
        .iter()
        .map(DeviceRow::from)
        .map(|r| vec![r.role, r.hostname, r.management_ip, r.status, r.uuid, r.failure])
        .collect();
    html_table(
        &mut out,
        &["Role", "Hostname", "Mgmt IP", "Status", "UUID", "Failure"],
        &rows,
    );

    let _ = writeln!(
        out,
        "<h2>HA pair</h2>\n<p><span class=\"{}\">{}</span> {}</p>",
        tone_class(Tone::of(&result.ha_pair.status.to_string())),
        result.ha_pair.status,
        escape(&pair_line(&result.ha_pair))
    );

    if !result.objects.is_empty() {
        out.push_str("<h2>Objects</h2>\n");
        let rows: Vec<Vec<String>> = result
            .objects
            .iter()
            .map(ObjectRow::from)
            .map(|r| vec![r.kind, r.name, r.outcome, r.existed, r.uuid, r.detail])
            .collect();
        html_table(
            &mut out,
            &["Kind", "Name", "Outcome", "Existed", "UUID", "Detail"],
            &rows,
        );
    }

    if let Some(job) = &result.deployment {
        let _ = writeln!(
            out,
            "<h2>Deployment</h2>\n<p><span class=\"{}\">{}</span>{}</p>",
            tone_class(Tone::of(&job.status.to_string())),
            job.status,
            job.reason
                .as_deref()
                .map(|r| format!(": {}", escape(r)))
                .unwrap_or_default()
        );
        let rows: Vec<Vec<String>> = deploy_rows(job)
            .into_iter()
            .map(|r| vec![r.device, r.status, r.message])
            .collect();
        if !rows.is_empty() {
            html_table(&mut out, &["Device", "Status", "Message"], &rows);
        }
    }

    if let Some(health) = &result.health {
        out.push_str("<h2>Health</h2>\n");
        let rows: Vec<Vec<String>> = health_rows(health)
            .into_iter()
            .map(|r| vec![r.name, r.health, r.deployment, r.version])
            .collect();
        html_table(&mut out, &["Device", "Health", "Deployment", "Version"], &rows);
    }

    out.push_str("</body>\n</html>\n");
    out
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use fwpair_core::{
        DeployStatus, DeviceDeployResult, DeviceRole, JobStatus, ObjectKind, OutcomeCounts,
        PairingStatus, Stage,
    };

    use super::*;

    fn partial_run() -> RunResult {
        let mut primary = Device::new(DeviceRole::Primary, "fw-01", "192.0.2.11");
        primary.remote_uuid = Some("dev-1".into());
        let secondary = Device::new(DeviceRole::Secondary, "fw-02", "192.0.2.12");
        let mut pair = HaPair::new("fw-01_HA", "GigabitEthernet0/2");
        pair.status = PairingStatus::Active;

        let objects = vec![
            ObjectReport {
                kind: ObjectKind::Network,
                logical_name: "INSIDE_NET".into(),
                remote_uuid: Some("uuid-123".into()),
                existed_before: false,
                outcome: Outcome::Created,
            },
            ObjectReport {
                kind: ObjectKind::Route,
                logical_name: "<inside>".into(),
                remote_uuid: None,
                existed_before: false,
                outcome: Outcome::Failed {
                    reason: "Invalid gateway".into(),
                },
            },
        ];
        let mut job = DeploymentJob::new(vec!["dev-1".into(), "dev-2".into()]);
        job.status = JobStatus::Partial;
        job.per_device_results = vec![
            DeviceDeployResult {
                device_uuid: "dev-1".into(),
                device_name: Some("fw-01".into()),
                status: DeployStatus::Succeeded,
                message: None,
            },
            DeviceDeployResult {
                device_uuid: "dev-2".into(),
                device_name: Some("fw-02".into()),
                status: DeployStatus::Failed,
                message: Some("policy push failed".into()),
            },
        ];

        RunResult {
            controller: "https://fmc.example/".into(),
            session: SessionOutcome::Authenticated {
                domain_uuid: "dom-1".into(),
            },
            stages: vec![Stage::Auth, Stage::Reconcile, Stage::Deploy],
            devices: vec![primary, secondary],
            ha_pair: pair,
            counts: OutcomeCounts::tally(&objects),
            objects,
            deployment: Some(job),
            health: None,
            stopped_at: None,
            halt_reason: None,
            started_at: Utc::now(),
            finished_at: Some(Utc::now()),
        }
    }

    #[test]
    fn text_report_covers_every_section() {
        let run = partial_run();
        let text = render_text(&run, false);
        assert!(text.starts_with("Run partial"));
        assert!(text.contains("fw-01"));
        assert!(text.contains("uuid-123"));
        assert!(text.contains("Invalid gateway"));
        assert!(text.contains("Deployment: partial"));
        assert!(text.contains("policy push failed"));
        assert!(!text.contains("Stopped at"));
    }

    #[test]
    fn html_report_escapes_names() {
        let html = render_html(&partial_run());
        assert!(html.contains("&lt;inside&gt;"));
        assert!(!html.contains("<inside>"));
        assert!(html.contains("<td class=\"bad\">failed</td>"));
    }

    #[test]
    fn summary_names_halt() {
        let mut run = partial_run();
        run.deployment = None;
        run.stopped_at = Some(Stage::Pair);
        run.halt_reason = Some("HA pair fw-01_HA not active".into());
        assert_eq!(verdict(&run), "halted");
        assert!(summary(&run).ends_with("stopped at pair: HA pair fw-01_HA not active"));
    }
}
