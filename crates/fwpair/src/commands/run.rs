//! `fwpair run`: drive the pipeline and report the outcome.

use std::path::Path;

use clap::ValueEnum;
use tracing::{info, warn};

use fwpair_core::{Orchestrator, RunResult, SessionOutcome, Stage};

use crate::cli::{GlobalOpts, RunArgs, StageArg};
use crate::config::{self, Profile};
use crate::error::CliError;
use crate::{email, output, report};

impl From<StageArg> for Stage {
    fn from(arg: StageArg) -> Self {
        match arg {
            StageArg::Auth => Self::Auth,
            StageArg::Register => Self::Register,
            StageArg::Pair => Self::Pair,
            StageArg::Reconcile => Self::Reconcile,
            StageArg::Deploy => Self::Deploy,
        }
    }
}

/// Requested stages, or the whole pipeline when none were named.
pub fn selected_stages(args: &[StageArg]) -> Vec<Stage> {
    let args = if args.is_empty() {
        StageArg::value_variants()
    } else {
        args
    };
    args.iter().copied().map(Stage::from).collect()
}

pub async fn handle(args: &RunArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_config()?;
    let (profile_name, profile) = config::resolve_profile(global, &cfg)?;

    // Everything local is checked before the controller is contacted.
    let set = config::template_set(&args.template, Some(&profile))?;
    let params = config::parameters(&args.template, Some(&profile), &set);
    let templates = set.render(&params)?;
    let run_config = config::run_config(&profile, &profile_name, &params)?;

    let stages = selected_stages(&args.stages);
    info!(profile = %profile_name, controller = %run_config.url, ?stages, "starting run");
    let result = Orchestrator::new(run_config, templates).run(&stages).await;

    if let Some(path) = &args.save {
        save_result(path, &result)?;
    }

    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &result,
        |r| report::render_text(r, color),
        |r| report::verdict(r).to_owned(),
    );
    output::print_output(&out, global.quiet);

    let outcome = outcome(&result, &profile_name);
    if args.email {
        if let Err(e) = email_report(&profile, &profile_name, &result).await {
            if outcome.is_ok() {
                return Err(e);
            }
            warn!(error = %e, "report email failed");
        }
    }
    outcome
}

/// Write the run result as pretty JSON.
pub fn save_result(path: &Path, result: &RunResult) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(result)?;
    std::fs::write(path, json)?;
    info!(path = %path.display(), "run result saved");
    Ok(())
}

pub async fn email_report(
    profile: &Profile,
    profile_name: &str,
    result: &RunResult,
) -> Result<(), CliError> {
    let settings = profile.email.as_ref().ok_or_else(|| CliError::Validation {
        field: "email".into(),
        reason: format!("profile '{profile_name}' has no [email] section"),
    })?;
    email::send_report(settings, profile_name, result).await
}

/// Exit status of a finished run.
pub fn outcome(result: &RunResult, profile_name: &str) -> Result<(), CliError> {
    if let SessionOutcome::Failed { message } = &result.session {
        return Err(CliError::AuthFailed {
            profile: profile_name.to_owned(),
            message: message.clone(),
        });
    }
    if let Some(stage) = result.stopped_at {
        return Err(CliError::RunHalted {
            stage: stage.to_string(),
            reason: result.halt_reason.clone().unwrap_or_default(),
        });
    }
    if !result.is_success() {
        return Err(CliError::RunPartial {
            summary: report::summary(result),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_selection_runs_everything() {
        assert_eq!(
            selected_stages(&[]),
            vec![
                Stage::Auth,
                Stage::Register,
                Stage::Pair,
                Stage::Reconcile,
                Stage::Deploy
            ]
        );
        assert_eq!(
            selected_stages(&[StageArg::Deploy, StageArg::Reconcile]),
            vec![Stage::Deploy, Stage::Reconcile]
        );
    }
}
