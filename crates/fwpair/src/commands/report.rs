//! `fwpair report`: render a saved run result.

use fwpair_core::RunResult;

use crate::cli::{GlobalOpts, ReportArgs, ReportFormat};
use crate::commands::run::email_report;
use crate::config;
use crate::error::CliError;
use crate::output;
use crate::report;

pub async fn handle(args: &ReportArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let raw = std::fs::read_to_string(&args.file)?;
    let result: RunResult = serde_json::from_str(&raw)?;

    let out = match args.format {
        ReportFormat::Text => output::render_single(
            &global.output,
            &result,
            |r| report::render_text(r, output::should_color(&global.color)),
            |r| report::verdict(r).to_owned(),
        ),
        ReportFormat::Html => report::render_html(&result),
    };
    output::print_output(&out, global.quiet);

    if args.email {
        let cfg = config::load_config()?;
        let (profile_name, profile) = config::resolve_profile(global, &cfg)?;
        email_report(&profile, &profile_name, &result).await?;
    }
    Ok(())
}
