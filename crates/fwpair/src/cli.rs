//! Clap derive structures for the `fwpair` CLI.
//!
//! Defines the command tree, global flags, and shared value types. This file
//! is also compiled by `build.rs` for man pages, so it depends on clap only.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// fwpair -- stand up an HA firewall pair through its management controller
#[derive(Debug, Parser)]
#[command(
    name = "fwpair",
    version,
    about = "Deploy and pair HA firewalls through a management controller",
    long_about = "Registers two firewalls with a management controller, joins them into an\n\
        active/standby pair, reconciles interfaces, routes, NAT and platform settings\n\
        from JSON templates, deploys the result and reports what happened.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Controller profile to use
    #[arg(long, short = 'p', env = "FWPAIR_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Controller URL (overrides profile)
    #[arg(long, short = 'c', env = "FWPAIR_CONTROLLER", global = true)]
    pub controller: Option<String>,

    /// Controller user (overrides profile)
    #[arg(long, short = 'u', env = "FWPAIR_USERNAME", global = true)]
    pub username: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "FWPAIR_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "FWPAIR_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "FWPAIR_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

/// Pipeline stages selectable with `--stage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StageArg {
    Auth,
    Register,
    Pair,
    Reconcile,
    Deploy,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum ReportFormat {
    /// Tables for the terminal
    #[default]
    Text,
    /// Standalone HTML document
    Html,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SecretArg {
    /// Controller password
    Password,
    /// Device registration key
    RegistrationKey,
    /// SMTP password for report email
    SmtpPassword,
}

/// Parse a `KEY=VALUE` argument.
pub fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    Ok((key.to_owned(), value.to_owned()))
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the deployment pipeline against the controller
    Run(RunArgs),

    /// Render the templates locally and print the request bodies
    Render(RenderArgs),

    /// Render a saved run result
    Report(ReportArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Template inputs shared by `run` and `render`.
#[derive(Debug, Args)]
pub struct TemplateArgs {
    /// Template parameter (repeatable)
    #[arg(long = "param", short = 'P', value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub params: Vec<(String, String)>,

    /// Directory of template overrides (devices.json, ha.json, objects.json)
    #[arg(long, short = 't', value_name = "DIR")]
    pub templates: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub template: TemplateArgs,

    /// Stages to execute (repeatable; default: all). Skipped register and
    /// pair stages are looked up on the controller instead.
    #[arg(long = "stage", short = 's', value_delimiter = ',')]
    pub stages: Vec<StageArg>,

    /// Write the run result as JSON to this file
    #[arg(long, value_name = "FILE")]
    pub save: Option<PathBuf>,

    /// Email the report to the profile's recipients
    #[arg(long)]
    pub email: bool,
}

#[derive(Debug, Args)]
pub struct RenderArgs {
    #[command(flatten)]
    pub template: TemplateArgs,

    /// List the placeholders the templates use and exit
    #[arg(long)]
    pub placeholders: bool,
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    /// Run result written by `fwpair run --save`
    pub file: PathBuf,

    /// Report format
    #[arg(long, short = 'f', default_value = "text")]
    pub format: ReportFormat,

    /// Email the report to the profile's recipients
    #[arg(long)]
    pub email: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration with secrets masked
    Show,

    /// Print the config file location
    Path,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store a secret in the system keyring
    SetSecret {
        /// Which secret to store
        kind: SecretArg,

        /// Profile to store it for (default: active profile)
        #[arg(long)]
        profile: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
