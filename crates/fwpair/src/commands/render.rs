//! `fwpair render`: substitute parameters locally, no controller involved.

use std::fmt::Write;

use serde::Serialize;
use tabled::Tabled;

use fwpair_core::{ObjectSpec, RenderedTemplates};

use crate::cli::{GlobalOpts, RenderArgs};
use crate::config;
use crate::error::CliError;
use crate::output::{self, render_table};

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Hostname")]
    hostname: String,
    #[tabled(rename = "Mgmt IP")]
    management_ip: String,
}

#[derive(Tabled)]
struct ObjectRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Parent")]
    parent: String,
    #[tabled(rename = "Depends on")]
    depends_on: String,
}

impl From<&ObjectSpec> for ObjectRow {
    fn from(o: &ObjectSpec) -> Self {
        Self {
            kind: o.kind.to_string(),
            name: o.name.clone(),
            parent: o.parent.clone().unwrap_or_default(),
            depends_on: o.depends_on.join(", "),
        }
    }
}

/// A template placeholder and where its value comes from.
#[derive(Debug, Serialize, Tabled)]
struct Placeholder {
    #[tabled(rename = "Parameter")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
}

fn detail(rendered: &RenderedTemplates) -> String {
    let mut out = String::from("Devices\n");
    let devices: Vec<DeviceRow> = rendered
        .devices
        .iter()
        .map(|d| DeviceRow {
            role: d.role.to_string(),
            hostname: d.hostname.clone(),
            management_ip: d.management_ip.clone(),
        })
        .collect();
    let _ = writeln!(out, "{}", render_table(&devices));
    let _ = writeln!(out, "\nObjects ({})", rendered.objects.len());
    let objects: Vec<ObjectRow> = rendered.objects.iter().map(ObjectRow::from).collect();
    let _ = write!(out, "{}", render_table(&objects));
    out
}

pub fn handle(args: &RenderArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_config_or_default();
    let profile = cfg.profiles.get(&config::active_profile_name(global, &cfg));

    let set = config::template_set(&args.template, profile)?;
    let params = config::parameters(&args.template, profile, &set);

    if args.placeholders {
        let rows: Vec<Placeholder> = set
            .placeholders()
            .into_iter()
            .map(|name| Placeholder {
                value: params.get(&name).unwrap_or("(missing)").to_owned(),
                name,
            })
            .collect();
        let out = output::render_list(
            &global.output,
            &rows,
            |p| Placeholder {
                name: p.name.clone(),
                value: p.value.clone(),
            },
            |p| p.name.clone(),
        );
        output::print_output(&out, global.quiet);
        return Ok(());
    }

    let rendered = set.render(&params)?;
    let out = output::render_single(&global.output, &rendered, detail, |r| {
        r.objects
            .iter()
            .map(|o| format!("{}:{}", o.kind, o.name))
            .collect::<Vec<_>>()
            .join("\n")
    });
    output::print_output(&out, global.quiet);
    Ok(())
}
