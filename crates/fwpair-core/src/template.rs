// ── Template renderer ──
//
// Request bodies come from three JSON documents (`devices`, `ha`,
// `objects`) whose strings and keys carry `{UPPER_SNAKE}` placeholders.
// Built-in documents are embedded; a directory may override any of them.
// Rendering is all-or-nothing: every missing parameter is reported at once,
// and the object plan is validated, before anything talks to the controller.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::{DeviceRole, ObjectSpec};
use crate::reconcile::Plan;

pub const DEVICES: &str = "devices";
pub const HA: &str = "ha";
pub const OBJECTS: &str = "objects";

const BUILTIN: [(&str, &str); 3] = [
    (DEVICES, include_str!("../templates/devices.json")),
    (HA, include_str!("../templates/ha.json")),
    (OBJECTS, include_str!("../templates/objects.json")),
];

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Z][A-Z0-9_]*)\}").expect("placeholder pattern is valid"));

// ── Parameters ──────────────────────────────────────────────────────

/// Flat key → value mapping fed into the templates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Parameters(BTreeMap<String, String>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

// ── Rendered output ─────────────────────────────────────────────────

/// A device registration body with the fields the orchestrator reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceTemplate {
    pub role: DeviceRole,
    pub hostname: String,
    pub management_ip: String,
    pub payload: Value,
}

/// Templates with every placeholder substituted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedTemplates {
    pub devices: [DeviceTemplate; 2],
    pub ha: Value,
    pub objects: Vec<ObjectSpec>,
}

impl RenderedTemplates {
    pub fn device(&self, role: DeviceRole) -> &DeviceTemplate {
        match role {
            DeviceRole::Primary => &self.devices[0],
            DeviceRole::Secondary => &self.devices[1],
        }
    }
}

// ── Template set ────────────────────────────────────────────────────

/// The named JSON documents of one run.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    docs: IndexMap<String, Value>,
}

impl TemplateSet {
    /// Documents embedded in the binary.
    pub fn builtin() -> Result<Self, CoreError> {
        let docs = BUILTIN
            .iter()
            .map(|(name, raw)| parse_document(name, raw).map(|doc| ((*name).to_owned(), doc)))
            .collect::<Result<IndexMap<_, _>, _>>()?;
        Ok(Self { docs })
    }

    /// Built-ins, overridden by `<dir>/<name>.json` where present.
    pub fn from_dir(dir: &Path) -> Result<Self, CoreError> {
        let mut set = Self::builtin()?;
        let entries = std::fs::read_dir(dir).map_err(|e| {
            CoreError::template(format!("cannot read template directory {}: {e}", dir.display()))
        })?;

        for entry in entries {
            let path = entry
                .map_err(|e| CoreError::template(format!("{}: {e}", dir.display())))?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !set.docs.contains_key(name) {
                warn!(file = %path.display(), "ignoring unknown template");
                continue;
            }
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| CoreError::template(format!("{}: {e}", path.display())))?;
            let doc = parse_document(name, &raw)?;
            debug!(template = name, file = %path.display(), "template overridden");
            set.docs.insert(name.to_owned(), doc);
        }
        Ok(set)
    }

    pub fn document(&self, name: &str) -> Option<&Value> {
        self.docs.get(name)
    }

    /// Every placeholder used across all documents.
    pub fn placeholders(&self) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        for doc in self.docs.values() {
            collect_tokens(doc, &mut found);
        }
        found
    }

    /// Substitute `params` into every document and parse the results.
    pub fn render(&self, params: &Parameters) -> Result<RenderedTemplates, CoreError> {
        let mut missing = BTreeSet::new();
        let rendered: IndexMap<&str, Value> = self
            .docs
            .iter()
            .map(|(name, doc)| (name.as_str(), substitute(doc, params, &mut missing)))
            .collect();

        if !missing.is_empty() {
            let names = missing.into_iter().collect::<Vec<_>>().join(", ");
            return Err(CoreError::template(format!("missing parameters: {names}")));
        }

        let devices = rendered
            .get(DEVICES)
            .ok_or_else(|| CoreError::template("devices template missing"))?;
        let ha = rendered
            .get(HA)
            .ok_or_else(|| CoreError::template("ha template missing"))?;
        let objects = rendered
            .get(OBJECTS)
            .ok_or_else(|| CoreError::template("objects template missing"))?;

        if !ha.is_object() {
            return Err(CoreError::template("ha template must be a JSON object"));
        }

        let objects = object_specs(objects)?;
        Plan::build(&objects)?;

        Ok(RenderedTemplates {
            devices: [
                device_template(devices, DeviceRole::Primary)?,
                device_template(devices, DeviceRole::Secondary)?,
            ],
            ha: ha.clone(),
            objects,
        })
    }
}

fn parse_document(name: &str, raw: &str) -> Result<Value, CoreError> {
    let doc: Value = serde_json::from_str(raw)
        .map_err(|e| CoreError::template(format!("{name}: malformed JSON: {e}")))?;
    if !doc.is_object() {
        return Err(CoreError::template(format!(
            "{name}: top level must be a JSON object"
        )));
    }
    Ok(doc)
}

fn device_template(devices: &Value, role: DeviceRole) -> Result<DeviceTemplate, CoreError> {
    let key = role.to_string();
    let payload = devices
        .get(&key)
        .filter(|v| v.is_object())
        .ok_or_else(|| CoreError::template(format!("devices: missing \"{key}\" object")))?;
    let field = |name: &str| {
        payload
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .ok_or_else(|| CoreError::template(format!("devices.{key}: \"{name}\" is required")))
    };
    Ok(DeviceTemplate {
        role,
        hostname: field("name")?,
        management_ip: field("hostName")?,
        payload: payload.clone(),
    })
}

fn object_specs(objects: &Value) -> Result<Vec<ObjectSpec>, CoreError> {
    let list = objects
        .get(OBJECTS)
        .cloned()
        .ok_or_else(|| CoreError::template("objects: missing \"objects\" array"))?;
    serde_json::from_value(list).map_err(|e| CoreError::template(format!("objects: {e}")))
}

// ── Substitution ────────────────────────────────────────────────────

fn substitute(value: &Value, params: &Parameters, missing: &mut BTreeSet<String>) -> Value {
    match value {
        Value::String(s) => Value::String(substitute_str(s, params, missing)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| substitute(v, params, missing))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    (
                        substitute_str(k, params, missing),
                        substitute(v, params, missing),
                    )
                })
                .collect::<Map<_, _>>(),
        ),
        other => other.clone(),
    }
}

fn substitute_str(s: &str, params: &Parameters, missing: &mut BTreeSet<String>) -> String {
    TOKEN
        .replace_all(s, |caps: &regex::Captures<'_>| {
            let key = &caps[1];
            params.get(key).map_or_else(
                || {
                    missing.insert(key.to_owned());
                    caps[0].to_owned()
                },
                str::to_owned,
            )
        })
        .into_owned()
}

fn collect_tokens(value: &Value, found: &mut BTreeSet<String>) {
    match value {
        Value::String(s) => scan_tokens(s, found),
        Value::Array(items) => items.iter().for_each(|v| collect_tokens(v, found)),
        Value::Object(map) => {
            for (k, v) in map {
                scan_tokens(k, found);
                collect_tokens(v, found);
            }
        }
        _ => {}
    }
}

fn scan_tokens(s: &str, found: &mut BTreeSet<String>) {
    for caps in TOKEN.captures_iter(s) {
        found.insert(caps[1].to_owned());
    }
}
