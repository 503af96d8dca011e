// ── Configuration object types ──

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumIter, EnumString};

use crate::error::CoreError;

/// Kinds of configuration object the reconciler manages.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ObjectKind {
    Network,
    Host,
    Zone,
    Interface,
    MonitoredInterface,
    Route,
    NatPolicy,
    NatRule,
    NatAssignment,
    PlatformSettings,
}

/// A `"<kind>:<name>"` reference used in templates.
///
/// Besides object kinds, references may name controller-side policies
/// (`platform_policy:`, `access_policy:`) and the pairing context
/// (`device:primary`, `device:secondary`, `device:ha`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Reference {
    Object { kind: ObjectKind, name: String },
    PlatformPolicy(String),
    AccessPolicy(String),
    DevicePrimary,
    DeviceSecondary,
    HaPair,
}

impl Reference {
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let (kind, name) = raw.split_once(':').ok_or_else(|| CoreError::Plan {
            message: format!("reference {raw:?} is not of the form kind:name"),
        })?;
        if name.is_empty() {
            return Err(CoreError::Plan {
                message: format!("reference {raw:?} has an empty name"),
            });
        }
        match kind {
            "platform_policy" => Ok(Self::PlatformPolicy(name.to_owned())),
            "access_policy" => Ok(Self::AccessPolicy(name.to_owned())),
            "device" => match name {
                "primary" => Ok(Self::DevicePrimary),
                "secondary" => Ok(Self::DeviceSecondary),
                "ha" => Ok(Self::HaPair),
                other => Err(CoreError::Plan {
                    message: format!("unknown device reference {other:?}"),
                }),
            },
            other => {
                let kind = other.parse::<ObjectKind>().map_err(|_| CoreError::Plan {
                    message: format!("unknown reference kind {other:?} in {raw:?}"),
                })?;
                Ok(Self::Object {
                    kind,
                    name: name.to_owned(),
                })
            }
        }
    }
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Object { kind, name } => write!(f, "{kind}:{name}"),
            Self::PlatformPolicy(name) => write!(f, "platform_policy:{name}"),
            Self::AccessPolicy(name) => write!(f, "access_policy:{name}"),
            Self::DevicePrimary => f.write_str("device:primary"),
            Self::DeviceSecondary => f.write_str("device:secondary"),
            Self::HaPair => f.write_str("device:ha"),
        }
    }
}

/// One desired object as declared in the objects template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSpec {
    pub kind: ObjectKind,
    /// Logical name; the lookup key for name-keyed kinds.
    pub name: String,
    /// Desired fields, possibly containing `{"$ref": ...}` markers.
    pub payload: Value,
    /// Enclosing object for nested collections (NAT rules).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Ordering dependencies not expressed as references.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

/// What reconciliation did with one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Created,
    Updated,
    Unchanged,
    Failed { reason: String },
    /// A dependency failed; no request was issued for this object.
    Blocked { dependency: String },
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::Blocked { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
            Self::Failed { .. } => "failed",
            Self::Blocked { .. } => "blocked",
        }
    }
}

/// Reported state of one object. Desired payloads are not carried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectReport {
    pub kind: ObjectKind,
    pub logical_name: String,
    pub remote_uuid: Option<String>,
    pub existed_before: bool,
    #[serde(flatten)]
    pub outcome: Outcome,
}
