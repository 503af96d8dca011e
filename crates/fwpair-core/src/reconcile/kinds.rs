// Per-kind reconciliation table.

use serde_json::Value;

use crate::model::ObjectKind;

/// Where a kind's collection lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Domain,
    /// Under the primary device record (`{device}`).
    Device,
    /// Under the HA pair record (`{ha}`).
    HaPair,
    /// Under the object named by `parent` (`{parent}`).
    Parent,
}

/// How an existing remote object is recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// `name` equals the logical name.
    Name,
    /// The referenced object's `id` under this field matches.
    RefId(&'static str),
    /// Static route: same `interfaceName` and the same set of selected networks.
    Route,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindSpec {
    pub kind: ObjectKind,
    /// Collection path with `{device}`, `{ha}` or `{parent}` placeholders.
    pub collection: &'static str,
    pub scope: Scope,
    pub lookup: Lookup,
    /// Physical and monitored interfaces exist on the controller already
    /// and can only be updated.
    pub creatable: bool,
    /// Objects only reference kinds of strictly lower layers.
    pub layer: u8,
}

pub const PLATFORM_POLICIES: &str = "policy/ftdplatformsettingspolicies";
pub const ACCESS_POLICIES: &str = "policy/accesspolicies";

const fn entry(
    kind: ObjectKind,
    collection: &'static str,
    scope: Scope,
    lookup: Lookup,
    creatable: bool,
    layer: u8,
) -> KindSpec {
    KindSpec {
        kind,
        collection,
        scope,
        lookup,
        creatable,
        layer,
    }
}

pub fn spec(kind: ObjectKind) -> KindSpec {
    match kind {
        ObjectKind::Network => entry(kind, "object/networks", Scope::Domain, Lookup::Name, true, 0),
        ObjectKind::Host => entry(kind, "object/hosts", Scope::Domain, Lookup::Name, true, 0),
        ObjectKind::Zone => entry(kind, "object/securityzones", Scope::Domain, Lookup::Name, true, 0),
        ObjectKind::Interface => entry(
            kind,
            "devices/devicerecords/{device}/physicalinterfaces",
            Scope::Device,
            Lookup::Name,
            false,
            1,
        ),
        ObjectKind::MonitoredInterface => entry(
            kind,
            "devicehapairs/ftddevicehapairs/{ha}/monitoredinterfaces",
            Scope::HaPair,
            Lookup::Name,
            false,
            2,
        ),
        ObjectKind::Route => entry(
            kind,
            "devices/devicerecords/{device}/routing/ipv4staticroutes",
            Scope::Device,
            Lookup::Route,
            true,
            3,
        ),
        ObjectKind::NatPolicy => entry(kind, "policy/ftdnatpolicies", Scope::Domain, Lookup::Name, true, 4),
        ObjectKind::NatRule => entry(
            kind,
            "policy/ftdnatpolicies/{parent}/autonatrules",
            Scope::Parent,
            Lookup::RefId("originalNetwork"),
            true,
            5,
        ),
        ObjectKind::NatAssignment => entry(
            kind,
            "assignment/policyassignments",
            Scope::Domain,
            Lookup::Name,
            true,
            6,
        ),
        ObjectKind::PlatformSettings => entry(
            kind,
            "assignment/policyassignments",
            Scope::Domain,
            Lookup::Name,
            true,
            7,
        ),
    }
}

impl KindSpec {
    /// Whether `remote` is the controller's copy of the object named
    /// `name` with resolved desired fields `desired`.
    pub fn matches(&self, name: &str, desired: &Value, remote: &Value) -> bool {
        match self.lookup {
            Lookup::Name => remote.get("name").and_then(Value::as_str) == Some(name),
            Lookup::RefId(field) => {
                let id = |v: &Value| {
                    v.get(field)
                        .and_then(|f| f.get("id"))
                        .and_then(Value::as_str)
                        .map(str::to_owned)
                };
                id(desired).is_some() && id(desired) == id(remote)
            }
            Lookup::Route => {
                let iface = |v: &Value| v.get("interfaceName").and_then(Value::as_str).map(str::to_owned);
                iface(desired).is_some()
                    && iface(desired) == iface(remote)
                    && network_ids(desired) == network_ids(remote)
            }
        }
    }
}

fn network_ids(route: &Value) -> Vec<String> {
    let mut ids: Vec<String> = route
        .get("selectedNetworks")
        .and_then(Value::as_array)
        .map(|nets| {
            nets.iter()
                .filter_map(|n| n.get("id").and_then(Value::as_str))
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();
    ids.sort();
    ids
}
