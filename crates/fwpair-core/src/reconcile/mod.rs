// ── Object reconciler ──
//
// One routine for every kind of configuration object: look the object up,
// compare, then create, update or leave it. Kind-specific facts (where the
// collection lives, how an object is recognised, whether it can be created)
// come from the `kinds` table. Objects run in layer order so references
// always point at objects that already carry a remote UUID.

pub mod kinds;
pub mod payload;

use std::collections::{HashMap, HashSet};

use fwpair_api::FmcClient;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::model::{ObjectKind, ObjectReport, ObjectSpec, Outcome, Reference};
use kinds::{KindSpec, Scope};

/// Remote identifiers of the pairing context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeIds {
    pub primary: Option<String>,
    pub secondary: Option<String>,
    pub ha: Option<String>,
}

type Key = (ObjectKind, String);

// ── Plan ─────────────────────────────────────────────────────────────

/// A validated object, ready to run.
#[derive(Debug, Clone)]
struct Planned {
    spec: ObjectSpec,
    kind: KindSpec,
    refs: Vec<Reference>,
    parent: Option<Key>,
    /// Objects of this plan that must succeed first.
    depends_on: Vec<Key>,
}

/// Objects sorted by layer, with every intra-plan dependency pointing at a
/// strictly lower layer.
#[derive(Debug, Clone)]
pub struct Plan {
    entries: Vec<Planned>,
}

impl Plan {
    pub fn build(objects: &[ObjectSpec]) -> Result<Self, CoreError> {
        let mut seen = HashSet::new();
        for o in objects {
            if !seen.insert((o.kind, o.name.clone())) {
                return Err(plan_error(format!("duplicate object {}:{}", o.kind, o.name)));
            }
        }

        let layer_of = |key: &Key| kinds::spec(key.0).layer;
        let mut entries = Vec::with_capacity(objects.len());

        for o in objects {
            let kind = kinds::spec(o.kind);
            let this = format!("{}:{}", o.kind, o.name);
            let refs = payload::references(&o.payload)?;

            let parent = match (&o.parent, kind.scope) {
                (Some(raw), Scope::Parent) => Some(object_key(raw, &this)?),
                (None, Scope::Parent) => {
                    return Err(plan_error(format!("{this} requires a parent")));
                }
                (Some(_), _) => {
                    return Err(plan_error(format!("{this} does not take a parent")));
                }
                (None, _) => None,
            };
            if let Some(p) = &parent {
                if !seen.contains(p) {
                    return Err(plan_error(format!(
                        "{this}: parent {}:{} is not part of the plan",
                        p.0, p.1
                    )));
                }
            }

            let mut depends_on = Vec::new();
            for raw in &o.depends_on {
                let key = object_key(raw, &this)?;
                if !seen.contains(&key) {
                    return Err(plan_error(format!(
                        "{this}: depends on unknown object {raw}"
                    )));
                }
                depends_on.push(key);
            }

            let intra_plan = refs
                .iter()
                .filter_map(|r| match r {
                    Reference::Object { kind, name } => Some((*kind, name.clone())),
                    _ => None,
                })
                .filter(|k| seen.contains(k));
            for key in intra_plan.chain(parent.clone()).chain(depends_on.clone()) {
                if layer_of(&key) >= kind.layer {
                    return Err(plan_error(format!(
                        "{this} references {}:{} in the same or a later layer",
                        key.0, key.1
                    )));
                }
                if !depends_on.contains(&key) {
                    depends_on.push(key);
                }
            }

            entries.push(Planned {
                spec: o.clone(),
                kind,
                refs,
                parent,
                depends_on,
            });
        }

        entries.sort_by_key(|e| e.kind.layer);
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn plan_error(message: String) -> CoreError {
    CoreError::Plan { message }
}

fn object_key(raw: &str, owner: &str) -> Result<Key, CoreError> {
    match Reference::parse(raw)? {
        Reference::Object { kind, name } => Ok((kind, name)),
        other => Err(plan_error(format!(
            "{owner}: {other} cannot be a parent or dependency"
        ))),
    }
}

// ── Reconciliation ──────────────────────────────────────────────────

/// Reconcile every object of `objects` against the controller.
///
/// Per-object failures are recorded as outcomes. Only errors after which
/// the controller is unreachable (authentication, connection) are returned.
pub async fn reconcile(
    client: &mut FmcClient,
    objects: &[ObjectSpec],
    scope: &ScopeIds,
) -> Result<Vec<ObjectReport>, CoreError> {
    let plan = Plan::build(objects)?;
    info!(objects = plan.len(), "reconciling configuration objects");

    let mut done: HashMap<Key, ObjectReport> = HashMap::new();
    let mut order = Vec::with_capacity(plan.len());

    for entry in &plan.entries {
        let key = (entry.spec.kind, entry.spec.name.clone());
        let report = reconcile_one(client, entry, scope, &done).await?;
        match &report.outcome {
            Outcome::Created | Outcome::Updated => {
                info!(object = %format!("{}:{}", key.0, key.1), outcome = report.outcome.label(), "object reconciled");
            }
            Outcome::Unchanged => debug!(object = %format!("{}:{}", key.0, key.1), "object unchanged"),
            Outcome::Failed { reason } => {
                warn!(object = %format!("{}:{}", key.0, key.1), %reason, "object failed");
            }
            Outcome::Blocked { dependency } => {
                warn!(object = %format!("{}:{}", key.0, key.1), %dependency, "object blocked");
            }
        }
        order.push(key.clone());
        done.insert(key, report);
    }

    Ok(order
        .into_iter()
        .filter_map(|k| done.remove(&k))
        .collect())
}

struct Attempt {
    remote_uuid: Option<String>,
    existed_before: bool,
}

async fn reconcile_one(
    client: &mut FmcClient,
    entry: &Planned,
    scope: &ScopeIds,
    done: &HashMap<Key, ObjectReport>,
) -> Result<ObjectReport, CoreError> {
    let mut attempt = Attempt {
        remote_uuid: None,
        existed_before: false,
    };
    let outcome = match run_one(client, entry, scope, done, &mut attempt).await {
        Ok(outcome) => outcome,
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => Outcome::Failed {
            reason: e.to_string(),
        },
    };
    Ok(ObjectReport {
        kind: entry.spec.kind,
        logical_name: entry.spec.name.clone(),
        remote_uuid: attempt.remote_uuid,
        existed_before: attempt.existed_before,
        outcome,
    })
}

async fn run_one(
    client: &mut FmcClient,
    entry: &Planned,
    scope: &ScopeIds,
    done: &HashMap<Key, ObjectReport>,
    attempt: &mut Attempt,
) -> Result<Outcome, CoreError> {
    // Dependencies first: no request for an object whose inputs failed.
    for dep in &entry.depends_on {
        if done.get(dep).is_some_and(|r| r.outcome.is_failure()) {
            return Ok(Outcome::Blocked {
                dependency: format!("{}:{}", dep.0, dep.1),
            });
        }
    }

    let mut ids = HashMap::new();
    for r in &entry.refs {
        match resolve_reference(client, r, scope, done).await? {
            Some(id) => {
                ids.insert(r.clone(), id);
            }
            None => {
                return Ok(Outcome::Failed {
                    reason: format!("unresolved reference {r}"),
                });
            }
        }
    }

    let parent_id = entry
        .parent
        .as_ref()
        .and_then(|p| done.get(p))
        .and_then(|r| r.remote_uuid.clone());
    let collection = match collection_path(&entry.kind, scope, parent_id.as_deref()) {
        Ok(path) => path,
        Err(reason) => return Ok(Outcome::Failed { reason }),
    };

    let desired = payload::apply_refs(&entry.spec.payload, &ids);
    let existing = client
        .list_all(&collection)
        .await?
        .into_iter()
        .find(|remote| entry.kind.matches(&entry.spec.name, &desired, remote));

    match existing {
        Some(remote) => {
            let Some(id) = remote.get("id").and_then(Value::as_str).map(str::to_owned) else {
                return Ok(Outcome::Failed {
                    reason: "controller object carries no id".into(),
                });
            };
            attempt.existed_before = true;
            attempt.remote_uuid = Some(id.clone());

            if payload::is_subset(&desired, &remote) {
                return Ok(Outcome::Unchanged);
            }
            let body = payload::merge_for_update(&remote, &desired);
            client.put(&format!("{collection}/{id}"), &body).await?;
            Ok(Outcome::Updated)
        }
        None if !entry.kind.creatable => Ok(Outcome::Failed {
            reason: format!("{} not found on the controller", entry.spec.name),
        }),
        None => {
            let created = client.post(&collection, &desired).await?;
            match created.get("id").and_then(Value::as_str) {
                Some(id) => {
                    attempt.remote_uuid = Some(id.to_owned());
                    Ok(Outcome::Created)
                }
                None => Ok(Outcome::Failed {
                    reason: "create response carried no id".into(),
                }),
            }
        }
    }
}

/// Resolve a reference to a remote UUID.
///
/// Objects of this run win; anything else is looked up by name on the
/// controller. `None` when nothing matches.
async fn resolve_reference(
    client: &mut FmcClient,
    reference: &Reference,
    scope: &ScopeIds,
    done: &HashMap<Key, ObjectReport>,
) -> Result<Option<String>, CoreError> {
    let lookup = |collection: String, name: &str| (collection, name.to_owned());
    let (collection, name) = match reference {
        Reference::DevicePrimary => return Ok(scope.primary.clone()),
        Reference::DeviceSecondary => return Ok(scope.secondary.clone()),
        Reference::HaPair => return Ok(scope.ha.clone()),
        Reference::Object { kind, name } => {
            if let Some(report) = done.get(&(*kind, name.clone())) {
                return Ok(report.remote_uuid.clone());
            }
            let spec = kinds::spec(*kind);
            if spec.lookup != kinds::Lookup::Name {
                return Ok(None);
            }
            match collection_path(&spec, scope, None) {
                Ok(path) => lookup(path, name),
                Err(_) => return Ok(None),
            }
        }
        Reference::PlatformPolicy(name) => lookup(kinds::PLATFORM_POLICIES.to_owned(), name),
        Reference::AccessPolicy(name) => lookup(kinds::ACCESS_POLICIES.to_owned(), name),
    };

    debug!(%reference, %collection, "resolving reference on controller");
    Ok(client
        .find_by_name(&collection, &name)
        .await?
        .and_then(|found| found.get("id").and_then(Value::as_str).map(str::to_owned)))
}

fn collection_path(
    spec: &KindSpec,
    scope: &ScopeIds,
    parent: Option<&str>,
) -> Result<String, String> {
    let fill = |placeholder: &str, id: Option<&str>, what: &str| {
        id.map(|id| spec.collection.replace(placeholder, id))
            .ok_or_else(|| format!("no {what} in scope for {}", spec.kind))
    };
    match spec.scope {
        Scope::Domain => Ok(spec.collection.to_owned()),
        Scope::Device => fill("{device}", scope.primary.as_deref(), "primary device"),
        Scope::HaPair => fill("{ha}", scope.ha.as_deref(), "HA pair"),
        Scope::Parent => fill("{parent}", parent, "parent object"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(kind: ObjectKind, name: &str, payload: Value) -> ObjectSpec {
        ObjectSpec {
            kind,
            name: name.into(),
            payload,
            parent: None,
            depends_on: Vec::new(),
        }
    }

    #[test]
    fn plan_orders_by_layer() {
        let plan = Plan::build(&[
            spec(
                ObjectKind::Route,
                "default",
                json!({ "gateway": { "object": { "$ref": "host:gw" } } }),
            ),
            spec(ObjectKind::Host, "gw", json!({ "name": "gw" })),
        ])
        .expect("valid plan");
        assert_eq!(plan.entries[0].spec.kind, ObjectKind::Host);
        assert_eq!(
            plan.entries[1].depends_on,
            vec![(ObjectKind::Host, "gw".to_owned())]
        );
    }

    #[test]
    fn plan_rejects_same_layer_reference() {
        let err = Plan::build(&[
            spec(ObjectKind::Zone, "z", json!({ "name": "z" })),
            spec(ObjectKind::Network, "n", json!({ "zone": { "$ref": "zone:z" } })),
        ])
        .unwrap_err();
        assert!(matches!(err, CoreError::Plan { .. }));
    }

    #[test]
    fn plan_rejects_duplicates() {
        let err = Plan::build(&[
            spec(ObjectKind::Host, "gw", json!({})),
            spec(ObjectKind::Host, "gw", json!({})),
        ])
        .unwrap_err();
        assert!(matches!(err, CoreError::Plan { .. }));
    }

    #[test]
    fn nat_rule_needs_parent() {
        let err = Plan::build(&[spec(ObjectKind::NatRule, "pat", json!({}))]).unwrap_err();
        assert!(matches!(err, CoreError::Plan { .. }));
    }

    #[test]
    fn external_reference_in_same_layer_is_allowed() {
        // any-ipv4 is a built-in object, not part of the plan.
        Plan::build(&[spec(
            ObjectKind::Network,
            "n",
            json!({ "parent": { "$ref": "network:any-ipv4" } }),
        )])
        .expect("external references are looked up at run time");
    }

    #[test]
    fn scoped_paths_need_context() {
        let route = kinds::spec(ObjectKind::Route);
        assert!(collection_path(&route, &ScopeIds::default(), None).is_err());
        let scope = ScopeIds {
            primary: Some("dev-1".into()),
            ..ScopeIds::default()
        };
        assert_eq!(
            collection_path(&route, &scope, None).as_deref(),
            Ok("devices/devicerecords/dev-1/routing/ipv4staticroutes")
        );
    }
}
