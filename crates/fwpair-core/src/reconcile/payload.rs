// Payload helpers: reference markers, material difference, update bodies.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::model::Reference;

pub const REF_KEY: &str = "$ref";

/// Fields the controller owns; never compared, never sent back.
const SERVER_MANAGED: [&str; 2] = ["links", "metadata"];

/// Every `{"$ref": ...}` marker in `payload`, in document order.
pub fn references(payload: &Value) -> Result<Vec<Reference>, CoreError> {
    let mut out = Vec::new();
    collect_refs(payload, &mut out)?;
    Ok(out)
}

fn collect_refs(value: &Value, out: &mut Vec<Reference>) -> Result<(), CoreError> {
    match value {
        Value::Object(map) => {
            if let Some(raw) = map.get(REF_KEY) {
                let raw = raw.as_str().ok_or_else(|| CoreError::Plan {
                    message: format!("{REF_KEY} must be a string, got {raw}"),
                })?;
                out.push(Reference::parse(raw)?);
            }
            for (key, v) in map {
                if key != REF_KEY {
                    collect_refs(v, out)?;
                }
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_refs(v, out)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Replace each marker with `"id": <resolved uuid>`, keeping sibling fields.
///
/// Callers resolve every reference first; an unresolved marker is left in
/// place.
pub fn apply_refs(value: &Value, ids: &HashMap<Reference, String>) -> Value {
    match value {
        Value::Object(map) => {
            let resolved = map
                .get(REF_KEY)
                .and_then(Value::as_str)
                .and_then(|raw| Reference::parse(raw).ok())
                .and_then(|r| ids.get(&r));
            let mut out = Map::with_capacity(map.len());
            for (key, v) in map {
                if key == REF_KEY {
                    if resolved.is_none() {
                        out.insert(key.clone(), v.clone());
                    }
                    continue;
                }
                out.insert(key.clone(), apply_refs(v, ids));
            }
            if let Some(id) = resolved {
                out.insert("id".into(), Value::String(id.clone()));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| apply_refs(v, ids)).collect()),
        other => other.clone(),
    }
}

/// Whether every desired field is present and equal on the remote object.
///
/// Objects compare recursively, arrays order-insensitively (each desired
/// element must be a subset of some remote element).
pub fn is_subset(desired: &Value, remote: &Value) -> bool {
    match (desired, remote) {
        (Value::Object(d), Value::Object(r)) => d
            .iter()
            .filter(|(k, _)| !SERVER_MANAGED.contains(&k.as_str()))
            .all(|(k, dv)| r.get(k).is_some_and(|rv| is_subset(dv, rv))),
        (Value::Array(d), Value::Array(r)) => {
            d.iter().all(|dv| r.iter().any(|rv| is_subset(dv, rv)))
        }
        _ => desired == remote,
    }
}

/// Body for a PUT: the remote object without server-managed fields, with
/// the desired fields merged in. Arrays are unioned so assignments only
/// gain targets.
pub fn merge_for_update(remote: &Value, desired: &Value) -> Value {
    let mut base = remote.clone();
    if let Value::Object(map) = &mut base {
        for key in SERVER_MANAGED {
            map.remove(key);
        }
    }
    deep_merge(&mut base, desired);
    base
}

fn deep_merge(target: &mut Value, desired: &Value) {
    match (target, desired) {
        (Value::Object(t), Value::Object(d)) => {
            for (k, dv) in d {
                match t.get_mut(k) {
                    Some(tv) => deep_merge(tv, dv),
                    None => {
                        t.insert(k.clone(), dv.clone());
                    }
                }
            }
        }
        (Value::Array(t), Value::Array(d)) => {
            for dv in d {
                if !t.iter().any(|tv| is_subset(dv, tv)) {
                    t.push(dv.clone());
                }
            }
        }
        (t, d) => *t = d.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use crate::model::ObjectKind;

    #[test]
    fn collects_nested_references() {
        let payload = json!({
            "selectedNetworks": [{ "$ref": "network:any-ipv4", "type": "Network" }],
            "gateway": { "object": { "$ref": "host:gw", "type": "Host" } }
        });
        let refs = references(&payload).expect("refs");
        assert_eq!(refs.len(), 2);
        assert!(refs.contains(&Reference::Object {
            kind: ObjectKind::Host,
            name: "gw".into()
        }));
    }

    #[test]
    fn markers_become_ids() {
        let payload = json!({
            "gateway": { "object": { "$ref": "host:gw", "type": "Host" } },
            "metricValue": 1
        });
        let ids = HashMap::from([(
            Reference::Object {
                kind: ObjectKind::Host,
                name: "gw".into(),
            },
            "uuid-123".to_owned(),
        )]);
        assert_eq!(
            apply_refs(&payload, &ids),
            json!({
                "gateway": { "object": { "id": "uuid-123", "type": "Host" } },
                "metricValue": 1
            })
        );
    }

    #[test]
    fn subset_ignores_server_fields_and_order() {
        let desired = json!({
            "name": "OUTSIDE_ZONE",
            "targets": [{ "id": "b" }, { "id": "a" }]
        });
        let remote = json!({
            "id": "z1",
            "name": "OUTSIDE_ZONE",
            "links": { "self": "https://fmc/z1" },
            "metadata": { "lastUser": { "name": "admin" } },
            "targets": [{ "id": "a", "type": "Device" }, { "id": "b", "type": "Device" }]
        });
        assert!(is_subset(&desired, &remote));
        assert!(!is_subset(&json!({ "name": "INSIDE_ZONE" }), &remote));
    }

    #[test]
    fn update_body_unions_targets() {
        let remote = json!({
            "id": "pa-1",
            "name": "FTD_Platform",
            "links": { "self": "x" },
            "policy": { "id": "p1", "type": "FTDPlatformSettingsPolicy" },
            "targets": [{ "id": "other", "type": "Device", "name": "fw-99" }]
        });
        let desired = json!({
            "policy": { "id": "p1", "type": "FTDPlatformSettingsPolicy" },
            "targets": [{ "id": "ha-1", "type": "DeviceHAPair" }]
        });
        let body = merge_for_update(&remote, &desired);
        assert_eq!(body["id"], "pa-1");
        assert!(body.get("links").is_none());
        assert_eq!(body["targets"].as_array().map(Vec::len), Some(2));
    }
}
