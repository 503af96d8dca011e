// ── HA pairing ──
//
// Join the two registered devices into a failover pair and wait until the
// controller reports one side active and the other standby.

use fwpair_api::FmcClient;
use fwpair_api::models::HaPairRecord;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::error::CoreError;
use crate::model::{Device, DeviceRole, Failure, FailureKind, HaPair};
use crate::poll::{Poll, poll_until};

/// Member states that complete pairing.
const SETTLED: [&str; 2] = ["active", "standby"];
const BROKEN: [&str; 2] = ["failed", "disabled"];

fn member_uuids(devices: &[Device]) -> Option<(String, String)> {
    let uuid = |role| {
        devices
            .iter()
            .find(|d| d.role == role && d.is_registered())
            .and_then(|d| d.remote_uuid.clone())
    };
    Some((uuid(DeviceRole::Primary)?, uuid(DeviceRole::Secondary)?))
}

/// Create the HA pair (or resume an existing one) and wait for it to settle.
///
/// Both devices must be registered; otherwise a precondition error is
/// returned and the pair stays `not_started`.
pub async fn pair_devices(
    client: &mut FmcClient,
    config: &RunConfig,
    template: &Value,
    devices: &[Device],
    pair: &mut HaPair,
) -> Result<(), CoreError> {
    let (primary, secondary) = member_uuids(devices).ok_or_else(|| {
        CoreError::precondition("both devices must be registered before pairing")
    })?;

    if let Some(existing) = client.find_ha_pair(&pair.name).await? {
        info!(pair = %pair.name, id = %existing.id, "HA pair already exists, resuming");
        pair.begin(primary, secondary)?;
        pair.remote_uuid = Some(existing.id);
    } else {
        let Some(link_id) = client
            .find_physical_interface(&primary, &pair.ha_interface_name)
            .await?
            .map(|i| i.id)
        else {
            let message = format!(
                "failover interface {} not found on the primary device",
                pair.ha_interface_name
            );
            warn!(pair = %pair.name, %message, "cannot pair");
            pair.fail_precondition(Failure::new(FailureKind::Precondition, message))?;
            return Ok(());
        };
        if client
            .find_physical_interface(&secondary, &pair.ha_interface_name)
            .await?
            .is_none()
        {
            let message = format!(
                "failover interface {} not found on the secondary device",
                pair.ha_interface_name
            );
            warn!(pair = %pair.name, %message, "cannot pair");
            pair.fail_precondition(Failure::new(FailureKind::Precondition, message))?;
            return Ok(());
        }

        let body = pairing_body(template, &pair.name, &primary, &secondary, &link_id);
        pair.begin(primary, secondary)?;
        match client.create_ha_pair(&body).await {
            Ok(resp) => {
                // Creation is asynchronous; the id may only appear on a later lookup.
                pair.remote_uuid = resp.get("id").and_then(Value::as_str).map(str::to_owned);
                info!(pair = %pair.name, "HA pair creation submitted");
            }
            Err(e) => {
                let e = CoreError::from(e);
                if e.is_fatal() {
                    return Err(e);
                }
                warn!(pair = %pair.name, error = %e, "HA pair rejected");
                pair.mark_failed(Failure::new(FailureKind::Rejected, e.to_string()))?;
                return Ok(());
            }
        }
    }

    await_pairing(client, config, pair).await
}

fn pairing_body(template: &Value, name: &str, primary: &str, secondary: &str, link_id: &str) -> Value {
    let mut body = template.clone();
    body["name"] = Value::String(name.to_owned());
    body["primary"] = json!({ "id": primary, "type": "Device" });
    body["secondary"] = json!({ "id": secondary, "type": "Device" });
    for link in ["lanFailover", "statefulFailover"] {
        if let Some(iface) = body
            .get_mut("ftdHABootstrap")
            .and_then(|b| b.get_mut(link))
            .and_then(|l| l.get_mut("interfaceObject"))
        {
            iface["id"] = Value::String(link_id.to_owned());
        }
    }
    body
}

enum Settled {
    Active,
    Failed(String),
}

async fn await_pairing(
    client: &mut FmcClient,
    config: &RunConfig,
    pair: &mut HaPair,
) -> Result<(), CoreError> {
    let waited = poll_until(&config.pairing_poll, "HA pairing", async || {
        let record = match &pair.remote_uuid {
            Some(id) => client.get_ha_pair(id).await?,
            None => match client.find_ha_pair(&pair.name).await? {
                Some(found) => {
                    pair.remote_uuid = Some(found.id.clone());
                    client.get_ha_pair(&found.id).await?
                }
                None => return Ok(Poll::Pending),
            },
        };
        record_states(pair, &record);
        Ok(settle(&record).map_or(Poll::Pending, Poll::Ready))
    })
    .await;

    match waited {
        Ok(Settled::Active) => pair.mark_active(),
        Ok(Settled::Failed(message)) => {
            pair.mark_failed(Failure::new(FailureKind::Reported, message))
        }
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            let kind = if e.is_timeout() {
                FailureKind::Timeout
            } else {
                FailureKind::Api
            };
            pair.mark_failed(Failure::new(kind, e.to_string()))
        }
    }
}

fn record_states(pair: &mut HaPair, record: &HaPairRecord) {
    pair.primary_state = record.primary_status().map(str::to_owned);
    pair.secondary_state = record.secondary_status().map(str::to_owned);
}

fn settle(record: &HaPairRecord) -> Option<Settled> {
    let primary = record.primary_status()?.to_ascii_lowercase();
    let secondary = record.secondary_status()?.to_ascii_lowercase();
    if BROKEN.contains(&primary.as_str()) || BROKEN.contains(&secondary.as_str()) {
        return Some(Settled::Failed(format!(
            "controller reports primary {primary}, secondary {secondary}"
        )));
    }
    if SETTLED.contains(&primary.as_str()) && SETTLED.contains(&secondary.as_str()) && primary != secondary {
        return Some(Settled::Active);
    }
    None
}

/// Pick up a pair created by an earlier run.
///
/// Used when the pair stage is skipped: an existing pair whose members are
/// both settled counts as active.
pub async fn discover_pair(
    client: &mut FmcClient,
    devices: &[Device],
    pair: &mut HaPair,
) -> Result<(), CoreError> {
    let Some((primary, secondary)) = member_uuids(devices) else {
        return Ok(());
    };
    let Some(found) = client.find_ha_pair(&pair.name).await? else {
        warn!(pair = %pair.name, "HA pair not found on the controller");
        return Ok(());
    };
    let record = client.get_ha_pair(&found.id).await?;
    pair.begin(primary, secondary)?;
    pair.remote_uuid = Some(record.id.clone());
    record_states(pair, &record);
    match settle(&record) {
        Some(Settled::Active) => pair.mark_active(),
        Some(Settled::Failed(message)) => {
            pair.mark_failed(Failure::new(FailureKind::Reported, message))
        }
        None => pair.mark_failed(Failure::new(
            FailureKind::Reported,
            "existing pair has not settled",
        )),
    }
}
