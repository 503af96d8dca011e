// ── Device registration ──
//
// Submit both firewalls to the controller, then wait until each shows up
// healthy with its initial policy deployed. A device that already exists
// under its hostname is not submitted again.

use std::collections::HashSet;

use fwpair_api::FmcClient;
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::error::CoreError;
use crate::model::{Device, Failure, FailureKind};
use crate::poll::{Poll, poll_until};
use crate::template::RenderedTemplates;

/// Devices in role order, seeded from the rendered device templates.
pub fn devices_from(templates: &RenderedTemplates) -> Vec<Device> {
    templates
        .devices
        .iter()
        .map(|t| Device::new(t.role, t.hostname.clone(), t.management_ip.clone()))
        .collect()
}

/// Register every pending device and wait for it to become ready.
///
/// A missing access policy is a precondition failure: nothing is submitted
/// and the devices stay pending. Per-device failures are recorded on the
/// device; only fatal errors are returned.
pub async fn register_devices(
    client: &mut FmcClient,
    config: &RunConfig,
    templates: &RenderedTemplates,
    devices: &mut [Device],
) -> Result<(), CoreError> {
    let policy = client
        .find_access_policy(&config.access_policy)
        .await?
        .ok_or_else(|| {
            CoreError::precondition(format!(
                "access policy {} not found on the controller",
                config.access_policy
            ))
        })?;

    for device in devices.iter_mut() {
        device.begin_registration()?;

        if client.find_device_record(&device.hostname).await?.is_some() {
            info!(device = %device.hostname, "device already known to the controller, not submitting");
            continue;
        }

        let body = registration_body(
            &templates.device(device.role).payload,
            &policy.id,
            config.registration_key.expose_secret(),
        );
        match client.register_device(&body).await {
            Ok(_) => info!(device = %device.hostname, ip = %device.management_ip, "registration submitted"),
            Err(e) => {
                let e = CoreError::from(e);
                if e.is_fatal() {
                    return Err(e);
                }
                warn!(device = %device.hostname, error = %e, "registration rejected");
                device.mark_failed(Failure::new(FailureKind::Rejected, e.to_string()))?;
            }
        }
    }

    await_registration(client, config, devices).await
}

fn registration_body(template: &Value, policy_id: &str, reg_key: &str) -> Value {
    let mut body = template.clone();
    if let Value::Object(map) = &mut body {
        map.insert("regKey".into(), Value::String(reg_key.to_owned()));
        map.insert(
            "accessPolicy".into(),
            json!({ "id": policy_id, "type": "AccessPolicy" }),
        );
    }
    body
}

async fn await_registration(
    client: &mut FmcClient,
    config: &RunConfig,
    devices: &mut [Device],
) -> Result<(), CoreError> {
    if !devices.iter().any(Device::is_registering) {
        return Ok(());
    }

    let mut seen: HashSet<String> = HashSet::new();
    let waited = poll_until(&config.registration_poll, "device registration", async || {
        for device in devices.iter_mut().filter(|d| d.is_registering()) {
            match client.find_device_record(&device.hostname).await? {
                Some(record) => {
                    seen.insert(device.hostname.clone());
                    if record.is_ready() {
                        device.mark_registered(record.id)?;
                    }
                }
                None if seen.contains(&device.hostname) => {
                    device.mark_failed(Failure::new(
                        FailureKind::Disappeared,
                        "device record vanished from the controller",
                    ))?;
                }
                None => {}
            }
        }
        Ok(if devices.iter().any(Device::is_registering) {
            Poll::Pending
        } else {
            Poll::Ready(())
        })
    })
    .await;

    match waited {
        Ok(()) => Ok(()),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            let kind = if e.is_timeout() {
                FailureKind::Timeout
            } else {
                FailureKind::Api
            };
            for device in devices.iter_mut().filter(|d| d.is_registering()) {
                warn!(device = %device.hostname, error = %e, "registration did not complete");
                device.mark_failed(Failure::new(kind, e.to_string()))?;
            }
            Ok(())
        }
    }
}

/// Pick up devices registered by an earlier run.
///
/// Used when the register stage is skipped. Devices absent from the
/// controller stay pending.
pub async fn discover_devices(client: &mut FmcClient, devices: &mut [Device]) -> Result<(), CoreError> {
    for device in devices.iter_mut() {
        if let Some(record) = client.find_device_record(&device.hostname).await? {
            device.begin_registration()?;
            device.mark_registered(record.id)?;
        } else {
            warn!(device = %device.hostname, "device not registered on the controller");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_carries_key_and_policy() {
        let body = registration_body(
            &json!({ "name": "fw-01", "hostName": "192.0.2.11" }),
            "pol-1",
            "k3y",
        );
        assert_eq!(body["regKey"], "k3y");
        assert_eq!(body["accessPolicy"]["id"], "pol-1");
        assert_eq!(body["name"], "fw-01");
    }
}
