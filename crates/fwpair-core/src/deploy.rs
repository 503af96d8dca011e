// ── Deployment ──
//
// Push pending configuration to the pair and track the job to a terminal
// state, then take a health snapshot of what the controller reports.

use std::collections::HashSet;

use chrono::Utc;
use fwpair_api::FmcClient;
use fwpair_api::models::{DeployableDevice, DeploymentRequest, JobHistory};
use tracing::{debug, info, warn};

use crate::config::RunConfig;
use crate::error::CoreError;
use crate::model::{
    DeployStatus, DeploymentJob, Device, DeviceDeployResult, DeviceHealth, HaPair, HealthSnapshot,
    JobStatus,
};
use crate::poll::{Poll, poll_until};

/// Deploy to both members of an active pair.
///
/// Nothing is submitted unless the pair is active. When the controller has
/// nothing pending for the pair the job ends `succeeded` without a request.
pub async fn deploy(
    client: &mut FmcClient,
    config: &RunConfig,
    devices: &[Device],
    pair: &HaPair,
) -> Result<DeploymentJob, CoreError> {
    if !pair.is_active() {
        return Err(CoreError::precondition(format!(
            "HA pair {} is {}, deployment requires an active pair",
            pair.name, pair.status
        )));
    }
    let targets: Vec<String> = [&pair.primary_uuid, &pair.secondary_uuid]
        .into_iter()
        .flatten()
        .cloned()
        .collect();

    let names: HashSet<&str> = devices
        .iter()
        .map(|d| d.hostname.as_str())
        .chain([pair.name.as_str()])
        .collect();
    let ids: HashSet<&str> = [&pair.primary_uuid, &pair.secondary_uuid, &pair.remote_uuid]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .collect();

    let deployable = client.list_deployable_devices().await?;
    let Some(version) = pending_version(&deployable, &names, &ids) else {
        info!(pair = %pair.name, "no pending changes to deploy");
        return Ok(DeploymentJob::nothing_to_deploy(targets));
    };

    let mut job = DeploymentJob::new(targets.clone());
    job.version = Some(version.clone());

    let request = DeploymentRequest::new(version, targets, config.deployment_note.clone());
    let submitted_at = Utc::now().timestamp_millis();
    let accepted = match client.submit_deployment(&request).await.map_err(CoreError::from) {
        Ok(accepted) => accepted,
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            warn!(pair = %pair.name, error = %e, "deployment request rejected");
            job.status = JobStatus::Failed;
            job.reason = Some(match e {
                CoreError::Api { message, .. } => message,
                other => other.to_string(),
            });
            return Ok(job);
        }
    };
    job.job_id = accepted.task_id().map(str::to_owned);
    job.status = JobStatus::Deploying;
    info!(pair = %pair.name, task = ?job.job_id, "deployment submitted");

    let waited = poll_until(&config.deployment_poll, "deployment", async || {
        let histories = client.list_job_histories().await?;
        let Some(history) = find_job(&histories, job.job_id.as_deref(), &ids, submitted_at) else {
            debug!("deployment job not listed yet");
            return Ok(Poll::Pending);
        };
        let results = device_results(history, &ids);
        Ok(match DeploymentJob::aggregate(&results) {
            Some(status) => Poll::Ready((status, results)),
            None => {
                job.per_device_results = results;
                Poll::Pending
            }
        })
    })
    .await;

    match waited {
        Ok((status, results)) => {
            job.status = status;
            job.per_device_results = results;
            info!(pair = %pair.name, status = %job.status, "deployment finished");
        }
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            warn!(pair = %pair.name, error = %e, "deployment did not complete");
            job.status = JobStatus::Failed;
            job.reason = Some(if e.is_timeout() {
                "timeout".into()
            } else {
                e.to_string()
            });
        }
    }
    Ok(job)
}

/// Highest pending version among the deployable entries of this pair.
fn pending_version(
    deployable: &[DeployableDevice],
    names: &HashSet<&str>,
    ids: &HashSet<&str>,
) -> Option<String> {
    deployable
        .iter()
        .filter(|d| {
            let by_name = d.name.as_deref().is_some_and(|n| names.contains(n));
            let by_id = d
                .device
                .as_ref()
                .is_some_and(|r| ids.contains(r.id.as_str()));
            by_name || by_id
        })
        .filter_map(|d| d.version.clone())
        .max_by_key(|v| v.parse::<u64>().unwrap_or_default())
}

/// The job with `task_id`. Without a task id, the newest job touching the
/// pair that started at or after `submitted_at` (epoch millis).
fn find_job<'a>(
    histories: &'a [JobHistory],
    task_id: Option<&str>,
    ids: &HashSet<&str>,
    submitted_at: i64,
) -> Option<&'a JobHistory> {
    if let Some(task) = task_id {
        return histories.iter().find(|h| h.id == task);
    }
    histories.iter().find(|h| {
        h.start_millis().is_some_and(|t| t >= submitted_at)
            && h.device_list
                .iter()
                .any(|d| ids.contains(d.device_uuid.as_str()))
    })
}

fn device_results(history: &JobHistory, ids: &HashSet<&str>) -> Vec<DeviceDeployResult> {
    history
        .device_list
        .iter()
        .filter(|d| ids.contains(d.device_uuid.as_str()))
        .map(|d| DeviceDeployResult {
            device_uuid: d.device_uuid.clone(),
            device_name: d.device_name.clone(),
            status: DeployStatus::from_remote(d.deployment_status.as_deref()),
            message: d.message.clone(),
        })
        .collect()
}

/// Controller view of the devices and the pair. Lookups that fail are
/// logged and left out.
pub async fn health_snapshot(client: &mut FmcClient, devices: &[Device], pair: &HaPair) -> HealthSnapshot {
    let mut snapshot = HealthSnapshot {
        taken_at: Some(Utc::now()),
        ..HealthSnapshot::default()
    };

    for uuid in devices.iter().filter_map(|d| d.remote_uuid.as_deref()) {
        match client.get_device_record(uuid).await {
            Ok(record) => snapshot.devices.push(DeviceHealth {
                name: record.name,
                remote_uuid: record.id,
                health_status: record.health_status,
                deployment_status: record.deployment_status,
                sw_version: record.sw_version,
            }),
            Err(e) => warn!(device = %uuid, error = %e, "health lookup failed"),
        }
    }

    if let Some(id) = &pair.remote_uuid {
        match client.get_ha_pair(id).await {
            Ok(record) => {
                snapshot.ha_primary_status = record.primary_status().map(str::to_owned);
                snapshot.ha_secondary_status = record.secondary_status().map(str::to_owned);
            }
            Err(e) => warn!(pair = %pair.name, error = %e, "HA health lookup failed"),
        }
    }
    snapshot
}
