// ── Orchestrator ──
//
// Runs the pipeline auth → register → pair → reconcile → deploy against one
// controller session. Every run yields a `RunResult`; a stage that cannot
// complete halts the run and the result records where and why.

use chrono::Utc;
use fwpair_api::FmcClient;
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::deploy::{deploy, health_snapshot};
use crate::error::CoreError;
use crate::model::{Device, DeviceRole, HaPair, OutcomeCounts, RunResult, SessionOutcome, Stage};
use crate::pairing::{discover_pair, pair_devices};
use crate::reconcile::{Plan, ScopeIds, reconcile};
use crate::registration::{devices_from, discover_devices, register_devices};
use crate::template::RenderedTemplates;

/// Where and why a run stopped.
struct Halt {
    stage: Stage,
    reason: String,
}

impl Halt {
    fn new(stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            stage,
            reason: reason.into(),
        }
    }
}

fn at(stage: Stage) -> impl FnOnce(CoreError) -> Halt {
    move |e| Halt::new(stage, e.to_string())
}

fn unregistered(devices: &[Device]) -> Option<Halt> {
    devices.iter().find(|d| !d.is_registered()).map(|device| {
        let why = device
            .failure
            .as_ref()
            .map_or_else(|| device.status.to_string(), ToString::to_string);
        Halt::new(
            Stage::Register,
            format!("device {} not registered ({why})", device.hostname),
        )
    })
}

fn inactive(pair: &HaPair) -> Option<Halt> {
    if pair.is_active() {
        return None;
    }
    let why = pair
        .failure
        .as_ref()
        .map_or_else(|| pair.status.to_string(), ToString::to_string);
    Some(Halt::new(
        Stage::Pair,
        format!("HA pair {} not active ({why})", pair.name),
    ))
}

pub struct Orchestrator {
    config: RunConfig,
    templates: RenderedTemplates,
}

impl Orchestrator {
    pub fn new(config: RunConfig, templates: RenderedTemplates) -> Self {
        Self { config, templates }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run the selected stages in pipeline order.
    ///
    /// Authentication always runs. Skipped register and pair stages are
    /// replaced by a lookup of what an earlier run left on the controller.
    pub async fn run(&self, stages: &[Stage]) -> RunResult {
        let mut selected: Vec<Stage> = stages.iter().copied().chain([Stage::Auth]).collect();
        selected.sort_unstable();
        selected.dedup();

        let mut result = RunResult {
            controller: self.config.url.to_string(),
            session: SessionOutcome::NotAttempted,
            stages: selected,
            devices: devices_from(&self.templates),
            ha_pair: HaPair::new(self.config.ha_name.clone(), self.config.ha_interface.clone()),
            objects: Vec::new(),
            counts: OutcomeCounts::default(),
            deployment: None,
            health: None,
            stopped_at: None,
            halt_reason: None,
            started_at: Utc::now(),
            finished_at: None,
        };
        info!(controller = %result.controller, stages = ?result.stages, "run started");

        // A broken object plan never reaches the controller.
        if result.stages.contains(&Stage::Reconcile) {
            if let Err(e) = Plan::build(&self.templates.objects) {
                result.halt(Stage::Reconcile, e.to_string());
                result.finished_at = Some(Utc::now());
                return result;
            }
        }

        let mut client = match FmcClient::authenticate(
            self.config.url.as_str(),
            &self.config.username,
            self.config.password.clone(),
            &self.config.transport(),
        )
        .await
        {
            Ok(client) => {
                result.session = SessionOutcome::Authenticated {
                    domain_uuid: client.domain_uuid().to_owned(),
                };
                client
            }
            Err(e) => {
                let e = CoreError::from(e);
                result.session = SessionOutcome::Failed {
                    message: e.to_string(),
                };
                result.halt(Stage::Auth, e.to_string());
                result.finished_at = Some(Utc::now());
                return result;
            }
        };

        if let Err(halt) = self.run_stages(&mut client, &mut result).await {
            result.halt(halt.stage, halt.reason);
        }

        if let Err(e) = client.revoke().await {
            warn!(error = %e, "token revocation failed");
        }
        result.finished_at = Some(Utc::now());
        info!(
            success = result.is_success(),
            stopped_at = ?result.stopped_at,
            "run finished"
        );
        result
    }

    async fn run_stages(&self, client: &mut FmcClient, result: &mut RunResult) -> Result<(), Halt> {
        let selected = |stage| result.stages.contains(&stage);
        let (register, pair, reconcile_objects, deploy_pair) = (
            selected(Stage::Register),
            selected(Stage::Pair),
            selected(Stage::Reconcile),
            selected(Stage::Deploy),
        );

        // ── Register ──
        if register {
            register_devices(client, &self.config, &self.templates, &mut result.devices)
                .await
                .map_err(at(Stage::Register))?;
            if let Some(halt) = unregistered(&result.devices) {
                return Err(halt);
            }
        } else {
            discover_devices(client, &mut result.devices)
                .await
                .map_err(at(Stage::Register))?;
            // Later stages act on the devices, so they must already exist.
            if pair || reconcile_objects || deploy_pair {
                if let Some(halt) = unregistered(&result.devices) {
                    return Err(halt);
                }
            }
        }

        // ── Pair ──
        if pair {
            pair_devices(
                client,
                &self.config,
                &self.templates.ha,
                &result.devices,
                &mut result.ha_pair,
            )
            .await
            .map_err(at(Stage::Pair))?;
            if let Some(halt) = inactive(&result.ha_pair) {
                return Err(halt);
            }
        } else {
            discover_pair(client, &result.devices, &mut result.ha_pair)
                .await
                .map_err(at(Stage::Pair))?;
            // Network configuration needs an active pair.
            if reconcile_objects || deploy_pair {
                if let Some(halt) = inactive(&result.ha_pair) {
                    return Err(halt);
                }
            }
        }

        // ── Reconcile ──
        if reconcile_objects {
            let uuid = |role| {
                result
                    .devices
                    .iter()
                    .find(|d| d.role == role)
                    .and_then(|d| d.remote_uuid.clone())
            };
            let scope = ScopeIds {
                primary: uuid(DeviceRole::Primary),
                secondary: uuid(DeviceRole::Secondary),
                ha: result.ha_pair.remote_uuid.clone(),
            };
            result.objects = reconcile(client, &self.templates.objects, &scope)
                .await
                .map_err(at(Stage::Reconcile))?;
            result.counts = OutcomeCounts::tally(&result.objects);
            info!(
                created = result.counts.created,
                updated = result.counts.updated,
                unchanged = result.counts.unchanged,
                failed = result.counts.failed,
                blocked = result.counts.blocked,
                "reconciliation finished"
            );
        }

        // ── Deploy ──
        if deploy_pair {
            let job = deploy(client, &self.config, &result.devices, &result.ha_pair)
                .await
                .map_err(at(Stage::Deploy))?;
            result.deployment = Some(job);
            result.health = Some(health_snapshot(client, &result.devices, &result.ha_pair).await);
        }

        Ok(())
    }
}
