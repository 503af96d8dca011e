// Deployable devices, deployment requests and job history.

use serde_json::Value;

use crate::client::{FmcClient, decode};
use crate::error::Error;
use crate::models::{DeployableDevice, DeploymentAccepted, DeploymentRequest, JobHistory};

pub const DEPLOYABLE_DEVICES: &str = "deployment/deployabledevices";
pub const DEPLOYMENT_REQUESTS: &str = "deployment/deploymentrequests";
pub const JOB_HISTORIES: &str = "deployment/jobhistories";

impl FmcClient {
    /// Devices with undeployed changes, each carrying the pending version.
    pub async fn list_deployable_devices(&mut self) -> Result<Vec<DeployableDevice>, Error> {
        self.list_all_as(DEPLOYABLE_DEVICES).await
    }

    pub async fn submit_deployment(
        &mut self,
        request: &DeploymentRequest,
    ) -> Result<DeploymentAccepted, Error> {
        let body = serde_json::to_value(request).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: String::new(),
        })?;
        let resp = self.post(DEPLOYMENT_REQUESTS, &body).await?;
        if resp == Value::Null {
            return Ok(DeploymentAccepted::default());
        }
        decode(resp)
    }

    pub async fn list_job_histories(&mut self) -> Result<Vec<JobHistory>, Error> {
        self.list_all_as(JOB_HISTORIES).await
    }
}
