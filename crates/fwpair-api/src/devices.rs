// Device records, physical interfaces and access policies.

use serde_json::Value;
use tracing::debug;

use crate::client::{FmcClient, decode};
use crate::error::Error;
use crate::models::{DeviceRecord, NamedRef, PhysicalInterface};

pub const DEVICE_RECORDS: &str = "devices/devicerecords";
pub const ACCESS_POLICIES: &str = "policy/accesspolicies";

impl FmcClient {
    pub async fn list_device_records(&mut self) -> Result<Vec<DeviceRecord>, Error> {
        self.list_all_as(DEVICE_RECORDS).await
    }

    /// Look up a device record by its display name.
    pub async fn find_device_record(&mut self, name: &str) -> Result<Option<DeviceRecord>, Error> {
        Ok(self
            .list_device_records()
            .await?
            .into_iter()
            .find(|d| d.name == name))
    }

    pub async fn get_device_record(&mut self, id: &str) -> Result<DeviceRecord, Error> {
        self.get_as(&format!("{DEVICE_RECORDS}/{id}")).await
    }

    /// Submit a device registration. The controller answers 202 and
    /// registers the device asynchronously.
    pub async fn register_device(&mut self, payload: &Value) -> Result<Value, Error> {
        let name = payload.get("name").and_then(Value::as_str).unwrap_or("?");
        debug!(name, "submitting device registration");
        self.post(DEVICE_RECORDS, payload).await
    }

    pub async fn list_physical_interfaces(
        &mut self,
        device_id: &str,
    ) -> Result<Vec<PhysicalInterface>, Error> {
        self.list_all_as(&format!("{DEVICE_RECORDS}/{device_id}/physicalinterfaces"))
            .await
    }

    /// Find a physical interface by its hardware name (e.g. `GigabitEthernet0/2`).
    pub async fn find_physical_interface(
        &mut self,
        device_id: &str,
        name: &str,
    ) -> Result<Option<PhysicalInterface>, Error> {
        Ok(self
            .list_physical_interfaces(device_id)
            .await?
            .into_iter()
            .find(|i| i.name == name))
    }

    pub async fn find_access_policy(&mut self, name: &str) -> Result<Option<NamedRef>, Error> {
        self.find_by_name(ACCESS_POLICIES, name)
            .await?
            .map(decode)
            .transpose()
    }
}
