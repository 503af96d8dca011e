// FTD HA pair records.

use serde_json::Value;

use crate::client::FmcClient;
use crate::error::Error;
use crate::models::HaPairRecord;

pub const HA_PAIRS: &str = "devicehapairs/ftddevicehapairs";

impl FmcClient {
    pub async fn list_ha_pairs(&mut self) -> Result<Vec<HaPairRecord>, Error> {
        self.list_all_as(HA_PAIRS).await
    }

    pub async fn find_ha_pair(&mut self, name: &str) -> Result<Option<HaPairRecord>, Error> {
        Ok(self
            .list_ha_pairs()
            .await?
            .into_iter()
            .find(|p| p.name == name))
    }

    pub async fn get_ha_pair(&mut self, id: &str) -> Result<HaPairRecord, Error> {
        self.get_as(&format!("{HA_PAIRS}/{id}")).await
    }

    /// Submit a pairing request. Pair formation continues asynchronously
    /// on the controller.
    pub async fn create_ha_pair(&mut self, payload: &Value) -> Result<Value, Error> {
        self.post(HA_PAIRS, payload).await
    }
}
