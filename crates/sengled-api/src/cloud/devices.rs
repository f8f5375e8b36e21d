// Device endpoints
//
// Listing and one-shot attribute writes against the app server returned
// by server discovery.

use secrecy::SecretString;
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use crate::cloud::client::CloudClient;
use crate::cloud::models::{
    DeviceEntry, DeviceListResponse, ResponseMeta, SetAttributesRequest, WireAttribute,
};
use crate::endpoints::{DEVICE_LIST_PATH, MESSAGE_OK, SET_ATTRIBUTES_PATH, app_url};
use crate::error::Error;

impl CloudClient {
    /// List every device registered to the account, all categories.
    ///
    /// Filtering to WiFi bulbs is the caller's concern.
    pub async fn list_devices(
        &self,
        app_server: &Url,
        token: &SecretString,
    ) -> Result<Vec<DeviceEntry>, Error> {
        let url = app_url(app_server, DEVICE_LIST_PATH)?;
        let resp: DeviceListResponse = self.post_authed(url, token, &json!({})).await?;
        debug!(count = resp.device_list.len(), "device list fetched");
        Ok(resp.device_list)
    }

    /// Write attributes to a device over HTTPS, bypassing the broker.
    ///
    /// `attributes` are `(vendor name, vendor string value)` pairs.
    pub async fn set_device_state(
        &self,
        app_server: &Url,
        token: &SecretString,
        device_id: &str,
        attributes: &[(String, String)],
    ) -> Result<(), Error> {
        let url = app_url(app_server, SET_ATTRIBUTES_PATH)?;
        let body = SetAttributesRequest {
            device_uuid: device_id,
            attribute_list: attributes
                .iter()
                .map(|(name, value)| WireAttribute {
                    name: name.clone(),
                    value: Value::String(value.clone()),
                })
                .collect(),
        };

        let meta: ResponseMeta = self.post_authed(url, token, &body).await?;
        match (meta.ret(), meta.message_code()) {
            (Some(0), _) | (None, Some(MESSAGE_OK) | None) => {
                debug!(device = device_id, count = attributes.len(), "attributes set");
                Ok(())
            }
            _ => Err(Error::Api {
                message: format!("set state failed: {}", meta.description()),
                status: None,
            }),
        }
    }
}
