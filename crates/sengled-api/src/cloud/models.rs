// Wire types for the Sengled cloud HTTPS API.
//
// Field names follow the vendor's camelCase exactly. The cloud is loose
// about numbers vs. strings (`"ret": 0` and `"messageCode": "200"` both
// occur), so status codes are read through `code_of`.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::endpoints::{LOGIN_APP_CODE, LOGIN_OS_TYPE, LOGIN_PRODUCT_CODE};

/// Interpret a vendor status code that may be a JSON number or a numeric string.
pub fn code_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Status fields most responses carry next to their payload.
#[derive(Debug, Default, Deserialize)]
pub struct ResponseMeta {
    #[serde(default)]
    pub ret: Option<Value>,
    #[serde(rename = "messageCode", default)]
    pub message_code: Option<Value>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub info: Option<String>,
}

impl ResponseMeta {
    pub fn ret(&self) -> Option<i64> {
        self.ret.as_ref().and_then(code_of)
    }

    pub fn message_code(&self) -> Option<i64> {
        self.message_code.as_ref().and_then(code_of)
    }

    /// Best human-readable explanation the cloud gave.
    pub fn description(&self) -> String {
        self.msg
            .clone()
            .or_else(|| self.info.clone())
            .unwrap_or_else(|| match (self.ret(), self.message_code()) {
                (Some(ret), _) => format!("ret={ret}"),
                (None, Some(code)) => format!("messageCode={code}"),
                (None, None) => "no status in response".into(),
            })
    }
}

// ── Login ────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub user: &'a str,
    pub pwd: &'a str,
    pub uuid: &'a str,
    #[serde(rename = "osType")]
    pub os_type: &'static str,
    #[serde(rename = "productCode")]
    pub product_code: &'static str,
    #[serde(rename = "appCode")]
    pub app_code: &'static str,
}

impl<'a> LoginRequest<'a> {
    pub fn new(user: &'a str, pwd: &'a str, uuid: &'a str) -> Self {
        Self {
            user,
            pwd,
            uuid,
            os_type: LOGIN_OS_TYPE,
            product_code: LOGIN_PRODUCT_CODE,
            app_code: LOGIN_APP_CODE,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub meta: ResponseMeta,
    #[serde(rename = "customerId", default)]
    pub customer_id: Option<Value>,
    #[serde(rename = "jsessionId", default)]
    pub jsession_id: Option<String>,
}

/// Result of a successful credential exchange.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// Session token (the `JSESSIONID` cookie value).
    pub token: SecretString,
    /// Vendor customer id, when the cloud returned one.
    pub customer_id: Option<String>,
}

// ── Server info ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ServerInfoResponse {
    #[serde(flatten)]
    pub meta: ResponseMeta,
    #[serde(rename = "appServerAddr", default)]
    pub app_server_addr: Option<String>,
    #[serde(rename = "inceptionAddr", default)]
    pub inception_addr: Option<String>,
    #[serde(rename = "mqttSslPort", default)]
    pub mqtt_ssl_port: Option<Value>,
}

/// Per-account server endpoints handed out by the life2 service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// Base URL for device endpoints (`device/list.json`, ...).
    pub app_server: Url,
    /// MQTT-over-WebSocket URL (`wss://host:port/path`).
    pub broker_url: Url,
    /// Broker TLS port, if the cloud advertised one separately.
    pub broker_port: Option<u16>,
}

// ── Devices ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DeviceListResponse {
    #[serde(rename = "deviceList")]
    pub device_list: Vec<DeviceEntry>,
}

/// One `{name, value}` pair from a device's `attributeList`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireAttribute {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

impl WireAttribute {
    /// The value as the vendor's string form (`"1"`, `"80"`, `"255:0:0"`).
    pub fn text(&self) -> Option<String> {
        value_text(&self.value)
    }
}

/// Render a loosely-typed vendor value as text. `null`, arrays and
/// objects have no text form.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if *b { "1".into() } else { "0".into() }),
        _ => None,
    }
}

/// A device as the cloud lists it.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceEntry {
    #[serde(rename = "deviceUuid")]
    pub device_uuid: String,
    #[serde(default)]
    pub category: String,
    #[serde(rename = "typeCode", default)]
    pub type_code: Option<String>,
    #[serde(rename = "attributeList", default)]
    pub attribute_list: Vec<WireAttribute>,
}

impl DeviceEntry {
    /// Look up an attribute's text value by vendor name.
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.attribute_list
            .iter()
            .find(|a| a.name == name)
            .and_then(WireAttribute::text)
    }
}

#[derive(Debug, Serialize)]
pub struct SetAttributesRequest<'a> {
    #[serde(rename = "deviceUuid")]
    pub device_uuid: &'a str,
    #[serde(rename = "attributeList")]
    pub attribute_list: Vec<WireAttribute>,
}
