// Cloud endpoint and payload schema table.
//
// Every vendor URL, path, and magic value the wire layer relies on lives
// here. Field names for request and response bodies live on the serde
// types in `cloud::models` and `broker::envelope`.

use url::Url;

use crate::error::Error;

/// Account service: credential login.
pub const LOGIN_URL: &str = "https://ucenter.cloud.sengled.com/user/app/customer/v3/AuthenCross.json";

/// Account service: "is this session still alive" probe.
pub const SESSION_CHECK_URL: &str =
    "https://ucenter.cloud.sengled.com/user/app/customer/v2/isSessionTimeout.json";

/// Life2 service: per-account server endpoints (app server, MQTT broker).
pub const SERVER_INFO_URL: &str = "https://life2.cloud.sengled.com/life2/server/getServerInfo.json";

/// Device list, relative to the app server address.
pub const DEVICE_LIST_PATH: &str = "device/list.json";

/// One-shot attribute write, relative to the app server address.
pub const SET_ATTRIBUTES_PATH: &str = "device/deviceSetAttributes.json";

/// Name of the session cookie issued by the account service.
pub const SESSION_COOKIE: &str = "JSESSIONID";

/// Device category of WiFi bulbs. Other families are out of scope.
pub const WIFI_CATEGORY: &str = "wifielement";

/// Fixed fields the login exchange expects next to user/pwd/uuid.
pub const LOGIN_OS_TYPE: &str = "android";
pub const LOGIN_PRODUCT_CODE: &str = "life";
pub const LOGIN_APP_CODE: &str = "life";

/// `ret` value of a successful login.
pub const LOGIN_OK: i64 = 0;

/// `messageCode` value of a successful life2/ucenter call.
pub const MESSAGE_OK: i64 = 200;

/// Payload codes (`ret` or `messageCode`) that mean "your session is gone".
pub const INVALID_SESSION_CODES: &[i64] = &[100, 401];

/// Suffix the broker expects on MQTT client ids.
pub const MQTT_CLIENT_SUFFIX: &str = "@lifeApp";

/// `X-Requested-With` header the broker's WebSocket upgrade expects.
pub const MQTT_REQUESTED_WITH: &str = "com.sengled.life2";

/// Default TLS port for the broker when server info omits one.
pub const MQTT_DEFAULT_PORT: u16 = 443;

/// The vendor app stamps commands with seconds since this Unix time.
pub const COMMAND_EPOCH_OFFSET: i64 = 1_577_858_400;

/// Absolute URLs of the account-level endpoints.
///
/// App-server endpoints are discovered at runtime through
/// [`ServerInfo`](crate::ServerInfo), so only the fixed entry points are
/// configurable here. Tests point these at a mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub login: Url,
    pub session_check: Url,
    pub server_info: Url,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            login: Url::parse(LOGIN_URL).expect("static login URL"),
            session_check: Url::parse(SESSION_CHECK_URL).expect("static session URL"),
            server_info: Url::parse(SERVER_INFO_URL).expect("static server info URL"),
        }
    }
}

impl Endpoints {
    /// Rebase every account-level endpoint onto `base`, keeping the
    /// vendor paths. Useful for proxies and mock servers.
    pub fn with_base(base: &Url) -> Result<Self, Error> {
        let defaults = Self::default();
        let rebase = |url: &Url| -> Result<Url, Error> {
            let path = url.path().trim_start_matches('/');
            Ok(base.join(path)?)
        };
        Ok(Self {
            login: rebase(&defaults.login)?,
            session_check: rebase(&defaults.session_check)?,
            server_info: rebase(&defaults.server_info)?,
        })
    }
}

/// Join a path onto an app server address, tolerating a missing
/// trailing slash on the base.
pub fn app_url(app_server: &Url, path: &str) -> Result<Url, Error> {
    let mut base = app_server.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    Ok(base.join(path.trim_start_matches('/'))?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_vendor_hosts() {
        let endpoints = Endpoints::default();
        assert_eq!(
            endpoints.login.host_str(),
            Some("ucenter.cloud.sengled.com")
        );
        assert_eq!(
            endpoints.server_info.host_str(),
            Some("life2.cloud.sengled.com")
        );
    }

    #[test]
    fn with_base_keeps_vendor_paths() {
        let base = Url::parse("http://127.0.0.1:9999/").unwrap();
        let endpoints = Endpoints::with_base(&base).unwrap();
        assert_eq!(
            endpoints.login.as_str(),
            "http://127.0.0.1:9999/user/app/customer/v3/AuthenCross.json"
        );
        assert_eq!(
            endpoints.server_info.as_str(),
            "http://127.0.0.1:9999/life2/server/getServerInfo.json"
        );
    }

    #[test]
    fn app_url_adds_missing_slash() {
        let with = Url::parse("https://app.example.com/life2/").unwrap();
        let without = Url::parse("https://app.example.com/life2").unwrap();
        assert_eq!(
            app_url(&with, DEVICE_LIST_PATH).unwrap().as_str(),
            "https://app.example.com/life2/device/list.json"
        );
        assert_eq!(
            app_url(&without, DEVICE_LIST_PATH).unwrap().as_str(),
            "https://app.example.com/life2/device/list.json"
        );
    }
}
