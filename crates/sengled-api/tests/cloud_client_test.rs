#![allow(clippy::unwrap_used)]
// Integration tests for `CloudClient` using wiremock.

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sengled_api::{CloudClient, Endpoints, Error};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, CloudClient) {
    let server = MockServer::start().await;
    let base = Url::parse(&server.uri()).unwrap();
    let client = CloudClient::with_client(
        reqwest::Client::new(),
        Endpoints::with_base(&base).unwrap(),
    );
    (server, client)
}

fn app_server(server: &MockServer) -> Url {
    Url::parse(&format!("{}/life2/", server.uri())).unwrap()
}

fn token(value: &str) -> SecretString {
    SecretString::from(value.to_owned())
}

const LOGIN_PATH: &str = "/user/app/customer/v3/AuthenCross.json";
const SESSION_PATH: &str = "/user/app/customer/v2/isSessionTimeout.json";
const SERVER_INFO_PATH: &str = "/life2/server/getServerInfo.json";

// ── Authentication tests ────────────────────────────────────────────

#[tokio::test]
async fn test_login_takes_token_from_cookie() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .and(body_partial_json(json!({
            "user": "jane@example.com",
            "pwd": "hunter2",
            "uuid": "ABCDEF",
            "osType": "android",
            "productCode": "life",
            "appCode": "life"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "JSESSIONID=tok-123; Path=/; HttpOnly")
                .set_body_json(json!({ "ret": 0, "customerId": 987_654 })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let outcome = client
        .login("jane@example.com", &token("hunter2"), "ABCDEF")
        .await
        .unwrap();

    assert_eq!(outcome.token.expose_secret(), "tok-123");
    assert_eq!(outcome.customer_id.as_deref(), Some("987654"));
}

#[tokio::test]
async fn test_login_falls_back_to_body_session_id() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "ret": "0", "jsessionId": "body-token" })),
        )
        .mount(&server)
        .await;

    let outcome = client
        .login("jane@example.com", &token("pw"), "ABCDEF")
        .await
        .unwrap();
    assert_eq!(outcome.token.expose_secret(), "body-token");
}

#[tokio::test]
async fn test_login_rejected_credentials() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "ret": 1, "msg": "wrong password" })),
        )
        .mount(&server)
        .await;

    let result = client.login("jane@example.com", &token("bad"), "ABCDEF").await;
    assert!(
        matches!(&result, Err(Error::Authentication { message }) if message == "wrong password"),
        "expected Authentication error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_session_check_alive_and_dead() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(SESSION_PATH))
        .and(header("cookie", "JSESSIONID=alive"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "messageCode": "200" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(SESSION_PATH))
        .and(header("cookie", "JSESSIONID=dead"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "messageCode": 100 })))
        .mount(&server)
        .await;

    assert!(client.check_session(&token("alive")).await.unwrap());
    assert!(!client.check_session(&token("dead")).await.unwrap());
}

// ── Server discovery ────────────────────────────────────────────────

#[tokio::test]
async fn test_server_info() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(SERVER_INFO_PATH))
        .and(header("cookie", "JSESSIONID=tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messageCode": "200",
            "appServerAddr": "https://life2.cloud.sengled.com/life2/",
            "inceptionAddr": "wss://us-mqtt.cloud.sengled.com:443/mqtt",
            "mqttSslPort": "443"
        })))
        .mount(&server)
        .await;

    let info = client.server_info(&token("tok")).await.unwrap();
    assert_eq!(info.app_server.host_str(), Some("life2.cloud.sengled.com"));
    assert_eq!(info.broker_url.scheme(), "wss");
    assert_eq!(info.broker_url.path(), "/mqtt");
    assert_eq!(info.broker_port, Some(443));
}

#[tokio::test]
async fn test_server_info_missing_broker_is_api_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(SERVER_INFO_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messageCode": "200",
            "appServerAddr": "https://life2.cloud.sengled.com/life2/"
        })))
        .mount(&server)
        .await;

    let result = client.server_info(&token("tok")).await;
    assert!(matches!(result, Err(Error::Api { .. })), "got: {result:?}");
}

// ── Device tests ────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_devices() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/life2/device/list.json"))
        .and(header("cookie", "JSESSIONID=tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messageCode": "200",
            "deviceList": [
                {
                    "deviceUuid": "B0CE18140001",
                    "category": "wifielement",
                    "typeCode": "W21-N13",
                    "attributeList": [
                        { "name": "name", "value": "Desk" },
                        { "name": "brightness", "value": "80" }
                    ]
                },
                {
                    "deviceUuid": "HUB0001",
                    "category": "gateway",
                    "attributeList": []
                }
            ]
        })))
        .mount(&server)
        .await;

    let devices = client
        .list_devices(&app_server(&server), &token("tok"))
        .await
        .unwrap();

    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].device_uuid, "B0CE18140001");
    assert_eq!(devices[0].type_code.as_deref(), Some("W21-N13"));
    assert_eq!(devices[0].attribute("brightness").as_deref(), Some("80"));
    assert_eq!(devices[1].category, "gateway");
}

#[tokio::test]
async fn test_list_devices_http_401_is_session_rejected() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/life2/device/list.json"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = client
        .list_devices(&app_server(&server), &token("stale"))
        .await;
    assert!(
        result.as_ref().is_err_and(Error::is_session_rejected),
        "got: {result:?}"
    );
}

#[tokio::test]
async fn test_payload_invalid_session_code_is_session_rejected() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/life2/device/list.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "ret": 100, "msg": "session timeout" })),
        )
        .mount(&server)
        .await;

    let result = client
        .list_devices(&app_server(&server), &token("stale"))
        .await;
    assert!(
        matches!(&result, Err(Error::SessionRejected { message }) if message == "session timeout"),
        "got: {result:?}"
    );
}

#[tokio::test]
async fn test_list_devices_malformed_shape() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/life2/device/list.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "devices": "nope" })))
        .mount(&server)
        .await;

    let result = client
        .list_devices(&app_server(&server), &token("tok"))
        .await;
    assert!(
        matches!(result, Err(Error::Deserialization { .. })),
        "got: {result:?}"
    );
}

#[tokio::test]
async fn test_rate_limited() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/life2/device/list.json"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "12"))
        .mount(&server)
        .await;

    let result = client
        .list_devices(&app_server(&server), &token("tok"))
        .await;
    assert!(
        matches!(result, Err(Error::RateLimited { retry_after_secs: 12 })),
        "got: {result:?}"
    );
}

#[tokio::test]
async fn test_set_device_state() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/life2/device/deviceSetAttributes.json"))
        .and(header("cookie", "JSESSIONID=tok"))
        .and(body_partial_json(json!({
            "deviceUuid": "dev1",
            "attributeList": [
                { "name": "switch", "value": "1" },
                { "name": "brightness", "value": "40" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ret": 0 })))
        .expect(1)
        .mount(&server)
        .await;

    client
        .set_device_state(
            &app_server(&server),
            &token("tok"),
            "dev1",
            &[
                ("switch".into(), "1".into()),
                ("brightness".into(), "40".into()),
            ],
        )
        .await
        .unwrap();
}
