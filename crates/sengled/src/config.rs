//! CLI-owned configuration: the TOML file, credential resolution, and
//! translation to `sengled_core::ClientConfig`.
//!
//! Core never sees these types -- it receives a pre-built `ClientConfig`.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use sengled_core::{ClientConfig, ReconnectPolicy};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Keyring service name; the account email is the keyring user.
pub const KEYRING_SERVICE: &str = "sengled";

// ── TOML config structs ──────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Account email.
    pub email: Option<String>,

    /// Password (plaintext -- prefer keyring or env var).
    pub password: Option<String>,

    /// Stable app installation id. Generated per run when unset.
    pub app_uuid: Option<String>,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Broker connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Custom CA bundle for the cloud endpoints.
    pub ca_cert: Option<PathBuf>,

    #[serde(default)]
    pub reconnect: Reconnect,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            email: None,
            password: None,
            app_uuid: None,
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
            ca_cert: None,
            reconnect: Reconnect::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Reconnect {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt, in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Cap on any single delay, in seconds.
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
}

impl Default for Reconnect {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_secs: default_max_delay_secs(),
        }
    }
}

impl From<&Reconnect> for ReconnectPolicy {
    fn from(r: &Reconnect) -> Self {
        Self {
            max_attempts: r.max_attempts,
            base_delay: Duration::from_millis(r.base_delay_ms),
            max_delay: Duration::from_secs(r.max_delay_secs),
        }
    }
}

fn default_timeout() -> u64 {
    30
}
fn default_connect_timeout() -> u64 {
    15
}
fn default_max_attempts() -> u32 {
    5
}
fn default_base_delay_ms() -> u64 {
    1000
}
fn default_max_delay_secs() -> u64 {
    30
}

// ── Paths ────────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "sengled", "sengled")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || fallback_dir(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Directory holding persisted sessions.
pub fn session_dir() -> PathBuf {
    project_dirs().map_or_else(
        || fallback_dir(".local/share"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

fn fallback_dir(under_home: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(under_home);
    p.push("sengled");
    p
}

// ── Config loading ───────────────────────────────────────────────────

/// Load the full Config from defaults, file, and `SENGLED_*` environment.
///
/// Nested keys use a double underscore: `SENGLED_RECONNECT__MAX_ATTEMPTS`.
pub fn load_config() -> Result<Config, CliError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(config_path()))
        .merge(Env::prefixed("SENGLED_").split("__"));

    Ok(figment.extract()?)
}

// ── Resolution ───────────────────────────────────────────────────────

/// The account email: flag/env first, then the config file.
pub fn resolve_email(global: &GlobalOpts, config: &Config) -> Result<String, CliError> {
    global
        .email
        .clone()
        .or_else(|| config.email.clone())
        .map(|e| e.trim().to_owned())
        .filter(|e| !e.is_empty())
        .ok_or(CliError::NoCredentials { field: "email" })
}

/// Translate CLI config + global flags into a `ClientConfig`.
///
/// This is the single boundary where CLI config types cross into core types.
pub fn resolve_client_config(
    global: &GlobalOpts,
    config: &Config,
) -> Result<ClientConfig, CliError> {
    let email = resolve_email(global, config)?;
    let password = resolve_password(global, config, &email)?;

    let mut client = ClientConfig::new(email, password);
    if let Some(uuid) = &config.app_uuid {
        client = client.with_app_uuid(uuid.clone());
    }
    client.transport.timeout = Duration::from_secs(global.timeout.unwrap_or(config.timeout));
    client.transport.ca_cert.clone_from(&config.ca_cert);
    client.connect_timeout = Duration::from_secs(config.connect_timeout);
    client.reconnect = ReconnectPolicy::from(&config.reconnect);
    Ok(client)
}

/// Password chain: flag/env, config file, OS keyring, interactive prompt.
fn resolve_password(
    global: &GlobalOpts,
    config: &Config,
    email: &str,
) -> Result<SecretString, CliError> {
    // 1. CLI flag or SENGLED_PASSWORD
    if let Some(pw) = &global.password {
        return Ok(SecretString::from(pw.clone()));
    }

    // 2. Plaintext in config
    if let Some(pw) = &config.password {
        return Ok(SecretString::from(pw.clone()));
    }

    // 3. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, email) {
        if let Ok(pw) = entry.get_password() {
            return Ok(SecretString::from(pw));
        }
    }

    // 4. Prompt, only when someone can answer
    if std::io::stdin().is_terminal() {
        let pw = rpassword::prompt_password(format!("Password for {email}: "))?;
        if !pw.is_empty() {
            return Ok(SecretString::from(pw));
        }
    }

    Err(CliError::NoCredentials { field: "password" })
}

/// Store `password` for `email` in the OS keyring.
pub fn store_password(email: &str, password: &str) -> Result<(), CliError> {
    keyring::Entry::new(KEYRING_SERVICE, email)
        .and_then(|entry| entry.set_password(password))
        .map_err(|e| CliError::Keyring {
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_core_tuning() {
        let config = Config::default();
        let policy = ReconnectPolicy::from(&config.reconnect);
        assert_eq!(policy, ReconnectPolicy::default());
        assert_eq!(config.timeout, 30);
        assert_eq!(config.connect_timeout, 15);
    }

    #[test]
    fn toml_overrides_nested_keys() {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::string(
                "email = \"jane@example.com\"\n[reconnect]\nmax_attempts = 2\n",
            ))
            .extract()
            .unwrap_or_default();
        assert_eq!(config.email.as_deref(), Some("jane@example.com"));
        assert_eq!(config.reconnect.max_attempts, 2);
        assert_eq!(config.reconnect.max_delay_secs, 30);
    }
}
