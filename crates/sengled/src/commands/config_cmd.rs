//! Config command handlers. None of these touch the network.

use secrecy::{ExposeSecret, SecretString};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;

pub fn handle(args: ConfigArgs, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }

        ConfigCommand::Show => {
            let redacted = Config {
                password: cfg.password.as_ref().map(|_| "********".into()),
                email: cfg.email.clone(),
                app_uuid: cfg.app_uuid.clone(),
                timeout: cfg.timeout,
                connect_timeout: cfg.connect_timeout,
                ca_cert: cfg.ca_cert.clone(),
                reconnect: config::Reconnect {
                    max_attempts: cfg.reconnect.max_attempts,
                    base_delay_ms: cfg.reconnect.base_delay_ms,
                    max_delay_secs: cfg.reconnect.max_delay_secs,
                },
            };
            print!("{}", toml::to_string_pretty(&redacted)?);
            Ok(())
        }

        ConfigCommand::SetPassword => {
            let email = config::resolve_email(global, cfg)?;
            let password = match &global.password {
                Some(pw) => SecretString::from(pw.clone()),
                None => SecretString::from(rpassword::prompt_password(format!(
                    "Password for {email}: "
                ))?),
            };
            if password.expose_secret().is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "must not be empty".into(),
                });
            }
            config::store_password(&email, password.expose_secret())?;
            if !global.quiet {
                eprintln!("Password stored in the OS keyring for {email}");
            }
            Ok(())
        }
    }
}
