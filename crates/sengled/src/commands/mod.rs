//! Command dispatch: bridges CLI args -> core calls -> output formatting.

pub mod config_cmd;
pub mod devices;
pub mod session;
pub mod set;
pub mod watch;

use std::sync::Arc;

use sengled_core::{
    ClientConfig, CredentialSession, DeviceDirectory, DeviceRecord, FileSessionStore,
    SessionStore,
};

use crate::cli::{Command, GlobalOpts};
use crate::config;
use crate::error::CliError;

/// Core handles shared by every account-bound command.
pub struct App {
    pub directory: DeviceDirectory,
}

impl App {
    pub fn new(client_config: ClientConfig) -> Result<Self, CliError> {
        let store: Arc<dyn SessionStore> = Arc::new(FileSessionStore::new(config::session_dir()));
        let session = CredentialSession::new(client_config, store)?;
        Ok(Self {
            directory: DeviceDirectory::new(session),
        })
    }

    pub fn session(&self) -> &CredentialSession {
        self.directory.session()
    }

    /// Find a bulb by exact id, then by case-insensitive name.
    ///
    /// Looks only at the directory; callers refresh it first.
    pub fn resolve_device(&self, identifier: &str) -> Result<DeviceRecord, CliError> {
        if let Ok(record) = self.directory.get_device(identifier) {
            return Ok(record);
        }
        self.directory
            .devices()
            .into_iter()
            .find(|d| d.name.eq_ignore_ascii_case(identifier))
            .ok_or_else(|| CliError::NotFound {
                identifier: identifier.to_owned(),
            })
    }
}

/// Dispatch an account-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, app: &App, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Devices(args) => devices::handle(app, args, global).await,
        Command::Set(args) => set::handle(app, args, global).await,
        Command::Watch(args) => watch::handle(app, args, global).await,
        Command::Session(args) => session::handle(app, args, global).await,
        // Handled before an App exists
        Command::Config(_) => Ok(()),
    }
}
