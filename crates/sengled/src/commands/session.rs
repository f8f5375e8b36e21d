//! Session command handlers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use sengled_api::redact::hide_email;

use crate::cli::{GlobalOpts, SessionArgs, SessionCommand};
use crate::error::CliError;
use crate::output::{self, Render};

use super::App;

#[derive(Serialize)]
struct SessionReport {
    account: String,
    alive: bool,
    logins: u64,
    api_calls: u64,
    last_login: Option<DateTime<Utc>>,
}

impl Render for SessionReport {
    fn human(&self, _color: bool) -> String {
        [
            format!("Account:    {}", self.account),
            format!("Alive:      {}", if self.alive { "yes" } else { "no" }),
            format!("Logins:     {}", self.logins),
            format!("API calls:  {}", self.api_calls),
            format!(
                "Last login: {}",
                self.last_login
                    .map_or_else(|| "- (persisted session reused)".into(), |t| t.to_rfc3339())
            ),
        ]
        .join("\n")
    }
}

pub async fn handle(app: &App, args: SessionArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let session = app.session();

    match args.command {
        SessionCommand::Status => {
            session.login().await?;
            let alive = session.verify().await?;
            let stats = session.stats().await;
            let report = SessionReport {
                account: hide_email(&session.config().email),
                alive,
                logins: stats.logins,
                api_calls: stats.api_calls,
                last_login: stats.last_login,
            };
            let out = output::render(global.output, &report, output::should_color(global.color));
            output::emit(&out, global.quiet);
            Ok(())
        }

        SessionCommand::Logout => {
            session.logout().await?;
            if !global.quiet {
                eprintln!("Session cleared");
            }
            Ok(())
        }
    }
}
