//! `watch` command: stream broker updates until interrupted.

use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use sengled_core::{BrokerClient, BrokerEvent, UpdateKind};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::App;

pub async fn handle(app: &App, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    app.directory.list_devices().await?;
    let ids: Vec<String> = if args.devices.is_empty() {
        app.directory.device_ids()
    } else {
        args.devices
            .iter()
            .map(|d| app.resolve_device(d).map(|r| r.id))
            .collect::<Result<_, _>>()?
    };

    let broker = BrokerClient::new(app.directory.clone());
    let policy = app.session().config().reconnect.clone();
    let mut events = broker.subscribe_events();
    broker.connect_with_retry(&ids, &policy).await?;
    info!(devices = ids.len(), "watching");

    let color = output::should_color(global.color);
    let mut seen = 0usize;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result = loop {
        tokio::select! {
            _ = &mut ctrl_c => break Ok(()),
            event = events.recv() => match event {
                Ok(BrokerEvent::Update(update)) => {
                    if update.kind == UpdateKind::Ack && !args.acks {
                        continue;
                    }
                    output::emit(&output::render_line(global.output, &update, color), global.quiet);
                    seen += 1;
                    if args.count.is_some_and(|n| seen >= n) {
                        break Ok(());
                    }
                }
                Ok(BrokerEvent::Disconnected { reason }) => {
                    warn!(%reason, "broker link lost, reconnecting");
                    if let Err(e) = broker.connect_with_retry(&ids, &policy).await {
                        break Err(CliError::from(e));
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "watch fell behind"),
                Err(RecvError::Closed) => break Ok(()),
            },
        }
    };

    broker.disconnect().await;
    result
}
