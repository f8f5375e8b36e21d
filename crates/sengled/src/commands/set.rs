//! `set` command: write one bulb's state over the broker or HTTPS.

use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use sengled_core::model::kelvin_to_percent;
use sengled_core::{
    Attribute, BrokerClient, BrokerEvent, CommandFacade, MqttConnector, PublishTarget, Rgb,
    TargetKind, UpdateKind,
};

use crate::cli::{GlobalOpts, SetArgs};
use crate::error::CliError;

use super::App;

/// Turn the flags into attribute writes, in a fixed order.
fn build_attributes(args: &SetArgs) -> Result<Vec<Attribute>, CliError> {
    let mut attributes = Vec::new();

    if args.on || args.off {
        attributes.push(Attribute::Power(args.on));
    }
    if let Some(level) = args.brightness {
        attributes.push(Attribute::Brightness(level));
    }
    if let Some(percent) = args.color_temp {
        attributes.push(Attribute::ColorTemperature(percent));
    } else if let Some(kelvin) = args.kelvin {
        attributes.push(Attribute::ColorTemperature(kelvin_to_percent(kelvin)));
    }
    if let Some(raw) = &args.color {
        let rgb: Rgb = raw.parse().map_err(|reason| CliError::Validation {
            field: "color".into(),
            reason,
        })?;
        attributes.push(Attribute::Color(rgb));
    }

    if attributes.is_empty() {
        return Err(CliError::Validation {
            field: "attributes".into(),
            reason: "nothing to set (use --on, --off, --brightness, --color-temp, --kelvin or --color)"
                .into(),
        });
    }
    Ok(attributes)
}

pub async fn handle(app: &App, args: SetArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let kind: TargetKind = args.target.parse()?;
    let attributes = build_attributes(&args)?;

    let facade = CommandFacade::new(app.directory.clone());
    facade.get_devices().await?;
    let device = app.resolve_device(&args.device)?;

    match kind {
        TargetKind::Http => {
            let target: PublishTarget<MqttConnector> = PublishTarget::Http(app.directory.clone());
            facade
                .set_device_state(&target, &device.id, &attributes)
                .await?;
        }
        TargetKind::Mqtt => {
            let broker = BrokerClient::new(app.directory.clone());
            let policy = app.session().config().reconnect.clone();
            broker
                .connect_with_retry(std::slice::from_ref(&device.id), &policy)
                .await?;
            let mut events = broker.subscribe_events();

            let target = PublishTarget::Broker(broker.clone());
            let result = facade
                .set_device_state(&target, &device.id, &attributes)
                .await;
            if result.is_ok() {
                if let Some(secs) = args.ack_timeout {
                    let acked =
                        wait_for_ack(&mut events, &device.id, Duration::from_secs(secs)).await;
                    if !acked {
                        warn!(device = %device.id, "no acknowledgement within {secs}s");
                    }
                }
            }
            broker.disconnect().await;
            result?;
        }
    }

    if !global.quiet {
        eprintln!("Updated {} ({kind})", device.name);
    }
    Ok(())
}

/// Wait for the first ack from `device_id`.
async fn wait_for_ack(
    events: &mut broadcast::Receiver<BrokerEvent>,
    device_id: &str,
    limit: Duration,
) -> bool {
    let wait = async {
        loop {
            match events.recv().await {
                Ok(BrokerEvent::Update(update))
                    if update.kind == UpdateKind::Ack && update.device_id == device_id =>
                {
                    debug!(attribute = %update.attribute, value = %update.value, "acknowledged");
                    return true;
                }
                Ok(BrokerEvent::Update(_)) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Ok(BrokerEvent::Disconnected { .. }) | Err(broadcast::error::RecvError::Closed) => {
                    return false;
                }
            }
        }
    };
    tokio::time::timeout(limit, wait).await.unwrap_or(false)
}
