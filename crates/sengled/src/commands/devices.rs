//! Device command handlers.

use tabled::{Table, Tabled, settings::Style};

use sengled_core::DeviceRecord;

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts};
use crate::error::CliError;
use crate::output::{self, Render};

use super::App;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    type_code: String,
    #[tabled(rename = "Power")]
    power: String,
    #[tabled(rename = "Brightness")]
    brightness: String,
    #[tabled(rename = "Temp")]
    color_temperature: String,
    #[tabled(rename = "Color")]
    color: String,
    #[tabled(rename = "Online")]
    online: String,
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".into(), |v| v.to_string())
}

fn on_off(value: Option<bool>) -> String {
    opt(value.map(|on| if on { "on" } else { "off" }))
}

impl From<&DeviceRecord> for DeviceRow {
    fn from(d: &DeviceRecord) -> Self {
        Self {
            id: d.id.clone(),
            name: d.name.clone(),
            type_code: d.type_code.clone().unwrap_or_default(),
            power: on_off(d.power),
            brightness: opt(d.brightness),
            color_temperature: opt(d.color_temperature),
            color: opt(d.color),
            online: opt(d.online.map(|o| if o { "yes" } else { "no" })),
        }
    }
}

impl Render for [DeviceRecord] {
    fn human(&self, _color: bool) -> String {
        Table::new(self.iter().map(DeviceRow::from))
            .with(Style::rounded())
            .to_string()
    }
}

impl Render for DeviceRecord {
    fn human(&self, _color: bool) -> String {
        detail(self)
    }
}

fn detail(d: &DeviceRecord) -> String {
    let supported: Vec<String> = d.supported.iter().map(ToString::to_string).collect();
    let mut lines = vec![
        format!("ID:         {}", d.id),
        format!("Name:       {}", d.name),
        format!("Type:       {}", d.type_code.as_deref().unwrap_or("-")),
        format!("Power:      {}", on_off(d.power)),
        format!("Brightness: {}", opt(d.brightness)),
        format!("Color temp: {}", opt(d.color_temperature)),
        format!("Color:      {}", opt(d.color)),
        format!("Online:     {}", on_off(d.online)),
        format!("Writable:   {}", supported.join(", ")),
    ];
    for (name, value) in &d.extra {
        lines.push(format!("{name}: {value}"));
    }
    lines.join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(app: &App, args: DevicesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let devices = app.directory.list_devices().await?;

    let color = output::should_color(global.color);

    let out = match args.command {
        DevicesCommand::List => output::render(global.output, devices.as_slice(), color),
        DevicesCommand::Get { device } => {
            let record = app.resolve_device(&device)?;
            output::render(global.output, &record, color)
        }
    };
    output::emit(&out, global.quiet);
    Ok(())
}
