//! Clap derive structures for the `sengled` CLI.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// sengled -- control Sengled WiFi bulbs through the vendor cloud
#[derive(Debug, Parser)]
#[command(
    name = "sengled",
    version,
    about = "Control Sengled WiFi bulbs from the command line",
    long_about = "List, switch, dim, and recolor Sengled WiFi bulbs.\n\n\
        Logs in to the Sengled cloud, keeps the session between runs, and\n\
        sends commands over the MQTT broker (default) or plain HTTPS.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Sengled account email
    #[arg(long, short = 'e', env = "SENGLED_EMAIL", global = true)]
    pub email: Option<String>,

    /// Account password (prefer the keyring: `sengled config set-password`)
    #[arg(long, env = "SENGLED_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "SENGLED_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// HTTP request timeout in seconds (overrides config)
    #[arg(long, env = "SENGLED_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Tables and detail views (default)
    Table,
    /// JSON; one object per line under `watch`
    Json,
    /// YAML
    Yaml,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List and inspect bulbs
    #[command(alias = "dev")]
    Devices(DevicesArgs),

    /// Change the state of one bulb
    Set(SetArgs),

    /// Stream live state changes from the broker
    Watch(WatchArgs),

    /// Inspect or drop the persisted cloud session
    Session(SessionArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),
}

// ── Devices ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List WiFi bulbs on the account
    #[command(alias = "ls")]
    List,

    /// Show one bulb in detail
    Get {
        /// Device id (deviceUuid) or name
        device: String,
    },
}

// ── Set ──────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Device id (deviceUuid) or name
    pub device: String,

    /// Turn the bulb on
    #[arg(long, conflicts_with = "off")]
    pub on: bool,

    /// Turn the bulb off
    #[arg(long)]
    pub off: bool,

    /// Brightness, 0-100
    #[arg(long, short = 'b', value_parser = clap::value_parser!(u8).range(0..=100))]
    pub brightness: Option<u8>,

    /// Color temperature on the vendor scale, 0 (warm) to 100 (cool)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100), conflicts_with = "kelvin")]
    pub color_temp: Option<u8>,

    /// Color temperature in Kelvin (converted to the vendor scale)
    #[arg(long)]
    pub kelvin: Option<u32>,

    /// RGB color as r:g:b or r,g,b
    #[arg(long)]
    pub color: Option<String>,

    /// Delivery path: mqtt (broker) or http
    #[arg(long, short = 't', env = "SENGLED_TARGET", default_value = "mqtt")]
    pub target: String,

    /// Wait up to this many seconds for the bulb's acknowledgement (mqtt only)
    #[arg(long)]
    pub ack_timeout: Option<u64>,
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Devices to watch (default: all)
    pub devices: Vec<String>,

    /// Exit after this many updates
    #[arg(long, short = 'n')]
    pub count: Option<usize>,

    /// Include command acknowledgements
    #[arg(long)]
    pub acks: bool,
}

// ── Session ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub command: SessionCommand,
}

#[derive(Debug, Subcommand)]
pub enum SessionCommand {
    /// Log in if needed and check the session with the cloud
    Status,

    /// Forget the persisted session
    Logout,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Print the effective configuration (password redacted)
    Show,

    /// Store the account password in the OS keyring
    SetPassword,
}
