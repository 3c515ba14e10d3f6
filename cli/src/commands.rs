pub mod detect;
pub mod discover;
pub mod drawer;
pub mod print;
pub mod status;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{ArgAction, Args, Parser, Subcommand};
use posprobe_common::config::{Config, DrawerPolicy};
use posprobe_common::printer::{DeviceIdentity, PrinterLanguage};
use posprobe_common::validation;
use posprobe_core::service::PrinterService;
use posprobe_core::tcp::TcpConnectionFactory;
use posprobe_core::usb::NusbHost;

#[derive(Parser)]
#[command(name = "posprobe")]
#[command(about = "Find and drive POS receipt and label printers.")]
pub struct CommandLine {
    #[command(subcommand)]
    pub command: Commands,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Skip the start-up banner
    #[arg(long, global = true)]
    pub no_banner: bool,

    /// Raw print port probed and connected to
    #[arg(long, global = true, value_name = "PORT")]
    pub port: Option<u32>,

    /// Connect timeout in milliseconds
    #[arg(long, global = true, value_name = "MS")]
    pub timeout: Option<u64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Discover printers over USB and the local networks
    #[command(alias = "d")]
    Discover(DiscoverArgs),
    /// Identify the command language of one printer
    Detect { target: DeviceIdentity },
    /// Send a raw job to a printer
    #[command(alias = "p")]
    Print(PrintArgs),
    /// Query the real-time status of a printer
    #[command(alias = "s")]
    Status {
        target: DeviceIdentity,
        /// Ask with the ZPL host status request instead of ESC/POS
        #[arg(long)]
        zpl: bool,
    },
    /// Read the printer's serial number
    Serial { target: DeviceIdentity },
    /// Kick the cash drawer attached to a printer
    Drawer {
        target: DeviceIdentity,
        /// Send one pulse instead of the repeated sequence
        #[arg(long)]
        single: bool,
    },
}

#[derive(Args)]
pub struct DiscoverArgs {
    /// Skip USB enumeration
    #[arg(long)]
    pub no_usb: bool,

    /// Skip the port sweep of local subnets
    #[arg(long)]
    pub no_sweep: bool,

    /// Only report printers speaking one of these languages (implies --detect)
    #[arg(short, long, value_delimiter = ',', value_name = "LANG")]
    pub language: Vec<PrinterLanguage>,

    /// Identify the command language of every printer found
    #[arg(long)]
    pub detect: bool,

    /// Port sweep connect timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub probe_timeout: Option<u64>,

    /// Upper bound on concurrent sweep probes
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,
}

#[derive(Args)]
pub struct PrintArgs {
    pub target: DeviceIdentity,

    /// File whose bytes are sent as the job
    #[arg(short, long, conflicts_with = "text", required_unless_present = "text")]
    pub file: Option<PathBuf>,

    /// Text sent as the job, followed by a line feed
    #[arg(short, long)]
    pub text: Option<String>,

    /// Send the job untouched as a ZPL, TSPL or CPCL stream
    #[arg(long, value_name = "LANG")]
    pub label: Option<PrinterLanguage>,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn config(&self) -> anyhow::Result<Config> {
        let mut cfg = Config::default();

        if let Some(port) = self.port {
            cfg.probe_port = validation::port(port).context("--port")?;
        }
        if let Some(ms) = self.timeout {
            cfg.connect_timeout = millis(ms).context("--timeout")?;
        }

        match &self.command {
            Commands::Discover(args) => {
                if let Some(ms) = args.probe_timeout {
                    cfg.probe_timeout = millis(ms).context("--probe-timeout")?;
                }
                if let Some(limit) = args.concurrency {
                    if limit == 0 {
                        bail!("--concurrency must be at least 1");
                    }
                    cfg.max_concurrent_probes = limit;
                }
            }
            Commands::Drawer { single: true, .. } => cfg.drawer = DrawerPolicy::single(),
            _ => {}
        }

        Ok(cfg)
    }
}

fn millis(ms: u64) -> anyhow::Result<Duration> {
    let duration = Duration::from_millis(ms);
    validation::timeout(duration)?;
    Ok(duration)
}

/// Wires the service to the host's TCP stack and USB bus. There is no vendor
/// broadcast library on this platform, so broadcast discovery is unavailable.
pub fn build_service(cfg: &Config) -> PrinterService {
    PrinterService::builder(Arc::new(TcpConnectionFactory::new(cfg.probe_port)))
        .config(cfg.clone())
        .usb_host(Arc::new(NusbHost::new()))
        .build()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
