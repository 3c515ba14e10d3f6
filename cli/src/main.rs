mod commands;
mod terminal;

use commands::{CommandLine, Commands, detect, discover, drawer, print as print_cmd, status};
use posprobe_common::config::Config;
use posprobe_core::service::PrinterService;
use terminal::{logging, print};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    logging::init_logging(commands.verbose);
    print::banner(commands.no_banner);

    let cfg: Config = commands.config()?;
    let service: PrinterService = commands::build_service(&cfg);

    let result: anyhow::Result<()> = match commands.command {
        Commands::Discover(args) => {
            print::header("getting ready for discovery");
            discover::discover(&service, args).await
        }
        Commands::Detect { target } => {
            print::header("detecting printer language");
            detect::detect(&service, target).await
        }
        Commands::Print(args) => {
            print::header("sending print job");
            print_cmd::print(&service, args).await
        }
        Commands::Status { target, zpl } => {
            print::header("querying printer status");
            status::status(&service, target, zpl).await
        }
        Commands::Serial { target } => {
            print::header("reading serial number");
            status::serial(&service, target).await
        }
        Commands::Drawer { target, .. } => {
            print::header("opening cash drawer");
            drawer::drawer(&service, target, cfg.drawer.pulses).await
        }
    };

    service.shutdown();
    print::end_of_program();
    result
}
