use clap::Parser;
use log::info;
use media_flow_monitor::{capture::PcapEngine, config::OutputFormat, settings::Config, App};
use std::process;

#[derive(Parser)]
#[command(name = "media-flow-monitor")]
#[command(about = "Detect whether outgoing audio and video streams are active from UDP packet sizes")]
struct Cli {
    #[arg(short, long, help = "Network interface to capture on (default: system default device)")]
    interface: Option<String>,

    #[arg(short, long, help = "Configuration file path")]
    config: Option<String>,

    #[arg(short, long, help = "UDP port to watch")]
    port: Option<u16>,

    #[arg(short, long = "local", help = "Address or CIDR block of this host (repeatable)")]
    local: Vec<String>,

    #[arg(long, help = "Print status lines as JSON")]
    json: bool,

    #[arg(long, help = "Only print a status line when it changes")]
    changes_only: bool,

    #[arg(long, help = "List network devices and exit")]
    list: bool,

    #[arg(long, value_name = "PATH", help = "Write the effective configuration to PATH and exit")]
    write_config: Option<String>,

    #[arg(short, long, help = "Enable debug logging")]
    debug: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(interface) = &self.interface {
            config.capture.interface = Some(interface.clone());
        }
        if let Some(port) = self.port {
            config.capture.port = port;
        }
        if !self.local.is_empty() {
            config.capture.local_addresses = self.local.clone();
        }
        if self.json {
            config.report.format = OutputFormat::Json;
        }
        if self.changes_only {
            config.report.only_changes = true;
        }
    }
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();
}

fn list_devices() -> anyhow::Result<()> {
    println!("Network devices:");
    for device in PcapEngine::list_devices()? {
        let addresses: Vec<String> = device.addresses.iter().map(|a| a.addr.to_string()).collect();
        match &device.desc {
            Some(desc) => println!("{} ({}) {:?}", device.name, desc, addresses),
            None => println!("{} {:?}", device.name, addresses),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    if cli.list {
        return list_devices();
    }

    let mut config = match &cli.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };
    cli.apply_overrides(&mut config);
    config.validate()?;

    if let Some(path) = &cli.write_config {
        config.save_to_file(path)?;
        println!("Configuration written to {}", path);
        return Ok(());
    }

    info!("Starting media flow monitor (filter: {})", config.capture_filter());

    let app = App::new(config);
    if let Err(e) = app.run().await {
        eprintln!("Application error: {:#}", e);
        process::exit(1);
    }

    info!("Media flow monitor stopped");
    Ok(())
}
