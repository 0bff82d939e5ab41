use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use bldc_can_runtime::config::NodeConfig;
use bldc_can_runtime::link::{ConsoleLink, OperatorLink, SerialLink, TracingNotices};
use bldc_can_runtime::motor::LogCanDriver;
use bldc_can_runtime::runtime::ControlLoop;

/// Serial-commanded BLDC motor node publishing telemetry frames on CAN
#[derive(Parser)]
struct Args {
    /// Serial port for the operator link (e.g. /dev/ttyUSB0)
    #[arg(long)]
    port: Option<String>,

    /// JSON configuration file; missing fields keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Read commands from the local terminal instead of a serial port
    #[arg(long)]
    console: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let args = Args::parse();

    let cfg = match &args.config {
        Some(path) => match NodeConfig::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Config error: {}", e);
                std::process::exit(1);
            }
        },
        None => NodeConfig::default(),
    };

    let link: Box<dyn OperatorLink> = match (&args.port, args.console) {
        (Some(port), false) => match SerialLink::open(port, cfg.baud) {
            Ok(link) => Box::new(link),
            Err(e) => {
                eprintln!("Link error: {}", e);
                std::process::exit(1);
            }
        },
        _ => match ConsoleLink::new() {
            Ok(link) => Box::new(link),
            Err(e) => {
                eprintln!("Terminal error: {}", e);
                std::process::exit(1);
            }
        },
    };

    ControlLoop::new(cfg, link, LogCanDriver, TracingNotices)
        .run()
        .await;
}
