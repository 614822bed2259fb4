//! escvp: control an ESC/VP.net projector from the command line.
//!
//! ```text
//! escvp get PWR                  Query a property
//! escvp set SOURCE HDMI1         Set a property
//! escvp send KEY D1              Send a raw command
//! escvp key mute                 Press a remote-control key
//! escvp power on                 Power on and wait for the ack
//! escvp lens 1 / picture 2       Load a lens or picture memory
//! escvp monitor                  Print property updates until Ctrl-C
//! escvp --gen-config             Write default config to stdout
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use escvp_cli::config::{CliConfig, LoggingConfig};
use escvp_cli::monitor::{self, LinePrinter};
use escvp_core::{Projector, PropertyValue, RemoteKey, property};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "escvp", about = "Control ESC/VP.net projectors", version)]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "escvp.toml")]
    config: PathBuf,

    /// Projector host; overrides the config file.
    #[arg(long)]
    host: Option<String>,

    /// Projector port; overrides the config file.
    #[arg(long)]
    port: Option<u16>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Query a property.
    Get { property: String },
    /// Set a property. Integers are sent as numbers, names are mapped to codes.
    Set { property: String, value: String },
    /// Send a raw command with an optional argument.
    Send {
        command: String,
        argument: Option<String>,
    },
    /// Press a remote-control key (play, stop, pause, prev, next, mute, volup, voldown).
    Key { key: RemoteKey },
    /// Switch the projector on or off.
    Power { state: PowerArg },
    /// Load a lens memory slot.
    Lens { id: u8 },
    /// Load a picture memory slot.
    Picture { id: u8 },
    /// Print every property update.
    Monitor {
        /// Stop after this many seconds instead of waiting for Ctrl-C.
        #[arg(long)]
        seconds: Option<u64>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PowerArg {
    On,
    Off,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        println!("{}", CliConfig::default_toml()?);
        return Ok(());
    }
    let Some(command) = cli.command else {
        eprintln!("no command given; see --help");
        std::process::exit(2);
    };

    let config = CliConfig::load(&cli.config).with_overrides(cli.host, cli.port);
    init_tracing(&config.logging)?;
    info!("escvp v{}", env!("CARGO_PKG_VERSION"));
    debug!(address = %config.projector.address(), "using projector");

    let projector = Projector::new(config.projector);
    let result = run(&projector, command).await;
    projector.close().await;

    let value = result?;
    if value != PropertyValue::Empty {
        println!("{value}");
    }
    Ok(())
}

async fn run(projector: &Projector, command: Command) -> escvp_core::Result<PropertyValue> {
    match command {
        Command::Get { property } => projector.get(&property).await,
        Command::Set { property, value } => {
            projector.set(&property, monitor::parse_value(&value)).await
        }
        Command::Send { command, argument } => {
            projector.send(&command, argument.as_deref()).await
        }
        Command::Key { key } => projector.press_key(key).await,
        Command::Power { state: PowerArg::On } => projector.power_on().await,
        Command::Power { state: PowerArg::Off } => projector.power_off().await,
        Command::Lens { id } => projector.load_lens_memory(id).await,
        Command::Picture { id } => projector.load_picture_memory(id).await,
        Command::Monitor { seconds } => {
            projector.register_listener(LinePrinter::new(std::io::stdout()));
            projector.connect().await?;
            projector.get(property::POWER).await?;
            match seconds {
                Some(seconds) => tokio::time::sleep(Duration::from_secs(seconds)).await,
                None => {
                    tokio::signal::ctrl_c().await.ok();
                    info!("Ctrl-C received, shutting down");
                }
            }
            Ok(PropertyValue::Empty)
        }
    }
}

fn init_tracing(logging: &LoggingConfig) -> std::io::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    if logging.file.is_empty() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&logging.file)?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init();
    }
    Ok(())
}
