//! xbclient - inspect client configuration and protocol documents

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use xmlblaster_client::codec::decode_connect_result;
use xmlblaster_client::observability::init_default_logging;
use xmlblaster_client::testing::{MockTransport, RecordingListener};
use xmlblaster_client::{ClientConfig, ConnectionManager, Key, MsgQos, StatusQos};

#[derive(Parser)]
#[command(name = "xbclient")]
#[command(about = "Failsafe xmlBlaster client tooling")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "XBCLIENT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Print the connect request this configuration sends, password redacted
    ConnectQos,
    /// Decode a QoS document and print its fields as JSON
    DecodeQos {
        file: PathBuf,
        #[arg(long, value_enum, default_value_t = QosKind::Msg)]
        kind: QosKind,
    },
    /// Decode a key document and print it as JSON
    DecodeKey { file: PathBuf },
    /// Run a connection against an in-memory server that goes away and comes back
    Simulate {
        /// How long the server stays unreachable
        #[arg(long, default_value_t = 12_000)]
        outage_ms: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum QosKind {
    Msg,
    Status,
    Connect,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    let result = match cli.command {
        Commands::Config { show } => load_configuration(&cli.config)
            .and_then(|config| handle_config_command(&config, show)),
        Commands::ConnectQos => {
            load_configuration(&cli.config).and_then(|config| print_connect_qos(&config))
        }
        Commands::DecodeQos { file, kind } => decode_qos(&file, kind),
        Commands::DecodeKey { file } => decode_key(&file),
        Commands::Simulate { outage_ms } => simulate(outage_ms).await,
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<ClientConfig, Box<dyn std::error::Error>> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return Ok(ClientConfig::load_from_file(path)?);
    }

    for path_str in ["xbclient.toml", "config/xbclient.toml"] {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(ClientConfig::load_from_file(&path)?);
        }
    }

    Err("no configuration file found; pass -c/--config or create xbclient.toml".into())
}

fn handle_config_command(
    config: &ClientConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("{}", toml::to_string_pretty(config)?);
    }
    info!("Configuration validation complete");
    Ok(())
}

fn print_connect_qos(config: &ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    let settings = config.connection_settings()?;
    println!("{}", settings.redacted_connect_qos());
    Ok(())
}

fn decode_qos(file: &Path, kind: QosKind) -> Result<(), Box<dyn std::error::Error>> {
    let xml = std::fs::read_to_string(file)?;
    let value = match kind {
        QosKind::Msg => {
            let qos = MsgQos::parse(&xml)?;
            json!({
                "state": qos.state(),
                "state_info": qos.state_info(),
                "priority": qos.priority(),
                "persistent": qos.is_persistent(),
                "ptp": qos.is_ptp(),
                "sender": qos.sender().map(|s| s.absolute_name()),
                "subscription_id": qos.subscription_id(),
                "life_time": qos.life_time(),
                "rcv_timestamp": qos.rcv_timestamp(),
                "redeliver": qos.redeliver(),
                "client_properties": qos.client_properties(),
            })
        }
        QosKind::Status => {
            let qos = StatusQos::parse(&xml)?;
            json!({
                "state": qos.state(),
                "state_info": qos.state_info(),
                "ok": qos.is_ok(),
                "subscription_id": qos.subscription_id(),
                "key_oid": qos.key_oid(),
                "rcv_time": qos.rcv_time(),
            })
        }
        QosKind::Connect => {
            let qos = decode_connect_result(&xml)?;
            json!({
                "session_name": qos.session_name().map(|s| s.absolute_name()),
                "secret_session_id": "***",
                "session_timeout": qos.session_timeout(),
                "max_sessions": qos.max_sessions(),
                "clear_sessions": qos.clear_sessions(),
                "reconnect_same_client_only": qos.reconnect_same_client_only(),
                "reconnected": qos.is_reconnected(),
                "persistent": qos.is_persistent(),
            })
        }
    };
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn decode_key(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let xml = std::fs::read_to_string(file)?;
    let key = Key::decode(&xml)?;
    println!("{}", serde_json::to_string_pretty(&key)?);
    Ok(())
}

/// Connect, drop the server, watch the connection poll and recover
async fn simulate(outage_ms: u64) -> Result<(), Box<dyn std::error::Error>> {
    let transport = Arc::new(MockTransport::new());
    let config = ClientConfig::new("simulator");
    let connection = ConnectionManager::new(transport.clone(), config.connection_settings()?);
    let listener = Arc::new(RecordingListener::new());
    connection.add_listener(listener.clone());

    connection.connect().await?;
    info!(state = %connection.state(), "Connected to in-memory server");

    transport.set_server_down(true);
    tokio::time::sleep(Duration::from_millis(outage_ms)).await;
    transport.set_server_down(false);

    while !connection.is_alive() {
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    connection.disconnect(None).await?;

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "transitions": listener.events(),
            "metrics": connection.metrics().snapshot(),
        }))?
    );
    Ok(())
}
