//! rnext TUN diagnostic binary
//!
//! Opens the tunnel device described by the configuration file and logs every
//! packet the OS routes into it until Ctrl+C or SIGTERM.

use bytes::Bytes;
use log::{debug, error, info, warn};
use rnext::{
    config::Config,
    error::{Result, VpnError},
    tunnel::TunnelDevice,
};
use std::env;
use std::net::Ipv4Addr;
use std::path::Path;
use std::process;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const QUEUE_DEPTH: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }
    let config_path = if args.len() > 2 && args[1] == "--config" {
        args[2].as_str()
    } else if args.len() > 1 && !args[1].starts_with("--") {
        args[1].as_str()
    } else {
        "config.toml"
    };

    let config = load_config(config_path)?;

    // Initialize logging, RUST_LOG wins over the config file
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    info!("Starting rnext-tun v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded configuration from: {}", config_path);

    let tunnel_config = config.tunnel_config()?;
    let root = CancellationToken::new();
    let mut device = match TunnelDevice::new(&tunnel_config, &root) {
        Ok(device) => device,
        Err(e) => {
            error!("Failed to create TUN interface: {}", e);
            process::exit(1);
        }
    };

    let (_inbound_tx, inbound_rx) = mpsc::channel::<Bytes>(QUEUE_DEPTH);
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Bytes>(QUEUE_DEPTH);
    device.run(inbound_rx, outbound_tx)?;
    info!("TUN interface {} is running. Press Ctrl+C to stop.", device.name());

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
            _ = device.closed() => {
                warn!("TUN interface {} shut down", device.name());
                break;
            }
            packet = outbound_rx.recv() => match packet {
                Some(packet) => log_packet(&packet),
                None => break,
            },
        }
    }

    root.cancel();
    if let Err(e) = device.close().await {
        error!("TUN interface failed: {}", e);
        process::exit(1);
    }
    info!("rnext-tun stopped");
    Ok(())
}

/// Load configuration from file or fall back to defaults
fn load_config(config_path: &str) -> Result<Config> {
    let config = if Path::new(config_path).exists() {
        Config::from_file(config_path)?
    } else {
        eprintln!("Config file '{config_path}' not found, using defaults");
        Config::default()
    };
    config.validate()?;
    Ok(config)
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                let _ = signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = signal::ctrl_c() => debug!("Received Ctrl+C"),
            _ = sigterm.recv() => debug!("Received SIGTERM"),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
        debug!("Received Ctrl+C");
    }
}

fn log_packet(packet: &[u8]) {
    match ipv4_endpoints(packet) {
        Ok((src, dst, protocol)) => {
            info!("{} -> {} proto {} ({} bytes)", src, dst, protocol, packet.len())
        }
        Err(e) => debug!("Skipping packet of {} bytes: {}", packet.len(), e),
    }
}

fn ipv4_endpoints(packet: &[u8]) -> Result<(Ipv4Addr, Ipv4Addr, u8)> {
    if packet.len() < 20 || packet[0] >> 4 != 4 {
        return Err(VpnError::Validation("not an IPv4 packet".to_string()));
    }
    let src = Ipv4Addr::new(packet[12], packet[13], packet[14], packet[15]);
    let dst = Ipv4Addr::new(packet[16], packet[17], packet[18], packet[19]);
    Ok((src, dst, packet[9]))
}

/// Print usage information
fn print_usage() {
    println!("rnext-tun v{}", env!("CARGO_PKG_VERSION"));
    println!("Opens the rnext TUN interface and logs the traffic routed into it");
    println!();
    println!("USAGE:");
    println!("    rnext-tun [CONFIG_FILE]");
    println!("    rnext-tun --config CONFIG_FILE");
    println!();
    println!("PRIVILEGES:");
    println!("    Creating a TUN interface requires root or CAP_NET_ADMIN.");
}
