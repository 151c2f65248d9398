//! Relay hub example server
//!
//! Run with: cargo run --example relay_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example relay_server                  # binds to 0.0.0.0:6699
//!   cargo run --example relay_server localhost        # binds to 127.0.0.1:6699
//!   cargo run --example relay_server 127.0.0.1:7000   # binds to 127.0.0.1:7000
//!
//! ## Publish a camera (any WebSocket client)
//!
//! Connect to ws://localhost:6699/ingest, send one JSON text message:
//!   {"device_id":"cam1","room":"home","width":1280,"height":720,"fps":30}
//! then send each frame as a binary message.
//!
//! ## Watch a room
//!
//! Connect to ws://localhost:6699/view?room=home. The first message is the
//! room manifest; afterwards the server pushes join/leave events and binary
//! frames prefixed with [u16 id length][device id].
//!
//! ## Query devices
//!
//! curl http://localhost:6699/manifest

use std::net::SocketAddr;

use camhub::{HubConfig, RelayServer};

const DEFAULT_PORT: u16 = 6699;

fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: relay_server [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:6699)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let bind_addr = match args.get(1) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("camhub=debug".parse()?)
                .add_directive("relay_server=debug".parse()?),
        )
        .init();

    let config = HubConfig::default().bind(bind_addr);

    println!("Starting relay hub on {}", config.bind_addr);
    println!();
    println!("=== Publish a camera ===");
    println!("ws://{}/ingest  (JSON handshake, then binary frames)", config.bind_addr);
    println!();
    println!("=== Watch a room ===");
    println!("ws://{}/view?room=home", config.bind_addr);
    println!();

    let server = RelayServer::new(config);
    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await?;

    Ok(())
}
