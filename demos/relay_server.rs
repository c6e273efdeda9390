//! Screen relay server example
//!
//! Run with: cargo run --example relay_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example relay_server                    # binds to 0.0.0.0:3000
//!   cargo run --example relay_server localhost          # binds to 127.0.0.1:3000
//!   cargo run --example relay_server 127.0.0.1:3001     # binds to 127.0.0.1:3001
//!
//! ## Wire format
//!
//! Every message is a 4-byte big-endian length followed by a JSON object:
//!
//!   {"event": "client_type", "data": {"type": "windows", "clientId": "pc-1", "hostname": "LAB-PC"}}
//!   {"event": "client_type", "data": {"type": "web"}}
//!   {"event": "watch_pc",    "data": {"clientId": "pc-1"}}
//!   {"event": "screen_update", "data": {"image": "data:image/jpeg;base64,...", "timestamp": 1700000000000}}
//!   {"event": "remote_command", "data": {"clientId": "pc-1", "command": "lock"}}
//!
//! ## Features
//!
//! - Replay-on-subscribe: viewers get the producer's latest capture as soon as they watch it
//! - Targeted-else-broadcast: commands without a clientId reach every producer
//! - Backpressure: slow viewers drop updates instead of buffering them

use std::net::SocketAddr;

use screen_relay::{RelayServer, ServerConfig};

/// Parse bind address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:3000
/// - "localhost:3001" -> 127.0.0.1:3001
/// - "127.0.0.1" -> 127.0.0.1:3000
/// - "0.0.0.0:3000" -> 0.0.0.0:3000
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    const DEFAULT_PORT: u16 = 3000;

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
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:3000)");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  relay_server                     # binds to 0.0.0.0:3000");
    eprintln!("  relay_server localhost           # binds to 127.0.0.1:3000");
    eprintln!("  relay_server 127.0.0.1:3001      # binds to 127.0.0.1:3001");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let mut config = ServerConfig::default();
    if let Some(addr_str) = args.get(1) {
        match parse_bind_addr(addr_str) {
            Ok(addr) => config = config.bind(addr),
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        }
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("screen_relay=debug".parse()?)
                .add_directive("relay_server=debug".parse()?),
        )
        .init();

    println!("Starting screen relay on {}", config.bind_addr);
    println!("Max payload: {} bytes", config.max_payload_size);
    println!();

    let server = RelayServer::new(config);

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                eprintln!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
            let stats = server.relay().stats().await;
            println!(
                "Served {} connections ({} producers, {} consumers at shutdown)",
                stats.total_connections, stats.producers, stats.consumers
            );
        }
    }

    Ok(())
}
