//! The name server daemon.
//!
//! Usage: `nsengined [config.yaml]`
//!
//! Without a configuration file, all defaults apply. Set `RUST_LOG` to
//! control logging, e.g., `RUST_LOG=nsengine=debug`.

use std::process::exit;
use std::sync::Arc;

use nsengine::config::Config;
use nsengine::engine::Engine;
use nsengine::{server, store};
use tokio::net::{TcpListener, UdpSocket};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main()]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path).unwrap_or_else(|err| {
            eprintln!("Failed to load config file {path}: {err}");
            exit(1);
        }),
        None => Config::default(),
    };

    let (store, _refresher) =
        store::open(&config.backend).unwrap_or_else(|err| {
            eprintln!("Failed to open the record store: {err}");
            exit(1);
        });
    let engine = Engine::new(store, &config.dns).unwrap_or_else(|err| {
        eprintln!("Invalid configuration: {err}");
        exit(1);
    });
    let engine = Arc::new(engine);

    let addr = config.dns.listen;
    if config.dns.udp {
        let sock = UdpSocket::bind(addr).await.unwrap_or_else(|err| {
            eprintln!("Failed to bind UDP socket {addr}: {err}");
            exit(1);
        });
        tokio::spawn(server::serve_udp(sock, engine.clone()));
    }
    if config.dns.tcp {
        let sock = TcpListener::bind(addr).await.unwrap_or_else(|err| {
            eprintln!("Failed to bind TCP socket {addr}: {err}");
            exit(1);
        });
        tokio::spawn(server::serve_tcp(sock, engine.clone()));
    }
    if !config.dns.udp && !config.dns.tcp {
        eprintln!("Neither UDP nor TCP enabled, nothing to do.");
        exit(1);
    }

    info!(%addr, "Listening for queries");
    if let Err(err) = tokio::signal::ctrl_c().await {
        eprintln!("Failed to wait for Ctrl-C: {err}");
        exit(1);
    }
    info!("Shutting down");
}
