pub mod api;
pub mod bridge;
pub mod cli;
pub mod io;
pub mod logging;
pub mod question;
pub mod registry;
pub mod settings;
pub mod tally;
#[cfg(test)]
mod testing;

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use bridge::Bridge;
use cli::Cli;
use io::serial::{list_serial_ports, SerialConfig, SerialConnector};
use settings::AppSettings;

fn print_ports() -> anyhow::Result<()> {
    let ports = list_serial_ports().context("Failed to enumerate serial ports")?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        match port.product {
            Some(product) => println!("{}\t{}\t{}", port.port_name, port.port_type, product),
            None => println!("{}\t{}", port.port_name, port.port_type),
        }
    }
    Ok(())
}

/// Resolve when Ctrl-C arrives. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("[setup] Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn serve(settings: AppSettings) -> anyhow::Result<()> {
    let addr: SocketAddr = settings
        .http_addr()
        .parse()
        .with_context(|| format!("Invalid HTTP address {}", settings.http_addr()))?;

    let connector = Arc::new(SerialConnector::new(SerialConfig::from(&settings)));
    let bridge = Arc::new(Bridge::new(settings, connector));

    // Nothing is served until the base station shows up
    info!("[setup] Waiting for base station");
    let link = bridge.link().clone();
    let mut connecting = tokio::task::spawn_blocking(move || link.connect());
    tokio::select! {
        result = &mut connecting => {
            result.context("Connect task failed")??;
        }
        _ = interrupted() => {
            info!("[setup] Interrupted while waiting for base station");
            bridge.link().shutdown();
            let _ = connecting.await;
            return Ok(());
        }
    }

    let reader = bridge.start_reader();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let signal_bridge = bridge.clone();
    tokio::spawn(async move {
        interrupted().await;
        info!("[setup] Interrupted, shutting down");
        // Unblocks requests waiting on the link so the server can drain
        signal_bridge.link().shutdown();
        let _ = shutdown_tx.send(true);
    });

    let served = api::run_server(addr, bridge.clone(), shutdown_rx).await;
    reader.stop().await;
    served.context("HTTP server failed")?;

    info!("[setup] Stopped");
    Ok(())
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.list_ports {
        return print_ports();
    }

    let mut settings = AppSettings::load(cli.config.as_deref())?;
    cli.apply(&mut settings);
    settings.validate()?;

    let _log_guard = logging::init_logging(&settings)?;
    info!(
        "[setup] votelink {} ({} devices, {} baud)",
        env!("CARGO_PKG_VERSION"),
        settings.device_count,
        settings.baud_rate
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start tokio runtime")?;

    runtime.block_on(serve(settings))
}
