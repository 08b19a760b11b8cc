mod actuation;
mod command;
mod config;
mod connection;
mod device;
mod security;
mod transport;

#[cfg(test)]
mod testing;

use config::DeviceConfig;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = DeviceConfig::default();

    info!("Zone controller starting: {}", config.identity.device_id);
    info!("  Broker: {}", config.endpoint);
    info!("  Buffer capacity: {} bytes", config.buffer_capacity);

    let mut device = match device::boot(&config).await {
        Ok(device) => device,
        Err(e) => {
            error!("Boot failed, halting: {:#}", e);
            // Nothing can run without identity or lights
            futures::future::pending::<()>().await;
            return;
        }
    };

    tokio::select! {
        _ = device.run() => {
            error!("Device loop exited");
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, shutting down");
        }
    }
}
