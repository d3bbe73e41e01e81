//! Binary entry point that wires configuration, the device link, and
//! the HTTP server together.

use anyhow::{Context, Result};
use log::info;
use std::net::SocketAddr;

use chatduino::config::Settings;
use chatduino::dispatcher;
use chatduino::llm::LlmClient;
use chatduino::sensor;
use chatduino::server::{self, AppState};

#[tokio::main]
/// Bootstraps the environment, opens the device link once, starts the
/// sensor reader when a port is available, and serves the HTTP API.
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::load();
    info!("Serial port: {}", settings.serial_port);

    let (dispatcher, reader_port) = dispatcher::open_channel(&settings.serial_port, settings.baud_rate);
    let sensors = sensor::new_handle();
    if let Some(port) = reader_port {
        sensor::spawn_reader(port, sensors.clone());
    }
    let llm = LlmClient::new(&settings);

    let state = AppState {
        dispatcher,
        sensors,
        llm,
    };
    let addr = SocketAddr::from(([0, 0, 0, 0], settings.http_port));
    server::run_server(state, addr)
        .await
        .context("HTTP server failed")
}
