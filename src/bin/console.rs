//! Binary entry point for the interactive bridge console.

use anyhow::Result;

use chatduino::console;

#[tokio::main]
/// Bootstraps environment variables and runs the console loop against
/// the bridge URL given as the first argument.
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let base_url = std::env::args().nth(1);
    console::run(base_url).await
}
