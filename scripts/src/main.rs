pub mod action;
pub mod utils;

use clap::Parser;
use logfire::config::{MetricsOptions, SendToLogfire};
use pet_sponsor::{config, logger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = action::AppArgs::parse();

    if !config::APP_CONFIG.is_prod() {
        logger::setup_simple_logger()?;
        return args.run().await;
    }

    let shutdown_handler = logfire::configure()
        .install_panic_handler()
        .with_metrics(Some(MetricsOptions::default()))
        .send_to_logfire(SendToLogfire::IfTokenPresent)
        .finish()?;

    let result = args.run().await;

    shutdown_handler.shutdown()?;

    result
}
