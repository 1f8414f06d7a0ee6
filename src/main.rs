use anyhow::Result;
use oersted::config::{Config, DEFAULT_CONFIG_PATHS};
use oersted::driver::PriceDriver;
use oersted::setup::run_interactive_setup;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let mut config =
        Config::load().map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    oersted::logging::init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Oersted price sensor daemon starting up");

    // First run: walk through credential validation and meter selection
    if !config.is_configured() {
        run_interactive_setup(&mut config)
            .await
            .map_err(|e| anyhow::anyhow!("Setup failed: {}", e))?;
        let path = DEFAULT_CONFIG_PATHS[0];
        config
            .save_to_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to persist configuration: {}", e))?;
        info!("Configuration saved to {}", path);
    }

    let mut driver = PriceDriver::new(config)
        .map_err(|e| anyhow::anyhow!("Failed to create driver: {}", e))?;

    match driver.run().await {
        Ok(()) => {
            info!("Driver shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!("Driver failed with error: {}", e);
            Err(anyhow::anyhow!("Driver error: {}", e))
        }
    }
}
