mod app;
mod camera;
mod config;
mod inputs;
mod messages;
mod services;

use app::App;
use config::Config;

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    tracing::info!("Starting mocam motion camera controller");

    // Load configuration
    let config = Config::load()?;
    config.validate()?;

    let app = App::new(config).await?;
    app.run().await
}
