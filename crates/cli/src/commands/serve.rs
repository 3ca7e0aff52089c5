//! `relaychat serve`: Start the web chat gateway.

use relaychat_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("RelayChat Gateway");
    println!("   Open: http://{}:{}/", config.gateway.host, config.gateway.port);

    relaychat_gateway::start(config).await?;

    Ok(())
}
