//! `relaychat doctor`: Check configuration and credentials.

use relaychat_config::{
    AppConfig, ENV_API_KEY, ENV_DEPLOYMENT, ENV_ENDPOINT, LlmConfig,
};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("RelayChat Doctor");
    println!("================\n");

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("  ✅ Config file: {}", config_path.display());
    } else {
        println!("  ➖ No config file at {} (defaults in use)", config_path.display());
    }

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            return Ok(());
        }
    };

    let issues = report(&config.llm);

    println!();
    println!("  Model API version: {}", config.llm.api_version);
    println!("  Gateway: {}:{}", config.gateway.host, config.gateway.port);
    println!();
    if issues == 0 {
        println!("  All checks passed.");
    } else {
        println!("  {issues} credential(s) missing. Turns will be refused until they are set.");
    }

    Ok(())
}

/// Print one line per credential variable and return how many are missing.
fn report(llm: &LlmConfig) -> usize {
    let missing = llm.missing_credentials();
    for var in [ENV_ENDPOINT, ENV_API_KEY, ENV_DEPLOYMENT] {
        if missing.contains(&var) {
            println!("  ❌ {var} is not set");
        } else {
            println!("  ✅ {var} is set");
        }
    }
    missing.len()
}
