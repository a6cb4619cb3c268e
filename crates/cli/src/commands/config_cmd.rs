//! `envoy config`: Print a starter configuration file.

use envoy_config::AppConfig;

pub fn run() {
    println!("# Envoy configuration");
    println!("# Save as {}", AppConfig::config_path().display());
    println!("# The API key may instead come from ENVOY_API_KEY or OPENAI_API_KEY.");
    println!();
    print!("{}", AppConfig::default_toml());
}
