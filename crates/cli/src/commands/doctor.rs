//! `envoy doctor`: Diagnose system health.

use std::path::Path;

use envoy_config::{AppConfig, PaymentMode};

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Envoy Doctor — System Diagnostics");
    println!("====================================\n");

    let mut issues = 0;

    // Config
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(AppConfig::config_path);
    let config = if path.exists() {
        match super::load_config(config_path) {
            Ok(config) => {
                println!("  ✅ Config file valid ({})", path.display());
                config
            }
            Err(e) => {
                println!("  ❌ {e}");
                return Ok(());
            }
        }
    } else {
        println!("  ⚠️  No config file at {}, using defaults", path.display());
        AppConfig::default()
    };

    // Credentials
    let api_key = config.resolve_api_key(None);
    if api_key.is_some() {
        println!("  ✅ API key configured");
    } else {
        println!("  ❌ No API key — set api_key in config.toml or ENVOY_API_KEY / OPENAI_API_KEY");
        issues += 1;
    }

    // Personal data
    if config.personal_data_dir.is_dir() {
        let owners = std::fs::read_dir(&config.personal_data_dir)
            .map(|entries| entries.filter_map(|e| e.ok()).filter(|e| e.path().is_dir()).count())
            .unwrap_or(0);
        println!(
            "  ✅ Personal data directory {} ({owners} owner(s))",
            config.personal_data_dir.display()
        );
    } else {
        println!(
            "  ⚠️  Personal data directory {} does not exist",
            config.personal_data_dir.display()
        );
        issues += 1;
    }

    // Payments
    match config.payments.mode {
        PaymentMode::Disabled => println!("  ℹ️  Payments disabled"),
        PaymentMode::DryRun => println!("  ℹ️  Payments in dry-run mode"),
        PaymentMode::Http => println!(
            "  ℹ️  Payments via {}",
            config.payments.endpoint.as_deref().unwrap_or("(no endpoint)")
        ),
    }

    // Provider
    if let Some(key) = api_key {
        match envoy_providers::build_with_key(&config, key) {
            Ok(provider) => match provider.health_check().await {
                Ok(true) => println!("  ✅ Provider reachable ({})", config.api_url),
                Ok(false) => {
                    println!("  ❌ Provider rejected the health check ({})", config.api_url);
                    issues += 1;
                }
                Err(e) => {
                    println!("  ❌ Provider unreachable: {e}");
                    issues += 1;
                }
            },
            Err(e) => {
                println!("  ❌ {e}");
                issues += 1;
            }
        }
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
