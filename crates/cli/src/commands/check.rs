//! `threadscout check`: Verify credentials are configured.

use threadscout_config::{AppConfig, secret_prefix};

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔎 ThreadScout: Configuration Check");
    println!("====================================\n");

    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let mut missing = 0;

    match &config.api_key {
        Some(key) if !key.is_empty() => println!("  ✅ Model API key: {}", secret_prefix(key)),
        _ => {
            println!("  ❌ No model API key: set THREADSCOUT_API_KEY or ANTHROPIC_API_KEY");
            missing += 1;
        }
    }
    println!("     provider: {}, model: {}", config.provider, config.model);

    match &config.slack.token {
        Some(token) if !token.is_empty() => println!("  ✅ SLACK_USER_OAUTH_TOKEN: {}", secret_prefix(token)),
        _ => {
            println!("  ❌ SLACK_USER_OAUTH_TOKEN is not set");
            missing += 1;
        }
    }

    if config.redmine.is_configured() {
        let key = config.redmine.api_key.as_deref().unwrap_or_default();
        println!("  ✅ Redmine: {} (key {})", config.redmine.base_url.as_deref().unwrap_or_default(), secret_prefix(key));
    } else {
        println!("  ⚠️  Redmine not configured: redmine_* tools disabled");
    }

    println!();
    if missing > 0 {
        return Err(format!("{missing} required credential(s) missing").into());
    }
    println!("  🎉 Ready to answer questions!");
    Ok(())
}
