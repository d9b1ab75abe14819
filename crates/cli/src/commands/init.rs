//! `threadscout init`: Print a default configuration file.

use threadscout_config::AppConfig;

pub fn run() {
    eprintln!("# Save as {}", AppConfig::config_dir().join("config.toml").display());
    print!("{}", AppConfig::default_toml());
}
