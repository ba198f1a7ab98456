//! `dealpush config` – show where the config lives and what it resolves to.

use anyhow::Result;
use dealpush_core::config::{self, DealpushConfig};

pub fn run_config(cfg: &DealpushConfig) -> Result<()> {
    println!("# {}", config::config_path()?.display());
    let mut shown = cfg.clone();
    if shown.api_key.is_some() {
        shown.api_key = Some("<redacted>".to_string());
    }
    print!("{}", toml::to_string_pretty(&shown)?);
    Ok(())
}
