pub mod coverage;
pub mod generate;
pub mod grade;
pub mod init;
pub mod validate;

use std::path::PathBuf;

use anyhow::Result;

use paperforge_store::{create_store, load_config_from, PaperforgeConfig, Store, StoreConfig};

/// Load config and open its store. `--bank` replaces the configured store
/// with that bank file, keeping a configured results file.
pub fn open_store(bank: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<(PaperforgeConfig, Store)> {
    let mut config = load_config_from(config_path.as_deref())?;
    if let Some(path) = bank {
        let results = match &config.store {
            StoreConfig::File { results, .. } => results.clone(),
            _ => None,
        };
        config.store = StoreConfig::File { path, results };
    }
    tracing::debug!(store = ?config.store, "opening store");
    let store = create_store(&config.store)?;
    Ok((config, store))
}

/// Reject output formats a command does not support.
pub fn check_format(format: &str, supported: &[&str]) -> Result<()> {
    anyhow::ensure!(
        supported.contains(&format),
        "unsupported format '{format}', expected one of: {}",
        supported.join(", ")
    );
    Ok(())
}
