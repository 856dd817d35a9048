//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::Store;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct InitOptions {
    pub base_dir: PathBuf,
    /// Overwrite an existing config file
    pub force: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitInfo {
    pub config_path: PathBuf,
    pub db_path: PathBuf,
    pub config_written: bool,
}

/// Write a default config and create the database
///
/// An existing config is kept unless `force` is set. The database is
/// created with the vector settings of the resulting config.
pub async fn cmd_init(options: InitOptions) -> Result<InitInfo> {
    let InitOptions { base_dir, force } = options;

    let mut config = Config::load_from(Some(base_dir))?;
    let exists = config.paths.config_file.exists();

    if exists && !force {
        info!(
            "Config already exists at {:?}, keeping it",
            config.paths.config_file
        );
    } else {
        let paths = config.paths.clone();
        config = Config::default();
        config.paths = paths;
        config.save()?;
    }

    let store = Store::open(&config.paths.db_file, config.store_options())
        .await
        .map_err(|e| match e {
            Error::InvalidInput(msg) => Error::Config(format!(
                "{}; remove {} to start over",
                msg,
                config.paths.db_file.display()
            )),
            other => other,
        })?;
    store.close().await;
    info!("Database ready at {:?}", config.paths.db_file);

    Ok(InitInfo {
        config_path: config.paths.config_file.clone(),
        db_path: config.paths.db_file.clone(),
        config_written: !exists || force,
    })
}

pub fn print_init(info: &InitInfo) {
    if info.config_written {
        println!("✓ Wrote configuration to {:?}", info.config_path);
    } else {
        println!("Configuration kept at {:?} (use --force to overwrite)", info.config_path);
    }
    println!("Database: {:?}", info.db_path);
    println!("\nNext steps:");
    println!("  grimoire ingest langpacks/go.yaml   # Index a language pack");
    println!("  grimoire query \"error handling\"     # Search the knowledge base");
}
