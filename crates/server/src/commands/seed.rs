//! Seed command handler.

use clap::Args;
use std::path::PathBuf;
use unilink_core::{config::AppConfig, AppResult};
use unilink_retrieval::{seed_store, SeedBundle, SqliteStore};

/// Load sample records into the document store
#[derive(Args, Debug)]
pub struct SeedCommand {
    /// JSON bundle keyed by collection name
    pub file: PathBuf,
}

impl SeedCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Seeding {:?} from {:?}", config.store_path, self.file);

        let bundle = SeedBundle::from_file(&self.file)?;
        let store = SqliteStore::open(&config.store_path)?;
        let report = seed_store(&store, &bundle).await?;

        for (collection, count) in &report.inserted {
            println!("{:<14} {}", collection, count);
        }
        println!("Inserted {} document(s)", report.total_inserted());
        if report.rejected > 0 {
            println!("Rejected {} invalid document(s), see log", report.rejected);
        }

        Ok(())
    }
}
