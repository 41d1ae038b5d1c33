//! Catalog snapshots on disk

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};
use vodlink_core::Catalog;

/// Read a catalog snapshot from a JSON file
pub async fn load_catalog(path: impl AsRef<Path>) -> Result<Catalog> {
    let path = path.as_ref();
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    let catalog = Catalog::from_json_str(&json)
        .with_context(|| format!("Failed to parse snapshot {}", path.display()))?;
    info!(
        "📂 Loaded snapshot {} ({} videos, {} mappings)",
        path.display(),
        catalog.videos().len(),
        catalog.mappings().len()
    );
    Ok(catalog)
}

/// Write a catalog snapshot, replacing the file only once fully written
pub async fn save_catalog(catalog: &Catalog, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let json = catalog.to_json_pretty()?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    tokio::fs::write(&tmp, json)
        .await
        .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to replace snapshot {}", path.display()))?;

    debug!("Saved snapshot to {}", path.display());
    Ok(())
}
