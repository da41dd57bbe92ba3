//! `extrec purge` – drop completed records older than the retention window.

use std::time::Duration;

use anyhow::Result;
use extrec_core::status::StatusStore;

pub async fn run_purge(store: &StatusStore, days: u64) -> Result<()> {
    let removed = store
        .purge_older_than(Duration::from_secs(days * 24 * 60 * 60))
        .await?;
    println!("Removed {} completed record(s) older than {} day(s).", removed, days);
    Ok(())
}
