//! `extrec status` – show all tracked extraction jobs.

use anyhow::Result;
use extrec_core::status::{ExtractionStatus, StatusStore};

/// Human-readable state column: in-flight states for active jobs, the
/// terminal outcome otherwise.
fn state_label(status: &ExtractionStatus) -> &'static str {
    if !status.is_complete {
        if status.is_retrying {
            "retrying"
        } else {
            "processing"
        }
    } else {
        status.outcome().as_str()
    }
}

pub async fn run_status(store: &StatusStore) -> Result<()> {
    let jobs = store.list_all().await;
    if jobs.is_empty() {
        println!("No extraction jobs tracked.");
    } else {
        println!(
            "{:<24} {:<10} {:<8} {}",
            "CATALOG", "PAGES", "ERRORS", "STATE"
        );
        for job in jobs {
            let pages = format!("{}/{}", job.processed_pages, job.total_pages);
            println!(
                "{:<24} {:<10} {:<8} {}",
                job.catalog_id,
                pages,
                job.errors.len(),
                state_label(&job)
            );
        }
    }
    Ok(())
}
