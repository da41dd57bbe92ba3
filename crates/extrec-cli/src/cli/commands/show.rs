//! `extrec show` – full detail for one job.

use anyhow::Result;
use extrec_core::status::StatusStore;

pub async fn run_show(store: &StatusStore, catalog_id: &str) -> Result<()> {
    let Some(job) = store.get(catalog_id).await else {
        anyhow::bail!("no extraction status tracked for catalog {}", catalog_id);
    };

    println!("catalog:     {}", job.catalog_id);
    println!("pages:       {}/{}", job.processed_pages, job.total_pages);
    println!("complete:    {}", job.is_complete);
    if job.is_complete {
        println!("outcome:     {}", job.outcome().as_str());
    }
    println!("retrying:    {}", job.is_retrying);
    if let Some(t) = job.next_retry_time {
        println!("next retry:  {}", t);
    }
    println!("created:     {}", job.created_at);
    println!("updated:     {}", job.updated_at);

    if job.errors.is_empty() {
        println!("errors:      none");
    } else {
        println!("errors:");
        for e in &job.errors {
            let page = e
                .page
                .map(|p| format!("page {p}"))
                .unwrap_or_else(|| "job-level".to_string());
            println!(
                "  - [{}] {} ({}, retries {}/{}, {})",
                e.category.as_str(),
                e.message,
                page,
                e.retry_count,
                e.max_retries,
                if e.recoverable { "recoverable" } else { "exhausted" }
            );
        }
    }
    Ok(())
}
