//! Scan command implementation

use anyhow::Result;
use std::sync::Arc;

use crate::scanner::Scanner;

pub async fn run(scanner: &Arc<Scanner>) -> Result<()> {
    let summary = Arc::clone(scanner).run_pass().await;

    println!(
        "Scan complete: {} imported, {} unchanged, {} errors",
        summary.imported, summary.unchanged, summary.errors
    );

    Ok(())
}
