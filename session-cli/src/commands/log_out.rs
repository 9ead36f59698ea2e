//! Sign out.

use anyhow::{Context, Result};
use std::path::Path;

use super::{describe, open_session};

/// Sign out of the current session. Signing out twice is fine.
pub async fn run(data_dir: &Path) -> Result<()> {
    let sync = open_session(data_dir).await?;
    let result = sync.log_out().await;
    let state = sync.state();
    sync.shutdown().await;

    result.context("Log-out failed")?;
    println!("{}", describe(&state));
    Ok(())
}
