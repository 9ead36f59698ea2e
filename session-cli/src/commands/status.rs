//! Show the current session.

use anyhow::Result;
use std::path::Path;

use super::{describe, open_session};

/// Print the reconciled session state.
pub async fn run(data_dir: &Path) -> Result<()> {
    let sync = open_session(data_dir).await?;
    println!("{}", describe(&sync.state()));
    sync.shutdown().await;
    Ok(())
}
