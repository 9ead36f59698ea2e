//! Sign in with an existing account.

use anyhow::{Context, Result};
use std::path::Path;

use super::{describe, open_session, read_password};

/// Sign in as `email`.
pub async fn run(data_dir: &Path, email: &str, password: Option<String>) -> Result<()> {
    let password = read_password(password, "Password: ")?;

    let sync = open_session(data_dir).await?;
    let result = sync.sign_in(email, &password).await;
    let state = sync.state();
    sync.shutdown().await;

    let profile = result.context("Sign-in failed")?;
    println!("Welcome back, {}", profile.display_name);
    println!("{}", describe(&state));
    Ok(())
}
