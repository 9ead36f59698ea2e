//! Create an account and its profile.

use anyhow::{Context, Result};
use campus_session_types::Role;
use std::path::Path;

use super::{describe, open_session, read_password};

/// Register `email` and create its profile.
pub async fn run(
    data_dir: &Path,
    email: &str,
    password: Option<String>,
    name: &str,
    role: Role,
) -> Result<()> {
    let password = read_password(password, "Choose a password: ")?;

    let sync = open_session(data_dir).await?;
    let result = sync.sign_up(email, &password, name, role).await;
    let state = sync.state();
    sync.shutdown().await;

    let profile = result.context("Sign-up failed")?;
    println!("Account created for {}", profile.display_name);
    println!("{}", describe(&state));
    Ok(())
}
