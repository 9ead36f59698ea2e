//! CLI command implementations.
//!
//! Every command opens the development backend, starts a synchronizer on it,
//! waits for the persisted login to be reconciled, performs one operation and
//! shuts the synchronizer down again.

pub mod log_out;
pub mod sign_in;
pub mod sign_up;
pub mod status;
pub mod update;

use anyhow::{Context, Result};
use campus_session_client::{
    FileCache, Navigator, Route, SessionConfig, SessionState, SessionSynchronizer,
};
use std::path::Path;
use std::time::Duration;
use zeroize::Zeroizing;

use crate::backend::DirectoryBackend;
use crate::config::load_session_config;

/// The synchronizer as wired by the CLI.
pub type Session = SessionSynchronizer<DirectoryBackend, DirectoryBackend, FileCache, PrintNavigator>;

/// Navigator that prints each intent on stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrintNavigator;

impl Navigator for PrintNavigator {
    fn navigate_to(&self, route: Route) {
        println!("navigate: {}", route);
    }
}

/// Start a synchronizer on the data directory and wait until it has settled.
pub async fn open_session(data_dir: &Path) -> Result<Session> {
    let config = load_session_config(data_dir)?;
    let budget = settle_budget(&config);

    let backend = DirectoryBackend::open(data_dir)
        .await
        .context("Failed to open development backend")?;
    let sync = SessionSynchronizer::start(
        backend.clone(),
        backend,
        FileCache::in_dir(data_dir),
        PrintNavigator,
        config,
    )
    .await;

    tokio::time::timeout(budget, sync.settled())
        .await
        .context("Timed out waiting for the identity provider")?;
    Ok(sync)
}

/// Upper bound on the first reconciliation: every lookup attempt, its
/// backoff, and a forced sign-out.
fn settle_budget(config: &SessionConfig) -> Duration {
    let policy = &config.lookup_retry;
    let per_attempt = config.operation_timeout + policy.max_delay + policy.jitter;
    per_attempt.saturating_mul(policy.max_attempts.max(1)) + config.operation_timeout
}

/// Use `given` or prompt for a password without echo.
pub fn read_password(given: Option<String>, prompt: &str) -> Result<Zeroizing<String>> {
    let password = match given {
        Some(p) => Zeroizing::new(p),
        None => Zeroizing::new(rpassword::prompt_password(prompt).context("Failed to read password")?),
    };
    if password.is_empty() {
        anyhow::bail!("Password must not be empty");
    }
    Ok(password)
}

/// Render a session state for the terminal.
pub fn describe(state: &SessionState) -> String {
    match state {
        SessionState::Unresolved => "Session: unresolved".to_string(),
        SessionState::Anonymous => "Session: signed out".to_string(),
        SessionState::Authenticated {
            profile, confirmed, ..
        } => {
            let mut out = format!(
                "Session: signed in{}\n  Name:  {}\n  Email: {}\n  Role:  {}\n  ID:    {}",
                if *confirmed { "" } else { " (unconfirmed)" },
                profile.display_name,
                profile.email,
                profile.role,
                profile.id,
            );
            if let Some(phone) = &profile.phone {
                out.push_str(&format!("\n  Phone: {}", phone));
            }
            if let Some(department) = profile.attributes.department() {
                out.push_str(&format!("\n  Dept:  {}", department));
            }
            out
        }
    }
}
