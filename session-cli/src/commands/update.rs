//! Edit the signed-in user's profile.

use anyhow::{Context, Result};
use campus_session_types::ProfilePatch;
use std::path::Path;

use super::{describe, open_session};

/// Fields to change; unset fields are left alone.
#[derive(Debug, Default, Clone)]
pub struct UpdateArgs {
    /// New display name.
    pub name: Option<String>,
    /// New email.
    pub email: Option<String>,
    /// New phone number.
    pub phone: Option<String>,
}

impl UpdateArgs {
    fn into_patch(self) -> ProfilePatch {
        ProfilePatch {
            display_name: self.name,
            email: self.email,
            phone: self.phone,
            ..ProfilePatch::default()
        }
    }
}

/// Apply `args` to the signed-in profile.
pub async fn run(data_dir: &Path, args: UpdateArgs) -> Result<()> {
    let patch = args.into_patch();
    if patch.is_empty() {
        anyhow::bail!("Nothing to update: pass --name, --email or --phone");
    }

    let sync = open_session(data_dir).await?;
    let result = sync.update_profile(patch).await;
    let state = sync.state();
    sync.shutdown().await;

    result.context("Profile update failed")?;
    println!("Profile updated");
    println!("{}", describe(&state));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::sign_up;
    use campus_session_types::Role;
    use tempfile::tempdir;

    #[tokio::test]
    async fn update_round_trips_through_restart() {
        let dir = tempdir().unwrap();
        sign_up::run(dir.path(), "a@b.com", Some("secret1".into()), "Ann", Role::Parent)
            .await
            .unwrap();

        run(
            dir.path(),
            UpdateArgs {
                phone: Some("555-0100".into()),
                ..UpdateArgs::default()
            },
        )
        .await
        .unwrap();

        let sync = open_session(dir.path()).await.unwrap();
        let profile = sync.state().profile().cloned().unwrap();
        assert_eq!(profile.phone.as_deref(), Some("555-0100"));
        assert_eq!(profile.display_name, "Ann");
        sync.shutdown().await;
    }

    #[tokio::test]
    async fn update_requires_sign_in() {
        let dir = tempdir().unwrap();
        let err = run(
            dir.path(),
            UpdateArgs {
                name: Some("X".into()),
                ..UpdateArgs::default()
            },
        )
        .await
        .unwrap_err();
        assert!(format!("{:#}", err).contains("not authenticated"));
    }

    #[tokio::test]
    async fn empty_update_is_rejected() {
        let dir = tempdir().unwrap();
        assert!(run(dir.path(), UpdateArgs::default()).await.is_err());
    }
}
