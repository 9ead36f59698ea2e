//! Navigation targets.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::profile::Role;

/// A route the synchronizer can ask the navigation dispatcher to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Route {
    /// Sign-in screen.
    SignIn,
    /// Home for the administrative role.
    AdminHome,
    /// Home shared by every other role.
    SharedHome,
}

impl Route {
    /// Home route for a signed-in user with `role`.
    pub fn for_role(role: &Role) -> Self {
        if role.is_administrative() {
            Route::AdminHome
        } else {
            Route::SharedHome
        }
    }

    /// Route name as understood by the navigation dispatcher.
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::SignIn => "sign-in",
            Route::AdminHome => "admin-home",
            Route::SharedHome => "shared-home",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
