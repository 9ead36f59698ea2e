//! Profile records and the role model.
//!
//! The profile store holds one [`ProfileRecord`] per identity. The record's
//! role decides which extra attributes are meaningful; that bag is modelled as
//! the [`RoleAttributes`] tagged union rather than an untyped map, with an
//! explicit fallback for roles this crate does not know.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::ids::IdentityId;

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// A user's role.
///
/// Serialized as a lowercase string. Unknown strings round-trip through
/// [`Role::Other`] untouched, so records written by newer clients survive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    /// Enrolled student.
    Student,
    /// Teaching staff.
    Faculty,
    /// Campus administrator.
    Admin,
    /// Parent or guardian of a student.
    Parent,
    /// Any role not listed above.
    Other(String),
}

impl Role {
    /// The role's wire name.
    pub fn as_str(&self) -> &str {
        match self {
            Role::Student => "student",
            Role::Faculty => "faculty",
            Role::Admin => "admin",
            Role::Parent => "parent",
            Role::Other(name) => name,
        }
    }

    /// Whether this role lands on the administrative home route.
    pub fn is_administrative(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl From<String> for Role {
    fn from(name: String) -> Self {
        match name.as_str() {
            "student" => Role::Student,
            "faculty" => Role::Faculty,
            "admin" => Role::Admin,
            "parent" => Role::Parent,
            _ => Role::Other(name),
        }
    }
}

impl From<&str> for Role {
    fn from(name: &str) -> Self {
        Role::from(name.to_string())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role-conditional profile attributes.
///
/// The session layer stores and merges these but never validates them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoleAttributes {
    /// Student attributes.
    Student {
        /// Academic department.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        department: Option<String>,
        /// Year of study.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        year: Option<String>,
        /// Current semester.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        semester: Option<String>,
    },
    /// Faculty attributes.
    Faculty {
        /// Academic department.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        department: Option<String>,
        /// Job title.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        designation: Option<String>,
    },
    /// Parent attributes.
    Parent {
        /// Email of the student this guardian is linked to.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ward_email: Option<String>,
    },
    /// No role-specific attributes.
    #[default]
    None,
    /// Attributes of a role this crate does not model.
    Other(BTreeMap<String, serde_json::Value>),
}

impl RoleAttributes {
    /// Empty attributes of the shape matching `role`.
    pub fn for_role(role: &Role) -> Self {
        match role {
            Role::Student => RoleAttributes::Student {
                department: None,
                year: None,
                semester: None,
            },
            Role::Faculty => RoleAttributes::Faculty {
                department: None,
                designation: None,
            },
            Role::Parent => RoleAttributes::Parent { ward_email: None },
            Role::Admin => RoleAttributes::None,
            Role::Other(_) => RoleAttributes::Other(BTreeMap::new()),
        }
    }

    /// The department, for roles that carry one.
    pub fn department(&self) -> Option<&str> {
        match self {
            RoleAttributes::Student { department, .. }
            | RoleAttributes::Faculty { department, .. } => department.as_deref(),
            _ => None,
        }
    }
}

/// The durable per-user profile held by the profile store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    /// Identity id this record is keyed by.
    pub id: IdentityId,
    /// Sign-in identifier.
    pub email: String,
    /// Name shown in the UI.
    pub display_name: String,
    /// The user's role.
    pub role: Role,
    /// Contact phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Creation time (unix seconds).
    pub created_at: u64,
    /// Role-conditional attributes.
    #[serde(default)]
    pub attributes: RoleAttributes,
}

impl ProfileRecord {
    /// Create a fresh record, stamped with the current time.
    pub fn new(id: IdentityId, email: &str, display_name: &str, role: Role) -> Self {
        let attributes = RoleAttributes::for_role(&role);
        Self {
            id,
            email: email.to_string(),
            display_name: display_name.to_string(),
            role,
            phone: None,
            created_at: unix_now(),
            attributes,
        }
    }

    /// Merge the fields present in `patch` into this record.
    pub fn apply(&mut self, patch: &ProfilePatch) {
        if let Some(ref email) = patch.email {
            self.email = email.clone();
        }
        if let Some(ref name) = patch.display_name {
            self.display_name = name.clone();
        }
        if let Some(ref role) = patch.role {
            self.role = role.clone();
        }
        if let Some(ref phone) = patch.phone {
            self.phone = Some(phone.clone());
        }
        if let Some(ref attributes) = patch.attributes {
            self.attributes = attributes.clone();
        }
    }

    /// Return a copy of this record with `patch` merged in.
    pub fn merged(&self, patch: &ProfilePatch) -> Self {
        let mut record = self.clone();
        record.apply(patch);
        record
    }
}

/// A partial set of profile fields.
///
/// Absent fields are left untouched when the patch is applied.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    /// New sign-in identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// New display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// New role. Not expected through the normal update path, but not forbidden.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// New phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Replacement role attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<RoleAttributes>,
}

impl ProfilePatch {
    /// Create an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the display name.
    pub fn with_display_name(mut self, name: &str) -> Self {
        self.display_name = Some(name.to_string());
        self
    }

    /// Set the email.
    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    /// Set the phone number.
    pub fn with_phone(mut self, phone: &str) -> Self {
        self.phone = Some(phone.to_string());
        self
    }

    /// Set the role.
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    /// Replace the role attributes.
    pub fn with_attributes(mut self, attributes: RoleAttributes) -> Self {
        self.attributes = Some(attributes);
        self
    }

    /// True when the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.display_name.is_none()
            && self.role.is_none()
            && self.phone.is_none()
            && self.attributes.is_none()
    }
}
