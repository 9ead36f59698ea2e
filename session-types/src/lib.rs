//! # session-types
//!
//! Shared data model for the campus session synchronizer.
//!
//! This crate provides the foundational types used across all session crates:
//! - [`IdentityId`] - Stable id issued by the identity provider
//! - [`ProfileRecord`], [`ProfilePatch`] - The durable profile and partial updates to it
//! - [`Role`], [`RoleAttributes`] - Role and the role-conditional attribute bag
//! - [`Route`] - Navigation targets the synchronizer may request
//! - [`SessionError`] - The closed error taxonomy surfaced to callers

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod profile;
mod route;

pub use error::SessionError;
pub use ids::IdentityId;
pub use profile::{unix_now, ProfilePatch, ProfileRecord, Role, RoleAttributes};
pub use route::Route;
