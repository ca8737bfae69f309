//! Record types for the permission catalog.
//!
//! Everything here is a plain tagged record mirroring the four persisted
//! kinds (Permission, Role, UserRole, UserPermission) plus the relation-
//! inclusion shapes the store hands back to the resolver. Identifiers are
//! opaque unique strings (uuid-shaped in practice); the only structured
//! field is `Permission::identifier`, which by convention is either the
//! literal `"*"` or `resource:action` so the match engine can apply
//! hierarchical wildcard rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A grantable permission, e.g. identifier `"users:read"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Permission {
    pub id: String,
    /// `resource:action` or the literal wildcard `"*"`. Globally unique.
    pub identifier: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: String,
    pub active: bool,
}

/// Input payload for creating a permission; the store assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPermission {
    pub identifier: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool { true }

/// A named bundle of permissions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Role {
    pub id: String,
    /// Unique role name, e.g. `"EDITOR"`.
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub active: bool,
}

/// role <-> permission link. Unique on (role_id, permission_id).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RolePermission {
    pub role_id: String,
    pub permission_id: String,
}

/// user <-> role assignment with provenance and optional expiry.
/// Unique on (user_id, role_id); re-assignment refreshes the timestamps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRole {
    pub user_id: String,
    pub role_id: String,
    pub assigned_by: String,
    pub assigned_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// user <-> permission direct grant. Unique on (user_id, permission_id).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserPermission {
    pub user_id: String,
    pub permission_id: String,
    pub granted_by: String,
    pub granted_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Minimal user record. The credential verifier lives upstream; this exists
/// only so grant/assign operations can validate the target user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub login: String,
    pub name: String,
    pub active: bool,
}

/// A direct grant with its permission included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectGrant {
    pub grant: UserPermission,
    pub permission: Permission,
}

/// A role assignment with the role and its permission set included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleGrant {
    pub assignment: UserRole,
    pub role: Role,
    pub permissions: Vec<Permission>,
}
