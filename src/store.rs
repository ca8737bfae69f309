//!
//! warden permission store
//! -----------------------
//! Repository seam between the authorization core and whatever holds the
//! catalog durably. The resolver and guard only ever talk to the
//! [`PermissionStore`] trait; the bundled [`memory::MemoryStore`] is the
//! in-process reference implementation used by the demo binary and the test
//! suite. A SQL-backed store is an external collaborator and lives outside
//! this crate.
//!
//! Conventions:
//! - Lookups return `Ok(None)` for unknown ids; only link deletion reports
//!   `NotFound`, because revoking an absent grant is a caller error.
//! - `direct_grants` applies the expiry filter (`expires_at` null or beyond
//!   `now`). `role_grants` and `role_names` intentionally do not filter the
//!   assignment's own expiry, matching the behavior this engine reproduces.
//! - Store failures surface as `AppError::Store` and are never retried here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppResult;
use crate::model::{
    DirectGrant, NewPermission, Permission, Role, RoleGrant, User, UserPermission, UserRole,
};

pub mod memory;

pub use memory::MemoryStore;

/// Repository operations over the four persisted record kinds.
///
/// All methods are async because real implementations sit on I/O; the
/// in-memory store completes synchronously but keeps the same shape.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn find_user(&self, user_id: &str) -> AppResult<Option<User>>;
    async fn find_permission(&self, permission_id: &str) -> AppResult<Option<Permission>>;
    async fn find_role(&self, role_id: &str) -> AppResult<Option<Role>>;

    /// Direct grants for a user with the permission record included,
    /// filtered to `expires_at` null or strictly greater than `now`.
    async fn direct_grants(&self, user_id: &str, now: DateTime<Utc>) -> AppResult<Vec<DirectGrant>>;

    /// Role assignments for a user with role and role-permission records
    /// included. No expiry filter is applied to the assignment.
    async fn role_grants(&self, user_id: &str) -> AppResult<Vec<RoleGrant>>;

    /// Names of every role assigned to the user, unfiltered by expiry.
    async fn role_names(&self, user_id: &str) -> AppResult<Vec<String>>;

    /// Upsert keyed on (user_id, permission_id): create on first grant,
    /// refresh `granted_at` and `expires_at` on re-grant.
    async fn upsert_user_permission(
        &self,
        user_id: &str,
        permission_id: &str,
        granted_by: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<UserPermission>;

    /// Delete by key; `NotFound` when no such grant exists.
    async fn delete_user_permission(&self, user_id: &str, permission_id: &str) -> AppResult<()>;

    /// Upsert keyed on (user_id, role_id), symmetric to the permission variant.
    async fn upsert_user_role(
        &self,
        user_id: &str,
        role_id: &str,
        assigned_by: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<UserRole>;

    /// Delete by key; `NotFound` when no such assignment exists.
    async fn delete_user_role(&self, user_id: &str, role_id: &str) -> AppResult<()>;

    async fn create_permission(&self, data: NewPermission) -> AppResult<Permission>;

    /// Create a role and link the given permission ids in one step.
    async fn create_role(
        &self,
        name: &str,
        description: Option<String>,
        permission_ids: &[String],
    ) -> AppResult<Role>;

    /// Replace a role's permission set: delete all existing links for the
    /// role, then insert the new set. SQL implementations SHOULD wrap this
    /// in a transaction; a mid-replacement failure otherwise leaves the
    /// links partially applied, which callers must treat as a known sharp
    /// edge.
    async fn replace_role_permissions(
        &self,
        role_id: &str,
        permission_ids: &[String],
    ) -> AppResult<()>;

    /// Ids of every user currently assigned the role. Drives targeted cache
    /// invalidation after a role permission-set replacement.
    async fn users_with_role(&self, role_id: &str) -> AppResult<Vec<String>>;

    /// User records of every member of the role.
    async fn role_members(&self, role_id: &str) -> AppResult<Vec<User>>;

    /// All roles with `active = true`, each with its permission set included.
    async fn active_roles(&self) -> AppResult<Vec<(Role, Vec<Permission>)>>;
}
