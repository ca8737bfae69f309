//! Authorization guard: the enforcement point the boundary layer consumes.
//!
//! One guard is wired per process by the composition root, owning the store
//! handle, the resolver and the TTL cache. Reads are cache-checked; every
//! mutation writes to the store first and only then invalidates the affected
//! cache entries, so a failed write never produces a misleading
//! invalidation and a stale read can never repopulate the cache with
//! pre-mutation data.
//!
//! `authorize` returns `Ok(false)` on denial. It never raises for a denied
//! check; turning `false` into a 403 is the boundary layer's job.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::cache::PermissionCache;
use crate::error::{AppError, AppResult};
use crate::matcher;
use crate::model::{
    DirectGrant, NewPermission, Permission, Role, RoleGrant, User, UserPermission, UserRole,
};
use crate::resolver::PermissionResolver;
use crate::store::PermissionStore;

/// How multiple required permissions combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequireMode {
    /// Every required permission must match.
    All,
    /// At least one required permission must match.
    #[default]
    Any,
}

/// Full breakdown of a user's grants: direct plus per-role.
#[derive(Debug, Clone, Serialize)]
pub struct PermissionDetail {
    pub user_id: String,
    pub direct: Vec<DirectGrant>,
    pub roles: Vec<RoleGrant>,
}

pub struct AuthorizationGuard {
    store: Arc<dyn PermissionStore>,
    resolver: PermissionResolver,
    cache: Arc<PermissionCache>,
}

impl AuthorizationGuard {
    pub fn new(store: Arc<dyn PermissionStore>, cache: Arc<PermissionCache>) -> Self {
        let resolver = PermissionResolver::new(store.clone());
        Self { store, resolver, cache }
    }

    pub fn cache(&self) -> &PermissionCache { &self.cache }

    /// The user's effective permission set, cache-checked. On a miss the
    /// resolver runs and the fresh result is stored; a resolution that
    /// errors (or is cancelled) stores nothing.
    pub async fn user_permissions(&self, user_id: &str) -> AppResult<HashSet<String>> {
        if let Some(hit) = self.cache.get(user_id) {
            debug!(target: "warden::guard", "cache hit user={}", user_id);
            return Ok(hit);
        }
        let fresh = self.resolver.effective_permissions(user_id).await?;
        self.cache.insert(user_id, fresh.clone());
        debug!(target: "warden::guard", "resolved user={} permissions={}", user_id, fresh.len());
        Ok(fresh)
    }

    /// Names of the user's roles. Uncached and unfiltered by expiry.
    pub async fn user_roles(&self, user_id: &str) -> AppResult<Vec<String>> {
        self.resolver.role_names(user_id).await
    }

    /// Direct and role-derived grants with full records, for enriched
    /// responses. Bypasses the cache: callers want current provenance.
    pub async fn permission_detail(&self, user_id: &str) -> AppResult<PermissionDetail> {
        let now = Utc::now();
        let (direct, roles) = tokio::join!(
            self.store.direct_grants(user_id, now),
            self.store.role_grants(user_id),
        );
        Ok(PermissionDetail { user_id: user_id.to_string(), direct: direct?, roles: roles? })
    }

    /// Evaluate one or more required permissions against the user's
    /// effective set, combined per `mode`. Denial is `Ok(false)`.
    pub async fn authorize(
        &self,
        user_id: &str,
        required: &[&str],
        mode: RequireMode,
    ) -> AppResult<bool> {
        let effective = self.user_permissions(user_id).await?;
        let allowed = match mode {
            RequireMode::All => required.iter().all(|r| matcher::matches(r, &effective)),
            RequireMode::Any => required.iter().any(|r| matcher::matches(r, &effective)),
        };
        debug!(
            target: "warden::guard",
            "authorize user={} required={:?} mode={:?} allowed={}",
            user_id, required, mode, allowed
        );
        Ok(allowed)
    }

    /// Single-permission convenience over [`Self::authorize`].
    pub async fn has_permission(&self, user_id: &str, required: &str) -> AppResult<bool> {
        self.authorize(user_id, &[required], RequireMode::Any).await
    }

    /// Grant a permission directly to a user. Upserts the link (re-granting
    /// refreshes timestamp and expiry), then invalidates the user's cache
    /// entry. `NotFound` when the user or permission does not exist.
    pub async fn grant_permission(
        &self,
        user_id: &str,
        permission_id: &str,
        granted_by: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<UserPermission> {
        self.require_user(user_id).await?;
        if self.store.find_permission(permission_id).await?.is_none() {
            return Err(AppError::not_found(
                "permission_not_found".into(),
                format!("permission {} does not exist", permission_id),
            ));
        }
        let grant = self
            .store
            .upsert_user_permission(user_id, permission_id, granted_by, expires_at)
            .await?;
        self.cache.invalidate(user_id);
        info!(
            target: "warden::guard",
            "grant user={} permission={} by={} expires={:?}",
            user_id, permission_id, granted_by, expires_at
        );
        Ok(grant)
    }

    /// Revoke a direct grant. `NotFound` when the link is absent; the error
    /// propagates, it is not swallowed.
    pub async fn revoke_permission(&self, user_id: &str, permission_id: &str) -> AppResult<()> {
        self.store.delete_user_permission(user_id, permission_id).await?;
        self.cache.invalidate(user_id);
        info!(target: "warden::guard", "revoke user={} permission={}", user_id, permission_id);
        Ok(())
    }

    /// Assign a role to a user, symmetric to [`Self::grant_permission`].
    pub async fn assign_role(
        &self,
        user_id: &str,
        role_id: &str,
        assigned_by: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<UserRole> {
        self.require_user(user_id).await?;
        if self.store.find_role(role_id).await?.is_none() {
            return Err(AppError::not_found(
                "role_not_found".into(),
                format!("role {} does not exist", role_id),
            ));
        }
        let assignment = self
            .store
            .upsert_user_role(user_id, role_id, assigned_by, expires_at)
            .await?;
        self.cache.invalidate(user_id);
        info!(
            target: "warden::guard",
            "assign user={} role={} by={} expires={:?}",
            user_id, role_id, assigned_by, expires_at
        );
        Ok(assignment)
    }

    /// Remove a role assignment. `NotFound` when absent.
    pub async fn remove_role(&self, user_id: &str, role_id: &str) -> AppResult<()> {
        self.store.delete_user_role(user_id, role_id).await?;
        self.cache.invalidate(user_id);
        info!(target: "warden::guard", "remove user={} role={}", user_id, role_id);
        Ok(())
    }

    /// Structural write: a new permission can reach any user through role
    /// membership, so the whole cache is cleared.
    pub async fn create_permission(&self, data: NewPermission) -> AppResult<Permission> {
        let permission = self.store.create_permission(data).await?;
        self.cache.invalidate_all();
        info!(target: "warden::guard", "create permission identifier={}", permission.identifier);
        Ok(permission)
    }

    /// Structural write, same blast radius as [`Self::create_permission`].
    pub async fn create_role(
        &self,
        name: &str,
        description: Option<String>,
        permission_ids: &[String],
    ) -> AppResult<Role> {
        let role = self.store.create_role(name, description, permission_ids).await?;
        self.cache.invalidate_all();
        info!(target: "warden::guard", "create role name={} permissions={}", name, permission_ids.len());
        Ok(role)
    }

    /// Replace a role's permission set, then invalidate exactly the users
    /// currently assigned that role.
    pub async fn replace_role_permissions(
        &self,
        role_id: &str,
        permission_ids: &[String],
    ) -> AppResult<()> {
        self.store.replace_role_permissions(role_id, permission_ids).await?;
        let affected = self.store.users_with_role(role_id).await?;
        for user_id in &affected {
            self.cache.invalidate(user_id);
        }
        info!(
            target: "warden::guard",
            "replace role={} permissions={} invalidated_users={}",
            role_id, permission_ids.len(), affected.len()
        );
        Ok(())
    }

    /// Active roles with their permission sets, for the management surface.
    pub async fn active_roles(&self) -> AppResult<Vec<(Role, Vec<Permission>)>> {
        self.store.active_roles().await
    }

    /// User records of everyone assigned the role.
    pub async fn role_members(&self, role_id: &str) -> AppResult<Vec<User>> {
        self.store.role_members(role_id).await
    }

    async fn require_user(&self, user_id: &str) -> AppResult<()> {
        match self.store.find_user(user_id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::not_found(
                "user_not_found".into(),
                format!("user {} does not exist", user_id),
            )),
        }
    }
}
