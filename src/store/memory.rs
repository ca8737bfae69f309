//! In-memory reference implementation of [`PermissionStore`].
//!
//! Six relational tables held behind one `parking_lot::RwLock`, so every
//! operation observes a consistent snapshot and `replace_role_permissions`
//! is atomic without a transaction layer. Ids are uuid v4 strings assigned
//! on creation.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::model::{
    DirectGrant, NewPermission, Permission, Role, RoleGrant, RolePermission, User, UserPermission,
    UserRole,
};
use crate::store::PermissionStore;

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<String, User>,
    permissions: HashMap<String, Permission>,
    roles: HashMap<String, Role>,
    role_permissions: Vec<RolePermission>,
    /// Keyed on (user_id, role_id).
    user_roles: HashMap<(String, String), UserRole>,
    /// Keyed on (user_id, permission_id).
    user_permissions: HashMap<(String, String), UserPermission>,
}

/// Process-local permission catalog.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Seed a user record. User provisioning proper belongs to the upstream
    /// identity system; this exists for the demo binary and tests.
    pub fn add_user(&self, login: &str, name: &str) -> User {
        let user = User {
            id: Uuid::new_v4().to_string(),
            login: login.to_string(),
            name: name.to_string(),
            active: true,
        };
        self.tables.write().users.insert(user.id.clone(), user.clone());
        user
    }

    fn permissions_of_role(t: &Tables, role_id: &str) -> Vec<Permission> {
        t.role_permissions
            .iter()
            .filter(|rp| rp.role_id == role_id)
            .filter_map(|rp| t.permissions.get(&rp.permission_id).cloned())
            .collect()
    }

    fn require_role(t: &Tables, role_id: &str) -> AppResult<Role> {
        t.roles.get(role_id).cloned().ok_or_else(|| {
            AppError::not_found("role_not_found".into(), format!("role {} does not exist", role_id))
        })
    }

    fn require_permissions_exist(t: &Tables, permission_ids: &[String]) -> AppResult<()> {
        for pid in permission_ids {
            if !t.permissions.contains_key(pid) {
                return Err(AppError::not_found(
                    "permission_not_found".into(),
                    format!("permission {} does not exist", pid),
                ));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn find_user(&self, user_id: &str) -> AppResult<Option<User>> {
        Ok(self.tables.read().users.get(user_id).cloned())
    }

    async fn find_permission(&self, permission_id: &str) -> AppResult<Option<Permission>> {
        Ok(self.tables.read().permissions.get(permission_id).cloned())
    }

    async fn find_role(&self, role_id: &str) -> AppResult<Option<Role>> {
        Ok(self.tables.read().roles.get(role_id).cloned())
    }

    async fn direct_grants(&self, user_id: &str, now: DateTime<Utc>) -> AppResult<Vec<DirectGrant>> {
        let t = self.tables.read();
        let out = t
            .user_permissions
            .values()
            .filter(|up| up.user_id == user_id)
            .filter(|up| match up.expires_at {
                None => true,
                Some(exp) => exp > now,
            })
            .filter_map(|up| {
                t.permissions.get(&up.permission_id).map(|p| DirectGrant {
                    grant: up.clone(),
                    permission: p.clone(),
                })
            })
            .collect();
        Ok(out)
    }

    async fn role_grants(&self, user_id: &str) -> AppResult<Vec<RoleGrant>> {
        let t = self.tables.read();
        let out = t
            .user_roles
            .values()
            .filter(|ur| ur.user_id == user_id)
            .filter_map(|ur| {
                t.roles.get(&ur.role_id).map(|role| RoleGrant {
                    assignment: ur.clone(),
                    role: role.clone(),
                    permissions: Self::permissions_of_role(&t, &ur.role_id),
                })
            })
            .collect();
        Ok(out)
    }

    async fn role_names(&self, user_id: &str) -> AppResult<Vec<String>> {
        let t = self.tables.read();
        let out = t
            .user_roles
            .values()
            .filter(|ur| ur.user_id == user_id)
            .filter_map(|ur| t.roles.get(&ur.role_id).map(|r| r.name.clone()))
            .collect();
        Ok(out)
    }

    async fn upsert_user_permission(
        &self,
        user_id: &str,
        permission_id: &str,
        granted_by: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<UserPermission> {
        let mut t = self.tables.write();
        let key = (user_id.to_string(), permission_id.to_string());
        let now = Utc::now();
        let grant = t
            .user_permissions
            .entry(key)
            .and_modify(|up| {
                up.granted_at = now;
                up.expires_at = expires_at;
            })
            .or_insert_with(|| UserPermission {
                user_id: user_id.to_string(),
                permission_id: permission_id.to_string(),
                granted_by: granted_by.to_string(),
                granted_at: now,
                expires_at,
            })
            .clone();
        debug!(target: "warden::store", "upsert user_permission user={} permission={}", user_id, permission_id);
        Ok(grant)
    }

    async fn delete_user_permission(&self, user_id: &str, permission_id: &str) -> AppResult<()> {
        let key = (user_id.to_string(), permission_id.to_string());
        match self.tables.write().user_permissions.remove(&key) {
            Some(_) => Ok(()),
            None => Err(AppError::not_found(
                "user_permission_not_found".into(),
                format!("user {} has no direct grant for permission {}", user_id, permission_id),
            )),
        }
    }

    async fn upsert_user_role(
        &self,
        user_id: &str,
        role_id: &str,
        assigned_by: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<UserRole> {
        let mut t = self.tables.write();
        let key = (user_id.to_string(), role_id.to_string());
        let now = Utc::now();
        let assignment = t
            .user_roles
            .entry(key)
            .and_modify(|ur| {
                ur.assigned_at = now;
                ur.expires_at = expires_at;
            })
            .or_insert_with(|| UserRole {
                user_id: user_id.to_string(),
                role_id: role_id.to_string(),
                assigned_by: assigned_by.to_string(),
                assigned_at: now,
                expires_at,
            })
            .clone();
        debug!(target: "warden::store", "upsert user_role user={} role={}", user_id, role_id);
        Ok(assignment)
    }

    async fn delete_user_role(&self, user_id: &str, role_id: &str) -> AppResult<()> {
        let key = (user_id.to_string(), role_id.to_string());
        match self.tables.write().user_roles.remove(&key) {
            Some(_) => Ok(()),
            None => Err(AppError::not_found(
                "user_role_not_found".into(),
                format!("user {} is not assigned role {}", user_id, role_id),
            )),
        }
    }

    async fn create_permission(&self, data: NewPermission) -> AppResult<Permission> {
        let mut t = self.tables.write();
        if t.permissions.values().any(|p| p.identifier == data.identifier) {
            return Err(AppError::conflict(
                "permission_exists".into(),
                format!("permission identifier {} already exists", data.identifier),
            ));
        }
        let permission = Permission {
            id: Uuid::new_v4().to_string(),
            identifier: data.identifier,
            name: data.name,
            description: data.description,
            category: data.category,
            active: data.active,
        };
        t.permissions.insert(permission.id.clone(), permission.clone());
        Ok(permission)
    }

    async fn create_role(
        &self,
        name: &str,
        description: Option<String>,
        permission_ids: &[String],
    ) -> AppResult<Role> {
        let mut t = self.tables.write();
        if t.roles.values().any(|r| r.name == name) {
            return Err(AppError::conflict(
                "role_exists".into(),
                format!("role name {} already exists", name),
            ));
        }
        Self::require_permissions_exist(&t, permission_ids)?;
        let role = Role {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description,
            active: true,
        };
        t.roles.insert(role.id.clone(), role.clone());
        for pid in permission_ids {
            t.role_permissions.push(RolePermission {
                role_id: role.id.clone(),
                permission_id: pid.clone(),
            });
        }
        Ok(role)
    }

    async fn replace_role_permissions(
        &self,
        role_id: &str,
        permission_ids: &[String],
    ) -> AppResult<()> {
        let mut t = self.tables.write();
        Self::require_role(&t, role_id)?;
        Self::require_permissions_exist(&t, permission_ids)?;
        // Delete-then-insert under the single table lock, so readers never
        // see a half-replaced set.
        t.role_permissions.retain(|rp| rp.role_id != role_id);
        for pid in permission_ids {
            t.role_permissions.push(RolePermission {
                role_id: role_id.to_string(),
                permission_id: pid.clone(),
            });
        }
        Ok(())
    }

    async fn users_with_role(&self, role_id: &str) -> AppResult<Vec<String>> {
        let t = self.tables.read();
        Ok(t.user_roles
            .values()
            .filter(|ur| ur.role_id == role_id)
            .map(|ur| ur.user_id.clone())
            .collect())
    }

    async fn role_members(&self, role_id: &str) -> AppResult<Vec<User>> {
        let t = self.tables.read();
        Ok(t.user_roles
            .values()
            .filter(|ur| ur.role_id == role_id)
            .filter_map(|ur| t.users.get(&ur.user_id).cloned())
            .collect())
    }

    async fn active_roles(&self) -> AppResult<Vec<(Role, Vec<Permission>)>> {
        let t = self.tables.read();
        Ok(t.roles
            .values()
            .filter(|r| r.active)
            .map(|r| (r.clone(), Self::permissions_of_role(&t, &r.id)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn perm(store: &MemoryStore, identifier: &str) -> Permission {
        futures_block(store.create_permission(NewPermission {
            identifier: identifier.to_string(),
            name: identifier.to_string(),
            description: None,
            category: "test".into(),
            active: true,
        }))
        .unwrap()
    }

    // Tiny helper so these unit tests stay sync like the rest of the module.
    fn futures_block<F: std::future::Future>(f: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(f)
    }

    #[test]
    fn upsert_refreshes_expiry_and_timestamp() {
        let store = MemoryStore::new();
        let u = store.add_user("alice", "Alice");
        let p = perm(&store, "users:read");
        let first = futures_block(store.upsert_user_permission(&u.id, &p.id, "admin", None)).unwrap();
        let exp = Utc::now() + Duration::hours(1);
        let second =
            futures_block(store.upsert_user_permission(&u.id, &p.id, "admin", Some(exp))).unwrap();
        assert_eq!(second.expires_at, Some(exp));
        assert!(second.granted_at >= first.granted_at);
        // still a single row
        let grants = futures_block(store.direct_grants(&u.id, Utc::now())).unwrap();
        assert_eq!(grants.len(), 1);
    }

    #[test]
    fn delete_missing_grant_is_not_found() {
        let store = MemoryStore::new();
        let err = futures_block(store.delete_user_permission("nobody", "nothing")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn expired_grants_are_filtered_by_direct_grants() {
        let store = MemoryStore::new();
        let u = store.add_user("bob", "Bob");
        let p = perm(&store, "posts:write");
        let past = Utc::now() - Duration::minutes(5);
        futures_block(store.upsert_user_permission(&u.id, &p.id, "admin", Some(past))).unwrap();
        let grants = futures_block(store.direct_grants(&u.id, Utc::now())).unwrap();
        assert!(grants.is_empty());
    }

    #[test]
    fn replace_role_permissions_swaps_the_set() {
        let store = MemoryStore::new();
        let a = perm(&store, "users:read");
        let b = perm(&store, "users:write");
        let role = futures_block(store.create_role("EDITOR", None, &[a.id.clone()])).unwrap();
        futures_block(store.replace_role_permissions(&role.id, &[b.id.clone()])).unwrap();
        let roles = futures_block(store.active_roles()).unwrap();
        let (_, perms) = roles.iter().find(|(r, _)| r.id == role.id).unwrap();
        assert_eq!(perms.len(), 1);
        assert_eq!(perms[0].identifier, "users:write");
    }

    #[test]
    fn duplicate_role_name_conflicts() {
        let store = MemoryStore::new();
        futures_block(store.create_role("VIEWER", None, &[])).unwrap();
        let err = futures_block(store.create_role("VIEWER", None, &[])).unwrap_err();
        assert_eq!(err.http_status(), 409);
    }
}
