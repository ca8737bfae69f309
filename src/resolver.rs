//! Effective-permission resolution.
//!
//! The resolver computes, per user, the union of direct grants (expiry
//! filtered by the store) and role-derived grants (assignments traversed
//! regardless of their own expiry, reproducing the behavior of the system
//! this engine replaces), then collapses the whole set to `{"*"}` when the
//! full wildcard is present. Store I/O and set algebra are kept apart:
//! the two fetches run concurrently, and the union/collapse steps are pure
//! functions testable without a store.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;

use crate::error::AppResult;
use crate::model::{DirectGrant, RoleGrant};
use crate::store::PermissionStore;

/// Union of direct grant identifiers and every role's permission identifiers.
pub fn raw_union(direct: &[DirectGrant], roles: &[RoleGrant]) -> HashSet<String> {
    let mut set: HashSet<String> = HashSet::new();
    for dg in direct {
        set.insert(dg.permission.identifier.clone());
    }
    for rg in roles {
        for p in &rg.permissions {
            set.insert(p.identifier.clone());
        }
    }
    set
}

/// If the full wildcard is present, every finer-grained entry is redundant.
pub fn collapse_wildcard(mut set: HashSet<String>) -> HashSet<String> {
    if set.contains("*") {
        set.clear();
        set.insert("*".to_string());
    }
    set
}

/// Computes effective permission sets against a [`PermissionStore`].
#[derive(Clone)]
pub struct PermissionResolver {
    store: Arc<dyn PermissionStore>,
}

impl PermissionResolver {
    pub fn new(store: Arc<dyn PermissionStore>) -> Self { Self { store } }

    /// The effective permission set for a user. Empty for a user with no
    /// grants; store failures propagate and nothing partial is returned.
    pub async fn effective_permissions(&self, user_id: &str) -> AppResult<HashSet<String>> {
        let now = Utc::now();
        let (direct, roles) = tokio::join!(
            self.store.direct_grants(user_id, now),
            self.store.role_grants(user_id),
        );
        let raw = raw_union(&direct?, &roles?);
        Ok(collapse_wildcard(raw))
    }

    /// Names of every role assigned to the user, unfiltered by expiry.
    pub async fn role_names(&self, user_id: &str) -> AppResult<Vec<String>> {
        self.store.role_names(user_id).await
    }
}
