//! Permission match engine: exact and hierarchical wildcard rules.
//!
//! Given a required identifier like `"users:read"` and a user's effective
//! set, allow when any of the following holds, checked in order (pure
//! short-circuit, order has no semantic effect):
//! 1. exact match
//! 2. `"*"` (super-admin)
//! 3. `"resource:*"` (all actions on the resource)
//! 4. `"*:action"` (the action on all resources)
//!
//! A required identifier without a `resource:action` shape can only match
//! exactly or via `"*"`.

use std::collections::HashSet;

/// Decide whether `required` is satisfied by the effective set.
pub fn matches(required: &str, effective: &HashSet<String>) -> bool {
    if effective.contains(required) {
        return true;
    }
    if effective.contains("*") {
        return true;
    }
    let Some((resource, action)) = required.split_once(':') else {
        return false;
    };
    if resource.is_empty() || action.is_empty() {
        return false;
    }
    if effective.contains(&format!("{}:*", resource)) {
        return true;
    }
    if effective.contains(&format!("*:{}", action)) {
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exact_match() {
        assert!(matches("users:read", &set(&["users:read"])));
        assert!(!matches("users:read", &set(&["roles:read"])));
    }

    #[test]
    fn super_admin_wildcard() {
        assert!(matches("users:read", &set(&["*"])));
        assert!(matches("anything", &set(&["*"])));
    }

    #[test]
    fn resource_wildcard() {
        assert!(matches("users:read", &set(&["users:*"])));
        assert!(!matches("roles:read", &set(&["users:*"])));
    }

    #[test]
    fn action_wildcard() {
        assert!(matches("users:read", &set(&["*:read"])));
        assert!(!matches("users:write", &set(&["*:read"])));
    }

    #[test]
    fn malformed_required_only_matches_exact_or_star() {
        assert!(!matches("noseparator", &set(&["users:*", "*:read"])));
        assert!(matches("noseparator", &set(&["noseparator"])));
        assert!(!matches(":read", &set(&["users:*", "*:read"])));
        assert!(!matches("users:", &set(&["users:*"])));
    }

    #[test]
    fn empty_effective_set_denies() {
        assert!(!matches("users:read", &HashSet::new()));
    }
}
