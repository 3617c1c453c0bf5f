//! Administrator permissions and the convergence comparison.

use serde::{Deserialize, Serialize};

/// Trailing path index of the SMC role that an administrator holds implicitly
/// when no explicit permission is stored.
pub const BASELINE_ROLE_INDEX: &str = "1";

/// One role granted to an administrator over a set of elements.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Permission {
    pub granted_domain_ref: String,
    #[serde(default)]
    pub granted_elements: Vec<String>,
    pub role_ref: String,
}

/// Wire wrapper: the SMC nests the list as `{"permission": [...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PermissionList {
    #[serde(default)]
    pub permission: Vec<Permission>,
}

impl From<Vec<Permission>> for PermissionList {
    fn from(permission: Vec<Permission>) -> Self {
        Self { permission }
    }
}

/// Domain and elements every managed permission is granted against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantScope {
    pub domain_ref: String,
    pub elements: Vec<String>,
}

impl GrantScope {
    /// The shared admin domain and the "all elements" access list, both
    /// relative to the SMC API base URL (`http://host:port/version`).
    #[must_use]
    pub fn for_api_base(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            domain_ref: format!("{base}/elements/admin_domain/1"),
            elements: vec![format!("{base}/elements/access_control_list/7")],
        }
    }

    /// Permission granting `role_ref` within this scope.
    #[must_use]
    pub fn grant(&self, role_ref: &str) -> Permission {
        Permission {
            granted_domain_ref: self.domain_ref.clone(),
            granted_elements: self.elements.clone(),
            role_ref: role_ref.to_owned(),
        }
    }
}

/// Last `/`-separated segment of a resource reference.
#[must_use]
pub fn last_path_segment(href: &str) -> &str {
    href.trim_end_matches('/').rsplit('/').next().unwrap_or(href)
}

/// Whether `role_ref` points at the baseline role.
#[must_use]
pub fn is_baseline_role(role_ref: &str) -> bool {
    last_path_segment(role_ref) == BASELINE_ROLE_INDEX
}

/// Whether the stored permissions already match the desired ones.
///
/// Only role references are compared and order does not matter. An empty
/// stored list counts as equal to a single desired permission on the baseline
/// role, since the SMC reports no permissions for an administrator that only
/// holds it.
#[must_use]
pub fn permissions_converged(current: &[Permission], desired: &[Permission]) -> bool {
    if let [only] = desired
        && current.is_empty()
        && is_baseline_role(&only.role_ref)
    {
        return true;
    }

    if current.len() != desired.len() {
        return false;
    }

    current
        .iter()
        .all(|c| desired.iter().any(|d| d.role_ref == c.role_ref))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const BASE: &str = "http://smc:8082/6.7";

    fn role(index: u32) -> Permission {
        GrantScope::for_api_base(BASE).grant(&format!("{BASE}/elements/role/{index}"))
    }

    #[test]
    fn test_both_empty_converged() {
        assert!(permissions_converged(&[], &[]));
    }

    #[test]
    fn test_order_is_ignored() {
        assert!(permissions_converged(
            &[role(3), role(4)],
            &[role(4), role(3)]
        ));
    }

    #[test]
    fn test_length_mismatch() {
        assert!(!permissions_converged(&[role(3)], &[role(3), role(4)]));
        assert!(!permissions_converged(&[role(3), role(4)], &[role(3)]));
    }

    #[test]
    fn test_different_role() {
        assert!(!permissions_converged(&[role(3)], &[role(4)]));
    }

    #[test]
    fn test_grant_scope_not_compared() {
        let mut other_scope = role(3);
        other_scope.granted_domain_ref = "http://elsewhere/admin_domain/9".to_string();
        other_scope.granted_elements.clear();
        assert!(permissions_converged(&[other_scope], &[role(3)]));
    }

    #[test]
    fn test_baseline_equivalence() {
        assert!(permissions_converged(&[], &[role(1)]));
        // Only the single-permission case is special
        assert!(!permissions_converged(&[], &[role(1), role(2)]));
        assert!(!permissions_converged(&[], &[role(2)]));
        // Role 11 ends in "1" but is not index 1
        assert!(!permissions_converged(&[], &[role(11)]));
    }

    #[test]
    fn test_empty_desired_against_existing() {
        assert!(!permissions_converged(&[role(1)], &[]));
    }

    #[test]
    fn test_grant_scope_for_api_base() {
        let scope = GrantScope::for_api_base("http://smc:8082/6.7/");
        assert_eq!(scope.domain_ref, "http://smc:8082/6.7/elements/admin_domain/1");
        assert_eq!(
            scope.elements,
            vec!["http://smc:8082/6.7/elements/access_control_list/7".to_string()]
        );
    }

    #[test]
    fn test_last_path_segment() {
        assert_eq!(last_path_segment("http://smc/elements/role/12"), "12");
        assert_eq!(last_path_segment("http://smc/elements/role/12/"), "12");
        assert_eq!(last_path_segment("plain"), "plain");
    }

    #[test]
    fn test_permission_list_wire_format() {
        let list = PermissionList::from(vec![role(2)]);
        let json = serde_json::to_value(&list).unwrap();
        assert_eq!(
            json["permission"][0]["role_ref"],
            "http://smc:8082/6.7/elements/role/2"
        );

        let parsed: PermissionList = serde_json::from_str("{}").unwrap();
        assert!(parsed.permission.is_empty());
    }
}
