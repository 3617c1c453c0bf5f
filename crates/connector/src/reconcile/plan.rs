//! Pure planning steps of a reconciliation cycle.
//!
//! Nothing here performs I/O. The engine gathers inputs from the SMC and the
//! directory, asks these functions what the target state is, and applies it.

use std::collections::{BTreeMap, HashSet};

use smc_connector_core::{GrantScope, Permission, SmcRole};

use crate::smc::RoleCatalog;

/// Target role set per administrator, roles in discovery order.
pub type DesiredAssignments = BTreeMap<String, Vec<SmcRole>>;

/// Permissions and superuser flag an administrator should end up with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredPermissions {
    /// Roles actually granted, for logging.
    pub roles: Vec<SmcRole>,
    pub permissions: Vec<Permission>,
    pub superuser: bool,
}

/// Map group membership onto SMC administrators.
///
/// `groups` is in role enumeration order. Members that are not SMC
/// administrators are ignored; a role is appended once per administrator.
#[must_use]
pub fn desired_assignments(
    groups: &[(SmcRole, Vec<String>)],
    administrators: &HashSet<&str>,
) -> DesiredAssignments {
    let mut assignments = DesiredAssignments::new();
    for (role, members) in groups {
        for member in members {
            if !administrators.contains(member.as_str()) {
                continue;
            }
            let roles = assignments.entry(member.clone()).or_default();
            if !roles.contains(role) {
                roles.push(*role);
            }
        }
    }
    assignments
}

/// Build the permission list for one administrator.
///
/// Holding `Superuser` yields exactly one Superuser permission regardless of
/// the other roles. Roles the catalog does not know are skipped.
#[must_use]
pub fn build_permissions(
    roles: &[SmcRole],
    catalog: &RoleCatalog,
    scope: &GrantScope,
) -> DesiredPermissions {
    if roles.iter().any(|r| r.is_superuser())
        && let Some(role_ref) = catalog.get(SmcRole::Superuser.name())
    {
        return DesiredPermissions {
            roles: vec![SmcRole::Superuser],
            permissions: vec![scope.grant(role_ref)],
            superuser: true,
        };
    }

    let (roles, permissions) = roles
        .iter()
        .filter(|r| !r.is_superuser())
        .filter_map(|role| catalog.get(role.name()).map(|href| (*role, scope.grant(href))))
        .unzip();

    DesiredPermissions {
        roles,
        permissions,
        superuser: false,
    }
}

/// Administrators to delete: known to the directory but no longer assigned to
/// the governing application.
///
/// Administrators the directory does not know (local accounts) are never
/// returned.
#[must_use]
pub fn deprovision_candidates(
    administrators: &[String],
    directory_users: &[String],
    assigned: &[String],
) -> Vec<String> {
    let directory: HashSet<&str> = directory_users.iter().map(String::as_str).collect();
    let assigned: HashSet<&str> = assigned.iter().map(String::as_str).collect();

    administrators
        .iter()
        .filter(|name| directory.contains(name.as_str()) && !assigned.contains(name.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://smc:8082/6.7";

    fn catalog() -> RoleCatalog {
        [
            ("Viewer", 1),
            ("Operator", 2),
            ("Editor", 3),
            ("Owner", 4),
            ("Superuser", 9),
        ]
        .into_iter()
        .map(|(name, index)| (name, format!("{BASE}/elements/role/{index}")))
        .collect()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_desired_assignments_keeps_discovery_order() {
        let groups = vec![
            (SmcRole::Editor, names(&["alice", "stranger"])),
            (SmcRole::Operator, names(&["alice", "bob"])),
            (SmcRole::Viewer, names(&["alice"])),
        ];
        let admins: HashSet<&str> = ["alice", "bob", "carol"].into_iter().collect();

        let assignments = desired_assignments(&groups, &admins);

        assert_eq!(
            assignments["alice"],
            vec![SmcRole::Editor, SmcRole::Operator, SmcRole::Viewer]
        );
        assert_eq!(assignments["bob"], vec![SmcRole::Operator]);
        assert!(!assignments.contains_key("stranger"));
        assert!(!assignments.contains_key("carol"));
    }

    #[test]
    fn test_desired_assignments_deduplicates() {
        let groups = vec![(SmcRole::Owner, names(&["alice", "alice"]))];
        let admins: HashSet<&str> = ["alice"].into_iter().collect();
        assert_eq!(desired_assignments(&groups, &admins)["alice"], vec![SmcRole::Owner]);
    }

    #[test]
    fn test_build_permissions_in_order() {
        let scope = GrantScope::for_api_base(BASE);
        let desired = build_permissions(&[SmcRole::Owner, SmcRole::Viewer], &catalog(), &scope);

        assert!(!desired.superuser);
        assert_eq!(desired.roles, vec![SmcRole::Owner, SmcRole::Viewer]);
        let refs: Vec<&str> = desired.permissions.iter().map(|p| p.role_ref.as_str()).collect();
        assert_eq!(
            refs,
            vec![
                "http://smc:8082/6.7/elements/role/4",
                "http://smc:8082/6.7/elements/role/1"
            ]
        );
        assert_eq!(desired.permissions[0].granted_domain_ref, scope.domain_ref);
    }

    #[test]
    fn test_superuser_dominates() {
        let scope = GrantScope::for_api_base(BASE);
        let desired = build_permissions(
            &[SmcRole::Editor, SmcRole::Superuser, SmcRole::Viewer],
            &catalog(),
            &scope,
        );

        assert!(desired.superuser);
        assert_eq!(desired.roles, vec![SmcRole::Superuser]);
        assert_eq!(desired.permissions.len(), 1);
        assert_eq!(
            desired.permissions[0].role_ref,
            "http://smc:8082/6.7/elements/role/9"
        );
    }

    #[test]
    fn test_unknown_roles_skipped() {
        let scope = GrantScope::for_api_base(BASE);
        let desired = build_permissions(&[SmcRole::Monitor, SmcRole::Editor], &catalog(), &scope);
        assert_eq!(desired.roles, vec![SmcRole::Editor]);
        assert_eq!(desired.permissions.len(), 1);
    }

    #[test]
    fn test_deprovision_candidates() {
        let candidates = deprovision_candidates(
            &names(&["A", "B", "C"]),
            &names(&["A", "B", "C", "D"]),
            &names(&["A"]),
        );
        assert_eq!(candidates, names(&["B", "C"]));
    }

    #[test]
    fn test_deprovision_leaves_local_accounts() {
        let candidates = deprovision_candidates(
            &names(&["admin", "alice"]),
            &names(&["alice"]),
            &[],
        );
        assert_eq!(candidates, names(&["alice"]));
    }
}
