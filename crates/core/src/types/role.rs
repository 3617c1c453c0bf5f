//! SMC role names recognized by the connector.

use serde::{Deserialize, Serialize};

/// A role-bearing directory group that maps onto an SMC role of the same name.
///
/// Directory groups and SMC roles are joined by name, so the `Display` form is
/// the exact SMC catalog name (e.g. `"NSX Role"`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SmcRole {
    Editor,
    Operator,
    Owner,
    Viewer,
    /// Full console access. Dominates every other role.
    Superuser,
    #[serde(rename = "NSX Role")]
    NsxRole,
    #[serde(rename = "Logs Viewer")]
    LogsViewer,
    #[serde(rename = "Reports Manager")]
    ReportsManager,
    Monitor,
}

impl SmcRole {
    /// Every recognized role, in the order directory groups are scanned.
    pub const ALL: [Self; 9] = [
        Self::Editor,
        Self::Operator,
        Self::Owner,
        Self::Viewer,
        Self::Superuser,
        Self::NsxRole,
        Self::LogsViewer,
        Self::ReportsManager,
        Self::Monitor,
    ];

    /// SMC catalog name of the role.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Editor => "Editor",
            Self::Operator => "Operator",
            Self::Owner => "Owner",
            Self::Viewer => "Viewer",
            Self::Superuser => "Superuser",
            Self::NsxRole => "NSX Role",
            Self::LogsViewer => "Logs Viewer",
            Self::ReportsManager => "Reports Manager",
            Self::Monitor => "Monitor",
        }
    }

    /// Upper snake case key used for the role's configuration flag
    /// (`ROLES_PERMISSIONS_<KEY>`).
    #[must_use]
    pub const fn config_key(self) -> &'static str {
        match self {
            Self::Editor => "EDITOR",
            Self::Operator => "OPERATOR",
            Self::Owner => "OWNER",
            Self::Viewer => "VIEWER",
            Self::Superuser => "SUPERUSER",
            Self::NsxRole => "NSX_ROLE",
            Self::LogsViewer => "LOGS_VIEWER",
            Self::ReportsManager => "REPORTS_MANAGER",
            Self::Monitor => "MONITOR",
        }
    }

    #[must_use]
    pub const fn is_superuser(self) -> bool {
        matches!(self, Self::Superuser)
    }
}

impl std::fmt::Display for SmcRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for SmcRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.name() == s)
            .ok_or_else(|| format!("unrecognized SMC role: {s}"))
    }
}

/// Joins role names for log output (`"Editor, Viewer"`).
#[must_use]
pub fn join_role_names(roles: &[SmcRole]) -> String {
    roles
        .iter()
        .map(|r| r.name())
        .collect::<Vec<_>>()
        .join(", ")
}
