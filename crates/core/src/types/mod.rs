//! Core types for the SMC connector.
//!
//! This module provides type-safe wrappers for the domain concepts shared by
//! the connector service and the CLI.

pub mod login_name;
pub mod permission;
pub mod role;

pub use login_name::{LoginName, LoginNameError};
pub use permission::{
    BASELINE_ROLE_INDEX, GrantScope, Permission, PermissionList, is_baseline_role,
    last_path_segment, permissions_converged,
};
pub use role::{SmcRole, join_role_names};
