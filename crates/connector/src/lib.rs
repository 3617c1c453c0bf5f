//! SMC connector library.
//!
//! Keeps administrator permissions on a security-management console in step
//! with directory group membership, and serves the provisioning API the
//! identity provider calls.
//!
//! # Security
//!
//! This crate holds HIGH PRIVILEGE credentials:
//! - SMC API authentication key (full administrator management)
//! - Directory service principal password
//!
//! Deploy only where the inbound API is reachable by the identity provider
//! alone.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod directory;
pub mod error;
pub mod provisioning;
pub mod reconcile;
pub mod routes;
pub mod smc;
pub mod state;
