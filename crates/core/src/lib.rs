//! SMC Connector Core - Shared types library.
//!
//! This crate provides the types used by every SMC connector component:
//! - `smc-connector` - The reconciliation service and its inbound API
//! - `smcctl` - Operator command-line tool
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients. The permission comparison that decides whether a write is needed
//! lives here so it can be tested in isolation.
//!
//! # Modules
//!
//! - [`types`] - Login names, recognized roles, and permissions

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
