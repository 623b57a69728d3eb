//! Colibri Core - Shared domain types.
//!
//! This crate provides the domain model shared by the Colibri components:
//! - `storefront` - Public-facing storefront API
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP
//! clients. Repositories and service clients live in the storefront crate and
//! map these types at their boundaries.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
