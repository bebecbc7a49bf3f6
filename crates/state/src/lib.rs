//! State management for concord.
//!
//! This crate provides:
//! - The per-target baseline fingerprint store, the only state the tool
//!   persists about its own past writes.
//! - Content fingerprinting.
//! - Environment handling: home directory resolution and the optional
//!   secrets file that gates optional MCP servers.

pub mod baselines;
pub mod env;

pub use baselines::{fingerprint, BaselineStore};
pub use env::{home_dir, EnvFile};
