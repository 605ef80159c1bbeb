//! Shared test utilities for the gitfs workspace.
//!
//! Dev-dependency only; never published.
//!
//! # Modules
//!
//! - [`git`]: git repository fixtures, including a working tree wired to a
//!   bare remote

pub mod git;
