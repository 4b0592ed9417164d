//! Common test utilities for indexsync
//!
//! Shared fixtures and assertions for the integration suites.

#![allow(dead_code)]

mod assertions;
mod fixtures;

pub use assertions::*;
pub use fixtures::*;
