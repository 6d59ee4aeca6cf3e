//! # txdata Testkit
//!
//! Test utilities for txdata.
//!
//! This crate provides:
//! - Entity fixtures standing in for generated types, and store helpers
//! - Instrumented accessors that record, fail or panic
//! - Property-based test generators using proptest
//! - Stress testing utilities
//!
//! ## Usage
//!
//! ```rust
//! use txdata_testkit::prelude::*;
//!
//! with_store(|store| {
//!     let team = store.persisted_team(7, "platform");
//!     store
//!         .run(|| team.tags().insert("infra").map(drop))
//!         .unwrap();
//!     assert!(team.tags().contains("infra"));
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod accessors;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::accessors::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use accessors::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;
