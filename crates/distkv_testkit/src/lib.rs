//! # distkv Testkit
//!
//! Test utilities for distkv.
//!
//! This crate provides:
//! - Fixtures for managers, stores and recorded notifications
//! - Property-based test generators using proptest
//! - A model harness that checks a store against a shadow map
//!
//! ## Usage
//!
//! ```rust,ignore
//! use distkv_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_store() {
//!     with_temp_store(|store| {
//!         store.put("k", 1i64).unwrap();
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
