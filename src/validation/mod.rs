//! Resource-independent validation building blocks.
//!
//! - [`field`]: error and path types
//! - [`format`]: single-value format checks
//! - [`diff`]: changed-path sets between two documents
//! - [`immutability`]: table-driven update rules

pub mod diff;
pub mod field;
pub mod format;
pub mod immutability;

pub use diff::FieldDiff;
pub use field::{ErrorKind, ErrorList, FieldError, FieldPath};
pub use immutability::{Mutability, Rule};
