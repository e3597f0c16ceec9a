//! Helpers shared by the integration test targets.

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

pub mod fixtures;
