//! In-crate integration tests for the sync pipeline

pub mod support;
