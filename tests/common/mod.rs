//! Shared test utilities for integration tests.
//! Not compiled as a test binary of its own; test files include it with `mod common;`.
#![allow(dead_code)]

pub mod fixtures;
pub mod mock;
