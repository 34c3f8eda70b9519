//! jvm-recompile library: decides which JVM compilation units an edit forces to recompile.

pub mod adapters;
pub mod app;
pub mod cli;
pub mod domain;
