pub mod analysis;
pub mod descriptor;
pub mod edge;
pub mod graph;
pub mod fold;
pub mod analyzer;
pub mod classifier;
pub mod propagator;
pub mod plan;
pub mod baseline;
pub mod error;
pub mod ports;
