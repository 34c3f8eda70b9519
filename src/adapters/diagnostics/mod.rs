pub mod recording;
pub mod tracing_sink;
