pub mod compiler;
pub mod diagnostics;
pub mod source;
pub mod store;
