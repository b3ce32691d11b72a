//! State store implementations

pub mod file;
pub mod memory;

pub use file::*;
pub use memory::*;
