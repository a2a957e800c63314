// Library crate - exports the simulation engine and report writers

pub mod report;
pub mod simulation;

// Re-export commonly used types
pub use simulation::*;
