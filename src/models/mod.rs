//! Core data models for the overlay statistics pipeline.

mod age;
mod analysis;
mod civilization;
mod clock;
mod match_summary;

pub use age::*;
pub use analysis::*;
pub use civilization::*;
pub use clock::*;
pub use match_summary::*;
