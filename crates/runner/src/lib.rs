//! Per-point pipeline: build the generated project with the selected
//! strategy, run the artifact, and read its accuracy back.

pub mod report;
pub mod results;
pub mod runner;

pub use report::*;
pub use results::*;
pub use runner::*;
