//! Toolchain support for edgesweep: resolve the build tool once, wrap each
//! toolchain kind in a [`BuildStrategy`], and run child processes under a
//! bounded, self-cleaning [`ScopedProcess`].

pub mod process;
pub mod resolver;
pub mod strategy;

pub use process::*;
pub use resolver::*;
pub use strategy::*;
