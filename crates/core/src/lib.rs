//! Core vocabulary shared by every edgesweep crate: the sweep axes and the
//! validated per-point [`RunConfiguration`].

pub mod config;
pub mod error;

pub use config::*;
pub use error::*;
