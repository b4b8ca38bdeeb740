//! edgesweep orchestration facade.

#[cfg(feature = "cli")]
pub mod cli;
pub mod error;
pub mod layout;
pub mod producer;
pub mod settings;
pub mod summary;
pub mod sweep;

#[cfg(feature = "cli")]
pub use cli::*;
pub use error::*;
pub use layout::*;
pub use producer::*;
pub use settings::*;
pub use summary::*;
pub use sweep::*;
