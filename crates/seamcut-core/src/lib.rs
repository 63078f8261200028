//! seamcut-core: shared types, IDs, errors, configuration and clocks.
//!
//! This crate is the foundational dependency for the other seamcut crates,
//! providing type-safe identifiers, a unified error type, engine
//! configuration and the monotonic clock the playback engine runs on.

pub mod clock;
pub mod config;
pub mod error;
pub mod ids;

// Re-export the most commonly used items at the crate root.
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::Config;
pub use error::{Error, Result};
pub use ids::*;
