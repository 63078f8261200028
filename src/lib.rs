//! Seamcut - virtual timeline playback for non-destructive video edits
//!
//! This library crate exposes the CLI's building blocks for integration
//! testing. The engine itself lives in the `seamcut-*` workspace crates.

pub mod config;
pub mod edit;
pub mod inspect;
pub mod simulate;

pub use seamcut_player as player;
pub use seamcut_timeline as timeline;
