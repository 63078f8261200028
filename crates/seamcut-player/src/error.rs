//! Usage errors surfaced synchronously by the player.

/// Errors returned directly from [`PlayerController`](crate::PlayerController)
/// calls. Seek outcomes use [`SeekError`](crate::SeekError) instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlayerError {
    /// The operation needs a media element and none is attached.
    #[error("no media element attached; cannot {operation}")]
    NotAttached {
        /// The operation that was attempted.
        operation: &'static str,
    },
}
