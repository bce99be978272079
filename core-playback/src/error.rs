//! # Playback Error Types

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Queue Errors
    // ========================================================================
    /// Index does not point into the queue.
    #[error("Queue index {index} out of range (length {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// The playing track cannot be removed from the queue.
    #[error("Cannot remove the current track from the queue")]
    CannotRemoveCurrent,

    // ========================================================================
    // Playback Control Errors
    // ========================================================================
    /// Attempted operation when no track is loaded.
    #[error("No track loaded")]
    NoTrackLoaded,

    /// Invalid volume value (must be in range [0.0, 1.0]).
    #[error("Invalid volume: {0} (must be between 0.0 and 1.0)")]
    InvalidVolume(f32),

    /// Stream resolution failed for a track.
    #[error("Failed to resolve stream for track {track_id}: {message}")]
    ResolveFailed { track_id: i64, message: String },

    // ========================================================================
    // Platform/Adapter Errors
    // ========================================================================
    /// The media backend rejected a command.
    #[error("Media backend error: {0}")]
    Backend(#[from] BridgeError),

    /// Library error from core-library.
    #[error("Library error: {0}")]
    Library(#[from] core_library::error::LibraryError),
}

impl PlaybackError {
    /// Returns `true` if retrying the same command may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            PlaybackError::ResolveFailed { .. } => true,
            PlaybackError::Backend(err) => err.is_transient(),
            _ => false,
        }
    }

    /// Returns `true` if the caller passed a bad argument.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            PlaybackError::IndexOutOfRange { .. }
                | PlaybackError::CannotRemoveCurrent
                | PlaybackError::InvalidVolume(_)
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
