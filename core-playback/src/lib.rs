//! # Playback Module
//!
//! Queue and transport state machine over the host's single media element.
//!
//! ## Overview
//!
//! - [`queue`] - the play queue, shuffle and repeat arithmetic
//! - [`state`] - playback state folded from media backend events
//! - [`player`] - [`Player`], the [`PlaybackEngine`] implementation
//! - [`session`] - OS media session metadata and artwork
//!
//! Streams are resolved through a [`StreamResolver`], normally backed by the
//! lossless API client.

pub mod config;
pub mod error;
pub mod player;
pub mod queue;
pub mod session;
pub mod state;
pub mod traits;

pub use config::PlayerConfig;
pub use error::{PlaybackError, Result};
pub use player::Player;
pub use queue::{Advance, PlayQueue, Retreat};
pub use state::{PlaybackSnapshot, PlaybackState, PlaybackStatus, RepeatMode};
pub use traits::{PlaybackEngine, StreamResolver};
