//! # Playback State
//!
//! The player does not track play/pause on its own. [`PlaybackState`] is
//! folded from the media backend's [`MediaEvent`]s, so it always reflects
//! what the element is actually doing.

use bridge_traits::playback::MediaEvent;
use core_library::models::Track;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Repeat behavior at the end of a track or of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop after the last track.
    #[default]
    Off,
    /// Wrap from the last track to the first.
    All,
    /// Replay the current track.
    One,
}

impl RepeatMode {
    /// Off -> All -> One -> Off
    pub fn next(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatMode::Off => "off",
            RepeatMode::All => "all",
            RepeatMode::One => "one",
        }
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse playback status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    /// Nothing loaded.
    Idle,
    Paused,
    Playing,
    /// Loaded but waiting for data.
    Buffering,
}

/// Media element state as last reported.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub loaded: bool,
    pub is_playing: bool,
    pub buffering: bool,
    pub position: Duration,
    pub duration: Duration,
    pub volume: f32,
    pub muted: bool,
}

impl PlaybackState {
    pub fn new(volume: f32) -> Self {
        Self {
            loaded: false,
            is_playing: false,
            buffering: false,
            position: Duration::ZERO,
            duration: Duration::ZERO,
            volume,
            muted: false,
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        if !self.loaded {
            PlaybackStatus::Idle
        } else if self.buffering {
            PlaybackStatus::Buffering
        } else if self.is_playing {
            PlaybackStatus::Playing
        } else {
            PlaybackStatus::Paused
        }
    }

    /// Fold one backend event into the state.
    pub fn apply(&mut self, event: &MediaEvent) {
        match event {
            MediaEvent::LoadStart => {
                self.loaded = true;
                self.buffering = true;
                self.position = Duration::ZERO;
                self.duration = Duration::ZERO;
            }
            MediaEvent::Waiting => self.buffering = true,
            MediaEvent::CanPlay => self.buffering = false,
            MediaEvent::Playing => {
                self.loaded = true;
                self.is_playing = true;
                self.buffering = false;
            }
            MediaEvent::Paused => self.is_playing = false,
            MediaEvent::TimeUpdate(position) => self.position = *position,
            MediaEvent::DurationChange(duration) => self.duration = *duration,
            MediaEvent::VolumeChange { volume, muted } => {
                self.volume = *volume;
                self.muted = *muted;
            }
            MediaEvent::Ended => {
                self.is_playing = false;
                self.position = self.duration;
            }
            MediaEvent::Error(_) => {
                self.is_playing = false;
                self.buffering = false;
            }
        }
    }
}

/// Read-only view of the player for hosts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub status: PlaybackStatus,
    pub track: Option<Track>,
    pub index: Option<usize>,
    pub queue_length: usize,
    pub position: Duration,
    pub duration: Duration,
    pub volume: f32,
    pub muted: bool,
    pub repeat_mode: RepeatMode,
    pub shuffle: bool,
}

impl PlaybackSnapshot {
    pub fn is_playing(&self) -> bool {
        self.status == PlaybackStatus::Playing
    }
}
