//! # Player Configuration
//!
//! Settings the player reads on every decision. Usually derived from the
//! shared client configuration with [`PlayerConfig::from_client`].

use core_library::models::AudioQuality;
use core_runtime::config::ClientConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Player configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Past this position "previous" restarts the current track instead of
    /// going back.
    ///
    /// Default: 3 seconds.
    #[serde(default = "default_restart_threshold")]
    pub restart_threshold: Duration,

    /// Quality requested when resolving streams.
    ///
    /// Default: `LOSSLESS`.
    #[serde(default)]
    pub quality: AudioQuality,

    /// Proxy base for media-session artwork URLs.
    #[serde(default)]
    pub cover_proxy_base: Option<String>,

    /// Initial output volume, `0.0..=1.0`.
    ///
    /// Default: 1.0.
    #[serde(default = "default_volume")]
    pub initial_volume: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            restart_threshold: default_restart_threshold(),
            quality: AudioQuality::default(),
            cover_proxy_base: None,
            initial_volume: default_volume(),
        }
    }
}

impl PlayerConfig {
    /// Take the playback-related settings from a client configuration.
    /// An unrecognized quality token falls back to the default.
    pub fn from_client(config: &ClientConfig) -> Self {
        Self {
            restart_threshold: config.restart_threshold,
            quality: AudioQuality::from_token(&config.preferred_quality).unwrap_or_default(),
            cover_proxy_base: config.cover_proxy_base.clone(),
            ..Self::default()
        }
    }

    pub fn with_quality(mut self, quality: AudioQuality) -> Self {
        self.quality = quality;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.initial_volume) {
            return Err("initial_volume must be between 0.0 and 1.0".to_string());
        }

        Ok(())
    }
}

fn default_restart_threshold() -> Duration {
    Duration::from_secs(3)
}

fn default_volume() -> f32 {
    1.0
}
