//! # Host Bridge Traits
//!
//! Capabilities the core needs but each host platform provides differently.
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Single-shot async HTTP
//!
//! ### Playback
//! - [`MediaBackend`](playback::MediaBackend) - The one shared media element
//! - [`MediaSession`](playback::MediaSession) - OS "now playing" integration
//!
//! ### Storage
//! - [`SettingsStore`](storage::SettingsStore) - Key-value preferences storage
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | HTTP + settings |
//! | iOS      | host app            | 📋 Planned |
//! | Android  | host app            | 📋 Planned |
//! | Web      | host app            | 📋 Planned |
//!
//! `MediaBackend` and `MediaSession` are always supplied by the host shell,
//! since they wrap UI-owned objects.
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Adapters convert
//! platform errors into it and keep the message actionable.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so they can be shared across
//! tokio tasks behind `Arc`.

pub mod error;
pub mod http;
pub mod playback;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpRequest, HttpResponse, RetryPolicy};
pub use playback::{
    Artwork, MediaBackend, MediaEvent, MediaSession, MediaSessionAction, MediaSource, NowPlaying,
    PositionState, SessionPlaybackState,
};
pub use storage::SettingsStore;
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
