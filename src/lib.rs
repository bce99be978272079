//! Workspace umbrella crate.
//!
//! Hosts depend on `lossless-workspace` and pick a feature instead of wiring
//! each workspace crate by hand:
//!
//! - `desktop-shims` (default): the full [`core_service`] façade with the
//!   reqwest HTTP client and SQLite settings store.
//! - `api-only`: just the catalog client ([`core_api`]) and models.
//! - `playback-only`: the queue/playback engine ([`core_playback`]) for hosts
//!   that bring their own stream resolver.

#[cfg(feature = "desktop-shims")]
pub use core_service;

#[cfg(feature = "api-only")]
pub use core_api;

#[cfg(feature = "playback-only")]
pub use core_playback;

#[cfg(any(feature = "api-only", feature = "playback-only"))]
pub use core_library;
