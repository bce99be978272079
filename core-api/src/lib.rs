//! # Lossless API Client
//!
//! Client for the lossless catalog API and the pieces around it:
//!
//! - [`client`] - [`LosslessApi`] with multi-instance failover and caching
//! - [`cache`] - per-kind TTL cache and the stream URL cache
//! - [`normalize`] - locating `items` sections in loosely shaped responses
//! - [`quality`] - artist backfill and audio quality derivation
//! - [`manifest`] - decoding playback manifests into stream URLs
//! - [`lyrics`] - lyrics responses and LRC parsing

pub mod cache;
pub mod client;
pub mod error;
pub mod lyrics;
pub mod manifest;
pub mod normalize;
pub mod quality;

pub use cache::{ApiCache, CacheKind, CacheStats, StreamUrlCache};
pub use client::{LosslessApi, RequestOptions, StreamInfo, TrackLookup};
pub use error::{ApiError, Result};
pub use lyrics::{LyricLine, Lyrics};
pub use tokio_util::sync::CancellationToken;
