//! # Library Module
//!
//! Catalog domain models shared by the API client and the player, the
//! cover-art URL scheme, and the favorites / recently-played store.

pub mod artwork;
pub mod error;
pub mod models;
pub mod store;

pub use artwork::{cover_url, CoverSize};
pub use error::{LibraryError, Result};
pub use models::{
    Album, AlbumRef, AlbumWithTracks, Artist, ArtistDetails, ArtistRef, AudioQuality,
    MediaMetadata, Playlist, PlaylistWithTracks, SearchResponse, Track,
};
pub use store::{LibraryStore, MemoryLibraryStore};
