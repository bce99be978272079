//! Domain models for the catalog
//!
//! Shapes follow the wrapped API's JSON (camelCase). Optional fields default
//! when absent, so partially populated search results still deserialize.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// =============================================================================
// Audio quality
// =============================================================================

/// Streaming quality tier, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AudioQuality {
    HiResLossless,
    Lossless,
    High,
    Low,
}

impl AudioQuality {
    /// Every tier in priority order.
    pub const PRIORITY: [AudioQuality; 4] = [
        AudioQuality::HiResLossless,
        AudioQuality::Lossless,
        AudioQuality::High,
        AudioQuality::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AudioQuality::HiResLossless => "HI_RES_LOSSLESS",
            AudioQuality::Lossless => "LOSSLESS",
            AudioQuality::High => "HIGH",
            AudioQuality::Low => "LOW",
        }
    }

    /// Map a raw tag to a tier.
    ///
    /// Tokens are uppercased and `-`/space become `_` first, so
    /// `"hi-res lossless"` and `"HIRES_LOSSLESS"` both land on
    /// [`AudioQuality::HiResLossless`]. Unknown tags yield `None`.
    pub fn from_token(raw: &str) -> Option<Self> {
        let token: String = raw
            .trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect();

        match token.as_str() {
            "HI_RES_LOSSLESS" | "HIRES_LOSSLESS" | "HI_RES" | "HIRES" => {
                Some(AudioQuality::HiResLossless)
            }
            "LOSSLESS" => Some(AudioQuality::Lossless),
            "HIGH" => Some(AudioQuality::High),
            "LOW" => Some(AudioQuality::Low),
            _ => None,
        }
    }

    pub fn is_lossless(&self) -> bool {
        matches!(self, AudioQuality::HiResLossless | AudioQuality::Lossless)
    }
}

impl Default for AudioQuality {
    fn default() -> Self {
        AudioQuality::Lossless
    }
}

impl fmt::Display for AudioQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_token(s).ok_or_else(|| format!("Unknown audio quality: {}", s))
    }
}

/// Unknown or malformed quality strings become `None` instead of failing
/// the whole record.
fn lenient_quality<'de, D>(deserializer: D) -> Result<Option<AudioQuality>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(AudioQuality::from_token))
}

// =============================================================================
// References
// =============================================================================

/// Artist as embedded in tracks and albums.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistRef {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub picture: Option<String>,
    /// `MAIN` or `FEATURED`
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// Album as embedded in tracks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumRef {
    pub id: i64,
    pub title: String,
    /// Cover image id (`xxxxxxxx-xxxx-...`)
    #[serde(default)]
    pub cover: Option<String>,
    #[serde(default)]
    pub vibrant_color: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub media_metadata: Option<MediaMetadata>,
}

impl AlbumRef {
    pub fn tags(&self) -> &[String] {
        self.media_metadata
            .as_ref()
            .map(|meta| meta.tags.as_slice())
            .unwrap_or_default()
    }
}

/// Tags such as `LOSSLESS`, `HIRES_LOSSLESS`, `DOLBY_ATMOS`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaMetadata {
    #[serde(default)]
    pub tags: Vec<String>,
}

// =============================================================================
// Catalog entities
// =============================================================================

/// A streamable track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: i64,
    pub title: String,
    /// Seconds
    #[serde(default)]
    pub duration: u32,
    /// Edition suffix, e.g. "Radio Edit"
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub explicit: bool,
    #[serde(default, deserialize_with = "lenient_quality")]
    pub audio_quality: Option<AudioQuality>,
    #[serde(default)]
    pub artist: Option<ArtistRef>,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    #[serde(default)]
    pub album: Option<AlbumRef>,
    #[serde(default)]
    pub media_metadata: Option<MediaMetadata>,
    #[serde(default)]
    pub bpm: Option<u32>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub isrc: Option<String>,
    #[serde(default)]
    pub popularity: Option<u32>,
    #[serde(default)]
    pub track_number: Option<u32>,
    #[serde(default)]
    pub volume_number: Option<u32>,
    #[serde(default)]
    pub replay_gain: Option<f64>,
    #[serde(default)]
    pub peak: Option<f64>,
    #[serde(default)]
    pub copyright: Option<String>,
}

impl Track {
    /// Minimal track, mostly for tests and hosts building queues by hand.
    pub fn new(id: i64, title: impl Into<String>, duration: u32) -> Self {
        Self {
            id,
            title: title.into(),
            duration,
            version: None,
            explicit: false,
            audio_quality: None,
            artist: None,
            artists: Vec::new(),
            album: None,
            media_metadata: None,
            bpm: None,
            key: None,
            isrc: None,
            popularity: None,
            track_number: None,
            volume_number: None,
            replay_gain: None,
            peak: None,
            copyright: None,
        }
    }

    pub fn with_artist(mut self, artist: ArtistRef) -> Self {
        self.artists.push(artist.clone());
        self.artist = Some(artist);
        self
    }

    pub fn with_album(mut self, album: AlbumRef) -> Self {
        self.album = Some(album);
        self
    }

    /// Validate track data
    pub fn validate(&self) -> Result<(), String> {
        if self.id <= 0 {
            return Err(format!("Track id {} must be positive", self.id));
        }

        if self.title.trim().is_empty() {
            return Err("Track title cannot be empty".to_string());
        }

        Ok(())
    }

    /// Title with the version suffix, e.g. "Around the World (Radio Edit)".
    pub fn full_title(&self) -> String {
        match self.version.as_deref().map(str::trim) {
            Some(version) if !version.is_empty() => format!("{} ({})", self.title, version),
            _ => self.title.clone(),
        }
    }

    /// Primary artist name, falling back to the first credited artist.
    pub fn artist_name(&self) -> Option<&str> {
        self.artist
            .as_ref()
            .or_else(|| self.artists.first())
            .map(|artist| artist.name.as_str())
    }

    /// All credited artists joined for display.
    pub fn artists_display(&self) -> String {
        if self.artists.is_empty() {
            return self.artist_name().unwrap_or_default().to_string();
        }
        self.artists
            .iter()
            .map(|artist| artist.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn album_title(&self) -> Option<&str> {
        self.album.as_ref().map(|album| album.title.as_str())
    }

    pub fn cover_id(&self) -> Option<&str> {
        self.album.as_ref().and_then(|album| album.cover.as_deref())
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.duration))
    }

    pub fn tags(&self) -> &[String] {
        self.media_metadata
            .as_ref()
            .map(|meta| meta.tags.as_slice())
            .unwrap_or_default()
    }
}

/// An album.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub artist: Option<ArtistRef>,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    #[serde(default)]
    pub cover: Option<String>,
    #[serde(default)]
    pub number_of_tracks: Option<u32>,
    #[serde(default)]
    pub number_of_volumes: Option<u32>,
    /// Seconds
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub explicit: bool,
    #[serde(default, deserialize_with = "lenient_quality")]
    pub audio_quality: Option<AudioQuality>,
    #[serde(default)]
    pub media_metadata: Option<MediaMetadata>,
    #[serde(default)]
    pub popularity: Option<u32>,
    #[serde(default)]
    pub upc: Option<String>,
    #[serde(default)]
    pub copyright: Option<String>,
}

impl Album {
    pub fn artist_name(&self) -> Option<&str> {
        self.artist
            .as_ref()
            .or_else(|| self.artists.first())
            .map(|artist| artist.name.as_str())
    }

    /// Four-digit release year, when the date is present.
    pub fn release_year(&self) -> Option<u16> {
        self.release_date
            .as_deref()
            .and_then(|date| date.get(..4))
            .and_then(|year| year.parse().ok())
    }
}

/// An artist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artist {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub popularity: Option<u32>,
    #[serde(default)]
    pub artist_types: Vec<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// A curated or user playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub uuid: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub number_of_tracks: Option<u32>,
    /// Seconds
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub square_image: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

impl Playlist {
    /// Square image preferred; cover URLs are square.
    pub fn cover_id(&self) -> Option<&str> {
        self.square_image.as_deref().or(self.image.as_deref())
    }
}

/// An album with its track listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumWithTracks {
    pub album: Album,
    pub tracks: Vec<Track>,
}

/// An artist page: the artist plus top tracks and albums.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistDetails {
    pub artist: Artist,
    pub tracks: Vec<Track>,
    pub albums: Vec<Album>,
}

/// A playlist with its tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistWithTracks {
    pub playlist: Playlist,
    pub tracks: Vec<Track>,
}

// =============================================================================
// Search
// =============================================================================

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub total_number_of_items: u32,
}

impl<T> SearchResponse<T> {
    /// No results; what a response without the requested section becomes.
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            limit: 0,
            offset: 0,
            total_number_of_items: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> SearchResponse<U> {
        SearchResponse {
            items: self.items.into_iter().map(f).collect(),
            limit: self.limit,
            offset: self.offset,
            total_number_of_items: self.total_number_of_items,
        }
    }
}

impl<T> Default for SearchResponse<T> {
    fn default() -> Self {
        Self::empty()
    }
}
