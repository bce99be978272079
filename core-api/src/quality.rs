//! Track preparation: artist backfill and audio quality derivation.

use core_library::models::{Album, AudioQuality, Track};

/// Best tier among the candidates, by [`AudioQuality::PRIORITY`].
///
/// Unknown tags are ignored. `None` when nothing matches.
pub fn derive_quality<'a, I>(candidates: I) -> Option<AudioQuality>
where
    I: IntoIterator<Item = &'a str>,
{
    candidates
        .into_iter()
        .filter_map(AudioQuality::from_token)
        .min()
}

/// Normalize a freshly fetched track.
///
/// - `artist` is backfilled from `artists[0]` when absent
/// - `audio_quality` becomes the best tier found across the track's tags,
///   its album's tags and the explicit field
pub fn prepare_track(mut track: Track) -> Track {
    if track.artist.is_none() {
        track.artist = track.artists.first().cloned();
    }

    let explicit = track.audio_quality.map(|q| q.as_str());
    let album_tags = track.album.as_ref().map(|album| album.tags()).unwrap_or_default();

    let derived = derive_quality(
        track
            .tags()
            .iter()
            .chain(album_tags.iter())
            .map(String::as_str)
            .chain(explicit),
    );
    track.audio_quality = derived;
    track
}

/// Same normalization for albums: artist backfill and quality from tags.
pub fn prepare_album(mut album: Album) -> Album {
    if album.artist.is_none() {
        album.artist = album.artists.first().cloned();
    }

    let explicit = album.audio_quality.map(|q| q.as_str());
    let tags: Vec<&str> = album
        .media_metadata
        .as_ref()
        .map(|meta| meta.tags.iter().map(String::as_str).collect())
        .unwrap_or_default();

    album.audio_quality = derive_quality(tags.into_iter().chain(explicit));
    album
}
