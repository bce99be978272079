//! Cover art URLs
//!
//! Image ids look like `a1b2c3d4-0000-1111-2222-333344445555`. The image CDN
//! stores them as a path: dashes become slashes, followed by
//! `<width>x<height>.jpg`.

use serde::{Deserialize, Serialize};

/// Image CDN host.
pub const IMAGE_HOST: &str = "https://resources.tidal.com";

/// Square renditions the CDN serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoverSize {
    Tiny,
    Small,
    Medium,
    Large,
    Original,
}

impl CoverSize {
    /// Every rendition, smallest first.
    pub const ALL: [CoverSize; 5] = [
        CoverSize::Tiny,
        CoverSize::Small,
        CoverSize::Medium,
        CoverSize::Large,
        CoverSize::Original,
    ];

    pub fn pixels(&self) -> u32 {
        match self {
            CoverSize::Tiny => 80,
            CoverSize::Small => 160,
            CoverSize::Medium => 320,
            CoverSize::Large => 640,
            CoverSize::Original => 1280,
        }
    }

    /// `"<w>x<h>"`
    pub fn dimensions(&self) -> String {
        format!("{0}x{0}", self.pixels())
    }

    /// Smallest rendition at least `pixels` wide, capped at [`CoverSize::Original`].
    pub fn at_least(pixels: u32) -> Self {
        Self::ALL
            .into_iter()
            .find(|size| size.pixels() >= pixels)
            .unwrap_or(CoverSize::Original)
    }
}

impl Default for CoverSize {
    fn default() -> Self {
        CoverSize::Medium
    }
}

/// Build the URL for an image id.
///
/// `proxy_base`, when given, replaces [`IMAGE_HOST`]; the path is kept.
/// Returns `None` for an empty id.
pub fn cover_url(image_id: &str, size: CoverSize, proxy_base: Option<&str>) -> Option<String> {
    let image_id = image_id.trim();
    if image_id.is_empty() {
        return None;
    }

    let host = proxy_base
        .map(|base| base.trim_end_matches('/'))
        .unwrap_or(IMAGE_HOST);

    Some(format!(
        "{}/images/{}/{}.jpg",
        host,
        image_id.replace('-', "/"),
        size.dimensions()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cover_url_layout() {
        let url = cover_url(
            "a1b2c3d4-0000-1111-2222-333344445555",
            CoverSize::Large,
            None,
        )
        .unwrap();
        assert_eq!(
            url,
            "https://resources.tidal.com/images/a1b2c3d4/0000/1111/2222/333344445555/640x640.jpg"
        );
    }

    #[test]
    fn test_cover_url_through_proxy() {
        let url = cover_url("ab-cd", CoverSize::Tiny, Some("https://img.example.com/")).unwrap();
        assert_eq!(url, "https://img.example.com/images/ab/cd/80x80.jpg");
    }

    #[test]
    fn test_empty_id_has_no_url() {
        assert_eq!(cover_url("  ", CoverSize::Small, None), None);
    }

    #[test]
    fn test_size_selection() {
        assert_eq!(CoverSize::at_least(100), CoverSize::Small);
        assert_eq!(CoverSize::at_least(320), CoverSize::Medium);
        assert_eq!(CoverSize::at_least(5000), CoverSize::Original);
        assert_eq!(CoverSize::Original.dimensions(), "1280x1280");
    }
}
