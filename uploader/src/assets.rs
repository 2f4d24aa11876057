//! Locating the optional assets that accompany a video.

use std::path::{Path, PathBuf};

/// Extension of the thumbnail image expected next to the video.
pub const THUMBNAIL_EXTENSION: &str = "jpg";

/// The optional assets that were found on disk for one video.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedAssets {
    pub caption: Option<PathBuf>,
    pub thumbnail: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AssetResolver;

impl AssetResolver {
    /// The thumbnail lives in the video's directory under the video's name with a `.jpg`
    /// extension, whatever extension the video itself has.
    pub fn thumbnail_path(video: &Path) -> PathBuf {
        video.with_extension(THUMBNAIL_EXTENSION)
    }

    pub fn exists(path: &Path) -> bool {
        path.is_file()
    }

    /// Keeps the configured caption and the derived thumbnail only if they exist.
    pub fn resolve(video: &Path, caption: Option<&Path>) -> ResolvedAssets {
        let caption = caption.filter(|p| Self::exists(p)).map(Path::to_path_buf);
        let thumbnail = Some(Self::thumbnail_path(video)).filter(|p| Self::exists(p));
        ResolvedAssets { caption, thumbnail }
    }
}
