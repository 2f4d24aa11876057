//! YouTube Thumbnails API types for `thumbnails.set`.

use crate::upload::UploadedResource;
use serde::Deserialize;
use std::collections::HashMap;

/// Response of `thumbnails.set`.
///
/// The call updates an existing video, so the response names no resource of its own.
///
/// See: <https://developers.google.com/youtube/v3/docs/thumbnails/set>
#[derive(Debug, Clone, Deserialize)]
pub struct ThumbnailSetResponse {
    #[serde(default)]
    pub kind: Option<String>,
    /// One entry per thumbnail set, keyed by size name (`default`, `medium`, `high`, ...).
    #[serde(default)]
    pub items: Vec<HashMap<String, Thumbnail>>,
}

/// See: <https://developers.google.com/youtube/v3/docs/thumbnails#resource>
#[derive(Debug, Clone, Deserialize)]
pub struct Thumbnail {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl UploadedResource for ThumbnailSetResponse {
    fn resource_id(&self) -> Option<&str> {
        None
    }
}
