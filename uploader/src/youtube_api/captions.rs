//! YouTube Captions API types for `captions.insert`.

use crate::upload::UploadedResource;
use serde::{Deserialize, Serialize};

/// The body of a `captions.insert` call with `part=snippet`.
///
/// See: <https://developers.google.com/youtube/v3/docs/captions/insert>
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptionInsert {
    pub snippet: CaptionSnippet,
}

/// Basic details about a caption track.
///
/// See: <https://developers.google.com/youtube/v3/docs/captions#snippet>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionSnippet {
    /// The video the track belongs to.
    #[serde(rename = "videoId")]
    pub video_id: String,
    /// BCP-47 language tag, e.g. `en` or `pt-BR`.
    pub language: String,
    /// The name of the caption track, shown to viewers.
    pub name: String,
    /// Draft tracks are not visible to viewers.
    #[serde(rename = "isDraft", skip_serializing_if = "Option::is_none")]
    pub is_draft: Option<bool>,
}

/// A `caption` resource as returned once the upload completes.
#[derive(Debug, Clone, Deserialize)]
pub struct Caption {
    pub id: String,
    #[serde(default)]
    pub snippet: Option<CaptionSnippet>,
}

impl UploadedResource for Caption {
    fn resource_id(&self) -> Option<&str> {
        Some(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn draft_flag_is_omitted_unless_set() {
        let body = CaptionInsert {
            snippet: CaptionSnippet {
                video_id: "v1".to_string(),
                language: "en".to_string(),
                name: "subs.srt".to_string(),
                is_draft: None,
            },
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({ "snippet": { "videoId": "v1", "language": "en", "name": "subs.srt" } })
        );
    }
}
