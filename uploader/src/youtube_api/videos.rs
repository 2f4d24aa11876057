//! YouTube Videos API types for `videos.insert`.

use crate::upload::UploadedResource;
use serde::{Deserialize, Serialize};

/// Who can see a video.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos#status.privacyStatus>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyStatus {
    Private,
    Public,
    Unlisted,
}

/// The body of a `videos.insert` call with `part=snippet,status`.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos/insert>
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoInsert {
    pub snippet: VideoSnippet,
    pub status: VideoStatus,
}

/// Basic details about a video.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos#snippet>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSnippet {
    pub title: String,
    pub description: String,
    /// Keyword tags associated with the video.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// See <https://developers.google.com/youtube/v3/docs/videoCategories/list>.
    #[serde(rename = "categoryId")]
    pub category_id: String,
}

/// Upload, processing, and privacy state of a video.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos#status>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoStatus {
    #[serde(rename = "privacyStatus")]
    pub privacy_status: PrivacyStatus,
}

/// A `video` resource as returned once the upload completes.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos#resource>
#[derive(Debug, Clone, Deserialize)]
pub struct Video {
    /// The ID that YouTube uses to uniquely identify the video.
    pub id: String,
    #[serde(default)]
    pub snippet: Option<UploadedVideoSnippet>,
    #[serde(default)]
    pub status: Option<UploadedVideoStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadedVideoSnippet {
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadedVideoStatus {
    /// The status of the uploaded video, e.g. `uploaded` or `processed`.
    #[serde(rename = "uploadStatus")]
    pub upload_status: Option<String>,
    #[serde(rename = "privacyStatus")]
    pub privacy_status: Option<PrivacyStatus>,
}

impl UploadedResource for Video {
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
    fn insert_body_uses_api_field_names() {
        let body = VideoInsert {
            snippet: VideoSnippet {
                title: "Launch".to_string(),
                description: "line one\nline two".to_string(),
                tags: vec!["rust".to_string(), "release".to_string()],
                category_id: "28".to_string(),
            },
            status: VideoStatus {
                privacy_status: PrivacyStatus::Unlisted,
            },
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "snippet": {
                    "title": "Launch",
                    "description": "line one\nline two",
                    "tags": ["rust", "release"],
                    "categoryId": "28"
                },
                "status": { "privacyStatus": "unlisted" }
            })
        );
    }

    #[test]
    fn response_with_only_an_id_decodes() {
        let video: Video = serde_json::from_str(r#"{"kind":"youtube#video","id":"abc"}"#).unwrap();
        assert_eq!(video.resource_id(), Some("abc"));
        assert!(video.snippet.is_none());
    }
}
