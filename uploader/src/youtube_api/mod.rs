//! YouTube Data API v3 client library.
//!
//! The pieces of the API this tool needs: an authenticated [`YouTubeClient`] that refreshes its
//! access token on demand, the resource types of the three upload calls, and the resumable upload
//! protocol that lets the client act as a [`MediaTransport`](crate::upload::MediaTransport).
//!
//! # Upload calls
//!
//! | Call              | Body                            | Response                            |
//! |-------------------|---------------------------------|-------------------------------------|
//! | `videos.insert`   | [`videos::VideoInsert`]         | [`videos::Video`]                   |
//! | `captions.insert` | [`captions::CaptionInsert`]     | [`captions::Caption`]               |
//! | `thumbnails.set`  | none, the video id is the query | [`thumbnails::ThumbnailSetResponse`] |

pub mod captions;
pub mod channels;
pub mod client;
mod resumable;
pub mod thumbnails;
pub mod videos;

pub use client::{TimeBoundAccessToken, YouTubeClient};

pub use captions::{Caption, CaptionInsert, CaptionSnippet};
pub use channels::{Channel, ChannelSnippet};
pub use thumbnails::ThumbnailSetResponse;
pub use videos::{PrivacyStatus, Video, VideoInsert, VideoSnippet, VideoStatus};
