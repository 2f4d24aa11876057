//! Sequencing of the video, caption and thumbnail uploads of one run.
//!
//! The video goes first. Only once YouTube has assigned it an id can the caption and thumbnail be
//! attached to it, so a failed video upload ends the run. The other two are best effort: their
//! failures are reported and the run carries on.
//!
//! ```text
//! NotStarted -> VideoUploading -> VideoDone -> [CaptionUploading] -> [ThumbnailUploading] -> Finished
//!                     |
//!                     +-> Failed
//! ```

use crate::assets::AssetResolver;
use crate::config::UploadConfig;
use crate::progress::ProgressObserver;
use crate::upload::{
    ChunkSize, ChunkedUploadTask, MediaTransport, UploadEndpoint, UploadRequest, UploadResult,
    Uploaded, UploadedResource,
};
use crate::youtube_api::captions::{Caption, CaptionInsert, CaptionSnippet};
use crate::youtube_api::thumbnails::ThumbnailSetResponse;
use crate::youtube_api::videos::{Video, VideoInsert, VideoSnippet, VideoStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    NotStarted,
    VideoUploading,
    VideoDone,
    CaptionUploading,
    ThumbnailUploading,
    Finished,
    Failed,
}

/// The id of the video uploaded in this run.
///
/// Only exists once the video upload has succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoUploadContext {
    video_id: String,
}

impl VideoUploadContext {
    pub fn from_result(result: &UploadResult) -> Option<Self> {
        if !result.succeeded {
            return None;
        }
        let video_id = result.resource_id.clone()?;
        Some(Self { video_id })
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }
}

/// How far a run got, and what each upload produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub stage: Stage,
    /// Every stage entered, in order.
    pub history: Vec<Stage>,
    pub video: UploadResult,
    /// `None` if no caption was uploaded.
    pub caption: Option<UploadResult>,
    /// `None` if there was no thumbnail next to the video.
    pub thumbnail: Option<UploadResult>,
    pub context: Option<VideoUploadContext>,
}

pub struct UploadOrchestrator<'a, T, O> {
    config: &'a UploadConfig,
    transport: &'a T,
    observer: O,
    stage: Stage,
    history: Vec<Stage>,
}

impl<'a, T, O> UploadOrchestrator<'a, T, O>
where
    T: MediaTransport,
    O: ProgressObserver,
{
    pub fn new(config: &'a UploadConfig, transport: &'a T, observer: O) -> Self {
        Self {
            config,
            transport,
            observer,
            stage: Stage::NotStarted,
            history: Vec::new(),
        }
    }

    fn enter(&mut self, stage: Stage) {
        tracing::debug!(from = ?self.stage, to = ?stage, "upload stage changed");
        self.stage = stage;
        self.history.push(stage);
    }

    async fn upload<R: UploadedResource>(&mut self, request: UploadRequest) -> Uploaded<R> {
        let asset = request.endpoint.asset();
        let uploaded = ChunkedUploadTask::<R>::new(request)
            .run(self.transport, &mut self.observer)
            .await;
        if uploaded.result.succeeded {
            self.observer
                .resource_ready(asset, uploaded.result.resource_id.as_deref());
        }
        uploaded
    }

    /// Runs all uploads.
    ///
    /// Upload failures are part of the outcome; `Err` means a request could not even be put
    /// together.
    pub async fn run(mut self) -> eyre::Result<UploadOutcome> {
        let config = self.config;

        self.enter(Stage::VideoUploading);
        let request = UploadRequest::new(
            &config.video_file,
            "video/*",
            ChunkSize::VIDEO,
            UploadEndpoint::VideosInsert,
        )
        .with_metadata(&VideoInsert {
            snippet: VideoSnippet {
                title: config.title.clone(),
                description: config.description.clone(),
                tags: config.tags.clone(),
                category_id: config.category_id.clone(),
            },
            status: VideoStatus {
                privacy_status: config.privacy_status,
            },
        })?;
        let video = self.upload::<Video>(request).await;

        let Some(context) = VideoUploadContext::from_result(&video.result) else {
            self.enter(Stage::Failed);
            return Ok(UploadOutcome {
                stage: self.stage,
                history: self.history,
                video: video.result,
                caption: None,
                thumbnail: None,
                context: None,
            });
        };
        if let Some(status) = video.response.as_ref().and_then(|v| v.status.as_ref()) {
            tracing::info!(
                video_id = context.video_id(),
                upload_status = ?status.upload_status,
                "video uploaded"
            );
        }
        self.enter(Stage::VideoDone);

        let assets = AssetResolver::resolve(&config.video_file, config.caption_file.as_deref());

        let mut caption = None;
        if let Some(caption_file) = assets.caption {
            self.enter(Stage::CaptionUploading);
            let request = UploadRequest::new(
                &caption_file,
                "*/*",
                ChunkSize::CAPTION,
                UploadEndpoint::CaptionsInsert,
            )
            .with_metadata(&CaptionInsert {
                snippet: CaptionSnippet {
                    video_id: context.video_id().to_string(),
                    language: config.caption_language.clone(),
                    name: caption_file.display().to_string(),
                    is_draft: None,
                },
            })?;
            let uploaded = self.upload::<Caption>(request).await;
            if let Some(detail) = &uploaded.result.error_detail {
                tracing::warn!(%detail, "caption upload failed, continuing without captions");
            }
            caption = Some(uploaded.result);
        } else if let Some(caption_file) = &config.caption_file {
            tracing::debug!(path = %caption_file.display(), "caption file not found, skipping");
        }

        let mut thumbnail = None;
        if let Some(thumbnail_file) = assets.thumbnail {
            self.enter(Stage::ThumbnailUploading);
            let request = UploadRequest::new(
                thumbnail_file,
                "image/jpeg",
                ChunkSize::THUMBNAIL,
                UploadEndpoint::ThumbnailsSet {
                    video_id: context.video_id().to_string(),
                },
            );
            let uploaded = self.upload::<ThumbnailSetResponse>(request).await;
            if let Some(detail) = &uploaded.result.error_detail {
                tracing::warn!(%detail, "thumbnail upload failed");
            }
            thumbnail = Some(uploaded.result);
        }

        self.enter(Stage::Finished);
        Ok(UploadOutcome {
            stage: self.stage,
            history: self.history,
            video: video.result,
            caption,
            thumbnail,
            context: Some(context),
        })
    }
}
