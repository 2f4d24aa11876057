//! Chunked, resumable upload of one local file as the media payload of an API call.
//!
//! A [`ChunkedUploadTask`] owns the file for the duration of one upload. It opens a resumable
//! session through a [`MediaTransport`], feeds the file to it in [`ChunkSize`] pieces in strictly
//! increasing offset order, reports every acknowledgment to a [`ProgressObserver`], and decodes
//! the final response body into the resource type of the call.
//!
//! The task never retries on its own. If the server stores fewer bytes than were sent (a `308`
//! with a shorter `Range`), the next chunk simply starts at the first byte the server does not
//! have yet.

use crate::error::UploaderError;
use crate::progress::{Asset, ProgressEvent, ProgressObserver};
use bytes::Bytes;
use eyre::Context;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::io::SeekFrom;
use std::marker::PhantomData;
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::instrument;

/// Chunks must be a multiple of this many bytes, and at least this large.
pub const MIN_CHUNK_SIZE: usize = 256 * 1024;

/// Size of the pieces a file is sent in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSize(usize);

impl ChunkSize {
    pub const VIDEO: ChunkSize = ChunkSize(MIN_CHUNK_SIZE);
    pub const CAPTION: ChunkSize = ChunkSize(8 * MIN_CHUNK_SIZE);
    pub const THUMBNAIL: ChunkSize = ChunkSize(32 * MIN_CHUNK_SIZE);

    /// Returns `None` unless `bytes` is a non-zero multiple of [`MIN_CHUNK_SIZE`].
    pub fn new(bytes: usize) -> Option<Self> {
        (bytes >= MIN_CHUNK_SIZE && bytes % MIN_CHUNK_SIZE == 0).then_some(Self(bytes))
    }

    pub fn get(&self) -> usize {
        self.0
    }
}

/// The API call whose media payload an upload provides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEndpoint {
    /// `videos.insert`
    VideosInsert,
    /// `captions.insert`
    CaptionsInsert,
    /// `thumbnails.set` for an existing video.
    ThumbnailsSet { video_id: String },
}

impl UploadEndpoint {
    pub fn asset(&self) -> Asset {
        match self {
            UploadEndpoint::VideosInsert => Asset::Video,
            UploadEndpoint::CaptionsInsert => Asset::Caption,
            UploadEndpoint::ThumbnailsSet { .. } => Asset::Thumbnail,
        }
    }
}

/// Everything needed to upload one file.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub path: PathBuf,
    pub mime_type: String,
    pub chunk_size: ChunkSize,
    pub endpoint: UploadEndpoint,
    /// Resource fields sent as the JSON body when the session is opened.
    pub metadata: Option<serde_json::Value>,
}

impl UploadRequest {
    pub fn new(
        path: impl Into<PathBuf>,
        mime_type: impl Into<String>,
        chunk_size: ChunkSize,
        endpoint: UploadEndpoint,
    ) -> Self {
        Self {
            path: path.into(),
            mime_type: mime_type.into(),
            chunk_size,
            endpoint,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: &impl Serialize) -> eyre::Result<Self> {
        self.metadata = Some(serde_json::to_value(metadata).context("serialize upload metadata")?);
        Ok(self)
    }
}

/// Outcome of one upload, produced exactly once per task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    /// Id of the created or updated resource, if the response names one.
    pub resource_id: Option<String>,
    pub succeeded: bool,
    pub error_detail: Option<String>,
}

impl UploadResult {
    pub fn success(resource_id: Option<String>) -> Self {
        Self {
            resource_id,
            succeeded: true,
            error_detail: None,
        }
    }

    pub fn failure(error_detail: impl Into<String>) -> Self {
        Self {
            resource_id: None,
            succeeded: false,
            error_detail: Some(error_detail.into()),
        }
    }
}

/// An open resumable upload session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    /// Where chunks are sent.
    pub uri: String,
    /// Length of the whole payload, announced when the session was opened.
    pub total_len: u64,
}

/// What the server said after receiving a chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkAck {
    /// The server holds bytes `0..acknowledged` and wants the rest.
    Incomplete { acknowledged: u64 },
    /// The payload is complete; the body is the API's JSON response.
    Complete(Bytes),
}

/// The authenticated client a [`ChunkedUploadTask`] sends its bytes through.
///
/// Implementations own transport concerns such as authentication and retrying an individual
/// chunk after a transient failure.
pub trait MediaTransport {
    /// Opens a resumable session for `request` whose payload is `total_len` bytes long.
    ///
    /// This is the one resource-creation call of an upload.
    fn start_session(
        &self,
        request: &UploadRequest,
        total_len: u64,
    ) -> impl Future<Output = eyre::Result<UploadSession>> + Send;

    /// Sends the bytes starting at `offset`. An empty `chunk` is only sent for an empty payload.
    fn send_chunk(
        &self,
        session: &UploadSession,
        offset: u64,
        chunk: Bytes,
    ) -> impl Future<Output = eyre::Result<ChunkAck>> + Send;
}

/// A resource type an upload call responds with.
pub trait UploadedResource: DeserializeOwned {
    fn resource_id(&self) -> Option<&str>;
}

/// The result of a task together with the decoded response, if there was one.
#[derive(Debug)]
pub struct Uploaded<R> {
    pub result: UploadResult,
    pub response: Option<R>,
}

/// Uploads one file and yields a response of type `R`.
#[derive(Debug)]
pub struct ChunkedUploadTask<R> {
    asset: Asset,
    request: UploadRequest,
    _response: PhantomData<fn() -> R>,
}

impl<R: UploadedResource> ChunkedUploadTask<R> {
    pub fn new(request: UploadRequest) -> Self {
        Self {
            asset: request.endpoint.asset(),
            request,
            _response: PhantomData,
        }
    }

    /// Runs the upload to completion.
    ///
    /// Failures do not surface as `Err`: they end in a [`ProgressEvent::Failed`] and a result
    /// with `succeeded == false`, so the caller decides how much a failed asset matters.
    #[instrument(skip_all, fields(asset = %self.asset, path = %self.request.path.display()))]
    pub async fn run<T, O>(self, transport: &T, observer: &mut O) -> Uploaded<R>
    where
        T: MediaTransport,
        O: ProgressObserver + ?Sized,
    {
        match self.upload(transport, observer).await {
            Ok(response) => {
                observer.observe(self.asset, &ProgressEvent::Completed);
                let resource_id = response.resource_id().map(str::to_owned);
                tracing::debug!(?resource_id, "upload completed");
                Uploaded {
                    result: UploadResult::success(resource_id),
                    response: Some(response),
                }
            }
            Err(cause) => {
                let detail = format!("{cause:#}");
                tracing::debug!(%detail, "upload failed");
                observer.observe(self.asset, &ProgressEvent::Failed { cause });
                Uploaded {
                    result: UploadResult::failure(detail),
                    response: None,
                }
            }
        }
    }

    async fn upload<T, O>(&self, transport: &T, observer: &mut O) -> eyre::Result<R>
    where
        T: MediaTransport,
        O: ProgressObserver + ?Sized,
    {
        let path = &self.request.path;
        let mut file = match File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(UploaderError::FileNotFound(path.clone()).into());
            }
            Err(e) => return Err(e).with_context(|| format!("open {}", path.display())),
        };
        let total_len = file
            .metadata()
            .await
            .with_context(|| format!("read metadata of {}", path.display()))?
            .len();

        observer.observe(self.asset, &ProgressEvent::Starting);

        let session = transport
            .start_session(&self.request, total_len)
            .await
            .context("initiate resumable upload session")?;
        tracing::debug!(uri = %session.uri, total_len, "opened upload session");

        let chunk_size = self.request.chunk_size.get();
        let mut offset = 0;
        loop {
            let chunk = read_chunk(&mut file, offset, chunk_size)
                .await
                .with_context(|| format!("read {} at offset {offset}", path.display()))?;
            let sent_until = offset + chunk.len() as u64;
            tracing::trace!(offset, len = chunk.len(), "sending chunk");

            let ack = transport
                .send_chunk(&session, offset, chunk)
                .await
                .with_context(|| format!("send chunk at offset {offset}"))?;

            match ack {
                ChunkAck::Complete(body) => {
                    observer.observe(
                        self.asset,
                        &ProgressEvent::Uploading {
                            bytes_sent: total_len,
                        },
                    );
                    return serde_json::from_slice(&body).context("decode upload response");
                }
                ChunkAck::Incomplete { acknowledged } => {
                    if acknowledged <= offset {
                        eyre::bail!("server stored no bytes beyond offset {offset}");
                    }
                    if acknowledged > sent_until {
                        eyre::bail!(
                            "server acknowledged {acknowledged} bytes, only {sent_until} were sent"
                        );
                    }
                    offset = acknowledged;
                    observer.observe(self.asset, &ProgressEvent::Uploading { bytes_sent: offset });
                    if offset >= total_len {
                        eyre::bail!(
                            "server still expects data after receiving all {total_len} bytes"
                        );
                    }
                }
            }
        }
    }
}

/// Reads up to `len` bytes starting at `offset`; shorter only at the end of the file.
async fn read_chunk(file: &mut File, offset: u64, len: usize) -> std::io::Result<Bytes> {
    file.seek(SeekFrom::Start(offset)).await?;
    let mut chunk = Vec::with_capacity(len);
    (&mut *file).take(len as u64).read_to_end(&mut chunk).await?;
    Ok(Bytes::from(chunk))
}
