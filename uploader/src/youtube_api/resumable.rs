//! The resumable upload protocol spoken by the YouTube upload endpoints.
//!
//! An upload starts with a `POST` carrying the resource metadata and announcing the media type and
//! length. The `Location` of the response is the session URI, and the media is then `PUT` there
//! piece by piece with a `Content-Range` header. The server answers `308` with a `Range` header
//! while it wants more, and `200`/`201` with the resource once it has everything.
//!
//! See: <https://developers.google.com/youtube/v3/guides/using_resumable_upload_protocol>

use crate::upload::{ChunkAck, MediaTransport, UploadEndpoint, UploadRequest, UploadSession};
use crate::youtube_api::client::{YouTubeClient, ensure_success};
use bytes::Bytes;
use eyre::Context;
use http::{Method, StatusCode};
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, LOCATION, RANGE};
use tracing::instrument;

/// How often one chunk is sent before a transient failure becomes fatal.
const MAX_CHUNK_ATTEMPTS: u32 = 3;

/// Why a chunk `PUT` did not get an answer we could use.
#[derive(Debug)]
enum ChunkFailure {
    /// The connection broke or the server had a problem; sending the chunk again may work.
    Transient(eyre::Report),
    Fatal(eyre::Report),
}

impl MediaTransport for YouTubeClient {
    #[instrument(skip(self, request), fields(endpoint = ?request.endpoint))]
    async fn start_session(
        &self,
        request: &UploadRequest,
        total_len: u64,
    ) -> eyre::Result<UploadSession> {
        let (resource, mut query_params) = session_target(&request.endpoint);
        query_params.push(("uploadType", "resumable".to_string()));
        let url = format!("{}/{resource}", self.upload_base());

        let access_token = self.fresh_access_token().await?;
        let mut http_request = self
            .http_client()
            .post(&url)
            .bearer_auth(access_token)
            .query(&query_params)
            .header("X-Upload-Content-Type", &request.mime_type)
            .header("X-Upload-Content-Length", total_len);
        http_request = match &request.metadata {
            Some(metadata) => http_request.json(metadata),
            None => http_request.header(CONTENT_LENGTH, 0u64),
        };

        let response = http_request
            .send()
            .await
            .with_context(|| format!("send POST request to YouTube API: {url}"))?;
        let response = ensure_success(&Method::POST, response).await?;

        let uri = response
            .headers()
            .get(LOCATION)
            .ok_or_else(|| eyre::eyre!("upload session response has no Location header"))?
            .to_str()
            .context("upload session Location is not valid UTF-8")?
            .to_string();

        Ok(UploadSession { uri, total_len })
    }

    #[instrument(skip(self, session, chunk), fields(len = chunk.len()))]
    async fn send_chunk(
        &self,
        session: &UploadSession,
        offset: u64,
        chunk: Bytes,
    ) -> eyre::Result<ChunkAck> {
        let range = content_range(offset, chunk.len() as u64, session.total_len);
        let mut attempt = 1;
        loop {
            match self.put_chunk(session, &range, chunk.clone()).await {
                Ok(ack) => return Ok(ack),
                Err(ChunkFailure::Transient(e)) if attempt < MAX_CHUNK_ATTEMPTS => {
                    let backoff = self.retry_delay() * (1 << (attempt - 1));
                    tracing::warn!(attempt, ?backoff, "chunk upload failed, retrying: {:#}", e);
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(ChunkFailure::Transient(e)) => {
                    return Err(e.wrap_err(format!("giving up after {attempt} attempts")));
                }
                Err(ChunkFailure::Fatal(e)) => return Err(e),
            }
        }
    }
}

impl YouTubeClient {
    async fn put_chunk(
        &self,
        session: &UploadSession,
        range: &str,
        chunk: Bytes,
    ) -> Result<ChunkAck, ChunkFailure> {
        let access_token = self
            .fresh_access_token()
            .await
            .map_err(ChunkFailure::Fatal)?;

        let response = self
            .http_client()
            .put(&session.uri)
            .bearer_auth(access_token)
            .header(CONTENT_RANGE, range)
            .body(chunk)
            .send()
            .await
            .map_err(|e| ChunkFailure::Transient(eyre::Report::new(e).wrap_err("send chunk")))?;

        let status = response.status();
        if status == StatusCode::PERMANENT_REDIRECT {
            let acknowledged = match response.headers().get(RANGE) {
                Some(value) => value
                    .to_str()
                    .map_err(eyre::Report::new)
                    .and_then(parse_range)
                    .map_err(|e| ChunkFailure::Fatal(e.wrap_err("unusable Range header")))?,
                // Nothing has been stored yet.
                None => 0,
            };
            tracing::trace!(acknowledged, "server wants more");
            return Ok(ChunkAck::Incomplete { acknowledged });
        }

        if status.is_success() {
            let body = response.bytes().await.map_err(|e| {
                ChunkFailure::Transient(eyre::Report::new(e).wrap_err("read upload response"))
            })?;
            return Ok(ChunkAck::Complete(body));
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        let e = eyre::eyre!("chunk upload failed with status {}: {}", status, error_text);
        if status.is_server_error() {
            Err(ChunkFailure::Transient(e))
        } else {
            Err(ChunkFailure::Fatal(e))
        }
    }
}

/// Path below the upload base URL and query parameters that start a session for `endpoint`.
fn session_target(endpoint: &UploadEndpoint) -> (&'static str, Vec<(&'static str, String)>) {
    match endpoint {
        UploadEndpoint::VideosInsert => ("videos", vec![("part", "snippet,status".to_string())]),
        UploadEndpoint::CaptionsInsert => ("captions", vec![("part", "snippet".to_string())]),
        UploadEndpoint::ThumbnailsSet { video_id } => {
            ("thumbnails/set", vec![("videoId", video_id.clone())])
        }
    }
}

/// `Content-Range` value for `len` bytes at `offset` of a `total`-byte payload.
fn content_range(offset: u64, len: u64, total: u64) -> String {
    if len == 0 {
        format!("bytes */{total}")
    } else {
        format!("bytes {}-{}/{}", offset, offset + len - 1, total)
    }
}

/// Parses a `Range: bytes=0-<last>` acknowledgment into the number of bytes stored.
fn parse_range(value: &str) -> eyre::Result<u64> {
    let (first, last) = value
        .trim()
        .strip_prefix("bytes=")
        .and_then(|range| range.split_once('-'))
        .ok_or_else(|| eyre::eyre!("malformed range '{value}'"))?;
    if first != "0" {
        eyre::bail!("range '{value}' does not start at the first byte");
    }
    let last: u64 = last
        .parse()
        .with_context(|| format!("malformed range end in '{value}'"))?;
    Ok(last + 1)
}
