//! In-process stand-ins for the network side of an upload.

use crate::oauth::{ClientSecrets, OAuthManager};
use crate::progress::{Asset, ProgressEvent, ProgressObserver};
use crate::upload::{ChunkAck, MediaTransport, UploadEndpoint, UploadRequest, UploadSession};
use crate::youtube_api::client::{TimeBoundAccessToken, YouTubeClient};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use std::collections::{HashMap, HashSet, VecDeque};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) const VIDEO_ID: &str = "vid-8f3k2";
pub(crate) const CAPTION_ID: &str = "cap-19xa";

/// A session the fake was asked to open.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OpenedSession {
    pub endpoint: UploadEndpoint,
    pub mime_type: String,
    pub metadata: Option<serde_json::Value>,
    pub total_len: u64,
}

#[derive(Debug, Default)]
struct State {
    sessions: Vec<OpenedSession>,
    /// Per session uri: the asset it belongs to and the bytes stored so far.
    stored: HashMap<String, (Asset, Vec<u8>)>,
    chunks: Vec<(Asset, u64, u64)>,
}

/// Stores chunks in memory and answers like the resumable upload endpoint would.
#[derive(Debug, Default)]
pub(crate) struct FakeTransport {
    state: Mutex<State>,
    ack_limit: Option<u64>,
    failing_sessions: HashSet<Asset>,
    failing_chunks: HashSet<Asset>,
    responses: HashMap<Asset, String>,
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Store at most this many bytes of every chunk.
    pub(crate) fn with_ack_limit(mut self, limit: u64) -> Self {
        self.ack_limit = Some(limit);
        self
    }

    pub(crate) fn failing_sessions(mut self, asset: Asset) -> Self {
        self.failing_sessions.insert(asset);
        self
    }

    pub(crate) fn failing_chunks(mut self, asset: Asset) -> Self {
        self.failing_chunks.insert(asset);
        self
    }

    pub(crate) fn with_response(mut self, asset: Asset, body: &str) -> Self {
        self.responses.insert(asset, body.to_string());
        self
    }

    pub(crate) fn sessions(&self) -> Vec<OpenedSession> {
        self.state.lock().unwrap().sessions.clone()
    }

    pub(crate) fn session_count(&self) -> usize {
        self.state.lock().unwrap().sessions.len()
    }

    pub(crate) fn session_assets(&self) -> Vec<Asset> {
        self.sessions().iter().map(|s| s.endpoint.asset()).collect()
    }

    /// `(offset, length)` of every chunk sent for `asset`, in order.
    pub(crate) fn chunk_offsets(&self, asset: Asset) -> Vec<(u64, u64)> {
        self.state
            .lock()
            .unwrap()
            .chunks
            .iter()
            .filter(|(a, _, _)| *a == asset)
            .map(|&(_, offset, len)| (offset, len))
            .collect()
    }

    pub(crate) fn received(&self, asset: Asset) -> Vec<u8> {
        self.state
            .lock()
            .unwrap()
            .stored
            .values()
            .find(|(a, _)| *a == asset)
            .map(|(_, bytes)| bytes.clone())
            .unwrap_or_default()
    }

    fn response_body(&self, asset: Asset) -> String {
        if let Some(body) = self.responses.get(&asset) {
            return body.clone();
        }
        match asset {
            Asset::Video => serde_json::json!({
                "kind": "youtube#video",
                "id": VIDEO_ID,
                "snippet": { "title": "uploaded" },
                "status": { "privacyStatus": "unlisted", "uploadStatus": "uploaded" }
            }),
            Asset::Caption => serde_json::json!({
                "kind": "youtube#caption",
                "id": CAPTION_ID,
                "snippet": { "videoId": VIDEO_ID, "language": "en", "name": "subs" }
            }),
            Asset::Thumbnail => serde_json::json!({
                "kind": "youtube#thumbnailSetResponse",
                "items": [{ "default": { "url": "https://i.ytimg.com/vi/x/default.jpg", "width": 120, "height": 90 } }]
            }),
        }
        .to_string()
    }
}

impl MediaTransport for FakeTransport {
    async fn start_session(
        &self,
        request: &UploadRequest,
        total_len: u64,
    ) -> eyre::Result<UploadSession> {
        let asset = request.endpoint.asset();
        let mut state = self.state.lock().unwrap();
        state.sessions.push(OpenedSession {
            endpoint: request.endpoint.clone(),
            mime_type: request.mime_type.clone(),
            metadata: request.metadata.clone(),
            total_len,
        });
        if self.failing_sessions.contains(&asset) {
            eyre::bail!("403 Forbidden: {asset} uploads are not allowed");
        }
        let uri = format!("fake://upload/{}", state.sessions.len());
        state.stored.insert(uri.clone(), (asset, Vec::new()));
        Ok(UploadSession { uri, total_len })
    }

    async fn send_chunk(
        &self,
        session: &UploadSession,
        offset: u64,
        chunk: Bytes,
    ) -> eyre::Result<ChunkAck> {
        let mut state = self.state.lock().unwrap();
        let Some((asset, stored)) = state.stored.get(&session.uri).cloned() else {
            eyre::bail!("unknown session {}", session.uri);
        };
        state.chunks.push((asset, offset, chunk.len() as u64));
        if self.failing_chunks.contains(&asset) {
            eyre::bail!("503 Service Unavailable");
        }
        if offset != stored.len() as u64 {
            eyre::bail!("chunk at {offset} but {} bytes are stored", stored.len());
        }

        let keep = self
            .ack_limit
            .map_or(chunk.len(), |limit| chunk.len().min(limit as usize));
        let entry = state
            .stored
            .get_mut(&session.uri)
            .expect("session was looked up above");
        entry.1.extend_from_slice(&chunk[..keep]);
        let acknowledged = entry.1.len() as u64;
        drop(state);

        if acknowledged == session.total_len {
            Ok(ChunkAck::Complete(Bytes::from(self.response_body(asset))))
        } else {
            Ok(ChunkAck::Incomplete { acknowledged })
        }
    }
}

/// What an observer saw, without the error value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Seen {
    Starting,
    Uploading(u64),
    Completed,
    Failed(String),
}

#[derive(Debug, Default)]
pub(crate) struct RecordingObserver {
    pub seen: Vec<(Asset, Seen)>,
    pub ready: Vec<(Asset, Option<String>)>,
}

impl RecordingObserver {
    pub(crate) fn for_asset(&self, asset: Asset) -> Vec<Seen> {
        self.seen
            .iter()
            .filter(|(a, _)| *a == asset)
            .map(|(_, s)| s.clone())
            .collect()
    }
}

impl ProgressObserver for RecordingObserver {
    fn observe(&mut self, asset: Asset, event: &ProgressEvent) {
        let seen = match event {
            ProgressEvent::Starting => Seen::Starting,
            ProgressEvent::Uploading { bytes_sent } => Seen::Uploading(*bytes_sent),
            ProgressEvent::Completed => Seen::Completed,
            ProgressEvent::Failed { cause } => Seen::Failed(format!("{cause:#}")),
        };
        self.seen.push((asset, seen));
    }

    fn resource_ready(&mut self, asset: Asset, resource_id: Option<&str>) {
        self.ready.push((asset, resource_id.map(str::to_owned)));
    }
}

/// Writes `len` bytes of a repeating pattern to `dir/name`.
pub(crate) fn write_file(dir: &Path, name: &str, len: usize) -> PathBuf {
    let path = dir.join(name);
    let contents: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    std::fs::write(&path, contents).unwrap();
    path
}

/// A canned HTTP response.
#[derive(Debug, Clone)]
pub(crate) struct Reply {
    status: u16,
    headers: Vec<(&'static str, String)>,
    body: String,
}

impl Reply {
    pub(crate) fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub(crate) fn json(status: u16, body: serde_json::Value) -> Self {
        Self::status(status)
            .header("content-type", "application/json")
            .body(&body.to_string())
    }

    pub(crate) fn header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.push((name, value.to_string()));
        self
    }

    pub(crate) fn body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    fn into_response(self) -> hyper::Response<Full<Bytes>> {
        let mut response = hyper::Response::builder().status(self.status);
        for (name, value) in self.headers {
            response = response.header(name, value);
        }
        response.body(Full::new(Bytes::from(self.body))).unwrap()
    }
}

/// A request the server received.
#[derive(Debug, Clone)]
pub(crate) struct Received {
    pub method: http::Method,
    pub query: Option<String>,
    pub headers: http::HeaderMap,
    pub body: Bytes,
}

impl Received {
    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[derive(Debug, Default)]
struct Routes {
    /// Replies still to be given per path. The last one is repeated.
    replies: HashMap<String, VecDeque<Reply>>,
    received: Vec<(String, Received)>,
}

/// An HTTP server on a loopback port that answers every path from a script of replies.
///
/// Paths without a script get a `404`.
#[derive(Debug, Clone)]
pub(crate) struct ScriptedServer {
    addr: SocketAddr,
    routes: Arc<Mutex<Routes>>,
}

impl ScriptedServer {
    pub(crate) async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes = Arc::new(Mutex::new(Routes::default()));

        let server_routes = routes.clone();
        tokio::spawn(async move {
            while let Ok((conn, _)) = listener.accept().await {
                let routes = server_routes.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req: hyper::Request<hyper::body::Incoming>| {
                        let routes = routes.clone();
                        async move {
                            let (parts, body) = req.into_parts();
                            let body = body.collect().await?.to_bytes();
                            let path = parts.uri.path().to_string();
                            let mut routes = routes.lock().unwrap();
                            routes.received.push((
                                path.clone(),
                                Received {
                                    method: parts.method,
                                    query: parts.uri.query().map(str::to_owned),
                                    headers: parts.headers,
                                    body,
                                },
                            ));
                            let reply = match routes.replies.get_mut(&path) {
                                Some(script) if script.len() > 1 => script.pop_front().unwrap(),
                                Some(script) => script.front().cloned().unwrap(),
                                None => Reply::status(404),
                            };
                            Ok::<_, hyper::Error>(reply.into_response())
                        }
                    });
                    let conn = hyper_util::rt::TokioIo::new(conn);
                    let _ = hyper::server::conn::http1::Builder::new()
                        .serve_connection(conn, service)
                        .await;
                });
            }
        });

        Self { addr, routes }
    }

    /// Answers requests for `path` with `replies` in order.
    pub(crate) fn script(&self, path: &str, replies: impl IntoIterator<Item = Reply>) {
        let script: VecDeque<_> = replies.into_iter().collect();
        assert!(!script.is_empty(), "script for {path} has no replies");
        self.routes
            .lock()
            .unwrap()
            .replies
            .insert(path.to_string(), script);
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub(crate) fn received(&self, path: &str) -> Vec<Received> {
        self.routes
            .lock()
            .unwrap()
            .received
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub(crate) fn hits(&self, path: &str) -> usize {
        self.received(path).len()
    }

    /// An OAuth manager whose token endpoint is `/token` on this server.
    pub(crate) fn oauth_manager(&self) -> Arc<OAuthManager> {
        let secrets = ClientSecrets {
            client_id: "id.apps.googleusercontent.com".to_string(),
            client_secret: "shh".to_string(),
            auth_uri: self.url("/auth"),
            token_uri: self.url("/token"),
        };
        Arc::new(OAuthManager::new(secrets, &["https://www.googleapis.com/auth/youtube.upload"]))
    }

    /// A client that sends Data API calls to `/` and uploads to `/upload` on this server.
    pub(crate) fn client(&self, token: TimeBoundAccessToken) -> YouTubeClient {
        YouTubeClient::new(
            token,
            self.oauth_manager(),
            crate::youtube_api::client::http_client().unwrap(),
        )
        .with_endpoints(self.url(""), self.url("/upload"))
        .with_retry_delay(Duration::from_millis(1))
    }
}

/// An OAuth token response as Google sends it.
pub(crate) fn token_json(access_token: &str, expires_in: u64) -> serde_json::Value {
    serde_json::json!({
        "access_token": access_token,
        "token_type": "bearer",
        "expires_in": expires_in,
        "refresh_token": "1//refresh"
    })
}

/// A `channels.list?mine=true` response with one channel.
pub(crate) fn my_channel_json() -> serde_json::Value {
    serde_json::json!({
        "kind": "youtube#channelListResponse",
        "items": [{
            "kind": "youtube#channel",
            "id": "UC123",
            "snippet": { "title": "My Channel", "publishedAt": "2015-03-01T10:00:00Z" }
        }]
    })
}
