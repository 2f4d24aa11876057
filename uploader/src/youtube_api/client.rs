//! Core YouTube API client functionality and authentication management.

use crate::oauth::OAuthManager;
use crate::token_store::StoredToken;
use crate::youtube_api::channels::{Channel, ChannelListResponse};
use eyre::Context;
use http::Method;
use jiff::Timestamp;
use oauth2::TokenResponse;
use oauth2::basic::BasicTokenResponse;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;
use tracing::instrument;

/// Tokens are treated as expired this long before they actually expire.
const EXPIRY_BUFFER: Duration = Duration::from_secs(300);

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const UPLOAD_BASE: &str = "https://www.googleapis.com/upload/youtube/v3";

/// Wait before the first resend of a failed chunk; it doubles for every further attempt.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// The HTTP client YouTube requests go through.
///
/// 308 means "resume incomplete" to the upload endpoint, so redirects are not followed.
pub fn http_client() -> eyre::Result<reqwest::Client> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("build YouTube HTTP client")
}

#[derive(Debug, Clone)]
pub struct TimeBoundAccessToken {
    token: BasicTokenResponse,
    /// When the token endpoint handed out `token`.
    issued_at: Timestamp,
    /// Already includes [`EXPIRY_BUFFER`].
    expires_at: SystemTime,
}

impl TimeBoundAccessToken {
    /// Creates a token for a response that was just received.
    pub fn new(token: BasicTokenResponse) -> Self {
        Self::issued(token, Timestamp::now())
    }

    /// Creates a token for a response that was received at `stored.issued_at`.
    pub fn from_stored(stored: StoredToken) -> Self {
        Self::issued(stored.token, stored.issued_at)
    }

    fn issued(token: BasicTokenResponse, issued_at: Timestamp) -> Self {
        Self {
            expires_at: Self::calculate_token_expiry(&token, issued_at.into()),
            token,
            issued_at,
        }
    }

    /// The token together with when it was issued, ready for [`TokenStore::save`].
    ///
    /// [`TokenStore::save`]: crate::token_store::TokenStore::save
    pub fn to_stored(&self) -> StoredToken {
        StoredToken {
            token: self.token.clone(),
            issued_at: self.issued_at,
        }
    }

    pub fn is_expired(&self) -> bool {
        SystemTime::now() >= self.expires_at
    }

    /// Refreshes this token using the provided OAuth manager, preserving the refresh token.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - the token now holds a new access token
    /// * `Ok(false)` - the refresh was refused and the user has to authorize again
    /// * `Err(_)` - the token endpoint could not be reached
    pub async fn refresh(&mut self, oauth_manager: &OAuthManager) -> eyre::Result<bool> {
        tracing::trace!("refreshing token");
        match oauth_manager
            .refresh_token(&self.token)
            .await
            .context("refresh OAuth token")?
        {
            Some(new_token) => {
                let old_token = std::mem::replace(&mut self.token, new_token);

                // Google usually leaves the refresh token out of refresh responses.
                if self.token.refresh_token().is_none() {
                    tracing::trace!("new token lacks refresh token, preserving original");
                    self.token
                        .set_refresh_token(old_token.refresh_token().cloned());
                }

                self.issued_at = Timestamp::now();
                self.expires_at =
                    Self::calculate_token_expiry(&self.token, self.issued_at.into());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Uses `issued_at + expires_in - 5 minutes`, or 55 minutes when `expires_in` is missing.
    fn calculate_token_expiry(token: &BasicTokenResponse, issued_at: SystemTime) -> SystemTime {
        match token.expires_in() {
            Some(expires_in) => (issued_at + expires_in)
                .checked_sub(EXPIRY_BUFFER)
                .unwrap_or(SystemTime::UNIX_EPOCH),
            None => issued_at + Duration::from_secs(3300),
        }
    }
}

/// Client for interacting with the YouTube Data API v3.
///
/// This client wraps an OAuth2 token and refreshes it before a call whenever it has expired, so
/// long uploads keep working past the lifetime of a single access token.
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    token: Arc<Mutex<TimeBoundAccessToken>>,
    oauth_manager: Arc<OAuthManager>,
    client: reqwest::Client,
    api_base: String,
    upload_base: String,
    retry_delay: Duration,
}

impl YouTubeClient {
    pub fn new(
        token: TimeBoundAccessToken,
        oauth_manager: Arc<OAuthManager>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            token: Arc::new(Mutex::new(token)),
            oauth_manager,
            client,
            api_base: API_BASE.to_string(),
            upload_base: UPLOAD_BASE.to_string(),
            retry_delay: RETRY_DELAY,
        }
    }

    /// Sends Data API calls to `api_base` and upload sessions to `upload_base` instead of Google.
    pub fn with_endpoints(
        mut self,
        api_base: impl Into<String>,
        upload_base: impl Into<String>,
    ) -> Self {
        self.api_base = api_base.into();
        self.upload_base = upload_base.into();
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Returns a clone of the underlying OAuth2 token.
    pub async fn token(&self) -> BasicTokenResponse {
        self.token.lock().await.token.clone()
    }

    /// Returns the current token in the form it is cached in.
    pub async fn stored_token(&self) -> StoredToken {
        self.token.lock().await.to_stored()
    }

    pub(crate) fn http_client(&self) -> &reqwest::Client {
        &self.client
    }

    pub(crate) fn upload_base(&self) -> &str {
        &self.upload_base
    }

    pub(crate) fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Gets a guaranteed-fresh access token, refreshing if necessary.
    #[instrument(skip(self), level = tracing::Level::TRACE)]
    pub(crate) async fn fresh_access_token(&self) -> eyre::Result<String> {
        let mut token = self.token.lock().await;

        if token.is_expired() {
            tracing::debug!("access token expired, attempting refresh");

            if token.refresh(&self.oauth_manager).await? {
                tracing::debug!("access token successfully refreshed");
            } else {
                tracing::error!("access token refresh failed, client is unusable");
                return Err(eyre::eyre!("Unable to refresh expired access token"));
            }
        }

        Ok(token.token.access_token().secret().to_string())
    }

    /// Sends an authenticated `GET` to a Data API endpoint and decodes the JSON response.
    #[instrument(skip(self), level = tracing::Level::TRACE)]
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query_params: &[(&str, &str)],
    ) -> eyre::Result<T> {
        let access_token = self.fresh_access_token().await?;
        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .query(query_params)
            .send()
            .await
            .with_context(|| format!("send GET request to YouTube API: {url}"))?;
        let response = ensure_success(&Method::GET, response).await?;
        response
            .json()
            .await
            .with_context(|| format!("parse response of {url} as JSON"))
    }

    /// Checks that the token works by looking up the channel it belongs to.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - the API accepted the token
    /// * `Ok(false)` - the API call failed, e.g. because the grant was revoked
    #[instrument(skip(self), ret)]
    pub async fn validate_token(&self) -> eyre::Result<bool> {
        match self.my_channel().await {
            Ok(channel) => {
                match channel {
                    Some(channel) => tracing::info!(
                        channel = %channel.snippet.title,
                        id = %channel.id,
                        "authorized for channel"
                    ),
                    None => tracing::warn!("authorized account has no YouTube channel"),
                }
                Ok(true)
            }
            Err(e) => {
                tracing::warn!("YouTube API token validation failed: {:#}", e);
                Ok(false)
            }
        }
    }

    /// Returns the authenticated user's channel, if they have one.
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/channels/list>
    pub async fn my_channel(&self) -> eyre::Result<Option<Channel>> {
        let url = format!("{}/channels", self.api_base);
        let channels: ChannelListResponse = self
            .get_json(
                &url,
                &[("part", "id,snippet"), ("mine", "true"), ("maxResults", "1")],
            )
            .await?;
        Ok(channels.items.into_iter().next())
    }
}

/// Turns a non-2xx response into an error carrying the response body.
pub(crate) async fn ensure_success(
    method: &Method,
    response: reqwest::Response,
) -> eyre::Result<reqwest::Response> {
    let status_code = response.status();
    if status_code.is_success() {
        return Ok(response);
    }
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    Err(eyre::eyre!(
        "YouTube API {} request failed with status {}: {}",
        method,
        status_code,
        error_text
    ))
}
