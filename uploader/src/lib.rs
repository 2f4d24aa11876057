//! Upload a video to YouTube, along with its captions and thumbnail.
//!
//! The moving parts, leaf first:
//!
//! - [`progress`] turns upload lifecycle events into console lines.
//! - [`upload`] sends one file through a resumable session in fixed-size chunks.
//! - [`assets`] finds the caption and thumbnail that go with a video.
//! - [`orchestrator`] runs the uploads of one video in order.
//! - [`youtube_api`] is the authenticated client, which [`authorize`] sets up.

use crate::error::UploaderError;
use crate::oauth::{ClientSecrets, OAuthManager};
use crate::token_store::TokenStore;
use crate::youtube_api::client::{TimeBoundAccessToken, YouTubeClient, http_client};
use eyre::Context;
use oauth2::basic::BasicTokenResponse;
use std::ops::AsyncFnMut;
use std::sync::Arc;

pub mod assets;
pub mod config;
pub mod error;
pub mod oauth;
pub mod orchestrator;
pub mod progress;
pub mod token_store;
pub mod upload;
pub mod youtube_api;

#[cfg(test)]
mod testing;

/// Obtains an authenticated YouTube client for `user`.
///
/// A token cached in `store` is reused, refreshing it if needed. Without a usable cached token,
/// the user is sent through the browser-based OAuth flow. Whatever token results is written back
/// to `store`.
pub async fn authorize(
    secrets: ClientSecrets,
    scopes: &[&str],
    user: &str,
    store: &TokenStore,
) -> Result<YouTubeClient, UploaderError> {
    authorize_inner(secrets, scopes, user, store)
        .await
        .map_err(UploaderError::authorization)
}

async fn authorize_inner(
    secrets: ClientSecrets,
    scopes: &[&str],
    user: &str,
    store: &TokenStore,
) -> eyre::Result<YouTubeClient> {
    // ==============================================================================
    // OAuth Manager Setup
    // ==============================================================================
    // The manager is shared with the client, which needs it to refresh the access
    // token should it expire in the middle of a long upload.
    let oauth_manager = Arc::new(OAuthManager::new(secrets, scopes));
    let http_client = http_client()?;

    authorize_with(
        store,
        user,
        &oauth_manager,
        |token| YouTubeClient::new(token, oauth_manager.clone(), http_client.clone()),
        async || oauth_manager.authenticate().await,
    )
    .await
}

/// The token strategy behind [`authorize`].
///
/// `connect` wraps a token into a client, and `authenticate` runs the interactive flow when
/// no cached token can be made to work.
async fn authorize_with<C, F>(
    store: &TokenStore,
    user: &str,
    oauth_manager: &OAuthManager,
    connect: C,
    mut authenticate: F,
) -> eyre::Result<YouTubeClient>
where
    C: Fn(TimeBoundAccessToken) -> YouTubeClient,
    F: AsyncFnMut() -> eyre::Result<BasicTokenResponse>,
{
    // ==============================================================================
    // Token Acquisition Strategy
    // ==============================================================================
    // A cached token that is still valid is used as-is, an expired one is refreshed.
    // A cached token the API rejects before it expires gets one refresh as well. An
    // unreadable cache counts as no cache.
    let cached = match store.load(user).await {
        Ok(cached) => cached,
        Err(e) => {
            tracing::warn!("ignoring unreadable token cache: {:#}", e);
            None
        }
    };

    match cached {
        Some(stored) => {
            let mut token = TimeBoundAccessToken::from_stored(stored);
            let mut refreshed = false;
            if token.is_expired() {
                refreshed = token
                    .refresh(oauth_manager)
                    .await
                    .context("refresh cached token")?;
            }

            if !token.is_expired() {
                let client = connect(token.clone());
                if save_and_validate(store, user, &client).await? {
                    tracing::debug!(refreshed, "using cached token");
                    return Ok(client);
                }
                if !refreshed {
                    tracing::warn!("cached token was rejected, refreshing it");
                    if token
                        .refresh(oauth_manager)
                        .await
                        .context("refresh rejected token")?
                    {
                        let client = connect(token);
                        if save_and_validate(store, user, &client).await? {
                            return Ok(client);
                        }
                    }
                }
            }
            tracing::warn!("cached token is unusable, getting new token via full OAuth");
        }
        None => tracing::info!(user, "no cached token, starting OAuth flow"),
    }

    // ==============================================================================
    // Full OAuth Flow
    // ==============================================================================
    let raw_token = authenticate().await.context("authorize user to YouTube")?;
    let client = connect(TimeBoundAccessToken::new(raw_token));
    if !save_and_validate(store, user, &client).await? {
        eyre::bail!("YouTube did not accept the access token");
    }
    Ok(client)
}

/// Caches the client's token, then checks that the API accepts it.
async fn save_and_validate(
    store: &TokenStore,
    user: &str,
    client: &YouTubeClient,
) -> eyre::Result<bool> {
    store
        .save(user, &client.stored_token().await)
        .await
        .context("cache OAuth token")?;
    client
        .validate_token()
        .await
        .context("validate YouTube token")
}
