//! Authorising a bot with Google OAuth 2.0.
//!
//! A bot only needs OAuth to send or delete messages; reading a public live chat works with just
//! an API key. This module covers the initial user authorization, token refresh, and persisting
//! tokens next to the client secrets file so the user does not have to re-authorise on every run.

use crate::secrets::Secrets;
use crate::youtube_api::client::TimeBoundAccessToken;
use eyre::Context;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::service::service_fn;
use hyper::{Request, Response, body};
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, CsrfToken, PkceCodeChallenge, RedirectUrl, Scope,
    TokenUrl,
};
use oauth2::{ClientSecret, RevocationUrl, reqwest};
use std::future::Future;
use std::path::{Path, PathBuf};

/// The scopes requested during authorization.
pub const YOUTUBE_API_SCOPES: &[&str] = &["https://www.googleapis.com/auth/youtube"];

const REVOCATION_URL: &str = "https://oauth2.googleapis.com/revoke";

const OAUTH_DONE_HTML: &str = "<!DOCTYPE html>\
<html><head><title>Chatto</title></head>\
<body><h1>Authorised</h1><p>You can close this tab and return to your bot.</p></body></html>";

/// Obtains and refreshes OAuth tokens for one set of client secrets.
#[derive(Debug, Clone)]
pub struct OAuthManager {
    secrets: Secrets,
}

impl OAuthManager {
    /// Creates a new OAuth manager for the application described by `secrets`.
    pub fn new(secrets: Secrets) -> Self {
        Self { secrets }
    }

    pub fn secrets(&self) -> &Secrets {
        &self.secrets
    }

    /// Sends the user through Google's consent screen and returns the token it grants.
    ///
    /// The consent URL is opened in the browser (and logged, for machines without one). Google
    /// redirects back to a one-shot server on a random localhost port, after which the
    /// authorization code is exchanged using PKCE.
    pub async fn authenticate(&self) -> eyre::Result<BasicTokenResponse> {
        let csrf = CsrfToken::new_random();
        let (redirect_url, authorization_code) = listen_for_redirect(csrf.clone())
            .await
            .context("listen for OAuth redirect")?;

        let client = BasicClient::new(ClientId::new(self.secrets.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.secrets.client_secret.clone()))
            .set_auth_uri(
                AuthUrl::new(self.secrets.auth_uri.clone()).context("parse authorization URL")?,
            )
            .set_token_uri(
                TokenUrl::new(self.secrets.token_uri.clone()).context("parse token URL")?,
            )
            .set_redirect_uri(redirect_url)
            .set_revocation_url(
                RevocationUrl::new(REVOCATION_URL.to_string())
                    .context("parse revocation URL")?,
            );

        let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
        let (consent_url, _) = client
            .authorize_url(move || csrf.clone())
            .add_scopes(YOUTUBE_API_SCOPES.iter().map(|s| Scope::new(s.to_string())))
            .set_pkce_challenge(challenge)
            .url();

        tracing::info!(url = %consent_url, "waiting for the user to grant access");
        if let Err(e) = webbrowser::open(consent_url.as_ref()) {
            tracing::warn!(error = %e, "could not open a browser, visit the URL above manually");
        }
        let code = authorization_code
            .await
            .context("wait for the user to grant access")?;

        let token = client
            .exchange_code(code)
            .set_pkce_verifier(verifier)
            .request_async(&token_http_client()?)
            .await
            .context("exchange authorization code for a token")?;
        tracing::info!("user granted access");
        Ok(token)
    }

    /// Trades the refresh token in `token` for a new access token.
    ///
    /// Returns `Ok(None)` if `token` has no refresh token or Google no longer accepts it, in which
    /// case only [`Self::authenticate`] can produce a new token. Transport and server failures
    /// are errors.
    pub async fn refresh_token(
        &self,
        token: BasicTokenResponse,
    ) -> eyre::Result<Option<BasicTokenResponse>> {
        use oauth2::TokenResponse;

        let Some(refresh_token) = token.refresh_token() else {
            tracing::warn!("token has no refresh token");
            return Ok(None);
        };

        tracing::debug!("refreshing OAuth token");
        let client = BasicClient::new(ClientId::new(self.secrets.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.secrets.client_secret.clone()))
            .set_token_uri(
                TokenUrl::new(self.secrets.token_uri.clone()).context("parse token URL")?,
            );

        match client
            .exchange_refresh_token(refresh_token)
            .request_async(&token_http_client()?)
            .await
        {
            Ok(new_token) => {
                tracing::debug!("refreshed OAuth token");
                Ok(Some(new_token))
            }
            Err(ref e @ oauth2::RequestTokenError::ServerResponse(ref sr))
                if matches!(
                    sr.error(),
                    oauth2::basic::BasicErrorResponseType::InvalidGrant
                ) =>
            {
                tracing::warn!(error = %e, "refresh token was rejected");
                Ok(None)
            }
            Err(e) => Err(e).context("exchange refresh token"),
        }
    }

    /// Produces a usable token, re-using the one in `store` where possible.
    ///
    /// Stored tokens are always refreshed up front so the bot starts with the longest possible
    /// lifetime. If there is no stored token, `force` is set, or the refresh is rejected, the
    /// full browser flow runs instead. The resulting token is written back to `store`.
    pub async fn obtain_token(
        &self,
        store: &TokenStore,
        force: bool,
    ) -> eyre::Result<TimeBoundAccessToken> {
        let stored = if force {
            tracing::info!("forced re-authorisation");
            None
        } else {
            store.load().await.context("load stored OAuth token")?
        };

        let token = match stored {
            Some(stored) => {
                tracing::info!("proactively refreshing stored token");
                let mut token = TimeBoundAccessToken::expired(stored);
                if token.refresh(self).await.context("refresh stored token")? {
                    token
                } else {
                    tracing::warn!("token refresh failed, authorisation required");
                    TimeBoundAccessToken::new(
                        self.authenticate()
                            .await
                            .context("authorize user to YouTube")?,
                    )
                }
            }
            None => {
                tracing::info!("no tokens found, authorisation required");
                TimeBoundAccessToken::new(
                    self.authenticate()
                        .await
                        .context("authorize user to YouTube")?,
                )
            }
        };

        store
            .save(token.raw_token())
            .await
            .context("persist OAuth token")?;
        Ok(token)
    }
}

/// Binds a localhost port for Google to redirect back to after consent.
///
/// The returned future resolves with the code from the first request whose `state` matches
/// `csrf`. The server stops after that one connection.
async fn listen_for_redirect(
    csrf: CsrfToken,
) -> eyre::Result<(
    RedirectUrl,
    impl Future<Output = eyre::Result<AuthorizationCode>>,
)> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .context("bind redirect listener")?;
    let addr = listener.local_addr().context("get redirect listener address")?;
    let redirect_url = RedirectUrl::new(format!("http://{addr}"))
        .context("construct redirect URL")?;

    let (done, result) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let _ = done.send(accept_redirect(listener, csrf).await);
    });
    Ok((redirect_url, async move {
        result.await.context("redirect listener went away")?
    }))
}

async fn accept_redirect(
    listener: tokio::net::TcpListener,
    csrf: CsrfToken,
) -> eyre::Result<AuthorizationCode> {
    let (conn, peer) = listener.accept().await.context("accept redirect")?;
    tracing::debug!(%peer, "received OAuth redirect");

    let (code_tx, mut code_rx) = tokio::sync::mpsc::channel(1);
    let service = service_fn(move |req: Request<body::Incoming>| {
        let csrf = csrf.clone();
        let code_tx = code_tx.clone();
        async move {
            let code = code_from_redirect(req.uri().query().unwrap_or(""), &csrf)?;
            code_tx
                .send(code)
                .await
                .map_err(|_| "redirect already handled")?;
            Ok::<_, &'static str>(Response::new(Full::<Bytes>::from(OAUTH_DONE_HTML)))
        }
    });

    let mut connection = std::pin::pin!(
        hyper::server::conn::http1::Builder::new()
            .serve_connection(hyper_util::rt::TokioIo::new(conn), service)
    );
    tokio::select! {
        closed = &mut connection => match closed {
            Err(e) => Err(e).context("serve OAuth redirect"),
            Ok(()) => eyre::bail!("browser closed the connection without an authorization code"),
        },
        code = code_rx.recv() => {
            // Let the browser get its response before the connection goes away.
            connection.as_mut().graceful_shutdown();
            if let Err(e) = connection.await {
                tracing::debug!(error = %e, "OAuth redirect connection closed uncleanly");
            }
            code.ok_or_else(|| eyre::eyre!("authorization code lost"))
        }
    }
}

/// Pulls the authorization code out of the redirect's query string.
fn code_from_redirect(query: &str, csrf: &CsrfToken) -> Result<AuthorizationCode, &'static str> {
    let mut state = None;
    let mut code = None;
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        match &*key {
            "state" => state = Some(value),
            "code" => code = Some(value),
            _ => {}
        }
    }

    if state.as_deref() != Some(csrf.secret().as_str()) {
        return Err("state does not match");
    }
    code.map(|c| AuthorizationCode::new(c.into_owned()))
        .ok_or("no authorization code in redirect")
}

/// HTTP client for talking to the token endpoint.
fn token_http_client() -> eyre::Result<reqwest::Client> {
    reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .context("build token endpoint HTTP client")
}

/// Persists an OAuth token as JSON on disk.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The store that lives next to the given client secrets.
    pub fn for_secrets(secrets: &Secrets) -> Self {
        Self::new(secrets.tokens_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored token, if there is one.
    pub async fn load(&self) -> eyre::Result<Option<BasicTokenResponse>> {
        if !tokio::fs::try_exists(&self.path)
            .await
            .with_context(|| format!("check for {}", self.path.display()))?
        {
            return Ok(None);
        }

        let data = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("read {}", self.path.display()))?;
        let token = serde_json::from_str(&data).context("parse stored OAuth token")?;
        Ok(Some(token))
    }

    pub async fn save(&self, token: &BasicTokenResponse) -> eyre::Result<()> {
        let json = serde_json::to_string(token).context("serialize OAuth token")?;
        tokio::fs::write(&self.path, json)
            .await
            .with_context(|| format!("write {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), "saved OAuth token");
        Ok(())
    }
}
