// Token authentication
//
// The management center issues an access token, a refresh token and the
// caller's domain UUID as response headers of `generatetoken`. The access
// token lives for a fixed window and can be refreshed a bounded number of
// times before a full re-authentication is required.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use reqwest::header::HeaderMap;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};
use url::Url;

use crate::client::{self, FmcClient};
use crate::error::Error;

pub(crate) const ACCESS_TOKEN_HEADER: &str = "X-auth-access-token";
pub(crate) const REFRESH_TOKEN_HEADER: &str = "X-auth-refresh-token";
pub(crate) const DOMAIN_UUID_HEADER: &str = "DOMAIN_UUID";

const GENERATE_TOKEN_PATH: &str = "api/fmc_platform/v1/auth/generatetoken";
const REFRESH_TOKEN_PATH: &str = "api/fmc_platform/v1/auth/refreshtoken";
const REVOKE_ACCESS_PATH: &str = "api/fmc_platform/v1/auth/revokeaccess";

/// The controller allows three refreshes per generated token.
const MAX_REFRESHES: u8 = 3;

/// Tokens are renewed this long before their nominal expiry.
const RENEWAL_MARGIN: TimeDelta = TimeDelta::seconds(60);

/// Authenticated session state.
///
/// Owned by [`FmcClient`] for the lifetime of a run. Token material is held
/// as [`SecretString`] so it is zeroized on drop and redacted from `Debug`.
pub struct Session {
    base_url: Url,
    auth_token: SecretString,
    refresh_token: Option<SecretString>,
    token_expiry: DateTime<Utc>,
    domain_uuid: String,
    refreshes_left: u8,
}

impl Session {
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn domain_uuid(&self) -> &str {
        &self.domain_uuid
    }

    pub fn token_expiry(&self) -> DateTime<Utc> {
        self.token_expiry
    }

    pub(crate) fn auth_token(&self) -> &SecretString {
        &self.auth_token
    }

    /// Whether the token must be renewed before it is used at `now`.
    pub fn needs_renewal(&self, now: DateTime<Utc>) -> bool {
        now + RENEWAL_MARGIN >= self.token_expiry
    }

    fn from_headers(
        base_url: &Url,
        headers: &HeaderMap,
        lifetime: TimeDelta,
    ) -> Result<Self, Error> {
        let auth_token = header_str(headers, ACCESS_TOKEN_HEADER).ok_or_else(|| {
            Error::Authentication {
                message: "access token not found in response headers".into(),
            }
        })?;
        let domain_uuid = header_str(headers, DOMAIN_UUID_HEADER).ok_or_else(|| {
            Error::Authentication {
                message: "domain UUID not found in response headers".into(),
            }
        })?;
        let refresh_token = header_str(headers, REFRESH_TOKEN_HEADER).map(SecretString::from);

        Ok(Self {
            base_url: base_url.clone(),
            auth_token: SecretString::from(auth_token),
            refresh_token,
            token_expiry: Utc::now() + lifetime,
            domain_uuid,
            refreshes_left: MAX_REFRESHES,
        })
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url.as_str())
            .field("domain_uuid", &self.domain_uuid)
            .field("token_expiry", &self.token_expiry)
            .field("refreshes_left", &self.refreshes_left)
            .finish_non_exhaustive()
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn platform_url(base_url: &Url, path: &str) -> Result<Url, Error> {
    let base = base_url.as_str().trim_end_matches('/');
    Ok(Url::parse(&format!("{base}/{path}"))?)
}

/// `POST generatetoken` with HTTP basic auth.
pub(crate) async fn generate_token(
    http: &reqwest::Client,
    base_url: &Url,
    username: &str,
    password: &SecretString,
    lifetime: TimeDelta,
) -> Result<Session, Error> {
    let url = platform_url(base_url, GENERATE_TOKEN_PATH)?;
    debug!("generating token at {}", url);

    let resp = http
        .post(url)
        .basic_auth(username, Some(password.expose_secret()))
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Authentication {
            message: format!(
                "token generation failed (HTTP {status}): {}",
                client::preview(&body)
            ),
        });
    }

    let session = Session::from_headers(base_url, resp.headers(), lifetime)?;
    debug!(domain = %session.domain_uuid, "token generated");
    Ok(session)
}

impl FmcClient {
    /// Renew the token if it is about to expire.
    ///
    /// Uses the refresh endpoint while refreshes remain, otherwise generates
    /// a fresh token with the stored credentials.
    pub(crate) async fn ensure_fresh_token(&mut self) -> Result<(), Error> {
        if !self.session().needs_renewal(Utc::now()) {
            return Ok(());
        }

        if self.session().refreshes_left > 0 && self.session().refresh_token.is_some() {
            match self.refresh_token().await {
                Ok(()) => return Ok(()),
                Err(e) => warn!(error = %e, "token refresh failed, re-authenticating"),
            }
        }

        self.reauthenticate().await
    }

    /// Generate a new token with the stored credentials.
    pub(crate) async fn reauthenticate(&mut self) -> Result<(), Error> {
        debug!("re-authenticating");
        let session = generate_token(
            self.http(),
            self.base_url(),
            self.username(),
            self.password(),
            self.token_lifetime(),
        )
        .await?;
        self.replace_session(session);
        Ok(())
    }

    /// `POST refreshtoken` with the current access and refresh tokens.
    async fn refresh_token(&mut self) -> Result<(), Error> {
        let url = platform_url(self.base_url(), REFRESH_TOKEN_PATH)?;
        debug!("refreshing token at {}", url);

        let session = self.session();
        let refresh = session
            .refresh_token
            .as_ref()
            .map(|t| t.expose_secret().to_owned())
            .unwrap_or_default();
        let resp = self
            .http()
            .post(url)
            .header(ACCESS_TOKEN_HEADER, session.auth_token.expose_secret())
            .header(REFRESH_TOKEN_HEADER, refresh)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Authentication {
                message: format!("token refresh failed (HTTP {status})"),
            });
        }

        let refreshes_left = self.session().refreshes_left.saturating_sub(1);
        let mut renewed =
            Session::from_headers(self.base_url(), resp.headers(), self.token_lifetime())?;
        renewed.refreshes_left = refreshes_left;
        self.replace_session(renewed);
        debug!(refreshes_left, "token refreshed");
        Ok(())
    }

    /// Revoke the current access token.
    ///
    /// Best-effort: callers log and ignore failures since the token expires
    /// on its own.
    pub async fn revoke(&self) -> Result<(), Error> {
        let url = platform_url(self.base_url(), REVOKE_ACCESS_PATH)?;
        debug!("revoking access at {}", url);

        let resp = self
            .http()
            .post(url)
            .header(ACCESS_TOKEN_HEADER, self.session().auth_token.expose_secret())
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Error::Api {
                status: resp.status().as_u16(),
                message: "token revocation rejected".into(),
            });
        }
        debug!("access revoked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_expiring_in(delta: TimeDelta) -> Session {
        Session {
            base_url: Url::parse("https://fmc.example").expect("valid url"),
            auth_token: SecretString::from("s3cr3t-access".to_owned()),
            refresh_token: None,
            token_expiry: Utc::now() + delta,
            domain_uuid: "domain".into(),
            refreshes_left: MAX_REFRESHES,
        }
    }

    #[test]
    fn fresh_token_does_not_need_renewal() {
        let session = session_expiring_in(TimeDelta::minutes(30));
        assert!(!session.needs_renewal(Utc::now()));
    }

    #[test]
    fn token_inside_margin_needs_renewal() {
        let session = session_expiring_in(TimeDelta::seconds(30));
        assert!(session.needs_renewal(Utc::now()));
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let session = session_expiring_in(TimeDelta::minutes(30));
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("s3cr3t-access"));
        assert!(rendered.contains("domain"));
    }
}
