// Async HTTP client for the management center configuration API.
//
// Base path: /api/fmc_config/v1/domain/{domain_uuid}/
// Auth: X-auth-access-token header, obtained from generatetoken

use chrono::TimeDelta;
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::auth::{self, ACCESS_TOKEN_HEADER, Session};
use crate::error::Error;
use crate::models::ItemPage;
use crate::transport::TransportConfig;

/// Page size for collection listings; the controller caps `limit` at 1000.
pub const PAGE_LIMIT: usize = 1000;

/// Nominal lifetime of an access token.
pub const DEFAULT_TOKEN_LIFETIME: TimeDelta = TimeDelta::minutes(30);

// ── Error response shape ─────────────────────────────────────────────

#[derive(serde::Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    #[serde(default)]
    messages: Vec<ErrorMessage>,
}

#[derive(serde::Deserialize)]
struct ErrorMessage {
    #[serde(default)]
    description: Option<String>,
}

// ── Client ───────────────────────────────────────────────────────────

/// Authenticated client for one management center.
///
/// Owns its [`Session`]. Every call takes `&mut self` so token renewal
/// happens in place; a run holds exactly one client and lends it to one
/// stage at a time.
pub struct FmcClient {
    http: reqwest::Client,
    base_url: Url,
    username: String,
    password: SecretString,
    token_lifetime: TimeDelta,
    session: Session,
}

impl FmcClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Generate a token and build a client bound to the caller's domain.
    pub async fn authenticate(
        base_url: &str,
        username: &str,
        password: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        Self::authenticate_with_lifetime(
            base_url,
            username,
            password,
            transport,
            DEFAULT_TOKEN_LIFETIME,
        )
        .await
    }

    /// Like [`authenticate`](Self::authenticate) with an explicit token
    /// lifetime, for controllers configured with a shorter session window.
    pub async fn authenticate_with_lifetime(
        base_url: &str,
        username: &str,
        password: SecretString,
        transport: &TransportConfig,
        token_lifetime: TimeDelta,
    ) -> Result<Self, Error> {
        let base_url = Url::parse(base_url)?;
        let http = transport.build_client()?;
        let session =
            auth::generate_token(&http, &base_url, username, &password, token_lifetime).await?;

        Ok(Self {
            http,
            base_url,
            username: username.to_owned(),
            password,
            token_lifetime,
            session,
        })
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn domain_uuid(&self) -> &str {
        self.session.domain_uuid()
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn password(&self) -> &SecretString {
        &self.password
    }

    pub(crate) fn token_lifetime(&self) -> TimeDelta {
        self.token_lifetime
    }

    pub(crate) fn replace_session(&mut self, session: Session) {
        self.session = session;
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Join a domain-relative path (e.g. `"object/hosts"`) onto the config base.
    fn url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let domain = self.session.domain_uuid();
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!(
            "{base}/api/fmc_config/v1/domain/{domain}/{path}"
        ))?)
    }

    // ── Invocation ───────────────────────────────────────────────────

    /// Issue one request against the config API.
    ///
    /// Renews the token first when it is close to expiry. A 401 triggers
    /// exactly one re-authentication and one retry; a second 401 is an
    /// [`Error::Authentication`]. Other failures are returned as
    /// [`Error::Api`] and never retried here.
    pub async fn invoke(
        &mut self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, Error> {
        self.invoke_with_query(method, path, &[], body).await
    }

    pub async fn invoke_with_query(
        &mut self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value, Error> {
        self.ensure_fresh_token().await?;

        let resp = self.send(method.clone(), path, query, body).await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return handle_response(resp).await;
        }

        warn!(%method, path, "token rejected, re-authenticating once");
        self.reauthenticate().await?;

        let retry = self.send(method, path, query, body).await?;
        if retry.status() == StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: format!("{path} rejected after re-authentication"),
            });
        }
        handle_response(retry).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<reqwest::Response, Error> {
        let url = self.url(path)?;
        debug!("{method} {url} params={query:?}");

        let mut req = self
            .http
            .request(method, url)
            .header(
                ACCESS_TOKEN_HEADER,
                self.session.auth_token().expose_secret(),
            )
            .query(query);
        if let Some(body) = body {
            req = req.json(body);
        }
        Ok(req.send().await?)
    }

    // ── Verb helpers ─────────────────────────────────────────────────

    pub async fn get(&mut self, path: &str) -> Result<Value, Error> {
        self.invoke(Method::GET, path, None).await
    }

    pub async fn post(&mut self, path: &str, body: &Value) -> Result<Value, Error> {
        self.invoke(Method::POST, path, Some(body)).await
    }

    pub async fn put(&mut self, path: &str, body: &Value) -> Result<Value, Error> {
        self.invoke(Method::PUT, path, Some(body)).await
    }

    /// `GET` and decode into a typed model.
    pub async fn get_as<T: DeserializeOwned>(&mut self, path: &str) -> Result<T, Error> {
        let value = self.get(path).await?;
        decode(value)
    }

    // ── Pagination ───────────────────────────────────────────────────

    /// Collect every item of a collection, walking `offset`/`limit` pages
    /// with `expanded=true`.
    pub async fn list_all(&mut self, path: &str) -> Result<Vec<Value>, Error> {
        let mut all = Vec::new();
        let mut offset = 0usize;

        loop {
            let query = [
                ("offset", offset.to_string()),
                ("limit", PAGE_LIMIT.to_string()),
                ("expanded", "true".to_owned()),
            ];
            let raw = self
                .invoke_with_query(Method::GET, path, &query, None)
                .await?;
            let page: ItemPage = decode(raw)?;
            let received = page.items.len();
            let total = page.paging.as_ref().and_then(|p| p.count);
            all.extend(page.items);

            if received < PAGE_LIMIT || total.is_some_and(|count| all.len() >= count) {
                break;
            }
            offset += received;
        }

        debug!(path, count = all.len(), "listed collection");
        Ok(all)
    }

    /// [`list_all`](Self::list_all), decoding each item into `T`.
    pub async fn list_all_as<T: DeserializeOwned>(&mut self, path: &str) -> Result<Vec<T>, Error> {
        self.list_all(path).await?.into_iter().map(decode).collect()
    }

    /// Find an item of a collection by its `name` field.
    pub async fn find_by_name(&mut self, path: &str, name: &str) -> Result<Option<Value>, Error> {
        Ok(self
            .list_all(path)
            .await?
            .into_iter()
            .find(|item| item.get("name").and_then(Value::as_str) == Some(name)))
    }
}

impl std::fmt::Debug for FmcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FmcClient")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

// ── Response handling ────────────────────────────────────────────────

async fn handle_response(resp: reqwest::Response) -> Result<Value, Error> {
    let status = resp.status();
    if !status.is_success() {
        return Err(parse_error(status, resp).await);
    }

    let body = resp.text().await?;
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body).map_err(|e| {
        let preview = preview(&body);
        Error::Deserialization {
            message: format!("{e} (body preview: {preview:?})"),
            body,
        }
    })
}

async fn parse_error(status: StatusCode, resp: reqwest::Response) -> Error {
    let raw = resp.text().await.unwrap_or_default();
    Error::Api {
        status: status.as_u16(),
        message: error_description(&raw).unwrap_or_else(|| {
            if raw.is_empty() {
                status.to_string()
            } else {
                raw
            }
        }),
    }
}

/// The first 200 characters of a response body, for error messages.
pub(crate) fn preview(body: &str) -> String {
    body.chars().take(200).collect()
}

/// Join the `description` fields of a controller error body.
pub(crate) fn error_description(raw: &str) -> Option<String> {
    let parsed: ErrorResponse = serde_json::from_str(raw).ok()?;
    let joined = parsed
        .error
        .messages
        .into_iter()
        .filter_map(|m| m.description)
        .collect::<Vec<_>>()
        .join("; ");
    (!joined.is_empty()).then_some(joined)
}

pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T, Error> {
    serde_json::from_value::<T>(value.clone()).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_description_joins_messages() {
        let raw = r#"{"error":{"category":"FRAMEWORK","messages":[{"description":"Duplicate name"},{"description":"Invalid value"}],"severity":"ERROR"}}"#;
        assert_eq!(
            error_description(raw).as_deref(),
            Some("Duplicate name; Invalid value")
        );
    }

    #[test]
    fn error_description_ignores_foreign_bodies() {
        assert_eq!(error_description("<html>gateway</html>"), None);
        assert_eq!(error_description(r#"{"error":{"messages":[]}}"#), None);
    }
}
