//! REST client for the remote engine.
//!
//! The readers and writers only see the [`ApiClient`] trait: `get` a
//! resource (a record or a list), `post` a new record, `put` an update.
//! [`HttpClient`] is the real implementation:
//!
//! - **Authentication**: `POST {base}/tokens.json` with the account email
//!   and API key returns a token, sent as a bearer token on every request.
//! - **Locale**: requests for localized content carry an `X-Locale` header.
//! - **Pagination**: list resources are fetched with `page`/`per_page`
//!   query parameters until a short page comes back.

use crate::config::ApiConfig;
use crate::locale::Locale;
use reqwest::blocking::{Client, RequestBuilder};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Path of the API below the configured host.
const API_PREFIX: &str = "api/v3";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("{resource}: API error ({status}): {body}")]
    Status {
        resource: String,
        status: u16,
        body: String,
    },
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("{resource}: expected {expected} in response")]
    UnexpectedResponse {
        resource: String,
        expected: &'static str,
    },
}

/// The operations the mounter needs from the remote engine.
#[cfg_attr(test, mockall::automock)]
pub trait ApiClient {
    /// Fetch `resource` (`"site"`, `"pages"`, `"content_types/events/entries"`).
    /// Lists are returned whole, every page concatenated.
    fn get(&self, resource: &str, locale: Option<Locale>) -> Result<serde_json::Value, ApiError>;

    /// Create a record under `resource`; returns the created record.
    fn post(
        &self,
        resource: &str,
        attributes: &serde_json::Value,
        locale: Option<Locale>,
    ) -> Result<serde_json::Value, ApiError>;

    /// Update record `id` of `resource`; returns the updated record.
    fn put(
        &self,
        resource: &str,
        id: &str,
        attributes: &serde_json::Value,
        locale: Option<Locale>,
    ) -> Result<serde_json::Value, ApiError>;
}

/// [`ApiClient`] over blocking HTTP.
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: String,
    per_page: usize,
}

impl HttpClient {
    /// Authenticate against the engine and return a ready client.
    pub fn connect(config: &ApiConfig, email: &str, api_key: &str) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let base_url = format!("{}/{API_PREFIX}", normalize_host(&config.host));

        let response = client
            .post(format!("{base_url}/tokens.json"))
            .json(&serde_json::json!({"email": email, "api_key": api_key}))
            .send()?;
        let body = check_status("tokens", response)?;
        let token = body
            .get("token")
            .and_then(|t| t.as_str())
            .ok_or_else(|| ApiError::Authentication("no token in response".into()))?
            .to_string();
        debug!(host = %base_url, "authenticated");

        Ok(Self {
            client,
            base_url,
            token,
            per_page: config.per_page,
        })
    }

    fn url(&self, resource: &str) -> String {
        format!("{}/{}.json", self.base_url, resource.trim_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder, locale: Option<&Locale>) -> RequestBuilder {
        let request = request.bearer_auth(&self.token);
        match locale {
            Some(locale) => request.header("X-Locale", locale.as_str()),
            None => request,
        }
    }
}

impl ApiClient for HttpClient {
    fn get(&self, resource: &str, locale: Option<Locale>) -> Result<serde_json::Value, ApiError> {
        collect_pages(resource, self.per_page, |page| {
            debug!(resource, page, "GET");
            let request = self
                .client
                .get(self.url(resource))
                .query(&[("page", page), ("per_page", self.per_page)]);
            let response = self.authorize(request, locale.as_ref()).send()?;
            check_status(resource, response)
        })
    }

    fn post(
        &self,
        resource: &str,
        attributes: &serde_json::Value,
        locale: Option<Locale>,
    ) -> Result<serde_json::Value, ApiError> {
        debug!(resource, "POST");
        let request = self.client.post(self.url(resource)).json(attributes);
        let response = self.authorize(request, locale.as_ref()).send()?;
        check_status(resource, response)
    }

    fn put(
        &self,
        resource: &str,
        id: &str,
        attributes: &serde_json::Value,
        locale: Option<Locale>,
    ) -> Result<serde_json::Value, ApiError> {
        debug!(resource, id, "PUT");
        let request = self
            .client
            .put(self.url(&format!("{resource}/{id}")))
            .json(attributes);
        let response = self.authorize(request, locale.as_ref()).send()?;
        check_status(resource, response)
    }
}

fn check_status(
    resource: &str,
    response: reqwest::blocking::Response,
) -> Result<serde_json::Value, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(ApiError::Status {
            resource: resource.to_string(),
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json()?)
}

/// `cms.example.com` → `https://cms.example.com`; trailing slashes dropped.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

/// Fetch pages `1..` through `fetch` until one holds fewer than `per_page`
/// items, concatenating them. A non-list first response is returned as is.
pub fn collect_pages(
    resource: &str,
    per_page: usize,
    mut fetch: impl FnMut(usize) -> Result<serde_json::Value, ApiError>,
) -> Result<serde_json::Value, ApiError> {
    let mut items = Vec::new();
    let mut page = 1;
    loop {
        let body = fetch(page)?;
        let batch = match body {
            serde_json::Value::Array(batch) => batch,
            other if page == 1 => return Ok(other),
            _ => {
                return Err(ApiError::UnexpectedResponse {
                    resource: resource.to_string(),
                    expected: "a list",
                });
            }
        };
        let len = batch.len();
        items.extend(batch);
        if len < per_page || len == 0 {
            break;
        }
        page += 1;
    }
    Ok(serde_json::Value::Array(items))
}

/// Records of a list response, or an error when the body is not a list.
pub fn expect_list(resource: &str, body: serde_json::Value) -> Result<Vec<serde_json::Value>, ApiError> {
    match body {
        serde_json::Value::Array(items) => Ok(items),
        _ => Err(ApiError::UnexpectedResponse {
            resource: resource.to_string(),
            expected: "a list",
        }),
    }
}

/// Remote id of a record (`_id` or `id`).
pub fn record_id(record: &serde_json::Value) -> Option<String> {
    let id = record.get("_id").or_else(|| record.get("id"))?;
    match id {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
