//! HTTP client for the Pocket Price record API.

use std::future::Future;
use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use url::Url;

use crate::config::Config;

use super::error::FetchError;

/// Records fetched per page unless the caller overrides `perPage`.
const PER_PAGE: u32 = 500;

/// Request timeout. A timeout surfaces as `FetchError::Transport`.
const TIMEOUT: Duration = Duration::from_secs(15);

/// Authenticated client for the remote record API.
///
/// Stateless beyond its configuration: every call is a pure function of
/// its inputs plus the configured base URL and key. No retries here —
/// retry policy, if any, belongs to the caller.
#[derive(Clone)]
pub struct RemoteClient {
  http: reqwest::Client,
  base_url: String,
  api_key: String,
}

impl RemoteClient {
  pub fn new(config: &Config) -> Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(TIMEOUT)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url: config.api_url.trim_end_matches('/').to_string(),
      api_key: config.api_key().unwrap_or_default(),
    })
  }

  /// Whether both the base URL and the API key are present.
  pub fn is_configured(&self) -> bool {
    !self.base_url.is_empty() && !self.api_key.is_empty()
  }

  fn build_url(&self, endpoint: &str, query: &[(String, String)]) -> Result<Url, FetchError> {
    let mut url = Url::parse(&format!("{}{}", self.base_url, endpoint))
      .map_err(|e| FetchError::Transport(format!("invalid URL: {}", e)))?;

    if !query.is_empty() {
      url.query_pairs_mut().extend_pairs(query);
    }

    Ok(url)
  }

  /// Issue an authenticated GET and decode the JSON body.
  pub async fn request(
    &self,
    endpoint: &str,
    query: &[(String, String)],
  ) -> Result<Value, FetchError> {
    if !self.is_configured() {
      return Err(FetchError::Unconfigured);
    }

    let url = self.build_url(endpoint, query)?;

    let response = self
      .http
      .get(url)
      .header("X-API-Key", &self.api_key)
      .header("Accept", "application/json")
      .send()
      .await?;

    let code = response.status().as_u16();
    let body = response.text().await?;

    if !(200..300).contains(&code) {
      return Err(FetchError::HttpStatus { code, body });
    }

    serde_json::from_str(&body).map_err(|_| FetchError::Decode)
  }

  /// Fetch every record of a collection, walking all pages.
  ///
  /// Caller-supplied `params` (filter, sort, perPage override, ...) are
  /// forwarded to each page request.
  pub async fn fetch_all(
    &self,
    collection: &str,
    params: &[(String, String)],
  ) -> Result<Vec<Value>, FetchError> {
    let endpoint = format!("/api/collections/{}/records", collection);

    let mut base_query: Vec<(String, String)> = Vec::with_capacity(params.len() + 1);
    if !params.iter().any(|(k, _)| k == "perPage") {
      base_query.push(("perPage".to_string(), PER_PAGE.to_string()));
    }
    base_query.extend(params.iter().cloned());

    fetch_pages(|page| {
      let client = self.clone();
      let endpoint = endpoint.clone();
      let mut query = base_query.clone();
      query.push(("page".to_string(), page.to_string()));
      async move { client.request(&endpoint, &query).await }
    })
    .await
  }

  /// Fetch a single record by id.
  pub async fn get_record(&self, collection: &str, id: &str) -> Result<Value, FetchError> {
    let endpoint = format!("/api/collections/{}/records/{}", collection, id);
    self.request(&endpoint, &[]).await
  }

  /// Hit the API health endpoint.
  pub async fn health(&self) -> Result<Value, FetchError> {
    self.request("/api/health", &[]).await
  }
}

/// Walk a paginated listing, accumulating `items` from each page.
///
/// Pages are numbered from 1; `totalPages` of 0 or absent counts as 1, so
/// at least one page is always attempted. Any page error aborts the whole
/// fetch — accumulated items are discarded, never returned partially.
pub async fn fetch_pages<F, Fut>(mut fetch_page: F) -> Result<Vec<Value>, FetchError>
where
  F: FnMut(u64) -> Fut,
  Fut: Future<Output = Result<Value, FetchError>>,
{
  let mut items = Vec::new();
  let mut page = 1u64;

  loop {
    let data = fetch_page(page).await?;

    if let Some(page_items) = data.get("items").and_then(Value::as_array) {
      items.extend(page_items.iter().cloned());
    }

    let total_pages = data
      .get("totalPages")
      .and_then(Value::as_u64)
      .unwrap_or(1)
      .max(1);

    page += 1;
    if page > total_pages {
      return Ok(items);
    }
  }
}
