//! Error taxonomy for remote API calls.

use thiserror::Error;

/// Failure modes at the client/fetch boundary.
///
/// These propagate unchanged through the pagination loop; the cache layer
/// is the only component allowed to swallow them.
#[derive(Debug, Error)]
pub enum FetchError {
  /// No API key or base URL configured. Checked before any network call.
  #[error("API is not configured (missing base URL or API key)")]
  Unconfigured,

  /// Network-level failure, including timeouts.
  #[error("transport error: {0}")]
  Transport(String),

  /// Response outside the 2xx range.
  #[error("API returned status {code}")]
  HttpStatus { code: u16, body: String },

  /// Body was not valid JSON.
  #[error("failed to parse API response")]
  Decode,
}

impl From<reqwest::Error> for FetchError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_decode() {
      FetchError::Decode
    } else {
      FetchError::Transport(err.to_string())
    }
  }
}
