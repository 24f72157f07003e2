//! Remote catalog API: client, pagination and record normalization.

mod client;
mod error;
pub mod normalize;
mod types;

pub use client::RemoteClient;
pub use error::FetchError;
pub use types::{Category, PriceDisplay, RefreshSummary, Service, Subcategory};
