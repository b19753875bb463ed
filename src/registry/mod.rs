//! Community rule registry access: the HTTP fetcher and the index cache.

pub mod cache;
pub mod client;

pub use cache::{Clock, IndexCache, SystemClock};
pub use client::{BackoffParams, HttpRegistryClient, RegistryFetcher};
