//! HTTP access to the Census ACS 5-year API.
//!
//! [`CensusClient`] implements [`acs_core::source::DataSource`]. Every request
//! it issues first draws a key from a shared [`RateLimiter`]. The
//! [`BatchFetcher`] splits a variable list into API-sized requests against any
//! `DataSource` and merges the answers into one row set.

pub mod batch;
pub mod client;
pub mod error;
pub mod rate;

pub use batch::{BatchConfig, BatchFetcher, FailedBatch, FetchOutcome};
pub use client::{CensusClient, ClientConfig};
pub use error::{Error, Result};
pub use rate::RateLimiter;
