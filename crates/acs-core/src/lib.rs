//! Core types and trait definitions for the ACS table downloader.
//!
//! No HTTP or database code lives here. The token resolver, the
//! geography-keyed row merge and the derived-column engine are pure
//! functions; the remote API and the persisted catalog are reached through
//! the [`source::DataSource`] and [`store::CatalogStore`] traits.

// Test doubles implement the traits with plain `async fn`.
#![allow(async_fn_in_trait)]

pub mod derive;
pub mod error;
pub mod geography;
pub mod resolve;
pub mod row;
pub mod source;
pub mod store;
pub mod variable;
pub mod years;

pub use error::{Error, Result};
