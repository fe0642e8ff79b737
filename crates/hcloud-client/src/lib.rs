//! Hetzner Cloud REST API Client
//!
//! A Rust client library for the parts of the Hetzner Cloud API that a
//! cluster infrastructure provider needs: private networks, load balancers
//! and placement groups.
//!
//! # Example
//!
//! ```no_run
//! use hcloud_client::{HCloudClient, HCloudClientTrait, ListOpts};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HCloudClient::new(
//!     "https://api.hetzner.cloud/v1".to_string(),
//!     "your-api-token".to_string(),
//! )?;
//!
//! // Every resource owned by a cluster carries the same label
//! let opts = ListOpts::with_label_selector("caph-cluster-demo==owned");
//! let networks = client.list_networks(&opts).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Typed error codes**: API errors are classified into [`ErrorCode`] so callers
//!   can match on `not_found`, `rate_limit_exceeded` and friends instead of strings
//! - **Label selectors**: helpers to encode and parse `key==value` selectors
//! - **Pagination**: list calls follow `meta.pagination.next_page`
//! - **Mocking**: an in-memory [`MockHCloudClient`] behind the `test-util` feature

pub mod client;
pub mod common;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod hcloud_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::{DefaultHCloudClientFactory, HCloudClient, HCloudClientFactory};
pub use common::HttpClient;
pub use common::selector::{labels_to_selector, selector_to_labels};
pub use error::{ErrorCode, HCloudError};
pub use models::*;
pub use hcloud_trait::HCloudClientTrait;
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockHCloudClient, MockHCloudClientFactory};
