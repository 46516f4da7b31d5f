//! # Addons
//!
//! Queries independently-configured third-party stream-listing endpoints in
//! parallel and normalizes their heterogeneous stream descriptions into the
//! unified [`providers::StreamSource`] model. One addon's failure, timeout
//! or malformed response never affects any other addon or the aggregate
//! call's success.

pub mod aggregate;
pub mod descriptor;
pub mod error;
pub mod normalize;
pub mod stream;

pub use aggregate::{aggregate_streams, streams_for_content, HttpStreamFetcher, StreamFetcher};
pub use descriptor::{addon_content_id, AddonDescriptor, AddonManifest};
pub use error::AddonError;
pub use stream::AddonStream;
