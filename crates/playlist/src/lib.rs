//! # Playlist
//!
//! HLS manifest handling for the delivery engine: master-variant selection,
//! media-manifest segment listing, and the line-by-line rewrite that routes
//! every referenced URL back through the proxy endpoints.

pub mod error;
pub mod rewrite;
pub mod segments;
pub mod variant;

pub use error::PlaylistError;
pub use rewrite::{rewrite_manifest, ProxyUrls};
pub use segments::{list_segments, SegmentRef};
pub use variant::{select_variant, PlaylistVariant};
