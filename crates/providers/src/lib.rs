//! # Providers
//!
//! Resolvers and payload decoders for the unofficial upstream providers the
//! engine aggregates. Each provider module reverse-engineers one wire format:
//!
//! - `vibix`: embed-URL resolver with a rotate-then-base64 link cipher
//! - `kinoray`: page-scraping resolver with a trash-token stream cipher
//! - `vidara`: embed API returning an inline `makePlayer({..})` data literal
//!
//! Providers never propagate upstream failures to their callers; a provider
//! that cannot produce streams yields an empty result and logs the cause.

pub mod cache;
pub mod extractor;
pub mod media;
pub mod providers;

pub use cache::SourceCache;
pub use extractor::error::ProviderError;
pub use extractor::source::{Extractor, HeaderBundle};
pub use media::{ContentRef, PlayerInfo, Quality, StreamSource, Subtitle, Translation};
