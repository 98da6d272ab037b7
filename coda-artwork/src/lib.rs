//! Tiered artwork cache for the Coda music client.
//!
//! Artwork for an owner (album, artist, collection, playlist) is resolved
//! through two cache tiers fronted by a fetch-on-miss pipeline:
//!
//! - [`key`] derives stable cache keys and filesystem-safe file names;
//! - [`memory`] holds decoded images for the life of the process;
//! - [`disk`] stores raw bytes with a durable, size-bounded LRU index that
//!   self-heals corruption and survives crashes via atomic rewrites;
//! - [`pipeline`] orchestrates lookup → fetch → validate → store and owns
//!   invalidation;
//! - [`retry`] backs off and re-probes for artwork that lags availability.
//!
//! The HTTP layer is injected through [`fetch::ArtworkFetcher`]; a stock
//! `reqwest` implementation is provided. There is no shared default
//! instance: build an [`ArtworkPipeline`] from an [`ArtworkCacheConfig`]
//! once at startup and pass it to consumers.

pub mod config;
pub mod disk;
pub mod error;
pub mod fetch;
pub mod key;
pub mod memory;
pub mod pipeline;
pub mod retry;

pub use config::ArtworkCacheConfig;
pub use disk::{ArtworkDiskCache, ArtworkIndex, IndexEntry};
pub use error::{ArtworkError, Result};
pub use fetch::{ArtworkFetcher, FetchResponse, HttpArtworkFetcher};
pub use key::{ArtworkKey, ArtworkVariant, OwnerKind};
pub use memory::ArtworkMemoryCache;
pub use pipeline::{ArtworkImage, ArtworkPipeline, ArtworkRequest};
pub use retry::{RetryPolicy, load_with_retry};
