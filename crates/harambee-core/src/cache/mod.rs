//! Local caches.
//!
//! - `manager`: JSON snapshots of fetched collections and the derived
//!   aggregate, with age and staleness tracking, for offline viewing
//! - `assets`: the generation-based offline asset cache

pub mod assets;
pub mod manager;

pub use assets::{
    AssetCache, AssetFetcher, AssetResponse, FetchOutcome, GenerationState, HttpFetcher,
    ImageSource,
};
pub use manager::{CacheAges, CacheManager, CachedData};
