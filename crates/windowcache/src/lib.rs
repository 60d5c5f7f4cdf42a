//! # windowcache
//!
//! Bounded-memory cache for windowed access over a large keyed sequence.
//!
//! ## Architecture
//! - **Atomic cell**: mutex-guarded value with atomic get/set/mutate
//! - **WindowCache**: HashMap (AHash) keyed cache with page-distance purging
//! - **Eviction**: distance from the last referenced page, not recency —
//!   memory stays bounded to a handful of contiguous pages
//!
//! ## Goals
//! - Purge and insert as one atomic mutation (no half-purged reads)
//! - O(pages_to_retain × window_size) resident entries
//! - Hit/miss statistics

#![warn(missing_docs)]

mod atomic;
mod cache;
mod stats;

pub use atomic::Atomic;
pub use cache::{WindowCache, DEFAULT_PAGES_TO_RETAIN};
pub use stats::CacheStats;
