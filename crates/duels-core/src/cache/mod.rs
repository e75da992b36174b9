//! Local cache for the signed-in user's profile.
//!
//! The profile is kept in memory and, when a cache directory is configured,
//! mirrored to `user.json` so a restarted client can show who is signed in.
//! It is cleared on logout.

pub mod manager;

pub use manager::{CacheManager, CachedData};
