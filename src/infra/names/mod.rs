//! Donor display-name resolution.

pub mod mydoge;

pub use mydoge::{
    DEFAULT_MYDOGE_API_URL, MydogeConfig, MydogeNameResolver, NAME_CACHE_TIME_SECONDS,
    profile_cache_key,
};
