//! Infrastructure layer implementations.

pub mod cache;
pub mod database;
pub mod explorer;
pub mod names;
pub mod reporting;
pub mod signature;

pub use cache::InMemoryCache;
pub use database::{PostgresClient, PostgresConfig};
pub use explorer::{BlockcypherClient, BlockcypherConfig, DEFAULT_BLOCKCYPHER_API_URL};
pub use names::{DEFAULT_MYDOGE_API_URL, MydogeConfig, MydogeNameResolver};
pub use reporting::TracingErrorReporter;
pub use signature::{BLOCKCYPHER_SIGNING_KEY, HttpSignatureVerifier};
