//! Block explorer clients.

pub mod blockcypher;

pub use blockcypher::{BlockcypherClient, BlockcypherConfig, DEFAULT_BLOCKCYPHER_API_URL};
