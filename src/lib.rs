//! Dogecoin donation reconciliation service.
//!
//! Pulls the transaction history of a monitored address from BlockCypher,
//! records inbound donations exactly once per transaction hash, and forwards
//! donations announced by explorer webhooks to a downstream consumer.

pub mod api;
pub mod app;
pub mod domain;
pub mod infra;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
