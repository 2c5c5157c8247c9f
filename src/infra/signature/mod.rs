//! Inbound webhook authentication.

pub mod http_signature;

pub use http_signature::{
    BLOCKCYPHER_SIGNING_KEY, HttpSignatureVerifier, body_digest, parse_signature_header,
};
