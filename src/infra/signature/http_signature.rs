//! HTTP Signature verification for explorer webhook notifications.
//!
//! BlockCypher signs hook callbacks following draft-cavage HTTP Signatures with
//! ECDSA P-256 over SHA-256. The signed headers are `(request-target)`,
//! `digest` and `date`; the `Digest` header carries the SHA-256 of the body.

use axum::http::{HeaderMap, Method};
use base64::{Engine, engine::general_purpose::STANDARD};
use p256::ecdsa::{Signature, VerifyingKey, signature::Verifier};
use p256::pkcs8::DecodePublicKey;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::domain::{AppError, ConfigError};

/// BlockCypher's published webhook signing key (base64 SubjectPublicKeyInfo)
pub const BLOCKCYPHER_SIGNING_KEY: &str = "MFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAEflgGqpIAC9k65JicOPBgXZUExen4rWLq05KwYmZHphTU/fmi3Oe/ckyxo2w3Ayo/SCO/rU2NB90jtCJfz9i1ow==";

/// Headers that must be covered by the signature
pub const REQUIRED_SIGNED_HEADERS: [&str; 3] = ["(request-target)", "digest", "date"];

const SUPPORTED_ALGORITHM: &str = "ecdsa-sha256";

/// Parsed parameters of a `Signature` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureParams {
    pub key_id: Option<String>,
    pub algorithm: Option<String>,
    /// Lower-cased names of the signed headers, in signing order
    pub headers: Vec<String>,
    pub signature: String,
}

/// Parse `keyId="..",algorithm="..",headers="..",signature=".."`.
/// Accepts the value of either `Signature` or `Authorization: Signature ...`.
pub fn parse_signature_header(value: &str) -> Option<SignatureParams> {
    let value = value.trim();
    let value = value.strip_prefix("Signature ").unwrap_or(value);

    let mut key_id = None;
    let mut algorithm = None;
    let mut headers = None;
    let mut signature = None;

    for part in value.split(',') {
        let (name, raw) = part.trim().split_once('=')?;
        let param = raw.trim().trim_matches('"').to_string();
        match name.trim() {
            "keyId" => key_id = Some(param),
            "algorithm" => algorithm = Some(param),
            "headers" => {
                headers = Some(
                    param
                        .split_whitespace()
                        .map(|h| h.to_ascii_lowercase())
                        .collect::<Vec<_>>(),
                )
            }
            "signature" => signature = Some(param),
            _ => {}
        }
    }

    Some(SignatureParams {
        key_id,
        algorithm,
        // the scheme defaults to `date` alone when the list is omitted
        headers: headers.unwrap_or_else(|| vec!["date".to_string()]),
        signature: signature?,
    })
}

/// Build the canonical string that was signed
pub fn signing_string(
    method: &Method,
    request_target: &str,
    headers: &HeaderMap,
    signed_headers: &[String],
) -> Result<String, String> {
    signed_headers
        .iter()
        .map(|name| {
            if name == "(request-target)" {
                return Ok(format!(
                    "(request-target): {} {}",
                    method.as_str().to_ascii_lowercase(),
                    request_target
                ));
            }
            let value = headers
                .get(name.as_str())
                .ok_or_else(|| format!("signed header {} missing", name))?
                .to_str()
                .map_err(|_| format!("signed header {} is not visible ASCII", name))?;
            Ok(format!("{}: {}", name, value.trim()))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(|lines| lines.join("\n"))
}

/// Value for a `Digest` header over `body`
#[must_use]
pub fn body_digest(body: &[u8]) -> String {
    format!("SHA-256={}", STANDARD.encode(Sha256::digest(body)))
}

fn digest_matches(header: &str, body: &[u8]) -> bool {
    let expected = Sha256::digest(body);
    header
        .split(',')
        .filter_map(|entry| entry.trim().split_once('='))
        .filter(|(algorithm, _)| algorithm.eq_ignore_ascii_case("SHA-256"))
        .any(|(_, encoded)| {
            STANDARD
                .decode(encoded.trim())
                .is_ok_and(|decoded| decoded.as_slice() == expected.as_slice())
        })
}

/// Verifies explorer webhook signatures against a fixed public key
#[derive(Debug, Clone)]
pub struct HttpSignatureVerifier {
    key: VerifyingKey,
}

impl HttpSignatureVerifier {
    #[must_use]
    pub fn new(key: VerifyingKey) -> Self {
        Self { key }
    }

    /// Build from base64-encoded DER SubjectPublicKeyInfo
    pub fn from_base64_spki(encoded: &str) -> Result<Self, AppError> {
        let der = STANDARD.decode(encoded.trim()).map_err(|e| {
            AppError::Config(ConfigError::Invalid {
                key: "webhook signing key".to_string(),
                message: e.to_string(),
            })
        })?;
        let key = VerifyingKey::from_public_key_der(&der).map_err(|e| {
            AppError::Config(ConfigError::Invalid {
                key: "webhook signing key".to_string(),
                message: e.to_string(),
            })
        })?;
        Ok(Self::new(key))
    }

    /// Verifier for BlockCypher's preset signing key
    pub fn blockcypher() -> Result<Self, AppError> {
        Self::from_base64_spki(BLOCKCYPHER_SIGNING_KEY)
    }

    /// True only for a well-formed, correctly signed request whose digest matches `body`
    pub fn verify(
        &self,
        method: &Method,
        request_target: &str,
        headers: &HeaderMap,
        body: &[u8],
    ) -> bool {
        match self.check(method, request_target, headers, body) {
            Ok(()) => true,
            Err(reason) => {
                warn!(reason = %reason, "Webhook signature rejected");
                false
            }
        }
    }

    fn check(
        &self,
        method: &Method,
        request_target: &str,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<(), String> {
        let header_value = headers
            .get("signature")
            .or_else(|| headers.get("authorization"))
            .ok_or("no signature header")?
            .to_str()
            .map_err(|_| "signature header is not visible ASCII")?;
        let params = parse_signature_header(header_value).ok_or("malformed signature header")?;

        if let Some(algorithm) = &params.algorithm
            && !algorithm.eq_ignore_ascii_case(SUPPORTED_ALGORITHM)
        {
            return Err(format!("unsupported algorithm {}", algorithm));
        }
        for required in REQUIRED_SIGNED_HEADERS {
            if !params.headers.iter().any(|h| h == required) {
                return Err(format!("{} is not signed", required));
            }
        }

        let digest = headers
            .get("digest")
            .and_then(|v| v.to_str().ok())
            .ok_or("digest header missing")?;
        if !digest_matches(digest, body) {
            return Err("digest does not match body".to_string());
        }

        let message = signing_string(method, request_target, headers, &params.headers)?;
        let raw = STANDARD
            .decode(params.signature.as_bytes())
            .map_err(|_| "signature is not base64")?;
        let signature = Signature::from_der(&raw)
            .or_else(|_| Signature::from_slice(&raw))
            .map_err(|_| "signature is not a valid ECDSA signature")?;

        self.key
            .verify(message.as_bytes(), &signature)
            .map_err(|_| "signature does not verify".to_string())?;

        debug!(key_id = ?params.key_id, "Webhook signature verified");
        Ok(())
    }
}
