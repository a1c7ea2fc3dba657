//! Versioned, checksummed encoding of portfolio state.
//!
//! Layout: JSON envelope `{ "version": N, "portfolio": {...} }`, compressed
//! with lz4 (size-prepended). The SHA-256 digest is taken over the
//! uncompressed JSON so it identifies portfolio content independently of the
//! compression settings.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::Portfolio;

/// Current envelope version written by `encode`.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSnapshot {
    pub version: u32,
    /// Lowercase hex SHA-256 of the uncompressed envelope.
    pub digest: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum SnapshotCodecError {
    #[error("failed to serialize snapshot: {0}")]
    Serialize(String),
    #[error("failed to decompress snapshot: {0}")]
    Decompress(String),
    #[error("snapshot digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },
    #[error("unsupported snapshot version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("failed to deserialize snapshot: {0}")]
    Deserialize(String),
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    portfolio: &'a Portfolio,
}

#[derive(Deserialize)]
struct EnvelopeHeader {
    version: u32,
}

#[derive(Deserialize)]
struct EnvelopeV1 {
    portfolio: Portfolio,
}

fn digest_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Encode a portfolio. Equal portfolios encode to equal bytes.
pub fn encode(portfolio: &Portfolio) -> Result<EncodedSnapshot, SnapshotCodecError> {
    let json = serde_json::to_vec(&EnvelopeRef {
        version: SNAPSHOT_VERSION,
        portfolio,
    })
    .map_err(|e| SnapshotCodecError::Serialize(e.to_string()))?;

    Ok(EncodedSnapshot {
        version: SNAPSHOT_VERSION,
        digest: digest_hex(&json),
        payload: lz4_flex::compress_prepend_size(&json),
    })
}

/// Decode and verify a snapshot produced by `encode`.
pub fn decode(snapshot: &EncodedSnapshot) -> Result<Portfolio, SnapshotCodecError> {
    let json = lz4_flex::decompress_size_prepended(&snapshot.payload)
        .map_err(|e| SnapshotCodecError::Decompress(e.to_string()))?;

    let actual = digest_hex(&json);
    if actual != snapshot.digest {
        return Err(SnapshotCodecError::DigestMismatch {
            expected: snapshot.digest.clone(),
            actual,
        });
    }

    let header: EnvelopeHeader = serde_json::from_slice(&json)
        .map_err(|e| SnapshotCodecError::Deserialize(e.to_string()))?;
    match header.version {
        1 => {
            let envelope: EnvelopeV1 = serde_json::from_slice(&json)
                .map_err(|e| SnapshotCodecError::Deserialize(e.to_string()))?;
            Ok(envelope.portfolio)
        }
        found => Err(SnapshotCodecError::UnsupportedVersion {
            found,
            supported: SNAPSHOT_VERSION,
        }),
    }
}
