//! Pagination cursors
//!
//! A page state handed to clients is opaque. Layout before base64 (URL-safe,
//! unpadded):
//!
//! ```text
//! version (1 byte) | MessagePack payload | CRC32 of the preceding bytes (4 bytes BE)
//! ```
//!
//! The payload pins the cursor to the collection generation and the query
//! signature it was issued for. Anything that does not decode, or decodes
//! for a different query, is rejected; a bad cursor never restarts a scan.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current token format version.
pub const CURSOR_VERSION: u8 = 1;

const CRC_LEN: usize = 4;

/// Rejected page state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CursorError {
    /// Not base64, too short, or an undecodable payload
    #[error("malformed page state: {0}")]
    Malformed(String),
    /// Integrity check failed
    #[error("page state checksum mismatch")]
    Checksum,
    /// Issued by an incompatible format version
    #[error("unsupported page state version {0}")]
    Version(u8),
    /// Issued for another collection, generation or query
    #[error("page state does not belong to this query")]
    Mismatch,
    /// Payload could not be serialized
    #[error("page state encoding failed: {0}")]
    Encode(String),
}

/// What a cursor is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorIdentity {
    /// Namespace
    pub namespace: String,
    /// Collection
    pub collection: String,
    /// Collection generation
    pub generation: Uuid,
    /// Sort and filter signature of the query
    pub signature: String,
}

/// Where a paged scan resumes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanState {
    /// Store continuation, for key-order scans
    pub paging_state: Option<Vec<u8>>,
    /// Documents already returned, for sorted reads
    pub offset: usize,
}

#[derive(Serialize, Deserialize)]
struct Payload {
    identity: CursorIdentity,
    state: ScanState,
}

/// Encodes and validates page-state tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct CursorManager;

impl CursorManager {
    /// Encode `state` for `identity`.
    pub fn encode(&self, identity: &CursorIdentity, state: &ScanState) -> Result<String, CursorError> {
        let payload = Payload {
            identity: identity.clone(),
            state: state.clone(),
        };
        let body = rmp_serde::to_vec_named(&payload).map_err(|e| CursorError::Encode(e.to_string()))?;

        let mut buf = Vec::with_capacity(1 + body.len() + CRC_LEN);
        buf.push(CURSOR_VERSION);
        buf.extend_from_slice(&body);
        let crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&crc.to_be_bytes());
        Ok(URL_SAFE_NO_PAD.encode(buf))
    }

    /// Decode a token, requiring it to match `expected`.
    pub fn decode(&self, token: &str, expected: &CursorIdentity) -> Result<ScanState, CursorError> {
        let buf = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|e| CursorError::Malformed(e.to_string()))?;
        if buf.len() < 1 + CRC_LEN {
            return Err(CursorError::Malformed("too short".into()));
        }
        let (body, crc) = buf.split_at(buf.len() - CRC_LEN);
        let mut stored = [0u8; CRC_LEN];
        stored.copy_from_slice(crc);
        if crc32fast::hash(body) != u32::from_be_bytes(stored) {
            return Err(CursorError::Checksum);
        }
        if body[0] != CURSOR_VERSION {
            return Err(CursorError::Version(body[0]));
        }
        let payload: Payload =
            rmp_serde::from_slice(&body[1..]).map_err(|e| CursorError::Malformed(e.to_string()))?;
        if &payload.identity != expected {
            return Err(CursorError::Mismatch);
        }
        Ok(payload.state)
    }
}
