//! Decoding landing-page URLs and identifying the visitor.

use std::net::SocketAddr;

use axum::http::HeaderMap;

use crate::error::CaptureError;

const TABLE_START: usize = 16;
const TABLE_END: usize = 48;

/// The log row a landing-page URL points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureTarget {
    /// Per-task log table.
    pub table: String,
    /// Recipient `uuid` within that table.
    pub recipient: String,
}

/// Decode the last path segment of `url`.
///
/// The segment carries the log table at bytes `16..48`; the recipient id is
/// the tail after byte 48 followed by the first 16 bytes.
pub fn parse_url_id(url: &str) -> Result<CaptureTarget, CaptureError> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let url_id = path.trim_end_matches('/').rsplit('/').next().unwrap_or_default();

    let invalid = || CaptureError::BadRequest(format!("unrecognized link: {}", url));
    if !url_id.is_ascii() || url_id.len() <= TABLE_END {
        return Err(invalid());
    }

    Ok(CaptureTarget {
        table: url_id[TABLE_START..TABLE_END].to_string(),
        recipient: format!("{}{}", &url_id[TABLE_END..], &url_id[..TABLE_START]),
    })
}

/// Client address: first `X-Forwarded-For` entry, else the peer address.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}
