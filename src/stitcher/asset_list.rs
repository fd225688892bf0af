//! HLS Interstitials asset lists.
//!
//! The stitcher never stores asset lists. It packs the list into a token,
//! points `X-ASSET-LIST` at the discovery endpoint with that token, and the
//! endpoint unpacks it into the public document players expect:
//! ```json
//! {"ASSETS": [{"URI": "https://ads.example.com/ad.m3u8", "DURATION": 15}]}
//! ```

use crate::codec::{self, CodecError};
use serde::{Deserialize, Serialize};
use serde_json::Number;

/// Compact form carried inside the token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetListPayload {
    pub assets: Vec<AssetItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetItem {
    pub uri: String,
    /// Duration in seconds
    pub dur: Number,
}

/// Public asset-list document; the upper-case field names are part of the
/// HLS Interstitials contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetListDocument {
    #[serde(rename = "ASSETS")]
    pub assets: Vec<AssetEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetEntry {
    #[serde(rename = "URI")]
    pub uri: String,
    #[serde(rename = "DURATION")]
    pub duration: Number,
}

impl AssetItem {
    /// Build an item from a duration in milliseconds
    pub fn from_millis(uri: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            uri: uri.into(),
            dur: seconds_from_millis(duration_ms),
        }
    }
}

/// Whole seconds stay integers so tokens match what players and older
/// clients already produced.
pub fn seconds_from_millis(ms: u64) -> Number {
    if ms % 1000 == 0 {
        Number::from(ms / 1000)
    } else {
        Number::from_f64(ms as f64 / 1000.0).unwrap_or_else(|| Number::from(ms / 1000))
    }
}

pub fn encode(payload: &AssetListPayload) -> Result<String, CodecError> {
    codec::encode(payload)
}

pub fn decode(token: &str) -> Result<AssetListDocument, CodecError> {
    let payload: AssetListPayload = codec::decode(token)?;
    Ok(AssetListDocument {
        assets: payload
            .assets
            .into_iter()
            .map(|a| AssetEntry {
                uri: a.uri,
                duration: a.dur,
            })
            .collect(),
    })
}

/// Discovery URL for a token under this service's asset-list route.
///
/// The token becomes a path segment, so its reserved characters are
/// percent-escaped here. Without a base URL the link is host-relative.
pub fn discovery_url(base_url: Option<&str>, prefix: &str, token: &str) -> String {
    let escaped: String = url::form_urlencoded::byte_serialize(token.as_bytes()).collect();
    let base = base_url.unwrap_or("").trim_end_matches('/');
    format!("{}{}/assetlist/{}", base, prefix, escaped)
}
