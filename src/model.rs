//! Stitching instruction data model.
//!
//! These types are reconstructed from the request token on every call;
//! nothing here is ever stored server-side.

use serde::{Deserialize, Serialize};

/// The complete instruction set carried by a request token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StitchInstruction {
    /// Source VOD multivariant playlist
    pub uri: String,
    /// Requested insertions, in the order the client gave them
    #[serde(default)]
    pub breaks: Vec<BreakDescriptor>,
}

/// One requested insertion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakDescriptor {
    /// Milliseconds from program start
    pub pos: u64,
    /// Nominal duration of the inserted content in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    /// Single piece of ad content to splice directly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Externally hosted interstitial asset list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_list_url: Option<String>,
    #[serde(flatten)]
    pub tuning: BreakTuning,
}

/// Optional HLS interstitial attributes, using the short wire names
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BreakTuning {
    /// Playout limit in milliseconds
    #[serde(rename = "pol", default, skip_serializing_if = "Option::is_none")]
    pub playout_limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cue: Option<String>,
    #[serde(rename = "sn", default, skip_serializing_if = "Option::is_none")]
    pub snap: Option<String>,
    /// Resume offset in milliseconds
    #[serde(rename = "ro", default, skip_serializing_if = "Option::is_none")]
    pub resume_offset: Option<u64>,
    #[serde(rename = "re", default, skip_serializing_if = "Option::is_none")]
    pub restrict: Option<String>,
    #[serde(rename = "cmv", default, skip_serializing_if = "Option::is_none")]
    pub content_may_vary: Option<String>,
    #[serde(rename = "tlo", default, skip_serializing_if = "Option::is_none")]
    pub timeline_occupies: Option<String>,
    #[serde(rename = "tls", default, skip_serializing_if = "Option::is_none")]
    pub timeline_style: Option<String>,
    #[serde(rename = "cb", default, skip_serializing_if = "Option::is_none")]
    pub custom_beacon: Option<String>,
}

impl BreakDescriptor {
    /// Asset list set, no direct ad URL
    pub fn is_asset_list_only(&self) -> bool {
        self.asset_list_url.is_some() && self.url.is_none()
    }

    /// Both a direct ad URL and an asset list
    pub fn is_hybrid(&self) -> bool {
        self.asset_list_url.is_some() && self.url.is_some()
    }

    /// Has something that can actually be inserted
    pub fn is_actionable(&self) -> bool {
        self.url.is_some() || self.asset_list_url.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_short_wire_names() {
        let b: BreakDescriptor = serde_json::from_value(json!({
            "pos": 55000,
            "duration": 15000,
            "url": "https://ads.example.com/a.m3u8",
            "pol": 10000,
            "ro": 5000,
            "sn": "IN,OUT",
            "re": "SKIP,JUMP",
            "cmv": "NO",
            "tlo": "RANGE",
            "tls": "PRIMARY",
            "cue": "ONCE",
            "cb": "beacon"
        }))
        .unwrap();

        assert_eq!(b.pos, 55000);
        assert_eq!(b.tuning.playout_limit, Some(10000));
        assert_eq!(b.tuning.resume_offset, Some(5000));
        assert_eq!(b.tuning.snap.as_deref(), Some("IN,OUT"));
        assert_eq!(b.tuning.restrict.as_deref(), Some("SKIP,JUMP"));
        assert_eq!(b.tuning.content_may_vary.as_deref(), Some("NO"));
        assert_eq!(b.tuning.timeline_occupies.as_deref(), Some("RANGE"));
        assert_eq!(b.tuning.timeline_style.as_deref(), Some("PRIMARY"));
        assert_eq!(b.tuning.cue.as_deref(), Some("ONCE"));
        assert_eq!(b.tuning.custom_beacon.as_deref(), Some("beacon"));
    }

    #[test]
    fn asset_list_url_is_camel_case() {
        let b: BreakDescriptor = serde_json::from_value(json!({
            "pos": 0,
            "assetListUrl": "https://ads.example.com/list.json"
        }))
        .unwrap();
        assert!(b.is_asset_list_only());
        assert!(!b.is_hybrid());
        assert!(b.is_actionable());
    }

    #[test]
    fn breaks_default_to_empty() {
        let i: StitchInstruction =
            serde_json::from_value(json!({"uri": "https://example.com/master.m3u8"})).unwrap();
        assert!(i.breaks.is_empty());
    }

    #[test]
    fn descriptor_without_content_is_not_actionable() {
        let b = BreakDescriptor {
            pos: 1000,
            duration: Some(5000),
            ..Default::default()
        };
        assert!(!b.is_actionable());
    }
}
