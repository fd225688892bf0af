//! Segment-level splicing.
//!
//! [`SpliceEngine`] is the seam between the orchestrator, which decides what
//! goes where, and the code that edits media playlists. [`vod::HlsVod`] is the
//! playlist-level implementation the HTTP handlers use.

pub mod track;
pub mod vod;

use crate::error::Result;
use async_trait::async_trait;

/// Interstitial attributes derived for one break group.
///
/// Durations and offsets are milliseconds; the engine renders them in
/// seconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterstitialOptions {
    pub planned_duration: Option<u64>,
    pub resume_offset: Option<u64>,
    pub playout_limit: Option<u64>,
    pub cue: Option<String>,
    pub snap: Option<String>,
    pub restrict: Option<String>,
    pub content_may_vary: Option<String>,
    pub timeline_occupies: Option<String>,
    pub timeline_style: Option<String>,
    pub custom_beacon: Option<String>,
    /// Break duration of the preceding group (combined mode only)
    pub previous_break_duration: Option<u64>,
    /// Whether earlier spliced breaks shift this one on the playback timeline
    pub add_delta_offset: Option<bool>,
}

/// Operations a splicing engine exposes.
///
/// Insertions must be applied one at a time, latest position first: each
/// insertion can move every segment after it.
#[async_trait]
pub trait SpliceEngine: Send {
    /// Splice the ad at `ad_uri` into every rendition at `pos_ms`
    async fn insert_ad_at(&mut self, pos_ms: u64, ad_uri: &str) -> Result<()>;

    /// Mark an interstitial at `pos_ms`.
    ///
    /// `is_asset_list` selects whether `uri` is an asset list or a single
    /// asset.
    async fn insert_interstitial_at(
        &mut self,
        pos_ms: u64,
        id: &str,
        uri: &str,
        is_asset_list: bool,
        options: &InterstitialOptions,
    ) -> Result<()>;

    /// Render the media playlist of the variant closest to `bandwidth`
    fn media_manifest(&self, bandwidth: u64) -> Result<String>;

    /// Render the audio rendition playlist for a group and language
    fn audio_manifest(&self, group_id: &str, language: &str) -> Result<String>;
}
