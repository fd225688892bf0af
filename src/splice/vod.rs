//! Playlist-level VOD splicing engine.
//!
//! [`HlsVod`] loads a source (multivariant or single media playlist) with all
//! its renditions, splices ads into each rendition and marks interstitials
//! with `EXT-X-DATERANGE`. Ad assets are loaded the same way and matched to
//! source renditions by bandwidth and language.

use super::track::{DateRange, MediaTrack, format_seconds};
use super::{InterstitialOptions, SpliceEngine};
use crate::error::{Result, StitchError};
use crate::fetch::Fetcher;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::try_join_all;
use m3u8_rs::{AlternativeMediaType, Playlist};
use std::fmt::Write;
use tracing::{debug, info};
use url::Url;

/// `CLASS` of HLS Interstitial date ranges
pub const INTERSTITIAL_CLASS: &str = "com.apple.hls.interstitial";

/// Program start used for interstitial dates when the source carries no
/// program date time
const DEFAULT_PROGRAM_START_MS: i64 = 1;

#[derive(Debug, Clone, Default)]
pub struct VodOptions {
    /// Overrides the location relative segment URIs of every rendition
    /// resolve against
    pub base_url: Option<Url>,
}

impl VodOptions {
    /// Options for a source URI and an optional `subdir` hint.
    ///
    /// A relative `subdir` is resolved against the source playlist's
    /// directory; an absolute one replaces it.
    pub fn for_source(source: &Url, subdir: Option<&str>) -> Result<Self> {
        let Some(subdir) = subdir.filter(|s| !s.is_empty()) else {
            return Ok(Self::default());
        };

        let dir = if subdir.ends_with('/') {
            subdir.to_string()
        } else {
            format!("{}/", subdir)
        };
        let base = source
            .join(&dir)
            .map_err(|e| StitchError::Validation(format!("Invalid subdir {}: {}", subdir, e)))?;

        Ok(Self {
            base_url: Some(base),
        })
    }
}

#[derive(Debug, Clone)]
struct Variant {
    bandwidth: u64,
    track: MediaTrack,
}

#[derive(Debug, Clone)]
struct AudioRendition {
    group_id: String,
    language: String,
    track: MediaTrack,
}

/// Every rendition of one loaded asset
#[derive(Debug, Clone, Default)]
struct Asset {
    variants: Vec<Variant>,
    audio: Vec<AudioRendition>,
}

impl Asset {
    fn closest_variant(&self, bandwidth: u64) -> Option<&Variant> {
        self.variants
            .iter()
            .min_by_key(|v| v.bandwidth.abs_diff(bandwidth))
    }

    fn audio_for(&self, language: &str) -> Option<&AudioRendition> {
        self.audio
            .iter()
            .find(|a| a.language == language)
            .or_else(|| self.audio.first())
    }
}

fn join(base: &Url, uri: &str) -> Result<Url> {
    base.join(uri)
        .map_err(|e| StitchError::PlaylistParse(format!("Unresolvable URI {}: {}", uri, e)))
}

async fn load_track(fetcher: &Fetcher, url: &Url, base: Option<&Url>) -> Result<MediaTrack> {
    let text = fetcher.text(url.as_str()).await?;
    let playlist = m3u8_rs::parse_media_playlist_res(text.as_bytes())
        .map_err(|e| StitchError::PlaylistParse(format!("{}: {:?}", url, e)))?;
    MediaTrack::from_playlist(&playlist, base.unwrap_or(url))
}

async fn load_asset(fetcher: &Fetcher, url: &Url, base: Option<&Url>) -> Result<Asset> {
    let text = fetcher.text(url.as_str()).await?;

    match m3u8_rs::parse_playlist_res(text.as_bytes()) {
        Ok(Playlist::MasterPlaylist(master)) => {
            let variants = master
                .variants
                .iter()
                .filter(|v| !v.is_i_frame)
                .map(|v| async move {
                    let variant_url = join(url, &v.uri)?;
                    let track = load_track(fetcher, &variant_url, base).await?;
                    Ok::<_, StitchError>(Variant {
                        bandwidth: v.bandwidth,
                        track,
                    })
                });

            let audio = master
                .alternatives
                .iter()
                .filter(|m| m.media_type == AlternativeMediaType::Audio)
                .filter_map(|m| m.uri.as_deref().map(|uri| (m, uri)))
                .map(|(m, uri)| async move {
                    let rendition_url = join(url, uri)?;
                    let track = load_track(fetcher, &rendition_url, base).await?;
                    Ok::<_, StitchError>(AudioRendition {
                        group_id: m.group_id.clone(),
                        language: m.language.clone().unwrap_or_else(|| m.name.clone()),
                        track,
                    })
                });

            let (variants, audio) =
                futures_util::try_join!(try_join_all(variants), try_join_all(audio))?;
            Ok(Asset { variants, audio })
        }
        Ok(Playlist::MediaPlaylist(media)) => Ok(Asset {
            variants: vec![Variant {
                bandwidth: 0,
                track: MediaTrack::from_playlist(&media, base.unwrap_or(url))?,
            }],
            audio: Vec::new(),
        }),
        Err(e) => Err(StitchError::PlaylistParse(format!("{}: {:?}", url, e))),
    }
}

/// Interstitial `EXT-X-DATERANGE`; its `START-DATE` comes from where the
/// marker ends up on the spliced timeline
pub fn interstitial_attributes(
    id: &str,
    uri: &str,
    is_asset_list: bool,
    options: &InterstitialOptions,
) -> DateRange {
    let seconds = |ms: u64| format_seconds(ms as f64 / 1000.0);

    let leading = format!("ID=\"{}\",CLASS=\"{}\"", id, INTERSTITIAL_CLASS);
    let mut attrs = String::new();
    if let Some(duration) = options.planned_duration {
        let _ = write!(attrs, ",DURATION={}", seconds(duration));
    }
    let key = if is_asset_list {
        "X-ASSET-LIST"
    } else {
        "X-ASSET-URI"
    };
    let _ = write!(attrs, ",{}=\"{}\"", key, uri);
    if let Some(offset) = options.resume_offset {
        let _ = write!(attrs, ",X-RESUME-OFFSET={}", seconds(offset));
    }
    if let Some(limit) = options.playout_limit {
        let _ = write!(attrs, ",X-PLAYOUT-LIMIT={}", seconds(limit));
    }

    let quoted = [
        ("X-SNAP", &options.snap),
        ("X-RESTRICT", &options.restrict),
        ("CUE", &options.cue),
        ("X-CONTENT-MAY-VARY", &options.content_may_vary),
        ("X-TIMELINE-OCCUPIES", &options.timeline_occupies),
        ("X-TIMELINE-STYLE", &options.timeline_style),
        ("X-CUSTOM-BEACON", &options.custom_beacon),
    ];
    for (name, value) in quoted {
        if let Some(value) = value {
            let _ = write!(attrs, ",{}=\"{}\"", name, value);
        }
    }

    DateRange {
        leading,
        trailing: attrs,
    }
}

/// A source VOD loaded into memory for splicing
pub struct HlsVod {
    fetcher: Fetcher,
    asset: Asset,
}

impl HlsVod {
    /// Fetch and parse `source` and all its renditions
    pub async fn load(fetcher: Fetcher, source: &str, options: VodOptions) -> Result<Self> {
        let url = Url::parse(source)
            .map_err(|e| StitchError::Validation(format!("Invalid source uri {}: {}", source, e)))?;

        let asset = load_asset(&fetcher, &url, options.base_url.as_ref()).await?;
        if asset.variants.is_empty() {
            return Err(StitchError::PlaylistParse(format!(
                "{} has no playable variants",
                source
            )));
        }

        info!(
            "Loaded VOD {} ({} variants, {} audio renditions)",
            source,
            asset.variants.len(),
            asset.audio.len()
        );

        Ok(Self { fetcher, asset })
    }

    fn program_start(&self) -> DateTime<Utc> {
        self.asset
            .variants
            .first()
            .and_then(|v| v.track.program_start)
            .unwrap_or_else(|| {
                DateTime::from_timestamp_millis(DEFAULT_PROGRAM_START_MS).unwrap_or_default()
            })
    }

    fn tracks_mut(&mut self) -> impl Iterator<Item = &mut MediaTrack> {
        self.asset
            .variants
            .iter_mut()
            .map(|v| &mut v.track)
            .chain(self.asset.audio.iter_mut().map(|a| &mut a.track))
    }
}

#[async_trait]
impl SpliceEngine for HlsVod {
    async fn insert_ad_at(&mut self, pos_ms: u64, ad_uri: &str) -> Result<()> {
        let ad_url = Url::parse(ad_uri)
            .map_err(|e| StitchError::Validation(format!("Invalid ad uri {}: {}", ad_uri, e)))?;
        let ad = load_asset(&self.fetcher, &ad_url, None).await?;

        let Some(fallback) = ad.closest_variant(0) else {
            return Err(StitchError::Splicing(format!(
                "{} has no playable variants",
                ad_uri
            )));
        };

        for variant in &mut self.asset.variants {
            let source = ad.closest_variant(variant.bandwidth).unwrap_or(fallback);
            variant.track.splice_ad(pos_ms, &source.track.segments);
        }
        for rendition in &mut self.asset.audio {
            let segments = ad
                .audio_for(&rendition.language)
                .map(|a| &a.track.segments)
                .unwrap_or(&fallback.track.segments);
            rendition.track.splice_ad(pos_ms, segments);
        }

        debug!("Spliced {} at {}ms", ad_uri, pos_ms);
        Ok(())
    }

    async fn insert_interstitial_at(
        &mut self,
        pos_ms: u64,
        id: &str,
        uri: &str,
        is_asset_list: bool,
        options: &InterstitialOptions,
    ) -> Result<()> {
        let daterange = interstitial_attributes(id, uri, is_asset_list, options);

        for track in self.tracks_mut() {
            track.insert_daterange(pos_ms, daterange.clone())?;
        }
        debug!("Marked interstitial {} at {}ms", id, pos_ms);
        Ok(())
    }

    fn media_manifest(&self, bandwidth: u64) -> Result<String> {
        let variant = self
            .asset
            .closest_variant(bandwidth)
            .ok_or_else(|| StitchError::Splicing("No variants loaded".to_string()))?;
        variant.track.render(self.program_start())
    }

    fn audio_manifest(&self, group_id: &str, language: &str) -> Result<String> {
        let rendition = self
            .asset
            .audio
            .iter()
            .find(|a| a.group_id == group_id && a.language == language)
            .or_else(|| self.asset.audio.iter().find(|a| a.group_id == group_id))
            .ok_or_else(|| {
                StitchError::Splicing(format!(
                    "No audio rendition for group {} language {}",
                    group_id, language
                ))
            })?;
        rendition.track.render(self.program_start())
    }
}
