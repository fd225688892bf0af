//! Segment timeline of a single rendition.
//!
//! A [`MediaTrack`] is built from a parsed m3u8-rs media playlist with every
//! URI made absolute, so ad segments from another host can sit next to
//! content segments. Splices and interstitial markers are applied to this
//! model and it is written back out as VOD playlist text.

use crate::error::{Result, StitchError};
use chrono::{DateTime, TimeDelta, Utc};
use m3u8_rs::{ByteRange, MediaPlaylist};
use std::fmt::Write;
use url::Url;

/// One media segment plus the markers attached in front of it
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub uri: String,
    /// Seconds
    pub duration: f64,
    pub discontinuity: bool,
    /// Rendered `EXT-X-BYTERANGE` value
    pub byte_range: Option<String>,
    /// Rendered `EXT-X-MAP` attribute list in effect for this segment
    pub map: Option<String>,
    /// Starts an ad break of this many seconds
    pub cue_out: Option<f64>,
    /// First segment after an ad break
    pub cue_in: bool,
    pub dateranges: Vec<DateRange>,
}

/// `EXT-X-DATERANGE` attributes around a `START-DATE` that is filled in at
/// render time from the playback position of the segment carrying it.
///
/// Splices applied after the marker move it along the timeline, so the date
/// cannot be fixed when the marker is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct DateRange {
    /// Attributes written before `START-DATE`, e.g. `ID` and `CLASS`
    pub leading: String,
    /// Attributes written after `START-DATE`, each with a leading comma
    pub trailing: String,
}

impl DateRange {
    pub fn render(&self, start: DateTime<Utc>) -> String {
        format!(
            "{},START-DATE=\"{}\"{}",
            self.leading,
            start.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            self.trailing
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaTrack {
    pub version: usize,
    pub media_sequence: u64,
    /// Program date time of the first segment, when the source had one
    pub program_start: Option<DateTime<Utc>>,
    pub segments: Vec<Segment>,
}

fn render_byte_range(range: &ByteRange) -> String {
    match range.offset {
        Some(offset) => format!("{}@{}", range.length, offset),
        None => range.length.to_string(),
    }
}

fn resolve(base: &Url, uri: &str) -> Result<String> {
    base.join(uri)
        .map(String::from)
        .map_err(|e| StitchError::PlaylistParse(format!("Unresolvable URI {}: {}", uri, e)))
}

/// Seconds with at most millisecond precision, integers without a fraction
pub fn format_seconds(seconds: f64) -> String {
    format!("{}", (seconds * 1000.0).round() / 1000.0)
}

impl MediaTrack {
    /// Convert a parsed media playlist, resolving relative URIs against `base`.
    pub fn from_playlist(playlist: &MediaPlaylist, base: &Url) -> Result<Self> {
        let mut segments = Vec::with_capacity(playlist.segments.len());
        let mut current_map: Option<String> = None;

        // TODO: carry EXT-X-KEY through splices so encrypted sources keep playing
        for seg in &playlist.segments {
            if let Some(map) = &seg.map {
                let mut rendered = format!("URI=\"{}\"", resolve(base, &map.uri)?);
                if let Some(range) = &map.byte_range {
                    let _ = write!(rendered, ",BYTERANGE=\"{}\"", render_byte_range(range));
                }
                current_map = Some(rendered);
            }

            segments.push(Segment {
                uri: resolve(base, &seg.uri)?,
                duration: seg.duration as f64,
                discontinuity: seg.discontinuity,
                byte_range: seg.byte_range.as_ref().map(render_byte_range),
                map: current_map.clone(),
                cue_out: None,
                cue_in: false,
                dateranges: Vec::new(),
            });
        }

        Ok(Self {
            version: playlist.version.unwrap_or(3),
            media_sequence: playlist.media_sequence,
            program_start: playlist
                .segments
                .first()
                .and_then(|s| s.program_date_time)
                .map(|pdt| pdt.with_timezone(&Utc)),
            segments,
        })
    }

    /// Total duration in seconds
    pub fn duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration).sum()
    }

    /// Index of the segment boundary closest to `pos_ms`.
    ///
    /// `segments.len()` means the end of the track. Ties go to the earlier
    /// boundary.
    pub fn boundary_index(&self, pos_ms: u64) -> usize {
        let target = pos_ms as f64 / 1000.0;
        let mut start = 0.0;
        let mut best = (0, f64::MAX);

        for (index, seg) in self.segments.iter().enumerate() {
            let distance = (start - target).abs();
            if distance < best.1 {
                best = (index, distance);
            }
            start += seg.duration;
        }
        if (start - target).abs() < best.1 {
            best = (self.segments.len(), 0.0);
        }

        best.0
    }

    /// Splice `ad` in at the boundary closest to `pos_ms`.
    ///
    /// An ad landing on the start of an existing break joins that break and
    /// the break's cue-out duration grows accordingly.
    pub fn splice_ad(&mut self, pos_ms: u64, ad: &[Segment]) {
        if ad.is_empty() {
            return;
        }

        let index = self.boundary_index(pos_ms);
        let ad_duration: f64 = ad.iter().map(|s| s.duration).sum();

        let mut inserted: Vec<Segment> = ad
            .iter()
            .cloned()
            .map(|mut s| {
                s.cue_out = None;
                s.cue_in = false;
                s.dateranges.clear();
                s
            })
            .collect();
        inserted[0].discontinuity = true;

        match self.segments.get_mut(index) {
            Some(next) => match next.cue_out.take() {
                Some(existing) => inserted[0].cue_out = Some(ad_duration + existing),
                None => {
                    inserted[0].cue_out = Some(ad_duration);
                    next.discontinuity = true;
                    next.cue_in = true;
                }
            },
            None => inserted[0].cue_out = Some(ad_duration),
        }

        self.segments.splice(index..index, inserted);
    }

    /// Attach a rendered `EXT-X-DATERANGE` to the segment closest to `pos_ms`
    pub fn insert_daterange(&mut self, pos_ms: u64, daterange: DateRange) -> Result<()> {
        if self.segments.is_empty() {
            return Err(StitchError::Splicing(
                "cannot mark an interstitial on an empty track".to_string(),
            ));
        }
        let index = self.boundary_index(pos_ms).min(self.segments.len() - 1);
        self.segments[index].dateranges.push(daterange);
        Ok(())
    }

    fn target_duration(&self) -> u64 {
        let longest = self.segments.iter().map(|s| s.duration).fold(0.0, f64::max);
        (longest.ceil() as u64).max(1)
    }

    /// Write the track as a VOD media playlist.
    ///
    /// `program_start` anchors dates when the source had no program date
    /// time. Date range `START-DATE`s are the anchor plus the playback time
    /// of the segment they sit on.
    pub fn render(&self, program_start: DateTime<Utc>) -> Result<String> {
        let anchor = self.program_start.unwrap_or(program_start);
        let with_pdt =
            self.program_start.is_some() || self.segments.iter().any(|s| !s.dateranges.is_empty());
        let mut elapsed = 0.0;
        let mut out = String::with_capacity(self.segments.len() * 128 + 256);

        let _ = writeln!(out, "#EXTM3U");
        let _ = writeln!(out, "#EXT-X-VERSION:{}", self.version.max(3));
        let _ = writeln!(out, "#EXT-X-TARGETDURATION:{}", self.target_duration());
        let _ = writeln!(out, "#EXT-X-MEDIA-SEQUENCE:{}", self.media_sequence);
        let _ = writeln!(out, "#EXT-X-PLAYLIST-TYPE:VOD");

        let mut current_map: Option<&str> = None;
        for (index, seg) in self.segments.iter().enumerate() {
            if seg.discontinuity && index > 0 {
                let _ = writeln!(out, "#EXT-X-DISCONTINUITY");
            }
            if seg.cue_in {
                let _ = writeln!(out, "#EXT-X-CUE-IN");
            }
            if let Some(duration) = seg.cue_out {
                let _ = writeln!(out, "#EXT-X-CUE-OUT:DURATION={}", format_seconds(duration));
            }
            if let Some(map) = seg.map.as_deref()
                && (current_map != Some(map) || seg.discontinuity)
            {
                let _ = writeln!(out, "#EXT-X-MAP:{}", map);
            }
            current_map = seg.map.as_deref();
            if index == 0 && with_pdt {
                let _ = writeln!(
                    out,
                    "#EXT-X-PROGRAM-DATE-TIME:{}",
                    anchor.format("%Y-%m-%dT%H:%M:%S%.3fZ")
                );
            }
            if !seg.dateranges.is_empty() {
                let start = offset_date(anchor, elapsed)?;
                for daterange in &seg.dateranges {
                    let _ = writeln!(out, "#EXT-X-DATERANGE:{}", daterange.render(start));
                }
            }
            elapsed += seg.duration;
            let _ = writeln!(out, "#EXTINF:{:.3},", seg.duration);
            if let Some(range) = &seg.byte_range {
                let _ = writeln!(out, "#EXT-X-BYTERANGE:{}", range);
            }
            let _ = writeln!(out, "{}", seg.uri);
        }

        let _ = writeln!(out, "#EXT-X-ENDLIST");
        Ok(out)
    }
}

/// `anchor` moved forward by `seconds`, rounded to the millisecond
fn offset_date(anchor: DateTime<Utc>, seconds: f64) -> Result<DateTime<Utc>> {
    let millis = (seconds * 1000.0).round();
    if !millis.is_finite() || millis >= i64::MAX as f64 {
        return Err(StitchError::Splicing(format!(
            "Playback offset {}s out of range",
            seconds
        )));
    }
    TimeDelta::try_milliseconds(millis as i64)
        .and_then(|delta| anchor.checked_add_signed(delta))
        .ok_or_else(|| StitchError::Splicing(format!("Playback offset {}s out of range", seconds)))
}
