//! Multivariant playlist rewriting.
//!
//! The upstream master playlist is rewritten in a single forward pass so every
//! variant and audio rendition is requested back through this service,
//! carrying the instruction token along. The only state kept between lines is
//! the last `BANDWIDTH` seen.

use super::attributes::{
    attribute_key, attribute_value, directory_of, has_attribute, split_attributes, split_tag,
};
use std::fmt::Write;
use url::form_urlencoded::byte_serialize;

const MEDIA_TAG: &str = "#EXT-X-MEDIA";
const STREAM_INF_TAG: &str = "#EXT-X-STREAM-INF";
const I_FRAME_STREAM_INF_TAG: &str = "#EXT-X-I-FRAME-STREAM-INF";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MasterRewriteOptions {
    pub use_interstitial: bool,
    pub combine_interstitial: bool,
    pub no_subtitles: bool,
}

fn escape(value: &str) -> String {
    byte_serialize(value.as_bytes()).collect()
}

fn push_common_params(
    uri: &mut String,
    token: &str,
    subdir: Option<&str>,
    options: &MasterRewriteOptions,
) {
    let _ = write!(uri, "&payload={}", token);
    if let Some(subdir) = subdir {
        let _ = write!(uri, "&subdir={}", escape(subdir));
    }
    if options.use_interstitial {
        uri.push_str("&i=1");
    }
    if options.combine_interstitial {
        uri.push_str("&c=1");
    }
}

/// Route an audio rendition declaration through the audio endpoint.
///
/// Returns `None` when the line is not an audio rendition with a group and a
/// URI.
fn rewrite_audio_rendition(
    attribute_list: &str,
    token: &str,
    options: &MasterRewriteOptions,
    prefix: &str,
) -> Option<String> {
    let attributes = split_attributes(attribute_list);
    if attribute_value(&attributes, "TYPE") != Some("AUDIO") {
        return None;
    }
    let group_id = attribute_value(&attributes, "GROUP-ID")?;
    let uri = attribute_value(&attributes, "URI")?;
    let language = attribute_value(&attributes, "LANGUAGE")
        .or_else(|| attribute_value(&attributes, "NAME"))
        .unwrap_or_default();

    let mut routed = format!(
        "{}/audio.m3u8?groupid={}&language={}",
        prefix,
        escape(group_id),
        escape(language)
    );
    push_common_params(&mut routed, token, directory_of(uri), options);

    let mut kept: Vec<String> = attributes
        .iter()
        .filter(|attr| attribute_key(attr) != "URI")
        .map(|attr| attr.to_string())
        .collect();
    kept.push(format!("URI=\"{}\"", routed));

    Some(format!("{}:{}", MEDIA_TAG, kept.join(",")))
}

/// Rewrite the multivariant playlist `text` so it routes through `prefix`.
///
/// `token` is the instruction token exactly as the client sent it. Every
/// retained line is terminated by a single `\n`.
pub fn rewrite_master(
    text: &str,
    token: &str,
    options: &MasterRewriteOptions,
    prefix: &str,
) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    let mut bandwidth: Option<String> = None;

    for raw in text.lines() {
        let mut line = raw.trim_end_matches('\r').to_string();

        if options.no_subtitles
            && let Some((tag, list)) = split_tag(&line)
        {
            let attributes = split_attributes(list);
            if tag == MEDIA_TAG && attribute_value(&attributes, "TYPE") == Some("SUBTITLES") {
                continue;
            }
            if tag == STREAM_INF_TAG && has_attribute(&attributes, "SUBTITLES") {
                let kept: Vec<&str> = attributes
                    .into_iter()
                    .filter(|attr| attribute_key(attr) != "SUBTITLES")
                    .collect();
                line = format!("{}:{}", tag, kept.join(","));
            }
        }

        let replacement = match split_tag(&line) {
            Some((MEDIA_TAG, list)) => rewrite_audio_rendition(list, token, options, prefix),
            Some((tag, list)) => {
                let attributes = split_attributes(list);
                if let Some(bw) = attribute_value(&attributes, "BANDWIDTH") {
                    bandwidth = Some(bw.to_string());
                    if tag == I_FRAME_STREAM_INF_TAG {
                        continue;
                    }
                }
                None
            }
            None if !line.is_empty() && !line.starts_with('#') => {
                let mut routed = format!(
                    "{}/media.m3u8?bw={}",
                    prefix,
                    bandwidth.as_deref().unwrap_or("0")
                );
                push_common_params(&mut routed, token, directory_of(&line), options);
                Some(routed)
            }
            None => None,
        };
        if let Some(replacement) = replacement {
            line = replacement;
        }

        out.push_str(&line);
        out.push('\n');
    }

    out
}
