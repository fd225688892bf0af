//! Tag line attribute lists.
//!
//! Master playlists are rewritten line by line without a full parse, so tag
//! attributes are handled textually: split on commas outside quoted strings,
//! matched by exact key.

/// Split `#EXT-X-TAG:ATTR=..,..` into the tag and its attribute list.
///
/// Returns `None` for lines that are not tags or carry no attributes.
pub fn split_tag(line: &str) -> Option<(&str, &str)> {
    if !line.starts_with('#') {
        return None;
    }
    line.split_once(':')
}

/// Split an attribute list on commas that are not inside a quoted string
pub fn split_attributes(list: &str) -> Vec<&str> {
    let mut attributes = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;

    for (i, c) in list.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                attributes.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if start < list.len() {
        attributes.push(&list[start..]);
    }

    attributes
}

/// Key of a `KEY=VALUE` attribute
pub fn attribute_key(attribute: &str) -> &str {
    attribute
        .split_once('=')
        .map(|(key, _)| key)
        .unwrap_or(attribute)
        .trim()
}

/// Unquoted value of the attribute named `key`
pub fn attribute_value<'a>(attributes: &[&'a str], key: &str) -> Option<&'a str> {
    attributes.iter().find_map(|attr| {
        let (k, v) = attr.split_once('=')?;
        (k.trim() == key).then(|| unquote(v.trim()))
    })
}

/// Whether an attribute named `key` is present
pub fn has_attribute(attributes: &[&str], key: &str) -> bool {
    attributes.iter().any(|attr| attribute_key(attr) == key)
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Directory part of a URI: everything before its last `/`
pub fn directory_of(uri: &str) -> Option<&str> {
    uri.rsplit_once('/')
        .map(|(dir, _)| dir)
        .filter(|dir| !dir.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_tag_from_attributes() {
        assert_eq!(
            split_tag("#EXT-X-STREAM-INF:BANDWIDTH=1000"),
            Some(("#EXT-X-STREAM-INF", "BANDWIDTH=1000"))
        );
        assert_eq!(split_tag("#EXTM3U"), None);
        assert_eq!(split_tag("http://host/a.m3u8"), None);
    }

    #[test]
    fn commas_inside_quotes_do_not_split() {
        let attrs = split_attributes("BANDWIDTH=1000,CODECS=\"avc1.4d401f,mp4a.40.2\",AUDIO=\"aac\"");
        assert_eq!(
            attrs,
            vec!["BANDWIDTH=1000", "CODECS=\"avc1.4d401f,mp4a.40.2\"", "AUDIO=\"aac\""]
        );
    }

    #[test]
    fn value_lookup_matches_whole_key() {
        let attrs = split_attributes("AVERAGE-BANDWIDTH=900,BANDWIDTH=1000,NAME=\"English\"");
        assert_eq!(attribute_value(&attrs, "BANDWIDTH"), Some("1000"));
        assert_eq!(attribute_value(&attrs, "NAME"), Some("English"));
        assert_eq!(attribute_value(&attrs, "LANGUAGE"), None);
        assert!(has_attribute(&attrs, "AVERAGE-BANDWIDTH"));
        assert!(!has_attribute(&attrs, "SUBTITLES"));
    }

    #[test]
    fn directory_is_path_before_last_slash() {
        assert_eq!(directory_of("1000/index.m3u8"), Some("1000"));
        assert_eq!(directory_of("a/b/index.m3u8"), Some("a/b"));
        assert_eq!(directory_of("index.m3u8"), None);
        assert_eq!(directory_of("/index.m3u8"), None);
    }
}
