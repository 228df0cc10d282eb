// SPDX-FileCopyrightText: 2026 Contributors to the MediaGraph project.
// SPDX-License-Identifier: Apache-2.0

//! Stream name validation.
//!
//! Stream bindings accept specs of the form `(TAG:)?(index:)?name` where
//! `TAG` matches `[A-Z_][A-Z0-9_]*`, `name` matches `[a-z_][a-z0-9_]*` and
//! `index` is a bounded non-negative integer. Malformed specs fail fast with
//! [`Error::InvalidName`] before any foreign call is attempted.

use crate::{Error, Result};

/// Upper bound for collection indices in a stream spec.
pub const MAX_COLLECTION_ITEM_ID: usize = 10_000;

/// A parsed `(TAG:)?(index:)?name` stream spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagIndexName {
    pub tag: Option<String>,
    pub index: Option<usize>,
    pub name: String,
}

fn is_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn is_tag(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_uppercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

fn is_number(s: &str) -> bool {
    match s.as_bytes() {
        [] => false,
        [b'0'] => true,
        [b'1'..=b'9', rest @ ..] => rest.iter().all(u8::is_ascii_digit),
        _ => false,
    }
}

/// Validates a bare stream name (`[a-z_][a-z0-9_]*`).
pub fn validate_name(name: &str) -> Result<()> {
    if is_name(name) {
        return Ok(());
    }
    Err(Error::InvalidName(format!(
        "name \"{name}\" does not match \"[a-z_][a-z0-9_]*\""
    )))
}

/// Validates a tag (`[A-Z_][A-Z0-9_]*`).
pub fn validate_tag(tag: &str) -> Result<()> {
    if is_tag(tag) {
        return Ok(());
    }
    Err(Error::InvalidName(format!(
        "tag \"{tag}\" does not match \"[A-Z_][A-Z0-9_]*\""
    )))
}

/// Parses a `(TAG:)?(index:)?name` stream spec.
///
/// # Examples
///
/// ```
/// use mediagraph::name::parse_tag_index_name;
///
/// let parsed = parse_tag_index_name("VIDEO:2:name_b")?;
/// assert_eq!(parsed.tag.as_deref(), Some("VIDEO"));
/// assert_eq!(parsed.index, Some(2));
/// assert_eq!(parsed.name, "name_b");
/// # Ok::<(), mediagraph::Error>(())
/// ```
pub fn parse_tag_index_name(spec: &str) -> Result<TagIndexName> {
    let invalid = || {
        Error::InvalidName(format!(
            "\"{spec}\" does not match \"(TAG:(index:)?)?name\" \
             (examples: \"TAG:name\", \"VIDEO:2:name_b\", \"longer_name\")"
        ))
    };

    let parts: Vec<&str> = spec.split(':').collect();
    let (tag, index, name) = match parts.as_slice() {
        [name] => (None, None, *name),
        [tag, name] => (Some(*tag), None, *name),
        [tag, index, name] => (Some(*tag), Some(*index), *name),
        _ => return Err(invalid()),
    };

    if !is_name(name) {
        return Err(invalid());
    }
    if let Some(tag) = tag
        && !is_tag(tag)
    {
        return Err(invalid());
    }
    let index = match index {
        None => None,
        Some(text) => {
            if !is_number(text) {
                return Err(invalid());
            }
            let value: usize = text.parse().map_err(|_| invalid())?;
            if value > MAX_COLLECTION_ITEM_ID {
                return Err(Error::InvalidName(format!(
                    "index {value} exceeds the maximum collection size {MAX_COLLECTION_ITEM_ID}"
                )));
            }
            Some(value)
        }
    };

    Ok(TagIndexName {
        tag: tag.map(str::to_string),
        index,
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_spec() {
        let parsed = parse_tag_index_name("VIDEO:2:name_b").unwrap();
        assert_eq!(parsed.tag.as_deref(), Some("VIDEO"));
        assert_eq!(parsed.index, Some(2));
        assert_eq!(parsed.name, "name_b");
    }

    #[test]
    fn parses_tag_and_name() {
        let parsed = parse_tag_index_name("AUDIO:samples").unwrap();
        assert_eq!(parsed.tag.as_deref(), Some("AUDIO"));
        assert_eq!(parsed.index, None);
        assert_eq!(parsed.name, "samples");
    }

    #[test]
    fn parses_bare_name() {
        let parsed = parse_tag_index_name("longer_name").unwrap();
        assert_eq!(parsed.tag, None);
        assert_eq!(parsed.index, None);
        assert_eq!(parsed.name, "longer_name");
    }

    #[test]
    fn rejects_malformed_specs() {
        assert!(matches!(
            parse_tag_index_name("2Invalid"),
            Err(Error::InvalidName(_))
        ));
        assert!(matches!(
            parse_tag_index_name("video:name"),
            Err(Error::InvalidName(_))
        ));
        assert!(matches!(
            parse_tag_index_name("VIDEO:02:name"),
            Err(Error::InvalidName(_))
        ));
        assert!(matches!(
            parse_tag_index_name("VIDEO:2:Name"),
            Err(Error::InvalidName(_))
        ));
        assert!(matches!(
            parse_tag_index_name(""),
            Err(Error::InvalidName(_))
        ));
        assert!(matches!(
            parse_tag_index_name("A:1:2:name"),
            Err(Error::InvalidName(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_index() {
        assert!(parse_tag_index_name("TAG:10000:name").is_ok());
        assert!(matches!(
            parse_tag_index_name("TAG:10001:name"),
            Err(Error::InvalidName(_))
        ));
    }

    #[test]
    fn validates_bare_names() {
        assert!(validate_name("input_video").is_ok());
        assert!(validate_name("_x0").is_ok());
        assert!(validate_name("Input").is_err());
        assert!(validate_name("").is_err());
    }

    #[test]
    fn validates_tags() {
        assert!(validate_tag("VIDEO").is_ok());
        assert!(validate_tag("_TAG2").is_ok());
        assert!(validate_tag("video").is_err());
    }
}
