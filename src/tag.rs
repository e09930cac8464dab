//! Tag module.
//!
//! Provides the `Tag` type, a string or integer label attached to packs
//! and pipeline nodes. Names use `Arc<str>` so cloning a tag never copies
//! the underlying text.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::sync::Arc;

/// A label used to filter which packs a node operates on.
///
/// Tags are either names (`"fire"`, `"stun"`) or integers. A name and an
/// integer never compare equal, so `Tag::from("1") != Tag::from(1)`.
///
/// # Examples
///
/// ```rust
/// use damage_pipeline::Tag;
///
/// let fire: Tag = "fire".into();
/// let slot: Tag = 3.into();
///
/// assert_eq!(fire, Tag::name("fire"));
/// assert_eq!(slot, Tag::Number(3));
/// assert_ne!(Tag::from("3"), slot);
/// ```
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tag {
    /// A textual tag.
    Name(Arc<str>),
    /// An integer tag.
    Number(i64),
}

impl Tag {
    /// Create a name tag from a string slice.
    pub fn name(s: &str) -> Self {
        Tag::Name(Arc::from(s))
    }

    /// Get the textual form if this is a name tag.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Tag::Name(name) => Some(&**name),
            Tag::Number(_) => None,
        }
    }

    /// Interpret an untyped JSON value as a tag.
    ///
    /// Strings and integral numbers become tags. Everything else
    /// (booleans, floats with a fraction, objects, null) is not a tag.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use damage_pipeline::Tag;
    /// use serde_json::json;
    ///
    /// assert_eq!(Tag::from_json(&json!("ice")), Some(Tag::name("ice")));
    /// assert_eq!(Tag::from_json(&json!(7)), Some(Tag::Number(7)));
    /// assert_eq!(Tag::from_json(&json!(true)), None);
    /// ```
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(Tag::name(s)),
            serde_json::Value::Number(n) => n.as_i64().map(Tag::Number).or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.is_finite())
                    .map(|f| Tag::Number(f as i64))
            }),
            _ => None,
        }
    }

    /// Parse a tag scalar or list from JSON, keeping only valid tags.
    ///
    /// A lone scalar forms a one-element list. Duplicates are dropped,
    /// keeping first-insertion order.
    pub fn list_from_json(value: &serde_json::Value) -> Vec<Tag> {
        let mut tags = Vec::new();
        match value {
            serde_json::Value::Array(items) => {
                for tag in items.iter().filter_map(Tag::from_json) {
                    push_unique(&mut tags, tag);
                }
            }
            other => {
                if let Some(tag) = Tag::from_json(other) {
                    tags.push(tag);
                }
            }
        }
        tags
    }
}

/// Append a tag unless an equal one is already present.
///
/// Returns `true` if the tag was added.
pub(crate) fn push_unique(tags: &mut Vec<Tag>, tag: Tag) -> bool {
    if tags.contains(&tag) {
        false
    } else {
        tags.push(tag);
        true
    }
}

/// Whether a candidate tag list passes a filter.
///
/// An empty filter matches everything, including an untagged candidate.
pub(crate) fn matches_filter(candidate: &[Tag], filter: &[Tag]) -> bool {
    filter.is_empty() || filter.iter().any(|tag| candidate.contains(tag))
}

impl Serialize for Tag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Tag::Name(name) => name.as_ref().serialize(serializer),
            Tag::Number(n) => n.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(i64),
            Float(f64),
            Name(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(Tag::Number(n)),
            Raw::Float(f) if f.fract() == 0.0 && f.is_finite() => Ok(Tag::Number(f as i64)),
            Raw::Float(f) => Err(<D::Error as de::Error>::custom(format!(
                "tag must be a string or an integer, got {}",
                f
            ))),
            Raw::Name(s) => Ok(Tag::from(s)),
        }
    }
}

impl From<&str> for Tag {
    fn from(s: &str) -> Self {
        Tag::name(s)
    }
}

impl From<String> for Tag {
    fn from(s: String) -> Self {
        Tag::Name(Arc::from(s))
    }
}

impl From<i64> for Tag {
    fn from(n: i64) -> Self {
        Tag::Number(n)
    }
}

impl From<i32> for Tag {
    fn from(n: i32) -> Self {
        Tag::Number(i64::from(n))
    }
}

impl From<u32> for Tag {
    fn from(n: u32) -> Self {
        Tag::Number(i64::from(n))
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tag::Name(name) => write!(f, "{}", name),
            Tag::Number(n) => write!(f, "{}", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tag_equality() {
        assert_eq!(Tag::from("fire"), Tag::name("fire"));
        assert_eq!(Tag::from(2), Tag::Number(2));
        assert_ne!(Tag::from("2"), Tag::from(2));
    }

    #[test]
    fn test_list_from_json_drops_untyped_and_duplicates() {
        let tags = Tag::list_from_json(&json!(["fire", 1, "fire", true, null, {"a": 1}, 1, 2.5]));
        assert_eq!(tags, vec![Tag::name("fire"), Tag::Number(1)]);
    }

    #[test]
    fn test_list_from_json_scalar() {
        assert_eq!(Tag::list_from_json(&json!("ice")), vec![Tag::name("ice")]);
        assert!(Tag::list_from_json(&json!(false)).is_empty());
    }

    #[test]
    fn test_tag_serde_untagged() {
        let tags: Vec<Tag> = serde_json::from_str(r#"["poison", 4]"#).unwrap();
        assert_eq!(tags, vec![Tag::name("poison"), Tag::Number(4)]);
        assert_eq!(serde_json::to_string(&tags).unwrap(), r#"["poison",4]"#);
    }

    #[test]
    fn test_tag_serde_integral_float() {
        let tags: Vec<Tag> = serde_json::from_str(r#"["slot", 2.0, -3.0]"#).unwrap();
        assert_eq!(tags, vec![Tag::name("slot"), Tag::Number(2), Tag::Number(-3)]);
        assert_eq!(Tag::from_json(&json!(2.0)), Some(tags[1].clone()));

        assert!(serde_json::from_str::<Tag>("2.5").is_err());
        assert!(serde_json::from_str::<Tag>("true").is_err());
    }

    #[test]
    fn test_matches_filter_empty_is_vacuous() {
        assert!(matches_filter(&[], &[]));
        assert!(matches_filter(&[Tag::name("a")], &[]));
        assert!(!matches_filter(&[], &[Tag::name("a")]));
    }
}
