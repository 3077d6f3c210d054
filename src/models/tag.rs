//! Tag model
//!
//! Posts carry tags in one of two shapes: a list of strings, or a single
//! comma-delimited string. [`TagField`] accepts either shape and converts
//! once into the normalized [`TagSet`] that the rest of the crate works with.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw tag input as it appears in stored or submitted documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagField {
    List(Vec<String>),
    Delimited(String),
}

impl Default for TagField {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

/// Normalized tags of a single post.
///
/// Every token is trimmed and non-empty, and each appears at most once.
/// First-seen order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TagField", into = "Vec<String>")]
pub struct TagSet(Vec<String>);

impl TagSet {
    /// Normalize any sequence of raw tokens
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tags: Vec<String> = Vec::new();
        for token in tokens {
            let token = token.as_ref().trim();
            if token.is_empty() || tags.iter().any(|t| t == token) {
                continue;
            }
            tags.push(token.to_string());
        }
        Self(tags)
    }

    /// Parse a comma-delimited string such as `"rust, web"`
    pub fn parse_delimited(raw: &str) -> Self {
        Self::from_tokens(raw.split(','))
    }

    /// Decode the storage column: a JSON array, or a legacy delimited string
    pub fn from_storage(raw: &str) -> Self {
        match serde_json::from_str::<TagField>(raw) {
            Ok(field) => field.into(),
            Err(_) => Self::parse_delimited(raw),
        }
    }

    /// Encode for the storage column
    pub fn to_storage(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl From<TagField> for TagSet {
    fn from(field: TagField) -> Self {
        match field {
            TagField::List(items) => Self::from_tokens(items),
            TagField::Delimited(raw) => Self::parse_delimited(&raw),
        }
    }
}

impl From<TagSet> for Vec<String> {
    fn from(set: TagSet) -> Self {
        set.0
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(", "))
    }
}

/// Frequency of a tag across the post set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagStat {
    pub tag: String,
    pub count: u64,
}

impl TagStat {
    pub fn new(tag: impl Into<String>, count: u64) -> Self {
        Self {
            tag: tag.into(),
            count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delimited_and_list_normalize_alike() {
        let from_string: TagSet = TagField::Delimited("a, b ,c".to_string()).into();
        let from_list: TagSet =
            TagField::List(vec!["a".into(), " b".into(), "c ".into()]).into();

        assert_eq!(from_string, from_list);
        assert_eq!(Vec::from(from_string), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_empty_tokens_and_duplicates_dropped() {
        let tags = TagSet::parse_delimited("rust,, ,rust, web,");
        assert_eq!(Vec::from(tags), vec!["rust", "web"]);
    }

    #[test]
    fn test_display_joins_with_comma_space() {
        let tags = TagSet::parse_delimited("x, y");
        assert_eq!(tags.iter().collect::<Vec<_>>(), vec!["x", "y"]);
        assert_eq!(tags.to_string(), "x, y");
    }

    #[test]
    fn test_deserialize_accepts_both_shapes() {
        let a: TagSet = serde_json::from_str(r#""news, tech""#).unwrap();
        let b: TagSet = serde_json::from_str(r#"["news", "tech", "news"]"#).unwrap();
        assert_eq!(a, b);

        let out = serde_json::to_string(&a).unwrap();
        assert_eq!(out, r#"["news","tech"]"#);
    }

    #[test]
    fn test_storage_reads_json_and_legacy_strings() {
        let tags = TagSet::parse_delimited("x, y");
        assert_eq!(TagSet::from_storage(&tags.to_storage()), tags);
        assert_eq!(TagSet::from_storage("x,y"), tags);
        assert_eq!(TagSet::from_storage(""), TagSet::default());
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn token() -> impl Strategy<Value = String> {
        "[a-z]{1,8}"
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// Joining tokens with commas and parsing back yields the list form.
        #[test]
        fn delimited_matches_list(tokens in proptest::collection::vec(token(), 0..10)) {
            let joined = tokens.join(" , ");
            let from_string = TagSet::parse_delimited(&joined);
            let from_list = TagSet::from_tokens(&tokens);
            prop_assert_eq!(from_string, from_list);
        }

        /// Normalized tags are trimmed, non-empty and unique.
        #[test]
        fn normalized_tokens_are_clean(raw in "[a-z ,]{0,40}") {
            let tags = TagSet::parse_delimited(&raw);
            let items: Vec<&str> = tags.iter().collect();
            for (i, tag) in items.iter().enumerate() {
                prop_assert!(!tag.is_empty());
                prop_assert_eq!(tag.trim(), *tag);
                prop_assert!(!items[..i].contains(tag));
            }
        }
    }
}
