//! Container selection for listeners.
//!
//! A [`Source`] carries at most one predicate. Matching is a pure function
//! of the source and a container's id and name, so the subscription path
//! (checking already attached containers) and the attach path (checking
//! registered listeners against a new container) always agree.

use std::fmt;

use regex::Regex;

use crate::error::{LogsError, Result};
use crate::types::short_id;

/// Name filter: a plain substring, or a glob when it contains `*` or `?`.
#[derive(Debug, Clone)]
pub struct NameFilter {
    pattern: String,
    glob: Option<Regex>,
}

impl NameFilter {
    /// Creates a filter from a substring or glob pattern.
    #[must_use]
    pub fn new(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        let glob = if pattern.contains(['*', '?']) {
            let translated = regex::escape(&pattern)
                .replace(r"\*", ".*")
                .replace(r"\?", ".");
            Regex::new(&format!("^{translated}$")).ok()
        } else {
            None
        };
        Self { pattern, glob }
    }

    /// The pattern as given.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns true if `name` matches the filter.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        match &self.glob {
            Some(glob) => glob.is_match(name),
            None => name.contains(&self.pattern),
        }
    }
}

impl PartialEq for NameFilter {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for NameFilter {}

/// Selector describing which containers a listener wants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Source {
    /// Every container, including ones started later.
    #[default]
    All,
    /// A container by exact short id.
    Id(String),
    /// A container by exact name.
    Name(String),
    /// Containers whose name matches a filter.
    Filter(NameFilter),
}

impl Source {
    /// Selects a container by id. The id is normalized to its short form
    /// and must equal the container's short id; an empty id selects
    /// everything.
    #[must_use]
    pub fn id(id: &str) -> Self {
        let id = id.trim();
        if id.is_empty() {
            Self::All
        } else {
            Self::Id(short_id(id).to_string())
        }
    }

    /// Selects a container by exact name. An empty name selects everything.
    #[must_use]
    pub fn name(name: &str) -> Self {
        let name = name.trim_start_matches('/');
        if name.is_empty() {
            Self::All
        } else {
            Self::Name(name.to_string())
        }
    }

    /// Selects containers by name filter. An empty filter selects everything.
    #[must_use]
    pub fn filter(pattern: &str) -> Self {
        if pattern.is_empty() {
            Self::All
        } else {
            Self::Filter(NameFilter::new(pattern))
        }
    }

    /// Builds a source from a `<predicate>:<value>` pair as used in URLs.
    pub fn from_predicate(predicate: &str, value: &str) -> Result<Self> {
        match predicate {
            "id" => Ok(Self::id(value)),
            "name" => Ok(Self::name(value)),
            "filter" => Ok(Self::filter(value)),
            other => Err(LogsError::InvalidPredicate(other.to_string())),
        }
    }

    /// Decides whether a container with `id` and `name` is selected.
    #[must_use]
    pub fn matches(&self, id: &str, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Id(wanted) => short_id(id) == wanted,
            Self::Name(wanted) => name == wanted,
            Self::Filter(filter) => filter.matches(name),
        }
    }

    /// Returns true for the unrestricted selector.
    #[must_use]
    pub const fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Returns true if the selector can cover more than one container.
    #[must_use]
    pub const fn is_multi(&self) -> bool {
        matches!(self, Self::All | Self::Filter(_))
    }

    /// Returns true if the selector names a single container, so the
    /// subscription ends together with that container.
    #[must_use]
    pub const fn is_single(&self) -> bool {
        matches!(self, Self::Id(_) | Self::Name(_))
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Id(id) => write!(f, "id:{id}"),
            Self::Name(name) => write!(f, "name:{name}"),
            Self::Filter(filter) => write!(f, "filter:{}", filter.pattern()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    const WEB_ID: &str = "4f9d8a7c6b5e4d3c2b1a0f9e8d7c6b5a";

    #[test_case("web-1", true ; "first web")]
    #[test_case("web-2", true ; "second web")]
    #[test_case("db-1", false ; "database")]
    fn filter_matches_substring(name: &str, expected: bool) {
        let source = Source::filter("web");
        assert_eq!(source.matches(WEB_ID, name), expected);
    }

    #[test_case("web-*", "web-1", true ; "star suffix")]
    #[test_case("web-*", "my-web-1", false ; "glob is anchored")]
    #[test_case("db-?", "db-1", true ; "single char")]
    #[test_case("db-?", "db-10", false ; "single char only")]
    #[test_case("a.b*", "axb", false ; "dot is literal")]
    fn filter_matches_glob(pattern: &str, name: &str, expected: bool) {
        assert_eq!(Source::filter(pattern).matches(WEB_ID, name), expected);
    }

    #[test]
    fn id_is_normalized_to_short_form() {
        let source = Source::id(WEB_ID);
        assert_eq!(source, Source::Id("4f9d8a7c6b5e".to_string()));
        assert!(source.matches(WEB_ID, "anything"));
        assert!(!source.matches("ffffffffffffffff", "anything"));
    }

    #[test]
    fn id_must_be_whole_short_id() {
        assert!(!Source::id("4f9d8a").matches(WEB_ID, "web"));
        assert!(!Source::id("4f9d8a").matches("4f9d8a", "web"));
        assert!(Source::id("4f9d8a7c6b5e").matches("4f9d8a7c6b5e", "web"));
        assert!(!Source::id("4f9d8a7c6b5e").matches("4f9d00000000", "web"));
    }

    #[test]
    fn name_is_exact() {
        let source = Source::name("/web-1");
        assert!(source.matches(WEB_ID, "web-1"));
        assert!(!source.matches(WEB_ID, "web-10"));
        assert!(!source.matches(WEB_ID, "web"));
    }

    #[test]
    fn empty_values_select_everything() {
        assert!(Source::id("").is_all());
        assert!(Source::name("").is_all());
        assert!(Source::filter("").is_all());
    }

    #[test]
    fn from_predicate() {
        assert_eq!(
            Source::from_predicate("name", "db").unwrap(),
            Source::Name("db".to_string())
        );
        assert!(matches!(
            Source::from_predicate("filter", "web").unwrap(),
            Source::Filter(_)
        ));
        assert!(Source::from_predicate("label", "x").is_err());
    }

    #[test]
    fn multi_and_single() {
        assert!(Source::All.is_multi());
        assert!(Source::filter("web").is_multi());
        assert!(Source::id("abc").is_single());
        assert!(Source::name("db").is_single());
        assert!(!Source::All.is_single());
    }

    #[test]
    fn display() {
        assert_eq!(Source::All.to_string(), "all");
        assert_eq!(Source::id("abc").to_string(), "id:abc");
        assert_eq!(Source::filter("web").to_string(), "filter:web");
    }

    proptest! {
        #[test]
        fn all_matches_everything(id in "[0-9a-f]{0,64}", name in ".*") {
            prop_assert!(Source::All.matches(&id, &name));
        }

        #[test]
        fn name_matches_itself(name in "[a-z0-9_.-]{1,32}") {
            prop_assert!(Source::name(&name).matches("abc", &name));
            prop_assert!(Source::filter(&name).matches("abc", &name));
        }

        #[test]
        fn full_id_matches_itself(id in "[0-9a-f]{12,64}") {
            prop_assert!(Source::id(&id).matches(&id, "x"));
        }
    }
}
