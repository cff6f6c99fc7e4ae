//! Query options for listing contacts.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};

/// Sort direction for [`ListOption::Sort`]. Entries are ordered by last-modified time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ascending => "ascending",
            Self::Descending => "descending",
        }
    }
}

/// One listing option. Each option sets one or more query parameters.
///
/// By default the entries of a feed are not ordered.
#[derive(Debug, Clone, PartialEq)]
pub enum ListOption {
    /// Override the service's default page size.
    MaxResults(u32),
    /// 1-based index of the first result.
    ///
    /// This is not a cursor. Fetching `start-index=1&max-results=10` and then
    /// `start-index=11&max-results=10` is not guaranteed to equal
    /// `start-index=1&max-results=20`: contacts created or deleted between
    /// the two requests shift the window, so results can be skipped or repeated.
    StartIndex(u32),
    /// Only entries updated at or after this instant.
    UpdatedMin(DateTime<Utc>),
    /// Only entries updated before this instant.
    UpdatedMax(DateTime<Utc>),
    /// Include tombstones of deleted contacts. Useful together with `UpdatedMin`.
    ShowDeleted(bool),
    /// Order by last-modified time.
    Sort(SortOrder),
    /// Entries whose author name or email matches.
    Author(String),
    /// Category filter in the service's raw syntax: `a|b` is OR, `a,b` is AND.
    Category(String),
    /// Full-text query terms, combined with AND.
    ///
    /// A term starting with `-` excludes matches; a term containing
    /// whitespace is searched as an exact phrase.
    TextQuery(Vec<String>),
}

impl ListOption {
    /// Write this option into `params`, replacing earlier values for the same keys.
    pub fn apply(&self, params: &mut QueryParams) {
        match self {
            Self::MaxResults(n) => params.set("max-results", n.to_string()),
            Self::StartIndex(n) => params.set("start-index", n.to_string()),
            Self::UpdatedMin(t) => params.set("updated-min", rfc3339(t)),
            Self::UpdatedMax(t) => params.set("updated-max", rfc3339(t)),
            Self::ShowDeleted(b) => params.set("showdeleted", b.to_string()),
            Self::Sort(order) => {
                params.set("orderby", "lastmodified");
                params.set("sortorder", order.as_str());
            }
            Self::Author(author) => params.set("author", author.clone()),
            Self::Category(filter) => params.set("category", filter.clone()),
            Self::TextQuery(terms) => params.set("q", text_query(terms)),
        }
    }
}

/// Query parameters of a list request, kept sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    values: BTreeMap<String, String>,
}

impl QueryParams {
    /// Build parameters from options. `strict=true` is added whenever any
    /// option is given, so the service rejects parameters it does not know.
    pub fn from_options(options: &[ListOption]) -> Self {
        let mut params = Self::default();
        if options.is_empty() {
            return params;
        }
        params.set("strict", "true");
        for option in options {
            option.apply(&mut params);
        }
        params
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn rfc3339(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn text_query(terms: &[String]) -> String {
    terms
        .iter()
        .map(|term| term.trim())
        .filter(|term| !term.is_empty())
        .map(|term| match term.strip_prefix('-') {
            Some(excluded) => format!("-\"{}\"", excluded),
            None if term.contains(char::is_whitespace) => format!("\"{}\"", term),
            None => term.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
