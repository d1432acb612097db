use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

/// Lookups over an ordered tag list. Names are not unique, the first occurrence wins.
pub trait TagsExt {
    fn get_tag(&self, name: &str) -> Option<&str>;

    fn has_tag(&self, name: &str, value: &str) -> bool;
}

impl TagsExt for [Tag] {
    fn get_tag(&self, name: &str) -> Option<&str> {
        self.iter().find(|tag| tag.name == name).map(|tag| tag.value.as_str())
    }

    fn has_tag(&self, name: &str, value: &str) -> bool {
        self.iter().any(|tag| tag.name == name && tag.value == value)
    }
}

impl TagsExt for Vec<Tag> {
    fn get_tag(&self, name: &str) -> Option<&str> {
        self.as_slice().get_tag(name)
    }

    fn has_tag(&self, name: &str, value: &str) -> bool {
        self.as_slice().has_tag(name, value)
    }
}

/// How the indexer matches the `values` of a tag filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TagMatch {
    #[default]
    Exact,
    FuzzyOr,
    FuzzyAnd,
    Wildcard,
}

impl TagMatch {
    /// The bare enum keyword used in query documents.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Exact => "EXACT",
            Self::FuzzyOr => "FUZZY_OR",
            Self::FuzzyAnd => "FUZZY_AND",
            Self::Wildcard => "WILDCARD",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFilter {
    pub name: String,
    pub values: Vec<String>,
    #[serde(rename = "match", default)]
    pub match_: TagMatch,
}

impl TagFilter {
    pub fn exact(name: impl Into<String>, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { name: name.into(), values: values.into_iter().map(Into::into).collect(), match_: TagMatch::Exact }
    }

    pub fn with_match(mut self, match_: TagMatch) -> Self {
        self.match_ = match_;
        self
    }
}
