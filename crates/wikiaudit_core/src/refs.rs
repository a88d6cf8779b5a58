//! Cross-reference values carried in tags: `wikipedia=language:title` and
//! `wikidata=Q<digits>`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::languages::is_known_language_code;

/// A `language:title` pointer into a wikipedia edition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRef {
    pub language: String,
    pub title: String,
}

impl ArticleRef {
    pub fn new(language: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            title: title.into(),
        }
    }

    /// Split a raw tag value on the first colon. Returns `None` when there
    /// is no colon at all; validation of the parts is a separate step so a
    /// malformed value can still be named in a report.
    pub fn parse(raw: &str) -> Option<Self> {
        let (language, title) = raw.split_once(':')?;
        Some(Self::new(language, title))
    }

    /// Title with any `#section` fragment removed. Section links never
    /// identify an entity of their own.
    pub fn title_without_section(&self) -> &str {
        match self.title.split_once('#') {
            Some((base, _)) => base,
            None => &self.title,
        }
    }

    pub fn has_section(&self) -> bool {
        self.title.contains('#')
    }
}

impl fmt::Display for ArticleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.language, self.title)
    }
}

/// A stable wikidata item id (`Q` followed by digits).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Accepts only the canonical `Q<digits>` form.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.len() < 2 || !raw.starts_with('Q') {
            return None;
        }
        if !raw[1..].bytes().all(|byte| byte.is_ascii_digit()) {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn url(&self) -> String {
        format!("https://www.wikidata.org/wiki/{}", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Detects codes that do not name a known wikipedia edition (covers
/// corruptions like `pl|` as well as empty or mixed-case codes). Membership
/// alone decides, so long editions like `simple` stay valid.
pub fn is_language_code_clearly_broken(language_code: Option<&str>) -> bool {
    match language_code {
        Some(code) => !is_known_language_code(code),
        None => true,
    }
}

/// A title whose own leading colon segment is a known language code is a
/// known corruption pattern (`wikipedia=en:pl:Foo`).
pub fn is_article_title_clearly_broken(title: &str) -> bool {
    match title.split_once(':') {
        Some((prefix, _)) => is_known_language_code(prefix),
        None => false,
    }
}

/// Full malformed check for a raw `wikipedia` tag value.
pub fn is_wikipedia_tag_clearly_broken(raw: &str) -> bool {
    match ArticleRef::parse(raw) {
        Some(article) => {
            is_language_code_clearly_broken(Some(&article.language))
                || is_article_title_clearly_broken(&article.title)
        }
        None => true,
    }
}

/// Full malformed check for a raw `wikidata` tag value.
pub fn is_wikidata_tag_clearly_broken(raw: &str) -> bool {
    EntityId::parse(raw).is_none()
}
