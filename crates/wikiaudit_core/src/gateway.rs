//! Abstract access to the Wikimedia knowledge base.
//!
//! The engine only ever talks to this trait. `Ok(None)` always means the
//! knowledge base confirmed the thing is absent; a transport or rate-limit
//! problem is `Err(GatewayError::Unavailable)` and must reach the caller
//! instead of being read as "no problem found".

use thiserror::Error;

use crate::geo::Coordinates;
use crate::refs::EntityId;

pub mod http;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("knowledge base temporarily unavailable: {0}")]
    Unavailable(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// A resolved wikidata item. `id` is the canonical id: when the requested
/// id was a redirect, this differs from what was asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub id: EntityId,
}

/// A resolved wikipedia page. `title` is the canonical title after the
/// wiki followed any redirects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: String,
}

/// One statement of a wikidata property, reduced to what the audit needs:
/// an item value and/or a coordinate value, an optional coordinate
/// qualifier (P625), and whether the statement is qualified with an
/// end-time (P582) and therefore describes the past.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Claim {
    pub item: Option<EntityId>,
    pub coordinate: Option<Coordinates>,
    pub coordinate_qualifier: Option<Coordinates>,
    pub no_longer_valid: bool,
}

pub trait KnowledgeGateway {
    /// Look up an item by id, following redirects.
    fn entity(&self, id: &EntityId) -> GatewayResult<Option<Entity>>;

    /// Look up a page by language and title, following redirects.
    fn article(&self, language: &str, title: &str) -> GatewayResult<Option<Article>>;

    /// Sitelink of the given item in the given language edition.
    fn article_in_language(&self, id: &EntityId, language: &str) -> GatewayResult<Option<String>>;

    /// Item connected to the given page, if any.
    fn entity_id_for_article(&self, language: &str, title: &str)
    -> GatewayResult<Option<EntityId>>;

    /// Statements for one property of one item. `Ok(None)` when the item
    /// has no such property (or no such item exists).
    fn claims(&self, id: &EntityId, property: &str) -> GatewayResult<Option<Vec<Claim>>>;

    /// Transitive instance-of/subclass-of closure of the item. The
    /// traversal is breadth-first with neighbors visited in ascending id
    /// order, so which exclusion rule wins first is deterministic.
    fn ancestor_type_ids(&self, id: &EntityId) -> GatewayResult<Vec<EntityId>>;

    /// Coordinate claim (P625) of the item.
    fn location(&self, id: &EntityId) -> GatewayResult<Option<Coordinates>>;

    /// Label of the item in the given language.
    fn label(&self, id: &EntityId, language: &str) -> GatewayResult<Option<String>>;

    /// Main-namespace links on the given page. Used to enumerate the
    /// targets of a disambiguation page.
    fn article_links(&self, language: &str, title: &str) -> GatewayResult<Vec<String>>;

    /// Equivalent of the given page in another language edition, resolved
    /// through the connected item. With `target_language == language` this
    /// doubles as a cheap existence proof for the page itself.
    fn interwiki(
        &self,
        language: &str,
        title: &str,
        target_language: &str,
    ) -> GatewayResult<Option<String>> {
        match self.entity_id_for_article(language, title)? {
            Some(id) => self.article_in_language(&id, target_language),
            None => Ok(None),
        }
    }
}
