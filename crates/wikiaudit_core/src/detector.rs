//! The decision pipeline. Runs an ordered sequence of checks over one
//! feature's tags and returns at most one finding - the highest-priority
//! problem, so a fixer never acts on a symptom of an earlier error.

use std::collections::BTreeSet;

use crate::config::AuditConfig;
use crate::gateway::{GatewayResult, KnowledgeGateway};
use crate::geo::{Coordinates, distance_km, distance_to_string};
use crate::languages::{CODES_BY_IMPORTANCE, is_known_language_code};
use crate::refs::{ArticleRef, EntityId, is_wikipedia_tag_clearly_broken};
use crate::report::{Finding, TagDelta, TagState, Tags, tag_state};
use crate::tables::{
    blacklist_entry, is_blacklisted_and_unfixable, is_safe_primary_type, unlinkable_type_reason,
};

const DISAMBIGUATION_TYPE: &str = "Q4167410";
const LIST_TYPE: &str = "Q13406463";
const OVERVIEW_TYPE: &str = "Q20136634";

const CATALOG_CODE_PROPERTY: &str = "P247";
const SUBCLASS_PROPERTY: &str = "P279";
const HEADQUARTERS_PROPERTY: &str = "P159";
const COUNTRY_PROPERTY: &str = "P17";
const DISSOLVED_PROPERTY: &str = "P576";

const HEADQUARTERS_RADIUS_KM: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Node,
    Way,
    Relation,
}

/// One feature's worth of audit. Borrows the gateway; owns a validated
/// config snapshot.
pub struct IssueDetector<'a> {
    config: AuditConfig,
    gateway: &'a dyn KnowledgeGateway,
}

impl<'a> IssueDetector<'a> {
    pub fn new(config: AuditConfig, gateway: &'a dyn KnowledgeGateway) -> Self {
        Self { config, gateway }
    }

    pub fn problem_for_tags(
        &self,
        tags: &Tags,
        kind: ObjectKind,
        description: &str,
    ) -> GatewayResult<Option<Finding>> {
        self.audit(tags, kind, description, None)
    }

    pub fn problem_for_located_feature(
        &self,
        tags: &Tags,
        kind: ObjectKind,
        description: &str,
        location: Coordinates,
    ) -> GatewayResult<Option<Finding>> {
        self.audit(tags, kind, description, Some(location))
    }

    fn audit(
        &self,
        tags: &Tags,
        kind: ObjectKind,
        description: &str,
        location: Option<Coordinates>,
    ) -> GatewayResult<Option<Finding>> {
        // Delete candidates get fixed by deletion, not by tag surgery.
        if is_delete_candidate(tags, kind) {
            return Ok(None);
        }

        let mut debug = Vec::new();

        if let Some(finding) = self.structural_problems(tags, description, &mut debug)? {
            return Ok(Some(self.finish(finding, debug)));
        }

        let wikipedia = valid_wikipedia_ref(tags);
        let declared_entity = self.declared_entity(tags)?;
        let effective_entity = match &declared_entity {
            Some(id) => Some(id.clone()),
            None => match &wikipedia {
                Some(article) => self
                    .gateway
                    .entity_id_for_article(&article.language, article.title_without_section())?,
                None => None,
            },
        };
        if self.config.additional_debug
            && let Some(id) = &effective_entity
        {
            debug.push(format!("effective entity: {id}"));
            let ancestors = self.gateway.ancestor_type_ids(id)?;
            if !ancestors.iter().any(is_safe_primary_type) {
                debug.push(format!("no recognized primary type for {id}"));
            }
        }

        if let Some(id) = &effective_entity
            && let Some(finding) =
                self.entity_problems(tags, description, id, wikipedia.as_ref(), location)?
        {
            return Ok(Some(self.finish(finding, debug)));
        }

        if let Some(finding) =
            self.derivation(tags, wikipedia.as_ref(), &declared_entity, &effective_entity)?
        {
            return Ok(Some(self.finish(finding, debug)));
        }

        Ok(None)
    }

    fn finish(&self, finding: Finding, debug: Vec<String>) -> Finding {
        if self.config.additional_debug && !debug.is_empty() {
            finding.with_debug_log(Some(debug.join("\n")))
        } else {
            finding
        }
    }

    /// Canonical id of the declared wikidata tag. Only meaningful after
    /// the structural stage confirmed the tag is well-formed and resolves.
    fn declared_entity(&self, tags: &Tags) -> GatewayResult<Option<EntityId>> {
        let Some(raw) = tags.get("wikidata") else {
            return Ok(None);
        };
        let Some(id) = EntityId::parse(raw) else {
            return Ok(None);
        };
        Ok(self.gateway.entity(&id)?.map(|entity| entity.id))
    }

    // ----- stage: critical structural checks -----

    fn structural_problems(
        &self,
        tags: &Tags,
        description: &str,
        debug: &mut Vec<String>,
    ) -> GatewayResult<Option<Finding>> {
        if let Some(finding) = invalid_legacy_key(tags) {
            return Ok(Some(finding));
        }
        let legacy = legacy_refs(tags);
        if !legacy.is_empty() {
            return self.migrate_legacy_keys(tags, description, &legacy);
        }

        let declared_entity = match tags.get("wikidata") {
            Some(raw) => match EntityId::parse(raw) {
                None => {
                    return Ok(Some(
                        Finding::new(
                            "malformed wikidata tag",
                            format!("malformed wikidata tag ({raw}) on {description}"),
                        )
                        .with_prerequisite("wikidata", Some(raw)),
                    ));
                }
                Some(id) => match self.gateway.entity(&id)? {
                    Some(entity) => Some((raw.clone(), entity.id)),
                    None => {
                        return Ok(Some(
                            Finding::new(
                                "wikidata tag links to missing page",
                                format!(
                                    "wikidata tag on {description} points at {}, which does not exist",
                                    id.url()
                                ),
                            )
                            .with_prerequisite("wikidata", Some(raw)),
                        ));
                    }
                },
            },
            None => None,
        };

        let wikipedia = match tags.get("wikipedia") {
            Some(raw) if is_wikipedia_tag_clearly_broken(raw) => {
                return Ok(Some(
                    Finding::new(
                        "malformed wikipedia tag",
                        format!(
                            "malformed wikipedia tag ({raw}) on {description}, expected language:title"
                        ),
                    )
                    .with_prerequisite("wikipedia", Some(raw)),
                ));
            }
            Some(raw) => {
                // not clearly broken, so the colon split cannot fail
                let Some(article) = ArticleRef::parse(raw) else {
                    return Ok(None);
                };
                if let Some(finding) = self.missing_article_problem(
                    tags,
                    description,
                    raw,
                    &article,
                    declared_entity.as_ref().map(|(_, id)| id),
                    debug,
                )? {
                    return Ok(Some(finding));
                }
                Some((raw.clone(), article))
            }
            None => None,
        };

        if let (Some((wikidata_raw, declared)), Some((wikipedia_raw, article))) =
            (&declared_entity, &wikipedia)
        {
            return self.collision_problem(
                description,
                wikidata_raw,
                declared,
                wikipedia_raw,
                article,
            );
        }

        Ok(None)
    }

    fn missing_article_problem(
        &self,
        tags: &Tags,
        description: &str,
        raw: &str,
        article: &ArticleRef,
        declared_entity: Option<&EntityId>,
        debug: &mut Vec<String>,
    ) -> GatewayResult<Option<Finding>> {
        let title = article.title_without_section();
        // A matching sitelink already proves the page exists.
        if let Some(entity) = declared_entity
            && self
                .gateway
                .article_in_language(entity, &article.language)?
                .as_deref()
                == Some(title)
        {
            if self.config.additional_debug {
                debug.push(format!("existence of {article} proven by sitelink"));
            }
            return Ok(None);
        }
        if self.gateway.article(&article.language, title)?.is_some() {
            return Ok(None);
        }

        let replacement = match declared_entity {
            Some(entity) => self.best_article_for_entity(entity)?,
            None => None,
        };
        let mut finding = Finding::new(
            "wikipedia tag links to missing page",
            format!("wikipedia tag on {description} points at {article}, which does not exist"),
        )
        .with_prerequisite("wikipedia", Some(raw))
        .with_prerequisite("wikidata", tags.get("wikidata").map(String::as_str))
        .with_desired_target(replacement.as_ref().map(ToString::to_string));
        if let Some(target) = &replacement {
            finding = finding.with_proposed_change(TagDelta {
                from: tag_state("wikipedia", Some(raw)),
                to: tag_state("wikipedia", Some(&target.to_string())),
            });
        }
        Ok(Some(finding))
    }

    /// Both refs present but pointing at different items. Repairable when
    /// one side merely lags behind a redirect; the entity side is checked
    /// first because a stale id is the more common and safer fix.
    fn collision_problem(
        &self,
        description: &str,
        wikidata_raw: &str,
        declared: &EntityId,
        wikipedia_raw: &str,
        article: &ArticleRef,
    ) -> GatewayResult<Option<Finding>> {
        let title = article.title_without_section();
        let from_article = self
            .gateway
            .entity_id_for_article(&article.language, title)?;
        // Entity-side redirect: the tagged id may be stale even when its
        // canonical form agrees with the article's item.
        if from_article.as_ref() == Some(declared) {
            if wikidata_raw == declared.as_str() {
                return Ok(None);
            }
            let tagged = wikidata_raw;
            return Ok(Some(
                Finding::new(
                    "wikipedia wikidata mismatch - follow wikidata redirect",
                    format!(
                        "wikidata tag on {description} holds {tagged}, a redirect to {declared}; \
                         the wikipedia tag already agrees with {declared}"
                    ),
                )
                .with_prerequisite("wikidata", Some(wikidata_raw))
                .with_prerequisite("wikipedia", Some(wikipedia_raw))
                .with_proposed_change(TagDelta {
                    from: tag_state("wikidata", Some(wikidata_raw)),
                    to: tag_state("wikidata", Some(declared.as_str())),
                }),
            ));
        }

        // Article-side redirect: the tagged title redirects to a page whose
        // item is the declared one.
        if let Some(resolved) = self.gateway.article(&article.language, title)?
            && resolved.title != title
            && self
                .gateway
                .entity_id_for_article(&article.language, &resolved.title)?
                .as_ref()
                == Some(declared)
        {
            let target = ArticleRef::new(article.language.clone(), resolved.title);
            return Ok(Some(
                Finding::new(
                    "wikipedia wikidata mismatch - follow wikipedia redirect",
                    format!(
                        "wikipedia tag on {description} holds {article}, a redirect to {target}; \
                         the redirect target agrees with wikidata {declared}"
                    ),
                )
                .with_prerequisite("wikidata", Some(wikidata_raw))
                .with_prerequisite("wikipedia", Some(wikipedia_raw))
                .with_desired_target(Some(target.to_string()))
                .with_proposed_change(TagDelta {
                    from: tag_state("wikipedia", Some(wikipedia_raw)),
                    to: tag_state("wikipedia", Some(&target.to_string())),
                }),
            ));
        }

        // An article linked to no item at all cannot agree with any declared
        // id, so that case lands here too.
        let linked = match &from_article {
            Some(id) => id.as_str().to_string(),
            None => "(missing)".to_string(),
        };
        Ok(Some(
            Finding::new(
                "wikipedia wikidata mismatch",
                format!(
                    "{description} carries wikidata {declared} but its wikipedia tag {article} \
                     belongs to {linked}; which one is right needs human judgment"
                ),
            )
            .with_prerequisite("wikidata", Some(wikidata_raw))
            .with_prerequisite("wikipedia", Some(wikipedia_raw)),
        ))
    }

    // ----- stage: legacy wikipedia:<lang> keys -----

    fn migrate_legacy_keys(
        &self,
        tags: &Tags,
        description: &str,
        legacy: &[(String, ArticleRef)],
    ) -> GatewayResult<Option<Finding>> {
        let mut candidate_ids: Vec<Option<EntityId>> = Vec::new();
        for (_, article) in legacy {
            candidate_ids.push(
                self.gateway
                    .entity_id_for_article(&article.language, article.title_without_section())?,
            );
        }
        let declared_wikipedia = valid_wikipedia_ref(tags);
        if let Some(article) = &declared_wikipedia {
            candidate_ids.push(
                self.gateway
                    .entity_id_for_article(&article.language, article.title_without_section())?,
            );
        }
        if let Some(raw) = tags.get("wikidata") {
            candidate_ids.push(EntityId::parse(raw));
        }

        let distinct: BTreeSet<_> = candidate_ids.iter().flatten().cloned().collect();
        let unified = match distinct.len() {
            1 if candidate_ids.iter().all(Option::is_some) => distinct.into_iter().next(),
            _ => None,
        };
        let Some(unified) = unified else {
            let listed = legacy
                .iter()
                .map(|(key, article)| format!("{key}={article}"))
                .collect::<Vec<_>>()
                .join(", ");
            return Ok(Some(Finding::new(
                "wikipedia tag in outdated form and there is mismatch between links",
                format!(
                    "old-style wikipedia tags on {description} ({listed}) do not all point at \
                     the same item; unifying them needs human judgment"
                ),
            )));
        };

        let target = match self.best_article_for_entity(&unified)? {
            Some(article) => article,
            None => legacy[0].1.clone(),
        };

        let mut from = TagState::new();
        for (key, _) in legacy {
            from.insert(key.clone(), tags.get(key).cloned());
        }

        if let Some(article) = &declared_wikipedia {
            let mut from = from;
            from.insert("wikipedia".to_string(), Some(article.to_string()));
            return Ok(Some(
                Finding::new(
                    "wikipedia tag in an outdated form for removal",
                    format!(
                        "{description} carries a wikipedia tag plus agreeing old-style \
                         wikipedia:<language> tags; the old-style tags can be dropped"
                    ),
                )
                .with_proposed_change(TagDelta {
                    from,
                    to: tag_state("wikipedia", Some(&article.to_string())),
                }),
            ));
        }

        from.insert("wikipedia".to_string(), None);
        let mut to = tag_state("wikipedia", Some(&target.to_string()));
        if tags.get("wikidata").is_none() {
            from.insert("wikidata".to_string(), None);
            to.insert("wikidata".to_string(), Some(unified.as_str().to_string()));
        }
        Ok(Some(
            Finding::new(
                "wikipedia tag from wikipedia tag in an outdated form",
                format!(
                    "{description} uses only old-style wikipedia:<language> tags; they agree \
                     on {unified}, so plain wikipedia and wikidata tags can replace them"
                ),
            )
            .with_desired_target(Some(target.to_string()))
            .with_proposed_change(TagDelta { from, to }),
        ))
    }

    // ----- stage: entity admissibility and lifetime -----

    fn entity_problems(
        &self,
        tags: &Tags,
        description: &str,
        entity: &EntityId,
        wikipedia: Option<&ArticleRef>,
        location: Option<Coordinates>,
    ) -> GatewayResult<Option<Finding>> {
        if let Some(finding) = self.blacklist_problem(tags, description, entity) {
            return Ok(Some(finding));
        }

        if !is_blacklisted_and_unfixable(entity) {
            if let Some(finding) =
                self.type_problem(tags, description, entity, wikipedia, location)?
            {
                return Ok(Some(finding));
            }
        }

        if let Some(finding) = self.headquarters_problem(description, entity, location)? {
            return Ok(Some(finding));
        }

        if let Some(article) = wikipedia
            && let Some(finding) =
                self.language_problem(tags, description, entity, article)?
        {
            return Ok(Some(finding));
        }

        if let Some(claims) = self.gateway.claims(entity, DISSOLVED_PROPERTY)?
            && !claims.is_empty()
        {
            let label_language = self
                .config
                .expected_language_code
                .as_deref()
                .unwrap_or("en");
            let subject = match self.gateway.label(entity, label_language)? {
                Some(label) => format!("{label} ({entity})"),
                None => entity.to_string(),
            };
            return Ok(Some(
                Finding::new(
                    "no longer existing object",
                    format!(
                        "wikidata says {subject} linked from {description} was dissolved or \
                         abolished; a no-longer-existing object should not be mapped. \
                         REMEMBER TO VERIFY! WIKIDATA QUALITY MAY BE POOR!"
                    ),
                )
                .with_prerequisite("wikidata", tags.get("wikidata").map(String::as_str))
                .with_prerequisite("wikipedia", tags.get("wikipedia").map(String::as_str)),
            ));
        }

        Ok(None)
    }

    fn blacklist_problem(
        &self,
        tags: &Tags,
        description: &str,
        entity: &EntityId,
    ) -> Option<Finding> {
        let entry = blacklist_entry(entity)?;
        let prefix = entry.prefix;
        let name = entry.name.unwrap_or("this concept");

        let mut from = TagState::new();
        let mut to = TagState::new();
        if let Some(raw) = tags.get("wikipedia") {
            from.insert("wikipedia".to_string(), Some(raw.clone()));
            to.insert(format!("{prefix}wikipedia"), Some(raw.clone()));
        }
        from.insert("wikidata".to_string(), tags.get("wikidata").cloned());
        to.insert(format!("{prefix}wikidata"), Some(entity.as_str().to_string()));
        for (key, value) in entry.expected_tags {
            to.insert((*key).to_string(), Some((*value).to_string()));
        }

        Some(
            Finding::new(
                "blacklisted connection with known replacement",
                format!(
                    "{description} links {name} ({entity}) as its primary reference; the link \
                     belongs under {prefix}wikidata instead"
                ),
            )
            .with_extra_data(prefix)
            .with_proposed_change(TagDelta { from, to }),
        )
    }

    fn type_problem(
        &self,
        tags: &Tags,
        description: &str,
        entity: &EntityId,
        wikipedia: Option<&ArticleRef>,
        location: Option<Coordinates>,
    ) -> GatewayResult<Option<Finding>> {
        for type_id in self.gateway.ancestor_type_ids(entity)? {
            match type_id.as_str() {
                DISAMBIGUATION_TYPE => {
                    return Ok(Some(self.disambiguation_finding(
                        tags,
                        description,
                        entity,
                        wikipedia,
                        location,
                    )?));
                }
                LIST_TYPE | OVERVIEW_TYPE => {
                    let what = if type_id.as_str() == LIST_TYPE {
                        "a list article"
                    } else {
                        "an overview article"
                    };
                    return Ok(Some(self.unlinkable_article_finding(
                        tags,
                        description,
                        entity,
                        what,
                    )));
                }
                _ => {}
            }
            if let Some(exclusion) = unlinkable_type_reason(&type_id) {
                return Ok(Some(self.secondary_tag_finding(
                    tags,
                    description,
                    entity,
                    exclusion.reason,
                    exclusion.suggested_prefix,
                )));
            }
        }

        if let Some(claims) = self.gateway.claims(entity, CATALOG_CODE_PROPERTY)?
            && !claims.is_empty()
        {
            return Ok(Some(self.secondary_tag_finding(
                tags,
                description,
                entity,
                "a spacecraft",
                Some("name:"),
            )));
        }
        if let Some(claims) = self.gateway.claims(entity, SUBCLASS_PROPERTY)?
            && !claims.is_empty()
        {
            return Ok(Some(self.secondary_tag_finding(
                tags,
                description,
                entity,
                "an uncoordinable generic object",
                Some("name:"),
            )));
        }

        Ok(None)
    }

    fn secondary_tag_finding(
        &self,
        tags: &Tags,
        description: &str,
        entity: &EntityId,
        reason: &str,
        suggested_prefix: Option<&str>,
    ) -> Finding {
        let hint = match suggested_prefix {
            Some(prefix) => format!("; consider {prefix}wikipedia / {prefix}wikidata"),
            None => String::new(),
        };
        let mut finding = Finding::new(
            "should use a secondary wikipedia tag",
            format!(
                "{description} links {} which is {reason}, not this mapped object{hint}",
                entity.url()
            ),
        )
        .with_prerequisite("wikidata", tags.get("wikidata").map(String::as_str))
        .with_prerequisite("wikipedia", tags.get("wikipedia").map(String::as_str));
        if let Some(prefix) = suggested_prefix {
            finding = finding.with_extra_data(prefix);
        }
        finding
    }

    fn unlinkable_article_finding(
        &self,
        tags: &Tags,
        description: &str,
        entity: &EntityId,
        what: &str,
    ) -> Finding {
        Finding::new(
            "link to an unlinkable article",
            format!(
                "{description} links {} which is {what}; a specific article should be \
                 linked instead",
                entity.url()
            ),
        )
        .with_prerequisite("wikidata", tags.get("wikidata").map(String::as_str))
        .with_prerequisite("wikipedia", tags.get("wikipedia").map(String::as_str))
    }

    /// Disambiguation pages get the extra service of listing their link
    /// targets with distances, as picking the nearest one is usually the
    /// whole fix.
    fn disambiguation_finding(
        &self,
        tags: &Tags,
        description: &str,
        entity: &EntityId,
        wikipedia: Option<&ArticleRef>,
        location: Option<Coordinates>,
    ) -> GatewayResult<Finding> {
        let article = match wikipedia {
            Some(article) => Some(article.clone()),
            None => self.best_article_for_entity(entity)?,
        };

        let mut candidates = Vec::new();
        if let (Some(article), Some(here)) = (&article, location) {
            for target in self
                .gateway
                .article_links(&article.language, article.title_without_section())?
            {
                let Some(target_entity) = self
                    .gateway
                    .entity_id_for_article(&article.language, &target)?
                else {
                    continue;
                };
                if let Some(there) = self.gateway.location(&target_entity)? {
                    candidates.push(format!(
                        "{target} - {}",
                        distance_to_string(distance_km(here, there))
                    ));
                }
            }
        }

        let mut message = format!(
            "{description} links {} which is a disambiguation page; a specific article \
             should be linked instead",
            entity.url()
        );
        if !candidates.is_empty() {
            message.push_str(&format!("; nearby candidates: {}", candidates.join(", ")));
        }

        Ok(Finding::new("link to an unlinkable article", message)
            .with_prerequisite("wikidata", tags.get("wikidata").map(String::as_str))
            .with_prerequisite("wikipedia", tags.get("wikipedia").map(String::as_str)))
    }

    /// A company item is only linkable from the place it is actually at.
    /// Fires only when the feature is far from every declared
    /// headquarters; a single nearby one means the link is plausible.
    fn headquarters_problem(
        &self,
        description: &str,
        entity: &EntityId,
        location: Option<Coordinates>,
    ) -> GatewayResult<Option<Finding>> {
        let Some(here) = location else {
            return Ok(None);
        };
        let Some(claims) = self.gateway.claims(entity, HEADQUARTERS_PROPERTY)? else {
            return Ok(None);
        };

        let mut distances = Vec::new();
        for claim in &claims {
            let hq = match claim.coordinate_qualifier {
                Some(coordinate) => Some(coordinate),
                None => match &claim.item {
                    Some(item) => self.gateway.location(item)?,
                    None => None,
                },
            };
            if let Some(there) = hq {
                distances.push(distance_km(here, there));
            }
        }
        let Some(nearest) = distances
            .iter()
            .copied()
            .min_by(|a, b| a.total_cmp(b))
        else {
            return Ok(None);
        };
        if nearest <= HEADQUARTERS_RADIUS_KM {
            return Ok(None);
        }

        Ok(Some(
            Finding::new(
                "should use a secondary wikipedia tag",
                format!(
                    "{description} links company {} headquartered {} away, which is \
                     a company that is not linkable from a single location",
                    entity.url(),
                    distance_to_string(nearest)
                ),
            )
            .with_extra_data("brand:"),
        ))
    }

    // ----- stage: language preference -----

    fn language_problem(
        &self,
        tags: &Tags,
        description: &str,
        entity: &EntityId,
        article: &ArticleRef,
    ) -> GatewayResult<Option<Finding>> {
        let Some(expected) = self.config.expected_language_code.as_deref() else {
            return Ok(None);
        };
        if article.language == expected {
            return Ok(None);
        }
        if self.foreign_link_allowed(entity, expected)? {
            return Ok(None);
        }

        let raw = tags.get("wikipedia").map(String::as_str);
        let equivalent = self.gateway.interwiki(
            &article.language,
            article.title_without_section(),
            expected,
        )?;
        if let Some(title) = equivalent {
            let target = ArticleRef::new(expected, title);
            return Ok(Some(
                Finding::new(
                    "wikipedia tag unexpected language",
                    format!(
                        "wikipedia tag on {description} points at the {} edition; {target} \
                         covers the same item in the expected language",
                        article.language
                    ),
                )
                .with_prerequisite("wikipedia", raw)
                .with_desired_target(Some(target.to_string()))
                .with_proposed_change(TagDelta {
                    from: tag_state("wikipedia", raw),
                    to: tag_state("wikipedia", Some(&target.to_string())),
                }),
            ));
        }

        if self.config.allow_requesting_edits_outside_osm && self.config.allow_false_positives {
            return Ok(Some(
                Finding::new(
                    "wikipedia tag unexpected language, article missing",
                    format!(
                        "wikipedia tag on {description} points at the {} edition and no \
                         {expected} article exists yet; fixing this means writing one",
                        article.language
                    ),
                )
                .with_prerequisite("wikipedia", raw),
            ));
        }
        Ok(None)
    }

    /// An item is allowed to keep a foreign-language article when its live
    /// country claims reach outside the countries of the expected
    /// language. End-time-qualified claims and former countries do not
    /// count as live.
    fn foreign_link_allowed(&self, entity: &EntityId, expected: &str) -> GatewayResult<bool> {
        let Some(expected_countries) = crate::languages::countries_for_language(expected) else {
            // validated at config load
            return Ok(true);
        };
        let Some(claims) = self.gateway.claims(entity, COUNTRY_PROPERTY)? else {
            return Ok(false);
        };
        for claim in &claims {
            if claim.no_longer_valid {
                continue;
            }
            let Some(country) = &claim.item else {
                continue;
            };
            if crate::languages::is_former_country(country.as_str()) {
                continue;
            }
            if !expected_countries.contains(&country.as_str()) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // ----- stage: derivation -----

    fn derivation(
        &self,
        tags: &Tags,
        wikipedia: Option<&ArticleRef>,
        declared_entity: &Option<EntityId>,
        effective_entity: &Option<EntityId>,
    ) -> GatewayResult<Option<Finding>> {
        if let Some(article) = wikipedia
            && tags.get("wikidata").is_none()
            && let Some(derived) = effective_entity
        {
            return Ok(Some(
                Finding::new(
                    "wikidata from wikipedia tag",
                    format!("wikidata tag may be added based on the wikipedia tag: {derived}"),
                )
                .with_prerequisite("wikipedia", Some(&article.to_string()))
                .with_prerequisite("wikidata", None)
                .with_proposed_change(TagDelta {
                    from: tag_state("wikidata", None),
                    to: tag_state("wikidata", Some(derived.as_str())),
                }),
            ));
        }

        if let Some(entity) = declared_entity
            && wikipedia.is_none()
            && let Some(target) = self.best_article_for_entity(entity)?
        {
            let expected = self
                .config
                .languages_ordered_by_preference
                .iter()
                .any(|code| *code == target.language);
            let problem_id = if expected || self.config.languages_ordered_by_preference.is_empty() {
                "wikipedia from wikidata tag"
            } else {
                "wikipedia from wikidata tag, unexpected language"
            };
            return Ok(Some(
                Finding::new(
                    problem_id,
                    format!("wikipedia tag may be added based on the wikidata tag: {target}"),
                )
                .with_prerequisite("wikidata", tags.get("wikidata").map(String::as_str))
                .with_prerequisite("wikipedia", None)
                .with_desired_target(Some(target.to_string()))
                .with_proposed_change(TagDelta {
                    from: tag_state("wikipedia", None),
                    to: tag_state("wikipedia", Some(&target.to_string())),
                }),
            ));
        }

        Ok(None)
    }

    /// Best sitelink of an item: caller preference order first, then the
    /// global importance order.
    fn best_article_for_entity(&self, entity: &EntityId) -> GatewayResult<Option<ArticleRef>> {
        let preferred = self
            .config
            .languages_ordered_by_preference
            .iter()
            .map(String::as_str);
        for language in preferred.chain(CODES_BY_IMPORTANCE.iter().copied()) {
            if let Some(title) = self.gateway.article_in_language(entity, language)? {
                return Ok(Some(ArticleRef::new(language, title)));
            }
        }
        Ok(None)
    }
}

/// Features whose whole existence in the record store is the problem.
/// A person-relation or a battlefield is a delete candidate; auditing its
/// links would only distract from the real fix.
fn is_delete_candidate(tags: &Tags, kind: ObjectKind) -> bool {
    if kind == ObjectKind::Relation && tags.get("type").map(String::as_str) == Some("person") {
        return true;
    }
    tags.get("historic").map(String::as_str) == Some("battlefield")
}

fn valid_wikipedia_ref(tags: &Tags) -> Option<ArticleRef> {
    let raw = tags.get("wikipedia")?;
    if is_wikipedia_tag_clearly_broken(raw) {
        return None;
    }
    ArticleRef::parse(raw)
}

/// `wikipedia:<suffix>` keys whose suffix is a known language code, with
/// their values parsed. A value may itself carry a `language:` prefix; if
/// that prefix is a known code it wins over the key suffix.
fn legacy_refs(tags: &Tags) -> Vec<(String, ArticleRef)> {
    let mut refs = Vec::new();
    for (key, value) in tags {
        let Some(suffix) = key.strip_prefix("wikipedia:") else {
            continue;
        };
        if !is_known_language_code(suffix) {
            continue;
        }
        let article = match ArticleRef::parse(value) {
            Some(parsed) if is_known_language_code(&parsed.language) => parsed,
            _ => ArticleRef::new(suffix, value.clone()),
        };
        refs.push((key.clone(), article));
    }
    refs
}

fn invalid_legacy_key(tags: &Tags) -> Option<Finding> {
    for (key, value) in tags {
        let Some(suffix) = key.strip_prefix("wikipedia:") else {
            continue;
        };
        if !is_known_language_code(suffix) {
            return Some(
                Finding::new(
                    "invalid old-style wikipedia tag",
                    format!(
                        "{key}={value} looks like an old-style wikipedia tag, but {suffix} is \
                         not a known language code"
                    ),
                )
                .with_prerequisite(key, Some(value)),
            );
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::mock::MockGateway;
    use crate::gateway::Claim;
    use crate::report::apply_delta;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    fn detector<'a>(gateway: &'a MockGateway) -> IssueDetector<'a> {
        IssueDetector::new(AuditConfig::default(), gateway)
    }

    fn check(gateway: &MockGateway, tags: &Tags) -> Option<Finding> {
        detector(gateway)
            .problem_for_tags(tags, ObjectKind::Node, "test object")
            .expect("gateway available")
    }

    #[test]
    fn empty_tags_are_silent() {
        let gateway = MockGateway::new();
        assert!(check(&gateway, &Tags::new()).is_none());
    }

    #[test]
    fn agreeing_refs_are_silent() {
        let gateway = MockGateway::new().with_linked_article("en", "Kraków", "Q31487");
        let tags = tags(&[("wikipedia", "en:Kraków"), ("wikidata", "Q31487")]);
        assert!(check(&gateway, &tags).is_none());
    }

    #[test]
    fn malformed_wikidata_wins_over_everything_else() {
        let gateway = MockGateway::new();
        let tags = tags(&[("wikidata", "123"), ("wikipedia", "not a link")]);
        let finding = check(&gateway, &tags).expect("finding");
        assert_eq!(finding.problem_id, "malformed wikidata tag");
        assert_eq!(
            finding.prerequisite.get("wikidata"),
            Some(&Some("123".to_string()))
        );
    }

    #[test]
    fn malformed_wikipedia_tag_is_reported() {
        let gateway = MockGateway::new();
        for raw in ["Kraków", "xx:Kraków", "en:pl:Kraków"] {
            let finding = check(&gateway, &tags(&[("wikipedia", raw)])).expect("finding");
            assert_eq!(finding.problem_id, "malformed wikipedia tag", "for {raw}");
        }
    }

    #[test]
    fn missing_entity_is_reported() {
        let gateway = MockGateway::new();
        let finding = check(&gateway, &tags(&[("wikidata", "Q999999")])).expect("finding");
        assert_eq!(finding.problem_id, "wikidata tag links to missing page");
        assert!(finding.message.contains("Q999999"));
    }

    #[test]
    fn missing_article_proposes_replacement_from_entity() {
        let gateway = MockGateway::new()
            .with_linked_article("en", "New name", "Q1")
            .with_entity("Q1");
        let tags = tags(&[("wikipedia", "en:Old name"), ("wikidata", "Q1")]);
        let finding = check(&gateway, &tags).expect("finding");
        assert_eq!(finding.problem_id, "wikipedia tag links to missing page");
        assert_eq!(
            finding.desired_wikipedia_target.as_deref(),
            Some("en:New name")
        );
        let delta = &finding.proposed_tagging_changes[0];
        assert_eq!(
            delta.to.get("wikipedia"),
            Some(&Some("en:New name".to_string()))
        );
    }

    #[test]
    fn sitelink_counts_as_existence_proof() {
        // article() knows nothing, but the sitelink matches the tag
        let mut gateway = MockGateway::new().with_entity("Q1");
        gateway
            .sitelinks
            .insert((EntityId::parse("Q1").expect("id"), "en".to_string()), "Foo".to_string());
        gateway.entity_by_article.insert(
            ("en".to_string(), "Foo".to_string()),
            EntityId::parse("Q1").expect("id"),
        );
        let tags = tags(&[("wikipedia", "en:Foo"), ("wikidata", "Q1")]);
        assert!(check(&gateway, &tags).is_none());
    }

    #[test]
    fn unreconciled_mismatch_names_both_ids() {
        let gateway = MockGateway::new()
            .with_linked_article("en", "Foo", "Q1")
            .with_entity("Q2");
        let tags = tags(&[("wikipedia", "en:Foo"), ("wikidata", "Q2")]);
        let finding = check(&gateway, &tags).expect("finding");
        assert_eq!(finding.problem_id, "wikipedia wikidata mismatch");
        assert!(finding.message.contains("Q1"));
        assert!(finding.message.contains("Q2"));
        assert!(finding.proposed_tagging_changes.is_empty());
    }

    #[test]
    fn article_without_item_mismatches_declared_entity() {
        // the page exists but carries no wikidata item of its own
        let mut gateway = MockGateway::new().with_entity("Q2");
        gateway
            .articles
            .insert(("en".to_string(), "Foo".to_string()), "Foo".to_string());
        let tags = tags(&[("wikipedia", "en:Foo"), ("wikidata", "Q2")]);
        let finding = check(&gateway, &tags).expect("finding");
        assert_eq!(finding.problem_id, "wikipedia wikidata mismatch");
        assert!(finding.message.contains("Q2"));
        assert!(finding.message.contains("(missing)"));
        assert!(finding.proposed_tagging_changes.is_empty());
    }

    #[test]
    fn stale_entity_redirect_is_repaired() {
        let gateway = MockGateway::new()
            .with_linked_article("en", "Foo", "Q1")
            .with_entity_redirect("Q2", "Q1");
        let tags = tags(&[("wikipedia", "en:Foo"), ("wikidata", "Q2")]);
        let finding = check(&gateway, &tags).expect("finding");
        assert_eq!(
            finding.problem_id,
            "wikipedia wikidata mismatch - follow wikidata redirect"
        );
        let delta = &finding.proposed_tagging_changes[0];
        assert_eq!(delta.to.get("wikidata"), Some(&Some("Q1".to_string())));
    }

    #[test]
    fn stale_article_redirect_is_repaired() {
        let gateway = MockGateway::new()
            .with_linked_article("en", "New", "Q1")
            .with_linked_article("en", "Old", "Q7") // redirect page kept its old item
            .with_article_redirect("en", "Old", "New");
        let tags = tags(&[("wikipedia", "en:Old"), ("wikidata", "Q1")]);
        let finding = check(&gateway, &tags).expect("finding");
        assert_eq!(
            finding.problem_id,
            "wikipedia wikidata mismatch - follow wikipedia redirect"
        );
        assert_eq!(finding.desired_wikipedia_target.as_deref(), Some("en:New"));
    }

    #[test]
    fn wikidata_is_derived_from_wikipedia() {
        let gateway = MockGateway::new().with_linked_article("en", "Foo", "Q1");
        let input = tags(&[("wikipedia", "en:Foo")]);
        let finding = check(&gateway, &input).expect("finding");
        assert_eq!(finding.problem_id, "wikidata from wikipedia tag");
        assert_eq!(finding.prerequisite.get("wikidata"), Some(&None));

        // applying the proposed edit settles the record
        let fixed = apply_delta(&input, &finding.proposed_tagging_changes[0]);
        assert_eq!(fixed.get("wikidata").map(String::as_str), Some("Q1"));
        assert!(check(&gateway, &fixed).is_none());
    }

    #[test]
    fn wikipedia_is_derived_from_wikidata() {
        let gateway = MockGateway::new().with_linked_article("pl", "Foo", "Q1");
        let config = AuditConfig {
            languages_ordered_by_preference: vec!["pl".to_string()],
            ..AuditConfig::default()
        };
        let input = tags(&[("wikidata", "Q1")]);
        let finding = IssueDetector::new(config, &gateway)
            .problem_for_tags(&input, ObjectKind::Node, "test object")
            .expect("available")
            .expect("finding");
        assert_eq!(finding.problem_id, "wikipedia from wikidata tag");
        assert_eq!(finding.desired_wikipedia_target.as_deref(), Some("pl:Foo"));

        let fixed = apply_delta(&input, &finding.proposed_tagging_changes[0]);
        let follow_up = IssueDetector::new(
            AuditConfig {
                languages_ordered_by_preference: vec!["pl".to_string()],
                ..AuditConfig::default()
            },
            &gateway,
        )
        .problem_for_tags(&fixed, ObjectKind::Node, "test object")
        .expect("available");
        assert!(follow_up.is_none());
    }

    #[test]
    fn derived_wikipedia_in_unlisted_language_is_flagged() {
        let gateway = MockGateway::new().with_linked_article("de", "Foo", "Q1");
        let config = AuditConfig {
            languages_ordered_by_preference: vec!["pl".to_string()],
            ..AuditConfig::default()
        };
        let finding = IssueDetector::new(config, &gateway)
            .problem_for_tags(&tags(&[("wikidata", "Q1")]), ObjectKind::Node, "test object")
            .expect("available")
            .expect("finding");
        assert_eq!(
            finding.problem_id,
            "wikipedia from wikidata tag, unexpected language"
        );
    }

    #[test]
    fn human_item_needs_a_secondary_tag() {
        let gateway = MockGateway::new()
            .with_linked_article("en", "John Smith", "Q100")
            .with_ancestors("Q100", &["Q5"]);
        let tags = tags(&[("wikipedia", "en:John Smith"), ("wikidata", "Q100")]);
        let finding = check(&gateway, &tags).expect("finding");
        assert_eq!(finding.problem_id, "should use a secondary wikipedia tag");
        assert!(finding.message.contains("a human"));
        assert_eq!(finding.extra_data.as_deref(), Some("name:"));
    }

    #[test]
    fn subclass_claims_mark_a_generic_object() {
        let gateway = MockGateway::new()
            .with_entity("Q200")
            .with_claim(
                "Q200",
                "P279",
                Claim {
                    item: EntityId::parse("Q811979"),
                    ..Claim::default()
                },
            );
        let finding = check(&gateway, &tags(&[("wikidata", "Q200")])).expect("finding");
        assert_eq!(finding.problem_id, "should use a secondary wikipedia tag");
        assert!(finding.message.contains("an uncoordinable generic object"));
        assert_eq!(finding.extra_data.as_deref(), Some("name:"));
    }

    #[test]
    fn blacklisted_brand_connection_is_reported() {
        let gateway = MockGateway::new().with_entity("Q38076");
        let finding = check(&gateway, &tags(&[("wikidata", "Q38076")])).expect("finding");
        assert_eq!(
            finding.problem_id,
            "blacklisted connection with known replacement"
        );
        assert_eq!(finding.extra_data.as_deref(), Some("brand:"));
        let delta = &finding.proposed_tagging_changes[0];
        assert_eq!(
            delta.to.get("brand:wikidata"),
            Some(&Some("Q38076".to_string()))
        );
        assert_eq!(
            delta.to.get("amenity"),
            Some(&Some("fast_food".to_string()))
        );
    }

    #[test]
    fn disambiguation_page_lists_candidates_with_distances() {
        let gateway = MockGateway::new()
            .with_linked_article("en", "Springfield", "Q300")
            .with_ancestors("Q300", &["Q4167410"])
            .with_article_links("en", "Springfield", &["Springfield, Ohio"])
            .with_linked_article("en", "Springfield, Ohio", "Q301")
            .with_location("Q301", 39.92, -83.81);
        let tags = tags(&[("wikipedia", "en:Springfield")]);
        let finding = detector(&gateway)
            .problem_for_located_feature(
                &tags,
                ObjectKind::Node,
                "test object",
                Coordinates::new(39.93, -83.80),
            )
            .expect("available")
            .expect("finding");
        assert_eq!(finding.problem_id, "link to an unlinkable article");
        assert!(finding.message.contains("Springfield, Ohio"));
        assert!(finding.message.contains(" m"), "short distance in meters");
    }

    #[test]
    fn list_article_is_unlinkable() {
        let gateway = MockGateway::new()
            .with_entity("Q400")
            .with_ancestors("Q400", &["Q13406463"]);
        let finding = check(&gateway, &tags(&[("wikidata", "Q400")])).expect("finding");
        assert_eq!(finding.problem_id, "link to an unlinkable article");
        assert!(finding.message.contains("list article"));
    }

    #[test]
    fn nearby_headquarters_keeps_the_link() {
        let gateway = MockGateway::new()
            .with_entity("Q500")
            .with_claim(
                "Q500",
                "P159",
                Claim {
                    item: EntityId::parse("Q501"),
                    ..Claim::default()
                },
            )
            .with_claim(
                "Q500",
                "P159",
                Claim {
                    item: EntityId::parse("Q502"),
                    ..Claim::default()
                },
            )
            .with_location("Q501", 50.06, 19.94)
            .with_location("Q502", 40.71, -74.00);
        let tags = tags(&[("wikidata", "Q500")]);
        let near = detector(&gateway)
            .problem_for_located_feature(
                &tags,
                ObjectKind::Node,
                "test object",
                Coordinates::new(50.07, 19.95),
            )
            .expect("available");
        assert!(near.is_none());
    }

    #[test]
    fn far_from_every_headquarters_is_reported() {
        let gateway = MockGateway::new()
            .with_entity("Q500")
            .with_claim(
                "Q500",
                "P159",
                Claim {
                    item: EntityId::parse("Q501"),
                    ..Claim::default()
                },
            )
            .with_location("Q501", 40.71, -74.00);
        let tags = tags(&[("wikidata", "Q500")]);
        let finding = detector(&gateway)
            .problem_for_located_feature(
                &tags,
                ObjectKind::Node,
                "test object",
                Coordinates::new(50.06, 19.94),
            )
            .expect("available")
            .expect("finding");
        assert_eq!(finding.problem_id, "should use a secondary wikipedia tag");
        assert!(finding.message.contains("not linkable from a single location"));
    }

    #[test]
    fn unexpected_language_proposes_the_expected_edition() {
        let gateway = MockGateway::new()
            .with_linked_article("en", "Foo", "Q600")
            .with_claim(
                "Q600",
                "P17",
                Claim {
                    item: EntityId::parse("Q36"),
                    ..Claim::default()
                },
            );
        let mut gateway = gateway;
        gateway.sitelinks.insert(
            (EntityId::parse("Q600").expect("id"), "pl".to_string()),
            "Foo po polsku".to_string(),
        );
        let config = AuditConfig {
            expected_language_code: Some("pl".to_string()),
            ..AuditConfig::default()
        };
        let finding = IssueDetector::new(config, &gateway)
            .problem_for_tags(
                &tags(&[("wikipedia", "en:Foo"), ("wikidata", "Q600")]),
                ObjectKind::Node,
                "test object",
            )
            .expect("available")
            .expect("finding");
        assert_eq!(finding.problem_id, "wikipedia tag unexpected language");
        assert_eq!(
            finding.desired_wikipedia_target.as_deref(),
            Some("pl:Foo po polsku")
        );
    }

    #[test]
    fn foreign_country_claim_allows_a_foreign_link() {
        let gateway = MockGateway::new()
            .with_linked_article("en", "Foo", "Q600")
            .with_claim(
                "Q600",
                "P17",
                Claim {
                    item: EntityId::parse("Q183"), // Germany, outside the pl set
                    ..Claim::default()
                },
            );
        let config = AuditConfig {
            expected_language_code: Some("pl".to_string()),
            ..AuditConfig::default()
        };
        let finding = IssueDetector::new(config, &gateway)
            .problem_for_tags(
                &tags(&[("wikipedia", "en:Foo"), ("wikidata", "Q600")]),
                ObjectKind::Node,
                "test object",
            )
            .expect("available");
        assert!(finding.is_none());
    }

    #[test]
    fn ended_and_former_country_claims_do_not_count() {
        let gateway = MockGateway::new()
            .with_linked_article("en", "Foo", "Q600")
            .with_claim(
                "Q600",
                "P17",
                Claim {
                    item: EntityId::parse("Q183"),
                    no_longer_valid: true,
                    ..Claim::default()
                },
            )
            .with_claim(
                "Q600",
                "P17",
                Claim {
                    item: EntityId::parse("Q7318"), // Nazi Germany
                    ..Claim::default()
                },
            )
            .with_claim(
                "Q600",
                "P17",
                Claim {
                    item: EntityId::parse("Q36"),
                    ..Claim::default()
                },
            );
        let mut gateway = gateway;
        gateway.sitelinks.insert(
            (EntityId::parse("Q600").expect("id"), "pl".to_string()),
            "Foo".to_string(),
        );
        let config = AuditConfig {
            expected_language_code: Some("pl".to_string()),
            ..AuditConfig::default()
        };
        let finding = IssueDetector::new(config, &gateway)
            .problem_for_tags(
                &tags(&[("wikipedia", "en:Foo"), ("wikidata", "Q600")]),
                ObjectKind::Node,
                "test object",
            )
            .expect("available")
            .expect("finding");
        assert_eq!(finding.problem_id, "wikipedia tag unexpected language");
    }

    #[test]
    fn missing_expected_article_needs_both_opt_ins() {
        let build = || {
            MockGateway::new()
                .with_linked_article("en", "Foo", "Q600")
                .with_claim(
                    "Q600",
                    "P17",
                    Claim {
                        item: EntityId::parse("Q36"),
                        ..Claim::default()
                    },
                )
        };
        let input = tags(&[("wikipedia", "en:Foo"), ("wikidata", "Q600")]);

        let gateway = build();
        let quiet = IssueDetector::new(
            AuditConfig {
                expected_language_code: Some("pl".to_string()),
                ..AuditConfig::default()
            },
            &gateway,
        )
        .problem_for_tags(&input, ObjectKind::Node, "test object")
        .expect("available");
        assert!(quiet.is_none());

        let gateway = build();
        let loud = IssueDetector::new(
            AuditConfig {
                expected_language_code: Some("pl".to_string()),
                allow_requesting_edits_outside_osm: true,
                allow_false_positives: true,
                ..AuditConfig::default()
            },
            &gateway,
        )
        .problem_for_tags(&input, ObjectKind::Node, "test object")
        .expect("available")
        .expect("finding");
        assert_eq!(
            loud.problem_id,
            "wikipedia tag unexpected language, article missing"
        );
    }

    #[test]
    fn dissolved_item_is_reported_with_caveat() {
        let gateway = MockGateway::new()
            .with_entity("Q700")
            .with_claim("Q700", "P576", Claim::default());
        let finding = check(&gateway, &tags(&[("wikidata", "Q700")])).expect("finding");
        assert_eq!(finding.problem_id, "no longer existing object");
        assert!(finding.message.contains("WIKIDATA QUALITY MAY BE POOR"));
    }

    #[test]
    fn dissolved_item_is_named_by_its_label() {
        let gateway = MockGateway::new()
            .with_entity("Q700")
            .with_claim("Q700", "P576", Claim::default())
            .with_label("Q700", "en", "Old Factory");
        let finding = check(&gateway, &tags(&[("wikidata", "Q700")])).expect("finding");
        assert!(finding.message.contains("Old Factory (Q700)"));
    }

    #[test]
    fn delete_candidates_are_skipped_entirely() {
        let gateway = MockGateway::new();
        let person = tags(&[("type", "person"), ("wikipedia", "broken value")]);
        let finding = detector(&gateway)
            .problem_for_tags(&person, ObjectKind::Relation, "test object")
            .expect("available");
        assert!(finding.is_none());

        let battlefield = tags(&[("historic", "battlefield"), ("wikidata", "123")]);
        assert!(check(&gateway, &battlefield).is_none());
    }

    #[test]
    fn person_node_is_still_audited() {
        let gateway = MockGateway::new();
        let tags = tags(&[("type", "person"), ("wikidata", "123")]);
        let finding = check(&gateway, &tags).expect("finding");
        assert_eq!(finding.problem_id, "malformed wikidata tag");
    }

    #[test]
    fn unknown_legacy_suffix_is_invalid() {
        let gateway = MockGateway::new();
        let tags = tags(&[("wikipedia:polish", "Kraków")]);
        let finding = check(&gateway, &tags).expect("finding");
        assert_eq!(finding.problem_id, "invalid old-style wikipedia tag");
        assert!(finding.message.contains("wikipedia:polish"));
    }

    #[test]
    fn agreeing_legacy_keys_become_a_plain_tag() {
        let gateway = MockGateway::new()
            .with_linked_article("de", "Berlin", "Q64")
            .with_linked_article("en", "Berlin", "Q64");
        let input = tags(&[("wikipedia:de", "Berlin"), ("wikipedia:en", "Berlin")]);
        let finding = check(&gateway, &input).expect("finding");
        assert_eq!(
            finding.problem_id,
            "wikipedia tag from wikipedia tag in an outdated form"
        );
        assert_eq!(finding.desired_wikipedia_target.as_deref(), Some("en:Berlin"));

        let fixed = apply_delta(&input, &finding.proposed_tagging_changes[0]);
        assert!(!fixed.contains_key("wikipedia:de"));
        assert_eq!(fixed.get("wikipedia").map(String::as_str), Some("en:Berlin"));
        assert_eq!(fixed.get("wikidata").map(String::as_str), Some("Q64"));
        // the migrated record is settled
        assert!(check(&gateway, &fixed).is_none());
    }

    #[test]
    fn legacy_keys_agreeing_with_the_plain_tag_are_removed() {
        let gateway = MockGateway::new().with_linked_article("de", "Berlin", "Q64");
        let input = tags(&[("wikipedia", "de:Berlin"), ("wikipedia:de", "Berlin")]);
        let finding = check(&gateway, &input).expect("finding");
        assert_eq!(
            finding.problem_id,
            "wikipedia tag in an outdated form for removal"
        );
        let fixed = apply_delta(&input, &finding.proposed_tagging_changes[0]);
        assert!(!fixed.contains_key("wikipedia:de"));
        assert_eq!(fixed.get("wikipedia").map(String::as_str), Some("de:Berlin"));
    }

    #[test]
    fn disagreeing_legacy_keys_need_human_judgment() {
        let gateway = MockGateway::new()
            .with_linked_article("de", "Berlin", "Q64")
            .with_linked_article("en", "Paris", "Q90");
        let input = tags(&[("wikipedia:de", "Berlin"), ("wikipedia:en", "Paris")]);
        let finding = check(&gateway, &input).expect("finding");
        assert_eq!(
            finding.problem_id,
            "wikipedia tag in outdated form and there is mismatch between links"
        );
        assert!(finding.proposed_tagging_changes.is_empty());
    }

    #[test]
    fn legacy_value_with_language_prefix_is_respected() {
        let gateway = MockGateway::new().with_linked_article("en", "Berlin", "Q64");
        let input = tags(&[("wikipedia:de", "en:Berlin")]);
        let finding = check(&gateway, &input).expect("finding");
        assert_eq!(
            finding.problem_id,
            "wikipedia tag from wikipedia tag in an outdated form"
        );
        assert_eq!(finding.desired_wikipedia_target.as_deref(), Some("en:Berlin"));
    }

    #[test]
    fn gateway_outage_propagates_as_error() {
        let gateway = MockGateway::unavailable();
        let result = detector(&gateway).problem_for_tags(
            &tags(&[("wikidata", "Q1")]),
            ObjectKind::Node,
            "test object",
        );
        assert!(result.is_err());
    }

    #[test]
    fn additional_debug_attaches_a_log() {
        let gateway = MockGateway::new().with_linked_article("en", "Foo", "Q1");
        let config = AuditConfig {
            additional_debug: true,
            ..AuditConfig::default()
        };
        let finding = IssueDetector::new(config, &gateway)
            .problem_for_tags(&tags(&[("wikipedia", "en:Foo")]), ObjectKind::Node, "test object")
            .expect("available")
            .expect("finding");
        assert!(finding.debug_log.expect("log").contains("Q1"));
    }
}
