//! Curated admissibility data: wikidata items that are known-wrong primary
//! link targets, type classes that disqualify an item as a primary target,
//! and type classes accepted as mappable. This is configuration, not
//! algorithm - the pipeline only does exact-id lookups against it.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::refs::EntityId;

/// A known-bad connection with an obvious replacement: the item is a
/// brand/operator/species-level concept, so the reference belongs under a
/// prefixed key instead.
#[derive(Debug, Clone, Copy)]
pub struct BlacklistEntry {
    pub prefix: &'static str,
    pub expected_tags: &'static [(&'static str, &'static str)],
    pub allowed_tags: &'static [(&'static str, &'static str)],
    pub name: Option<&'static str>,
}

const fn brand(
    expected_tags: &'static [(&'static str, &'static str)],
    name: Option<&'static str>,
) -> BlacklistEntry {
    BlacklistEntry {
        prefix: "brand:",
        expected_tags,
        allowed_tags: &[],
        name,
    }
}

#[rustfmt::skip]
const BLACKLIST: &[(&str, BlacklistEntry)] = &[
    // postal operators
    ("Q668687", brand(&[("amenity", "post_office")], Some("United States Postal Service"))),
    ("Q1032001", brand(&[("amenity", "post_office")], Some("Canada Post"))),
    ("Q157645", brand(&[("amenity", "post_office")], Some("Deutsche Post"))),
    ("Q459477", brand(&[("amenity", "post_office")], Some("FedEx"))),
    ("Q489815", brand(&[("amenity", "post_office")], Some("DHL"))),
    ("Q12133863", brand(&[("amenity", "post_office")], Some("Нова Пошта"))),
    // retail chains
    ("Q889624", brand(&[("shop", "doityourself")], Some("Leroy Merlin"))),
    ("Q1373493", brand(&[("shop", "doityourself")], Some("Lowe's"))),
    ("Q864407", BlacklistEntry {
        prefix: "brand:",
        expected_tags: &[("shop", "doityourself")],
        allowed_tags: &[("name", "The Home Depot")],
        name: Some("Home Depot"),
    }),
    ("Q54078", brand(&[("shop", "furniture")], Some("IKEA"))),
    ("Q533415", brand(&[("shop", "electronics")], Some("Best Buy"))),
    ("Q857182", brand(&[("shop", "supermarket")], Some("Biedronka"))),
    ("Q487494", brand(&[("shop", "supermarket")], Some("Tesco"))),
    ("Q685967", brand(&[("shop", "supermarket")], Some("Kaufland"))),
    ("Q151954", BlacklistEntry {
        prefix: "brand:",
        expected_tags: &[("shop", "supermarket")],
        allowed_tags: &[("name:es", "Lidl")],
        name: Some("Lidl"),
    }),
    ("Q125054", brand(&[("shop", "supermarket")], Some("Aldi"))),
    ("Q610492", brand(&[("shop", "supermarket")], Some("Spar"))),
    ("Q483551", BlacklistEntry {
        prefix: "brand:",
        expected_tags: &[("shop", "supermarket")],
        allowed_tags: &[("name", "Walmart Supercenter")],
        name: Some("Walmart"),
    }),
    ("Q701755", brand(&[("shop", "supermarket")], Some("Edeka"))),
    ("Q715583", brand(&[], Some("Costco"))),
    ("Q37158", brand(&[("amenity", "cafe")], Some("Starbucks"))),
    ("Q2589061", brand(&[("shop", "convenience")], Some("Żabka"))),
    ("Q259340", BlacklistEntry {
        prefix: "brand:",
        expected_tags: &[("shop", "convenience")],
        allowed_tags: &[("name:en", "7-Eleven")],
        name: Some("7-Eleven"),
    }),
    ("Q316004", brand(&[("shop", "chemist")], Some("Rossmann"))),
    ("Q188326", brand(&[("shop", "clothes")], Some("H&M"))),
    ("Q701338", brand(&[("shop", "clothes")], Some("C&A"))),
    ("Q147662", brand(&[("shop", "clothes")], Some("Zara"))),
    ("Q26070", brand(&[("shop", "clothes")], Some("Uniqlo"))),
    ("Q532746", brand(&[("shop", "clothes")], Some("Esprit"))),
    ("Q883965", brand(&[("shop", "clothes")], Some("KiK"))),
    ("Q1046951", brand(&[("shop", "department_store")], Some("Target"))),
    ("Q2634111", brand(&[("shop", "variety_store")], Some("Action"))),
    ("Q145168", brand(&[("shop", "variety_store")], Some("Dollar General"))),
    ("Q5289230", brand(&[("shop", "variety_store")], Some("Dollar Tree"))),
    ("Q795454", brand(&[("shop", "books")], Some("Barnes & Noble"))),
    ("Q3045978", brand(&[("shop", "books")], Some("Empik"))),
    // banks
    ("Q487907", brand(&[("amenity", "bank")], Some("Bank of America"))),
    ("Q744149", brand(&[("amenity", "bank")], Some("Wells Fargo"))),
    ("Q524629", brand(&[("amenity", "bank")], Some("Chase Bank"))),
    ("Q499707", brand(&[("amenity", "bank")], Some("BNP Paribas"))),
    ("Q270363", brand(&[("amenity", "bank")], Some("Société Générale"))),
    ("Q205012", brand(&[("amenity", "bank")], Some("Sberbank"))),
    ("Q1160928", brand(&[("amenity", "bank")], Some("mBank"))),
    // fuel stations
    ("Q971649", brand(&[("amenity", "fuel")], Some("Orlen"))),
    ("Q154950", brand(&[("amenity", "fuel")], Some("Shell"))),
    ("Q152057", brand(&[("amenity", "fuel")], Some("BP"))),
    ("Q3088656", brand(&[("amenity", "fuel")], Some("Mobil"))),
    ("Q4781944", brand(&[("amenity", "fuel")], Some("Exxon"))),
    ("Q319642", brand(&[("amenity", "fuel")], Some("Chevron"))),
    ("Q867662", brand(&[("amenity", "fuel")], Some("Esso"))),
    ("Q565734", brand(&[("amenity", "fuel")], Some("Aral"))),
    ("Q1208279", brand(&[("amenity", "fuel")], Some("Petro-Canada"))),
    // food chains
    ("Q244457", brand(&[("amenity", "fast_food")], Some("Subway"))),
    ("Q752941", brand(&[("amenity", "fast_food")], Some("Taco Bell"))),
    ("Q38076", brand(&[("amenity", "fast_food")], Some("McDonald's"))),
    ("Q524757", brand(&[("amenity", "fast_food")], Some("KFC"))),
    ("Q550258", brand(&[("amenity", "fast_food")], Some("Wendy's"))),
    ("Q839466", brand(&[("amenity", "fast_food")], Some("Domino's Pizza"))),
    ("Q175106", brand(&[("amenity", "fast_food")], Some("Tim Hortons"))),
    ("Q191615", brand(&[("cuisine", "pizza")], Some("Pizza Hut"))),
    ("Q1185675", brand(&[("amenity", "restaurant")], Some("IHOP"))),
    // pharmacies and insurance
    ("Q1591889", brand(&[("amenity", "pharmacy")], Some("Walgreens"))),
    ("Q2078880", brand(&[("amenity", "pharmacy")], Some("CVS"))),
    ("Q3433273", brand(&[("amenity", "pharmacy")], Some("Rite Aid"))),
    ("Q487292", BlacklistEntry {
        prefix: "brand:",
        expected_tags: &[("office", "insurance")],
        allowed_tags: &[],
        name: Some("Allianz"),
    }),
    ("Q160054", brand(&[("office", "insurance")], Some("AXA"))),
    ("Q2007336", brand(&[("office", "insurance")], Some("State Farm"))),
    // hotels
    ("Q2717882", brand(&[("tourism", "hotel")], Some("Holiday Inn"))),
    ("Q1502859", brand(&[("tourism", "hotel")], Some("Ramada"))),
    ("Q2746220", brand(&[("tourism", "hotel")], Some("Crowne Plaza"))),
    ("Q2188884", brand(&[("tourism", "motel")], Some("Motel 6"))),
    // species linked from individual trees or zoo enclosures
    ("Q140957", BlacklistEntry {
        prefix: "species:",
        expected_tags: &[
            ("species", "Dipterocarpus alatus"),
            ("natural", "tree"),
            ("leaf_cycle", "evergreen"),
            ("leaf_type", "broadleaved"),
        ],
        allowed_tags: &[],
        name: None,
    }),
    ("Q7378", BlacklistEntry {
        prefix: "species:",
        expected_tags: &[("attraction", "animal")],
        allowed_tags: &[],
        name: None,
    }),
    ("Q787", BlacklistEntry {
        prefix: "species:",
        expected_tags: &[("attraction", "animal")],
        allowed_tags: &[],
        name: None,
    }),
    ("Q36341", BlacklistEntry {
        prefix: "species:",
        expected_tags: &[("attraction", "animal")],
        allowed_tags: &[],
        name: None,
    }),
];

/// Items that are known-wrong but have no mechanical replacement.
const BLACKLISTED_UNFIXABLE: &[&str] = &["Q1456883"];

pub fn blacklist_entry(id: &EntityId) -> Option<&'static BlacklistEntry> {
    static INDEX: OnceLock<HashMap<&'static str, &'static BlacklistEntry>> = OnceLock::new();
    INDEX
        .get_or_init(|| {
            BLACKLIST
                .iter()
                .map(|(key, entry)| (*key, entry))
                .collect()
        })
        .get(id.as_str())
        .copied()
}

pub fn is_blacklisted_and_unfixable(id: &EntityId) -> bool {
    BLACKLISTED_UNFIXABLE.contains(&id.as_str())
}

/// Why a type class disqualifies an item as a primary link target, plus
/// the key prefix to suggest instead (if any).
#[derive(Debug, Clone, Copy)]
pub struct TypeExclusion {
    pub reason: &'static str,
    pub suggested_prefix: Option<&'static str>,
}

#[rustfmt::skip]
const UNLINKABLE_TYPES: &[(&str, TypeExclusion)] = &[
    ("Q5", TypeExclusion { reason: "a human", suggested_prefix: Some("name:") }),
    ("Q18786396", TypeExclusion { reason: "an animal or plant", suggested_prefix: None }),
    ("Q16521", TypeExclusion { reason: "an animal or plant", suggested_prefix: None }),
    ("Q55983715", TypeExclusion { reason: "an animal or plant", suggested_prefix: None }),
    ("Q12045585", TypeExclusion { reason: "an animal or plant", suggested_prefix: None }),
    ("Q729", TypeExclusion { reason: "an animal or plant", suggested_prefix: None }),
    ("Q5113", TypeExclusion { reason: "an animal or plant", suggested_prefix: None }),
    ("Q1344", TypeExclusion { reason: "an opera", suggested_prefix: None }),
    ("Q35127", TypeExclusion { reason: "a website", suggested_prefix: None }),
    ("Q17320256", TypeExclusion { reason: "a physical process", suggested_prefix: None }),
    ("Q1656682", TypeExclusion { reason: "an event", suggested_prefix: None }),
    ("Q4026292", TypeExclusion { reason: "an event", suggested_prefix: None }),
    ("Q3249551", TypeExclusion { reason: "an event", suggested_prefix: None }),
    ("Q1190554", TypeExclusion { reason: "an event", suggested_prefix: None }),
    ("Q5398426", TypeExclusion { reason: "a television series", suggested_prefix: None }),
    ("Q3026787", TypeExclusion { reason: "a saying", suggested_prefix: None }),
    ("Q18534542", TypeExclusion { reason: "a restaurant chain", suggested_prefix: Some("brand:") }),
    ("Q507619", TypeExclusion { reason: "a chain store", suggested_prefix: Some("brand:") }),
    ("Q202444", TypeExclusion { reason: "a given name", suggested_prefix: Some("name:") }),
    ("Q29048322", TypeExclusion { reason: "a vehicle model", suggested_prefix: Some("subject:") }),
    ("Q21502408", TypeExclusion { reason: "a mandatory constraint", suggested_prefix: None }),
];

pub fn unlinkable_type_reason(type_id: &EntityId) -> Option<&'static TypeExclusion> {
    static INDEX: OnceLock<HashMap<&'static str, &'static TypeExclusion>> = OnceLock::new();
    INDEX
        .get_or_init(|| {
            UNLINKABLE_TYPES
                .iter()
                .map(|(key, entry)| (*key, entry))
                .collect()
        })
        .get(type_id.as_str())
        .copied()
}

/// Type classes accepted as a primary link target. Only consulted by the
/// additional-debug channel to point out items of entirely unknown type.
#[rustfmt::skip]
const SAFE_PRIMARY_TYPES: &[(&str, &str)] = &[
    ("Q486972", "human settlement"),
    ("Q811979", "designed structure"),
    ("Q46831", "mountain range"),
    ("Q34442", "road"),
    ("Q2143825", "walking path"),
    ("Q11634", "art of sculpture"),
    ("Q56061", "administrative territorial entity"),
    ("Q473972", "protected area"),
    ("Q4022", "river"),
    ("Q22698", "park"),
    ("Q11446", "ship"),
    ("Q8502", "mountain"),
    ("Q10862618", "mountain saddle"),
    ("Q35509", "cave"),
    ("Q23397", "lake"),
    ("Q39816", "valley"),
    ("Q179700", "statue"),
    ("Q271669", "landform"),
    ("Q376799", "transport infrastructure"),
    ("Q15324", "body of water"),
    ("Q618123", "geographical object"),
    ("Q43229", "organization"),
];

pub fn is_safe_primary_type(type_id: &EntityId) -> bool {
    static INDEX: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    INDEX
        .get_or_init(|| SAFE_PRIMARY_TYPES.iter().copied().collect())
        .contains_key(type_id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refs::EntityId;

    fn id(raw: &str) -> EntityId {
        EntityId::parse(raw).expect("test id")
    }

    #[test]
    fn blacklist_lookup_is_exact_match() {
        let entry = blacklist_entry(&id("Q38076")).expect("mcdonalds");
        assert_eq!(entry.prefix, "brand:");
        assert_eq!(entry.name, Some("McDonald's"));
        assert!(blacklist_entry(&id("Q1")).is_none());
    }

    #[test]
    fn unfixable_blacklist_is_separate() {
        assert!(is_blacklisted_and_unfixable(&id("Q1456883")));
        assert!(!is_blacklisted_and_unfixable(&id("Q38076")));
    }

    #[test]
    fn human_type_suggests_name_prefix() {
        let exclusion = unlinkable_type_reason(&id("Q5")).expect("human");
        assert_eq!(exclusion.reason, "a human");
        assert_eq!(exclusion.suggested_prefix, Some("name:"));
    }

    #[test]
    fn event_types_have_no_replacement_prefix() {
        let exclusion = unlinkable_type_reason(&id("Q1190554")).expect("event");
        assert_eq!(exclusion.reason, "an event");
        assert!(exclusion.suggested_prefix.is_none());
    }

    #[test]
    fn safe_types_do_not_overlap_exclusions() {
        for (type_id, _) in SAFE_PRIMARY_TYPES {
            let parsed = id(type_id);
            assert!(
                unlinkable_type_reason(&parsed).is_none(),
                "{type_id} is both safe and excluded"
            );
        }
    }

    #[test]
    fn blacklist_ids_parse_as_entity_ids() {
        for (raw, _) in BLACKLIST {
            assert!(EntityId::parse(raw).is_some(), "bad blacklist id {raw}");
        }
    }
}
