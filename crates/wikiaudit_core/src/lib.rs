//! Issue detection for wikipedia/wikidata cross-references on OSM-style
//! features: the reference model, the knowledge-base gateway, the curated
//! admissibility tables, and the decision pipeline that returns at most
//! one finding per feature.

pub mod config;
pub mod detector;
pub mod gateway;
pub mod geo;
pub mod languages;
pub mod refs;
pub mod report;
pub mod tables;
