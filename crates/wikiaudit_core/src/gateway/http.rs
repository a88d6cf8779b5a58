//! Live gateway over the Wikidata and Wikipedia APIs: blocking HTTP with
//! bounded retries, polite request spacing, and a SQLite response cache.

use std::collections::{HashSet, VecDeque};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread::sleep;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use rusqlite::Connection;
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::{Article, Claim, Entity, GatewayError, GatewayResult, KnowledgeGateway};
use crate::geo::Coordinates;
use crate::refs::EntityId;

const DEFAULT_USER_AGENT: &str = "wikiaudit/0.2 (OSM wikipedia/wikidata tag audit)";
const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_RETRIES: usize = 2;
const DEFAULT_RETRY_DELAY_MS: u64 = 350;
const MIN_REQUEST_SPACING_MS: u64 = 100;

const WIKIDATA_API: &str = "https://www.wikidata.org/w/api.php";

/// Bound on the instance-of/subclass-of closure walk. Wikidata ontology
/// loops exist and some class trees are enormous.
const MAX_CLOSURE_NODES: usize = 400;

#[derive(Debug, Clone, Default)]
pub struct HttpGatewayOptions {
    pub cache_path: Option<PathBuf>,
    pub forced_refresh: bool,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub oldest_fetched_at: Option<i64>,
    pub newest_fetched_at: Option<i64>,
}

pub struct HttpGateway {
    client: Client,
    user_agent: String,
    retries: usize,
    retry_delay_ms: u64,
    forced_refresh: bool,
    cache: Option<Mutex<Connection>>,
    last_request_at: Mutex<Option<Instant>>,
}

impl HttpGateway {
    pub fn new(options: HttpGatewayOptions) -> Result<Self> {
        let timeout_ms = env_number("WIKIAUDIT_HTTP_TIMEOUT_MS").unwrap_or(DEFAULT_TIMEOUT_MS);
        let retries = env_number("WIKIAUDIT_HTTP_RETRIES")
            .map(|value| value as usize)
            .unwrap_or(DEFAULT_RETRIES);
        let retry_delay_ms =
            env_number("WIKIAUDIT_HTTP_RETRY_DELAY_MS").unwrap_or(DEFAULT_RETRY_DELAY_MS);
        let user_agent =
            env::var("WIKIAUDIT_USER_AGENT").unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string());
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .context("failed to build gateway HTTP client")?;

        let cache = match &options.cache_path {
            Some(path) => Some(Mutex::new(open_cache(path)?)),
            None => None,
        };

        Ok(Self {
            client,
            user_agent,
            retries,
            retry_delay_ms,
            forced_refresh: options.forced_refresh,
            cache,
            last_request_at: Mutex::new(None),
        })
    }

    pub fn cache_stats(&self) -> Result<CacheStats> {
        let Some(cache) = &self.cache else {
            return Ok(CacheStats {
                entries: 0,
                oldest_fetched_at: None,
                newest_fetched_at: None,
            });
        };
        let connection = cache.lock().expect("cache lock poisoned");
        let (entries, oldest, newest) = connection
            .query_row(
                "SELECT COUNT(*), MIN(fetched_at), MAX(fetched_at) FROM responses",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)? as usize,
                        row.get::<_, Option<i64>>(1)?,
                        row.get::<_, Option<i64>>(2)?,
                    ))
                },
            )
            .context("failed to query cache stats")?;
        Ok(CacheStats {
            entries,
            oldest_fetched_at: oldest,
            newest_fetched_at: newest,
        })
    }

    pub fn clear_cache(&self) -> Result<usize> {
        let Some(cache) = &self.cache else {
            return Ok(0);
        };
        let connection = cache.lock().expect("cache lock poisoned");
        let removed = connection
            .execute("DELETE FROM responses", [])
            .context("failed to clear cache")?;
        Ok(removed)
    }

    fn wikipedia_api(language: &str) -> String {
        format!("https://{language}.wikipedia.org/w/api.php")
    }

    fn request_json(&self, api_url: &str, params: &[(&str, &str)]) -> GatewayResult<Value> {
        let cache_key = request_cache_key(api_url, params);
        if !self.forced_refresh
            && let Some(cached) = self.cached_response(&cache_key)
        {
            return serde_json::from_str(&cached)
                .map_err(|error| GatewayError::Unavailable(format!("corrupt cache entry: {error}")));
        }

        let mut pairs = vec![("format", "json"), ("formatversion", "2")];
        pairs.extend_from_slice(params);

        let mut last_error = None::<String>;
        for attempt in 0..=self.retries {
            self.respect_request_spacing();
            let response = self
                .client
                .get(api_url)
                .header("User-Agent", self.user_agent.clone())
                .query(&pairs)
                .send();

            match response {
                Ok(response) if response.status().is_success() => {
                    let body = match response.text() {
                        Ok(body) => body,
                        Err(error) => {
                            last_error = Some(error.to_string());
                            self.backoff(attempt);
                            continue;
                        }
                    };
                    let payload: Value = match serde_json::from_str(&body) {
                        Ok(payload) => payload,
                        Err(error) => {
                            last_error = Some(format!("undecodable response: {error}"));
                            self.backoff(attempt);
                            continue;
                        }
                    };
                    if let Some(error) = payload.get("error") {
                        let code = error
                            .get("code")
                            .and_then(Value::as_str)
                            .unwrap_or("unknown_error");
                        let info = error
                            .get("info")
                            .and_then(Value::as_str)
                            .unwrap_or("unknown info");
                        last_error = Some(format!("api error [{code}]: {info}"));
                        self.backoff(attempt);
                        continue;
                    }
                    self.store_response(&cache_key, api_url, &body);
                    return Ok(payload);
                }
                Ok(response) => {
                    last_error = Some(format!("HTTP {}", response.status()));
                    self.backoff(attempt);
                }
                Err(error) => {
                    last_error = Some(error.to_string());
                    self.backoff(attempt);
                }
            }
        }

        Err(GatewayError::Unavailable(
            last_error.unwrap_or_else(|| "knowledge base request failed".to_string()),
        ))
    }

    fn respect_request_spacing(&self) {
        let mut last = self.last_request_at.lock().expect("spacing lock poisoned");
        if let Some(at) = *last {
            let elapsed = at.elapsed();
            let min_delay = Duration::from_millis(MIN_REQUEST_SPACING_MS);
            if elapsed < min_delay {
                sleep(min_delay - elapsed);
            }
        }
        *last = Some(Instant::now());
    }

    fn backoff(&self, attempt: usize) {
        if attempt < self.retries {
            sleep(Duration::from_millis(
                self.retry_delay_ms.saturating_mul(attempt as u64 + 1),
            ));
        }
    }

    fn cached_response(&self, key: &str) -> Option<String> {
        let cache = self.cache.as_ref()?;
        let connection = cache.lock().expect("cache lock poisoned");
        connection
            .query_row(
                "SELECT body FROM responses WHERE key = ?1",
                [key],
                |row| row.get::<_, String>(0),
            )
            .ok()
    }

    fn store_response(&self, key: &str, url: &str, body: &str) {
        let Some(cache) = &self.cache else {
            return;
        };
        let connection = cache.lock().expect("cache lock poisoned");
        // cache writes are best-effort; a failed insert only costs a refetch
        let _ = connection.execute(
            "INSERT OR REPLACE INTO responses (key, url, body, fetched_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![key, url, body, unix_now()],
        );
    }

    fn entity_payload(&self, id: &EntityId, props: &str) -> GatewayResult<Option<Value>> {
        let payload = self.request_json(
            WIKIDATA_API,
            &[
                ("action", "wbgetentities"),
                ("ids", id.as_str()),
                ("props", props),
            ],
        )?;
        let entity = payload
            .get("entities")
            .and_then(Value::as_object)
            .and_then(|entities| entities.values().next())
            .cloned();
        match entity {
            Some(entity) if entity.get("missing").is_none() => Ok(Some(entity)),
            _ => Ok(None),
        }
    }

    /// Direct instance-of/subclass-of neighbors, ascending by numeric id.
    fn type_neighbors(&self, id: &EntityId) -> GatewayResult<Vec<EntityId>> {
        let mut neighbors = Vec::new();
        for property in ["P31", "P279"] {
            if let Some(claims) = self.claims(id, property)? {
                for claim in claims {
                    if let Some(item) = claim.item {
                        neighbors.push(item);
                    }
                }
            }
        }
        neighbors.sort_by_key(|id| id.as_str()[1..].parse::<u64>().unwrap_or(u64::MAX));
        neighbors.dedup();
        Ok(neighbors)
    }
}

impl KnowledgeGateway for HttpGateway {
    fn entity(&self, id: &EntityId) -> GatewayResult<Option<Entity>> {
        let Some(payload) = self.entity_payload(id, "info")? else {
            return Ok(None);
        };
        let canonical = payload
            .get("id")
            .and_then(Value::as_str)
            .and_then(EntityId::parse)
            .ok_or_else(|| {
                GatewayError::Unavailable(format!("malformed entity payload for {id}"))
            })?;
        Ok(Some(Entity { id: canonical }))
    }

    fn article(&self, language: &str, title: &str) -> GatewayResult<Option<Article>> {
        let payload = self.request_json(
            &Self::wikipedia_api(language),
            &[("action", "query"), ("titles", title), ("redirects", "1")],
        )?;
        let Some(page) = first_page(&payload) else {
            return Ok(None);
        };
        if page.get("missing").is_some() || page.get("invalid").is_some() {
            return Ok(None);
        }
        let canonical = page
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or(title)
            .to_string();
        Ok(Some(Article { title: canonical }))
    }

    fn article_in_language(&self, id: &EntityId, language: &str) -> GatewayResult<Option<String>> {
        let Some(payload) = self.entity_payload(id, "sitelinks")? else {
            return Ok(None);
        };
        let site = format!("{language}wiki");
        Ok(payload
            .get("sitelinks")
            .and_then(|links| links.get(&site))
            .and_then(|link| link.get("title"))
            .and_then(Value::as_str)
            .map(ToString::to_string))
    }

    fn entity_id_for_article(
        &self,
        language: &str,
        title: &str,
    ) -> GatewayResult<Option<EntityId>> {
        let payload = self.request_json(
            &Self::wikipedia_api(language),
            &[
                ("action", "query"),
                ("prop", "pageprops"),
                ("ppprop", "wikibase_item"),
                ("redirects", "1"),
                ("titles", title),
            ],
        )?;
        let Some(page) = first_page(&payload) else {
            return Ok(None);
        };
        Ok(page
            .get("pageprops")
            .and_then(|props| props.get("wikibase_item"))
            .and_then(Value::as_str)
            .and_then(EntityId::parse))
    }

    fn claims(&self, id: &EntityId, property: &str) -> GatewayResult<Option<Vec<Claim>>> {
        let Some(payload) = self.entity_payload(id, "claims")? else {
            return Ok(None);
        };
        let Some(statements) = payload
            .get("claims")
            .and_then(|claims| claims.get(property))
            .and_then(Value::as_array)
        else {
            return Ok(None);
        };
        Ok(Some(statements.iter().map(parse_claim).collect()))
    }

    fn ancestor_type_ids(&self, id: &EntityId) -> GatewayResult<Vec<EntityId>> {
        let mut closure = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from(self.type_neighbors(id)?);
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }
            if visited.len() > MAX_CLOSURE_NODES {
                break;
            }
            queue.extend(self.type_neighbors(&current)?);
            closure.push(current);
        }
        Ok(closure)
    }

    fn location(&self, id: &EntityId) -> GatewayResult<Option<Coordinates>> {
        let Some(claims) = self.claims(id, "P625")? else {
            return Ok(None);
        };
        Ok(claims.into_iter().find_map(|claim| claim.coordinate))
    }

    fn label(&self, id: &EntityId, language: &str) -> GatewayResult<Option<String>> {
        let Some(payload) = self.entity_payload(id, "labels")? else {
            return Ok(None);
        };
        Ok(payload
            .get("labels")
            .and_then(|labels| labels.get(language))
            .and_then(|label| label.get("value"))
            .and_then(Value::as_str)
            .map(ToString::to_string))
    }

    fn article_links(&self, language: &str, title: &str) -> GatewayResult<Vec<String>> {
        let payload = self.request_json(
            &Self::wikipedia_api(language),
            &[
                ("action", "query"),
                ("prop", "links"),
                ("plnamespace", "0"),
                ("pllimit", "500"),
                ("titles", title),
            ],
        )?;
        let Some(page) = first_page(&payload) else {
            return Ok(Vec::new());
        };
        let mut titles = Vec::new();
        if let Some(links) = page.get("links").and_then(Value::as_array) {
            for link in links {
                if let Some(target) = link.get("title").and_then(Value::as_str)
                    && !target.trim().is_empty()
                {
                    titles.push(target.to_string());
                }
            }
        }
        Ok(titles)
    }
}

fn first_page(payload: &Value) -> Option<&Value> {
    payload
        .get("query")
        .and_then(|query| query.get("pages"))
        .and_then(Value::as_array)
        .and_then(|pages| pages.first())
}

fn parse_claim(statement: &Value) -> Claim {
    let datavalue = statement
        .get("mainsnak")
        .and_then(|snak| snak.get("datavalue"))
        .and_then(|datavalue| datavalue.get("value"));

    let item = datavalue
        .and_then(|value| value.get("id"))
        .and_then(Value::as_str)
        .and_then(EntityId::parse);
    let coordinate = datavalue.and_then(parse_coordinate);

    let qualifiers = statement.get("qualifiers");
    let coordinate_qualifier = qualifiers
        .and_then(|qualifiers| qualifiers.get("P625"))
        .and_then(Value::as_array)
        .and_then(|snaks| snaks.first())
        .and_then(|snak| snak.get("datavalue"))
        .and_then(|datavalue| datavalue.get("value"))
        .and_then(parse_coordinate);
    let no_longer_valid = qualifiers
        .and_then(|qualifiers| qualifiers.get("P582"))
        .is_some();

    Claim {
        item,
        coordinate,
        coordinate_qualifier,
        no_longer_valid,
    }
}

fn parse_coordinate(value: &Value) -> Option<Coordinates> {
    let lat = value.get("latitude").and_then(Value::as_f64)?;
    let lon = value.get("longitude").and_then(Value::as_f64)?;
    Some(Coordinates::new(lat, lon))
}

fn request_cache_key(api_url: &str, params: &[(&str, &str)]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_url.as_bytes());
    for (key, value) in params {
        hasher.update([0]);
        hasher.update(key.as_bytes());
        hasher.update([0]);
        hasher.update(value.as_bytes());
    }
    let digest = hasher.finalize();
    let mut output = String::with_capacity(32);
    for byte in digest.iter().take(16) {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}

fn open_cache(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let connection = Connection::open(path)
        .with_context(|| format!("failed to open cache db {}", path.display()))?;
    connection
        .execute_batch(
            "CREATE TABLE IF NOT EXISTS responses (
                key TEXT PRIMARY KEY,
                url TEXT NOT NULL,
                body TEXT NOT NULL,
                fetched_at INTEGER NOT NULL
            );",
        )
        .context("failed to initialize cache schema")?;
    Ok(connection)
}

fn env_number(key: &str) -> Option<u64> {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|value| value.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_keys_distinguish_params_and_urls() {
        let base = request_cache_key(WIKIDATA_API, &[("ids", "Q1")]);
        assert_eq!(base.len(), 32);
        assert_ne!(base, request_cache_key(WIKIDATA_API, &[("ids", "Q2")]));
        assert_ne!(
            base,
            request_cache_key("https://en.wikipedia.org/w/api.php", &[("ids", "Q1")])
        );
        assert_eq!(base, request_cache_key(WIKIDATA_API, &[("ids", "Q1")]));
    }

    #[test]
    fn cache_round_trip_through_sqlite() {
        let dir = tempfile::tempdir().expect("tempdir");
        let gateway = HttpGateway::new(HttpGatewayOptions {
            cache_path: Some(dir.path().join("cache.sqlite")),
            forced_refresh: false,
        })
        .expect("gateway");

        let key = request_cache_key(WIKIDATA_API, &[("ids", "Q1")]);
        assert!(gateway.cached_response(&key).is_none());
        gateway.store_response(&key, WIKIDATA_API, "{\"entities\":{}}");
        assert_eq!(
            gateway.cached_response(&key).as_deref(),
            Some("{\"entities\":{}}")
        );

        let stats = gateway.cache_stats().expect("stats");
        assert_eq!(stats.entries, 1);
        assert_eq!(gateway.clear_cache().expect("clear"), 1);
        assert_eq!(gateway.cache_stats().expect("stats").entries, 0);
    }

    #[test]
    fn claim_parsing_extracts_items_coordinates_and_qualifiers() {
        let statement: Value = serde_json::from_str(
            r#"{
                "mainsnak": {"datavalue": {"value": {"id": "Q36"}}},
                "qualifiers": {
                    "P625": [{"datavalue": {"value": {"latitude": 52.2, "longitude": 21.0}}}],
                    "P582": [{"datavalue": {"value": {"time": "+1989-00-00T00:00:00Z"}}}]
                }
            }"#,
        )
        .expect("json");
        let claim = parse_claim(&statement);
        assert_eq!(claim.item, EntityId::parse("Q36"));
        assert!(claim.coordinate.is_none());
        let qualifier = claim.coordinate_qualifier.expect("qualifier");
        assert!((qualifier.lat - 52.2).abs() < 1e-9);
        assert!(claim.no_longer_valid);
    }

    #[test]
    fn coordinate_claim_parsing() {
        let statement: Value = serde_json::from_str(
            r#"{"mainsnak": {"datavalue": {"value": {"latitude": 50.06, "longitude": 19.94}}}}"#,
        )
        .expect("json");
        let claim = parse_claim(&statement);
        assert!(claim.item.is_none());
        let coordinate = claim.coordinate.expect("coordinate");
        assert!((coordinate.lon - 19.94).abs() < 1e-9);
        assert!(!claim.no_longer_valid);
    }
}
