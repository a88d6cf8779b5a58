use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use wikiaudit_core::config::{AuditConfig, load_config};
use wikiaudit_core::detector::{IssueDetector, ObjectKind};
use wikiaudit_core::gateway::GatewayError;
use wikiaudit_core::gateway::http::{HttpGateway, HttpGatewayOptions};
use wikiaudit_core::geo::Coordinates;
use wikiaudit_core::report::{Finding, Tags};

const DEFAULT_CONFIG_PATH: &str = ".wikiaudit/config.toml";
const DEFAULT_CACHE_PATH: &str = ".wikiaudit/cache.sqlite";

/// Exit code when the knowledge base could not be reached; distinct from
/// usage errors so batch callers can retry instead of giving up.
const EXIT_UNAVAILABLE: i32 = 2;

#[derive(Debug, Parser)]
#[command(
    name = "wikiaudit",
    version,
    about = "Audit wikipedia/wikidata cross-references on OSM-style features"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH")]
    cache: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Audit one feature's tags and print the highest-priority finding
    Check(CheckArgs),
    /// Configuration inspection
    Config(ConfigArgs),
    /// Gateway response cache maintenance
    Cache(CacheArgs),
}

#[derive(Debug, Args)]
struct CheckArgs {
    /// Feature tag, repeatable, as key=value
    #[arg(long = "tag", value_name = "KEY=VALUE")]
    tags: Vec<String>,
    #[arg(long, value_enum, default_value_t = KindArg::Node)]
    kind: KindArg,
    /// Feature latitude; enables location-dependent checks
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    lat: Option<f64>,
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,
    /// Human-readable name of the feature, used in messages
    #[arg(long, default_value = "the audited object")]
    description: String,
    /// Language the wikipedia tag is expected to use
    #[arg(long, value_name = "CODE")]
    expected_language: Option<String>,
    /// Preferred replacement-article language, repeatable, in order
    #[arg(long = "prefer-language", value_name = "CODE")]
    prefer_languages: Vec<String>,
    #[arg(long, value_enum, default_value_t = FormatArg::Yaml)]
    format: FormatArg,
    /// Also append the finding to a YAML report file
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
    /// Bypass the gateway response cache
    #[arg(long)]
    forced_refresh: bool,
    /// Attach resolution diagnostics to the finding
    #[arg(long)]
    additional_debug: bool,
    #[arg(long)]
    allow_requesting_edits_outside_osm: bool,
    #[arg(long)]
    allow_false_positives: bool,
}

#[derive(Debug, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Debug, Subcommand)]
enum ConfigSubcommand {
    /// Print the effective configuration
    Show,
}

#[derive(Debug, Args)]
struct CacheArgs {
    #[command(subcommand)]
    command: CacheSubcommand,
}

#[derive(Debug, Subcommand)]
enum CacheSubcommand {
    /// Print entry count and age range of the response cache
    Stats,
    /// Drop every cached response
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum KindArg {
    Node,
    Way,
    Relation,
}

impl From<KindArg> for ObjectKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Node => ObjectKind::Node,
            KindArg::Way => ObjectKind::Way,
            KindArg::Relation => ObjectKind::Relation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Yaml,
    Json,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let cache_path = cli
        .cache
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_PATH));

    match cli.command {
        Commands::Check(args) => run_check(&config_path, &cache_path, args),
        Commands::Config(ConfigArgs {
            command: ConfigSubcommand::Show,
        }) => run_config_show(&config_path),
        Commands::Cache(CacheArgs { command }) => run_cache(&cache_path, command),
    }
}

fn run_check(config_path: &PathBuf, cache_path: &PathBuf, args: CheckArgs) -> Result<()> {
    let config = effective_config(config_path, &args)?;
    let tags = parse_tags(&args.tags)?;
    let location = match (args.lat, args.lon) {
        (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
        _ => None,
    };

    let gateway = HttpGateway::new(HttpGatewayOptions {
        cache_path: Some(cache_path.clone()),
        forced_refresh: config.forced_refresh,
    })?;
    let detector = IssueDetector::new(config, &gateway);

    let outcome = match location {
        Some(location) => detector.problem_for_located_feature(
            &tags,
            args.kind.into(),
            &args.description,
            location,
        ),
        None => detector.problem_for_tags(&tags, args.kind.into(), &args.description),
    };

    match outcome {
        Ok(Some(finding)) => {
            if let Some(path) = &args.output {
                finding.append_yaml(path)?;
            }
            print_finding(&finding, args.format)
        }
        Ok(None) => {
            println!("no problem found");
            Ok(())
        }
        Err(GatewayError::Unavailable(reason)) => {
            eprintln!("knowledge base unavailable: {reason}");
            process::exit(EXIT_UNAVAILABLE);
        }
    }
}

fn effective_config(config_path: &PathBuf, args: &CheckArgs) -> Result<AuditConfig> {
    let mut config = load_config(config_path)?;
    if let Some(code) = &args.expected_language {
        config.expected_language_code = Some(code.clone());
    }
    if !args.prefer_languages.is_empty() {
        config.languages_ordered_by_preference = args.prefer_languages.clone();
    }
    config.forced_refresh = args.forced_refresh;
    config.additional_debug = args.additional_debug;
    config.allow_requesting_edits_outside_osm |= args.allow_requesting_edits_outside_osm;
    config.allow_false_positives |= args.allow_false_positives;
    config.validate()?;
    Ok(config)
}

fn parse_tags(raw: &[String]) -> Result<Tags> {
    let mut tags = Tags::new();
    for entry in raw {
        let Some((key, value)) = entry.split_once('=') else {
            bail!("tag {entry} is not in key=value form");
        };
        if key.is_empty() {
            bail!("tag {entry} has an empty key");
        }
        if tags.insert(key.to_string(), value.to_string()).is_some() {
            bail!("tag key {key} given more than once");
        }
    }
    Ok(tags)
}

fn print_finding(finding: &Finding, format: FormatArg) -> Result<()> {
    let rendered = match format {
        FormatArg::Yaml => {
            serde_yaml::to_string(finding).context("failed to render finding as YAML")?
        }
        FormatArg::Json => {
            serde_json::to_string_pretty(finding).context("failed to render finding as JSON")?
        }
    };
    println!("{rendered}");
    Ok(())
}

fn run_config_show(config_path: &PathBuf) -> Result<()> {
    let config = load_config(config_path)?;
    println!("config_path: {}", config_path.display());
    println!("config_exists: {}", config_path.exists());
    println!(
        "expected_language_code: {}",
        config
            .expected_language_code
            .as_deref()
            .unwrap_or("(unset)")
    );
    println!(
        "languages_ordered_by_preference: {}",
        if config.languages_ordered_by_preference.is_empty() {
            "(none)".to_string()
        } else {
            config.languages_ordered_by_preference.join(", ")
        }
    );
    println!(
        "allow_requesting_edits_outside_osm: {}",
        config.allow_requesting_edits_outside_osm
    );
    println!("allow_false_positives: {}", config.allow_false_positives);
    Ok(())
}

fn run_cache(cache_path: &PathBuf, command: CacheSubcommand) -> Result<()> {
    let gateway = HttpGateway::new(HttpGatewayOptions {
        cache_path: Some(cache_path.clone()),
        forced_refresh: false,
    })?;
    match command {
        CacheSubcommand::Stats => {
            let stats = gateway.cache_stats()?;
            println!("cache_path: {}", cache_path.display());
            println!("entries: {}", stats.entries);
            println!(
                "oldest_fetched_at: {}",
                stats
                    .oldest_fetched_at
                    .map(|at| at.to_string())
                    .unwrap_or_else(|| "n/a".to_string())
            );
            println!(
                "newest_fetched_at: {}",
                stats
                    .newest_fetched_at
                    .map(|at| at.to_string())
                    .unwrap_or_else(|| "n/a".to_string())
            );
        }
        CacheSubcommand::Clear => {
            let removed = gateway.clear_cache()?;
            println!("removed {removed} cached responses");
        }
    }
    Ok(())
}
