mod config;
mod ingest;

use abs_archivist::survey::{self, SurveyEntry, SurveyFilter, SURVEY_KINDS};
use abs_archivist::{HttpFetcher, OfflineFetcher, Session, SyncEngine, UniverseFetcher};
use abs_core::geo::{self, Direction};
use abs_core::parse::parse_coordinates;
use abs_core::records::RecordKey;
use abs_core::relation::{normalize_relation, RelationAliases};
use abs_core::schema::EntityKind;
use abs_storage::RecordStore;
use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use config::{config_path, load_config, AbsConfig};
use ingest::{run_ingest, IngestDocument};
use serde_json::json;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "abs")]
#[command(about = "AtmoBurn archivist: local record store for scraped game data", long_about = None)]
struct Cli {
    /// Config file (default: $ABS_CONFIG_PATH or <config dir>/abs/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    database: Option<PathBuf>,
    /// Local player name
    #[arg(long, global = true)]
    player: Option<String>,
    /// Never contact the game API
    #[arg(long, global = true, default_value_t = false)]
    offline: bool,
    #[arg(long, global = true, default_value_t = false)]
    debug: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Observe or reconcile a batch of scraped records (`-` reads stdin)
    Ingest { file: PathBuf },
    /// Print every stored record of a kind as JSON
    Dump { kind: String },
    /// Delete every record of a kind, or of all kinds
    Clear {
        target: String,
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
    /// Check whether a stored record was observed recently
    Fresh {
        kind: String,
        id: String,
        #[arg(long, default_value_t = 86_400)]
        max_age: i64,
    },
    /// List stored entities nearest to a reference point
    #[command(group(ArgGroup::new("origin").required(true).args(["from", "fleet", "colony"])))]
    Survey {
        /// Coordinates, e.g. "12.5, -3, 40"
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        fleet: Option<String>,
        #[arg(long)]
        colony: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
        /// Relations to leave out, e.g. m,f
        #[arg(long, value_delimiter = ',')]
        hide: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        kinds: Vec<String>,
    },
    /// Heading, elevation and distance between two coordinates
    Direction { from: String, to: String },
    /// List recorded scrape marks
    Marks,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let config_file = cli.config.clone().unwrap_or_else(config_path);
    let config = load_config(&config_file)?;
    debug!(config = %config_file.display(), "config loaded");

    if let Commands::Direction { from, to } = &cli.command {
        return print_direction(from, to);
    }

    let database = cli.database.clone().unwrap_or_else(|| config.database_path());
    let store = open_store(&database)?;
    let offline = cli.offline || config.offline;
    let player = cli.player.clone().or_else(|| config.player.clone());

    match cli.command {
        Commands::Ingest { file } => {
            let engine = build_engine(&config, offline, player.as_deref())?;
            let document = IngestDocument::parse(&read_input(&file)?)?;
            let report = run_ingest(&engine, &store, document)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Dump { kind } => {
            let kind: EntityKind = kind.parse()?;
            let records: Vec<_> = store
                .all(kind)?
                .iter()
                .map(|entity| entity.to_fields())
                .collect();
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Commands::Clear { target, yes } => {
            let kinds = if target.trim().eq_ignore_ascii_case("all") {
                EntityKind::ALL.to_vec()
            } else {
                vec![target.parse::<EntityKind>()?]
            };
            if !yes {
                bail!("refusing to clear {target} without --yes");
            }
            for kind in kinds {
                let removed = store.clear(kind)?;
                info!(kind = %kind, removed, "cleared");
                println!("{kind}: removed {removed}");
            }
        }
        Commands::Fresh { kind, id, max_age } => {
            let kind: EntityKind = kind.parse()?;
            let key = RecordKey::parse(&id).context("id must not be empty")?;
            let engine = SyncEngine::new(OfflineFetcher, Session::new());
            let record = store.get(kind, &key)?;
            let fresh = engine.is_fresh(record.as_ref(), chrono::Duration::seconds(max_age));
            let output = json!({
                "kind": kind,
                "id": key,
                "fresh": fresh,
                "observed_at": record.as_ref().and_then(|entity| entity.observed_at()),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Survey {
            from,
            fleet,
            colony,
            limit,
            hide,
            kinds,
        } => {
            let origin = match (from, fleet, colony) {
                (Some(text), _, _) => parse_coordinates(&text)?,
                (_, Some(id), _) => stored_origin(&store, EntityKind::Fleet, &id)?,
                (_, _, Some(id)) => stored_origin(&store, EntityKind::Colony, &id)?,
                _ => bail!("a reference point is required"),
            };
            let filter = survey_filter(&hide, &kinds, limit)?;
            for entry in survey::survey(&store, origin, &filter)? {
                println!("{}", format_entry(&entry));
            }
        }
        Commands::Marks => {
            for mark in store.scrape_marks()? {
                println!("{}\t{}", mark.name, mark.scraped_at.to_rfc3339());
            }
        }
        Commands::Direction { .. } => {}
    }

    Ok(())
}

fn init_logging(debug: bool) {
    let level = if debug {
        "debug".to_string()
    } else if let Ok(level) = std::env::var("ABS_LOG_LEVEL") {
        level
    } else {
        "info".to_string()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("logging already initialized");
    }
}

fn open_store(path: &Path) -> Result<RecordStore> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    RecordStore::open(path).with_context(|| format!("failed to open {}", path.display()))
}

fn build_engine(
    config: &AbsConfig,
    offline: bool,
    player: Option<&str>,
) -> Result<SyncEngine<Box<dyn UniverseFetcher>>> {
    let fetcher: Box<dyn UniverseFetcher> = if offline {
        Box::new(OfflineFetcher)
    } else {
        Box::new(HttpFetcher::new(&config.api_base_url, config.fetch_timeout())?)
    };

    let mut session = Session::new().with_relation_aliases(config.relation_aliases());
    if let Some(players) = &config.neutral_players {
        session = session.with_neutral_players(players.iter().cloned());
    }
    if let Some(player) = player {
        session.set_local_player(player);
    }
    Ok(SyncEngine::new(fetcher, session))
}

fn read_input(file: &Path) -> Result<String> {
    if file == Path::new("-") {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("failed to read stdin")?;
        return Ok(text);
    }
    fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))
}

fn stored_origin(store: &RecordStore, kind: EntityKind, id: &str) -> Result<geo::Point> {
    let key = RecordKey::parse(id).context("id must not be empty")?;
    survey::reference_point(store, kind, &key)?
        .with_context(|| format!("{kind} {key} has no stored position"))
}

fn survey_filter(hide: &[String], kinds: &[String], limit: Option<usize>) -> Result<SurveyFilter> {
    let aliases = RelationAliases::default();
    let kinds = if kinds.is_empty() {
        SURVEY_KINDS.to_vec()
    } else {
        kinds
            .iter()
            .map(|kind| kind.parse::<EntityKind>())
            .collect::<Result<Vec<_>, _>>()?
    };
    Ok(SurveyFilter {
        kinds,
        hide_relations: hide
            .iter()
            .filter_map(|label| normalize_relation(label, &aliases))
            .collect(),
        limit,
    })
}

fn print_direction(from: &str, to: &str) -> Result<()> {
    let from = parse_coordinates(from)?;
    let to = parse_coordinates(to)?;
    println!("{}", describe_direction(&geo::direction(from, to)));
    Ok(())
}

/// Distance in millions of km, two decimals.
fn format_distance(distance: i64) -> String {
    format!("{:.2} Mkm", distance as f64 / 1e6)
}

fn describe_direction(direction: &Direction) -> String {
    let heading = match &direction.horizontal {
        Some(bearing) => format!(
            "{} {} ({} o'clock, {:.0}°)",
            bearing.arrow, bearing.compass, bearing.clock, bearing.degrees
        ),
        None => "overhead".to_string(),
    };
    let vertical = match direction.vertical {
        0 => "level".to_string(),
        up if up > 0 => format!("{up}° up"),
        down => format!("{}° down", -down),
    };
    format!(
        "{heading}, {vertical}, {}",
        format_distance(direction.distance)
    )
}

fn format_entry(entry: &SurveyEntry) -> String {
    let name = entry.name.as_deref().unwrap_or("-");
    let relation = entry
        .relation
        .map(|relation| relation.to_string())
        .unwrap_or_else(|| "-".to_string());
    let placement = match &entry.direction {
        Some(direction) => describe_direction(direction),
        None => "position unknown".to_string(),
    };
    format!(
        "{:<6} {:<12} {:<2} {:<24} {}",
        entry.kind.as_str(),
        entry.key.to_string(),
        relation,
        name,
        placement
    )
}
