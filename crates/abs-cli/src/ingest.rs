//! Scraper batch documents fed to `abs ingest`.

use abs_archivist::{
    ObserveOptions, ScopeFilter, Session, SyncEngine, SyncError, UniverseFetcher, WriteMode,
};
use abs_core::records::{RawFields, RecordKey};
use abs_core::schema::EntityKind;
use abs_storage::RecordStore;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct IngestDocument {
    pub kind: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub mode: WriteMode,
    #[serde(default)]
    pub scope: Option<ScopeSpec>,
    /// Scrape mark to set once the batch went through.
    #[serde(default)]
    pub mark: Option<String>,
    pub records: Vec<RawFields>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ScopeSpec {
    Index { index: String, value: Value },
    Prefix { prefix: String },
    Whole(WholeKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WholeKind {
    All,
}

impl ScopeSpec {
    /// Relation scopes accept any label the session knows, stored rows hold the code.
    pub fn to_filter(&self, session: &Session) -> Result<ScopeFilter> {
        Ok(match self {
            Self::Index { index, value } => {
                let key = RecordKey::from_value(value).with_context(|| {
                    format!("scope value for {index} must be a string or number")
                })?;
                match index.as_str() {
                    "relation" => {
                        let label = key.to_string();
                        let relation = session
                            .normalize_relation(&label)
                            .ok_or_else(|| anyhow!("unknown relation {label:?} in scope"))?;
                        ScopeFilter::relation(relation)
                    }
                    "world" => ScopeFilter::world(&key),
                    _ => ScopeFilter::index(index.clone(), key.storage_key()),
                }
            }
            Self::Prefix { prefix } => ScopeFilter::KeyPrefix(prefix.clone()),
            Self::Whole(WholeKind::All) => ScopeFilter::All,
        })
    }
}

impl IngestDocument {
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("failed to parse ingest document")
    }

    pub fn entity_kind(&self) -> Result<EntityKind, SyncError> {
        Ok(self.kind.parse()?)
    }

    pub fn options(&self) -> ObserveOptions {
        ObserveOptions {
            source: self.source.clone(),
            mode: self.mode,
        }
    }
}

/// Runs the document through the engine and returns the report as JSON.
pub fn run_ingest<F: UniverseFetcher>(
    engine: &SyncEngine<F>,
    store: &RecordStore,
    document: IngestDocument,
) -> Result<Value> {
    let kind = document.entity_kind()?;
    let options = document.options();
    let report = match &document.scope {
        Some(scope) => {
            let filter = scope.to_filter(engine.session())?;
            let report = engine.reconcile_scope(store, kind, &filter, document.records, &options)?;
            serde_json::to_value(&report)?
        }
        None => {
            let report = engine.observe_batch(store, kind, document.records, &options)?;
            serde_json::to_value(&report)?
        }
    };

    if let Some(mark) = &document.mark {
        store.mark_scraped(mark, engine.session().now())?;
        info!(mark = %mark, "scrape mark set");
    }
    Ok(report)
}
