//! Merges scraped AtmoBurn observations into the local record store.
//!
//! [`SyncEngine`] sanitizes each observation, fixes up ownership, resolves
//! missing coordinates through the colony → world → system chain and commits
//! the result. Scope reconciliation is the only path that deletes records.
//!
//! The engine assumes a single writer per scope; it takes no locks.

pub mod fetch;
mod locate;
pub mod session;
pub mod survey;

use abs_core::records::{is_unchanged, Entity, RawFields, RecordKey, SanitizeError, WormholeRecord};
use abs_core::relation::Relation;
use abs_core::schema::{EntityKind, SchemaError, PROVENANCE_FIELDS};
use abs_storage::{RecordStore, StorageError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use fetch::{FetchError, HttpFetcher, OfflineFetcher, UniverseFetcher};
pub use locate::LocationStep;
pub use session::{Clock, FixedClock, Session, SystemClock};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    UnknownKind(#[from] SchemaError),
    #[error("[{kind}] 'id' is required")]
    MissingPrimaryKey { kind: EntityKind },
    #[error("validation error: {0}")]
    Validation(String),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("storage error: {0}")]
    Storage(StorageError),
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),
    #[error("{kind} records are never pruned by reconciliation")]
    NotReconcilable { kind: EntityKind },
}

impl From<SanitizeError> for SyncError {
    fn from(err: SanitizeError) -> Self {
        match err {
            SanitizeError::MissingPrimaryKey { kind } => Self::MissingPrimaryKey { kind },
            invalid @ SanitizeError::Invalid { .. } => Self::Validation(invalid.to_string()),
        }
    }
}

impl From<StorageError> for SyncError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Unavailable(message) => Self::StorageUnavailable(message),
            StorageError::Validation(message) => Self::Validation(message),
            StorageError::Sanitize(err) => Self::from(err),
            other => Self::Storage(other),
        }
    }
}

/// Non-fatal issues attached to an otherwise committed observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum SyncWarning {
    UnresolvedLocation {
        kind: EntityKind,
        key: RecordKey,
    },
    FetchFailed {
        kind: EntityKind,
        key: RecordKey,
        step: LocationStep,
        message: String,
    },
}

impl fmt::Display for SyncWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedLocation { kind, key } => {
                write!(f, "{kind} {key}: location could not be resolved")
            }
            Self::FetchFailed {
                kind,
                key,
                step,
                message,
            } => write!(f, "{kind} {key}: {step} lookup failed: {message}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Present attributes overwrite, absent ones keep their stored value.
    #[default]
    Merge,
    /// The observation replaces the stored record.
    Replace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserveOptions {
    /// Scraper code stamped as `source`, e.g. `fo` for the fleet overview.
    pub source: String,
    pub mode: WriteMode,
}

impl ObserveOptions {
    pub fn merge(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            mode: WriteMode::Merge,
        }
    }

    pub fn replace(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            mode: WriteMode::Replace,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    Inserted,
    Updated,
    Unchanged,
}

impl WriteOutcome {
    pub fn wrote(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObserveOutcome {
    pub kind: EntityKind,
    pub key: RecordKey,
    pub outcome: WriteOutcome,
    pub warnings: Vec<SyncWarning>,
}

#[derive(Debug, Serialize)]
pub struct RecordFailure {
    /// Position of the observation in the submitted batch.
    pub index: usize,
    pub key: Option<RecordKey>,
    #[serde(serialize_with = "serialize_display")]
    pub error: SyncError,
}

#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
    pub succeeded: usize,
    pub written: usize,
    pub unchanged: usize,
    pub failures: Vec<RecordFailure>,
    pub warnings: Vec<SyncWarning>,
}

impl BatchReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

#[derive(Debug, Serialize)]
pub struct ReconcileReport {
    pub kind: EntityKind,
    #[serde(flatten)]
    pub batch: BatchReport,
    pub deleted: Vec<RecordKey>,
}

/// Subset of a kind the caller claims to see completely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeFilter {
    Index { index: String, value: String },
    KeyPrefix(String),
    All,
}

impl ScopeFilter {
    pub fn index(index: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Index {
            index: index.into(),
            value: value.into(),
        }
    }

    pub fn relation(relation: Relation) -> Self {
        Self::index("relation", relation.as_code_string())
    }

    pub fn world(world: &RecordKey) -> Self {
        Self::index("world", world.storage_key())
    }

    /// One rally point sub-database, personal or empire.
    pub fn rally_points(empire_db: bool) -> Self {
        Self::KeyPrefix(abs_core::records::RallyPointRecord::scope_prefix(empire_db))
    }

    fn validate(&self, kind: EntityKind) -> Result<(), SyncError> {
        match self {
            Self::Index { index, .. } if !kind.has_index(index) => {
                Err(SyncError::Storage(StorageError::UnknownIndex {
                    kind,
                    index: index.clone(),
                }))
            }
            _ => Ok(()),
        }
    }

    fn stored_keys(
        &self,
        store: &RecordStore,
        kind: EntityKind,
    ) -> Result<Vec<RecordKey>, StorageError> {
        match self {
            Self::Index { index, value } => store.keys_by_index(kind, index, value),
            Self::KeyPrefix(prefix) => store.keys_with_prefix(kind, prefix),
            Self::All => store.keys(kind),
        }
    }
}

impl fmt::Display for ScopeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index { index, value } => write!(f, "{index}={value}"),
            Self::KeyPrefix(prefix) => write!(f, "id^={prefix}"),
            Self::All => f.write_str("all"),
        }
    }
}

/// `false` when the record is absent, unstamped, or older than `max_age`.
pub fn is_fresh(record: Option<&Entity>, max_age: Duration, now: DateTime<Utc>) -> bool {
    record
        .and_then(Entity::observed_at)
        .is_some_and(|observed_at| observed_at >= now - max_age)
}

pub struct SyncEngine<F> {
    fetcher: F,
    session: Session,
}

impl<F: UniverseFetcher> SyncEngine<F> {
    pub fn new(fetcher: F, session: Session) -> Self {
        Self { fetcher, session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Sanitizes, enriches and commits one observation.
    pub fn observe(
        &self,
        store: &RecordStore,
        kind: EntityKind,
        raw: RawFields,
        options: &ObserveOptions,
    ) -> Result<ObserveOutcome, SyncError> {
        let mut entity = self.prepare(kind, raw)?;
        let warnings = self.resolve_location(store, &mut entity)?;
        entity.set_provenance(self.session.now(), &options.source);

        let outcome = commit(store, &entity, options.mode)?;
        debug!(
            kind = %kind,
            key = %entity.key(),
            outcome = ?outcome,
            source = %options.source,
            "observation committed"
        );
        Ok(ObserveOutcome {
            kind,
            key: entity.key().clone(),
            outcome,
            warnings,
        })
    }

    /// Observes each record in order; per-record failures are collected.
    ///
    /// Only an unavailable store aborts the batch.
    pub fn observe_batch(
        &self,
        store: &RecordStore,
        kind: EntityKind,
        records: Vec<RawFields>,
        options: &ObserveOptions,
    ) -> Result<BatchReport, SyncError> {
        let mut report = BatchReport::default();
        for (index, raw) in records.into_iter().enumerate() {
            self.observe_into(store, kind, index, raw, options, &mut report)?;
        }
        info!(
            kind = %kind,
            succeeded = report.succeeded,
            written = report.written,
            failed = report.failed(),
            "batch observed"
        );
        Ok(report)
    }

    /// Upserts a complete observed set, then deletes stored members of the
    /// scope that were not observed.
    pub fn reconcile_scope(
        &self,
        store: &RecordStore,
        kind: EntityKind,
        scope: &ScopeFilter,
        observed: Vec<RawFields>,
        options: &ObserveOptions,
    ) -> Result<ReconcileReport, SyncError> {
        if !kind.reconcilable() {
            return Err(SyncError::NotReconcilable { kind });
        }
        scope.validate(kind)?;

        let mut batch = BatchReport::default();
        let mut observed_keys = BTreeSet::new();
        for (index, raw) in observed.into_iter().enumerate() {
            if let Some(key) = self.observe_into(store, kind, index, raw, options, &mut batch)? {
                observed_keys.insert(key);
            }
        }

        let stale: Vec<RecordKey> = scope
            .stored_keys(store, kind)?
            .into_iter()
            .filter(|key| !observed_keys.contains(key))
            .collect();
        let removed = store.bulk_delete(kind, &stale)?;
        if removed > 0 {
            info!(kind = %kind, scope = %scope, removed, "deleted records missing from scope");
        }

        Ok(ReconcileReport {
            kind,
            batch,
            deleted: stale,
        })
    }

    pub fn is_fresh(&self, record: Option<&Entity>, max_age: Duration) -> bool {
        is_fresh(record, max_age, self.session.now())
    }

    pub fn is_stored_fresh(
        &self,
        store: &RecordStore,
        kind: EntityKind,
        key: &RecordKey,
        max_age: Duration,
    ) -> Result<bool, SyncError> {
        let record = store.get(kind, key)?;
        Ok(self.is_fresh(record.as_ref(), max_age))
    }

    /// Returns the observation's key, when one is known, whether or not the
    /// write succeeded.
    fn observe_into(
        &self,
        store: &RecordStore,
        kind: EntityKind,
        index: usize,
        raw: RawFields,
        options: &ObserveOptions,
        report: &mut BatchReport,
    ) -> Result<Option<RecordKey>, SyncError> {
        let key = raw.get("id").and_then(RecordKey::from_value);
        match self.observe(store, kind, raw, options) {
            Ok(outcome) => {
                let key = outcome.key.clone();
                report.succeeded += 1;
                if outcome.outcome.wrote() {
                    report.written += 1;
                } else {
                    report.unchanged += 1;
                }
                for warning in &outcome.warnings {
                    warn!(%warning, "observation stored with warning");
                }
                report.warnings.extend(outcome.warnings);
                Ok(Some(key))
            }
            Err(SyncError::StorageUnavailable(message)) => {
                Err(SyncError::StorageUnavailable(message))
            }
            Err(error) => {
                warn!(kind = %kind, index, %error, "observation skipped");
                report.failures.push(RecordFailure {
                    index,
                    key: key.clone(),
                    error,
                });
                Ok(key)
            }
        }
    }

    /// Provenance stripping, key derivation, relation normalization,
    /// sanitize and ownership fixups.
    fn prepare(&self, kind: EntityKind, mut raw: RawFields) -> Result<Entity, SyncError> {
        for field in PROVENANCE_FIELDS {
            raw.remove(field);
        }

        if kind == EntityKind::Wormhole && raw.get("id").and_then(RecordKey::from_value).is_none()
        {
            let derived = raw
                .get("name")
                .and_then(Value::as_str)
                .zip(raw.get("system").and_then(RecordKey::from_value))
                .and_then(|(name, system)| WormholeRecord::derive_key(name, &system));
            if let Some(key) = derived {
                raw.insert("id".to_string(), key.to_value());
            }
        }

        let relation = match raw.get("relation") {
            Some(Value::String(label)) => Some(self.session.normalize_relation(label)),
            _ => None,
        };
        match relation {
            Some(Some(relation)) => {
                raw.insert(
                    "relation".to_string(),
                    Value::from(relation.as_code_string()),
                );
            }
            Some(None) => {
                raw.remove("relation");
            }
            None => {}
        }

        let mut entity = Entity::from_fields(kind, &raw)?;
        self.session.fix_affiliation(&mut entity);
        Ok(entity)
    }
}

fn commit(
    store: &RecordStore,
    entity: &Entity,
    mode: WriteMode,
) -> Result<WriteOutcome, SyncError> {
    let kind = entity.kind();
    let existed = store.contains(kind, entity.key())?;
    let wrote = match mode {
        WriteMode::Merge => store.update_if_changed(entity)?,
        WriteMode::Replace => {
            let unchanged = kind.is_static()
                && match store.get(kind, entity.key())? {
                    Some(stored) => is_unchanged(kind, &stored.to_fields(), &entity.to_fields()),
                    None => false,
                };
            if !unchanged {
                store.put(entity)?;
            }
            !unchanged
        }
    };

    Ok(match (wrote, existed) {
        (false, _) => WriteOutcome::Unchanged,
        (true, true) => WriteOutcome::Updated,
        (true, false) => WriteOutcome::Inserted,
    })
}

fn serialize_display<T: fmt::Display, S: Serializer>(
    value: &T,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}
