use abs_core::records::{is_unchanged, Entity, RawFields, RecordKey, SanitizeError};
use abs_core::schema::EntityKind;
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

pub const ABS_SCHEMA_VERSION: i64 = 2;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(rusqlite::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("timestamp parse error: {0}")]
    Timestamp(String),
    #[error("unsupported schema version {found}, max supported {supported}")]
    UnsupportedSchemaVersion { found: i64, supported: i64 },
    #[error("validation error: {0}")]
    Validation(String),
    #[error("{kind} has no index named {index}")]
    UnknownIndex { kind: EntityKind, index: String },
    #[error(transparent)]
    Sanitize(#[from] SanitizeError),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
                Self::Unavailable(err.to_string())
            }
            _ => Self::Sqlite(err),
        }
    }
}

/// Last complete scrape of one game screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeMark {
    pub name: String,
    pub scraped_at: DateTime<Utc>,
}

/// Per-kind entity tables in one SQLite database.
///
/// Every row holds the sanitized record as JSON plus a few projected columns
/// for the kind's declared indexes.
pub struct RecordStore {
    conn: Connection,
}

impl RecordStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn schema_version(&self) -> Result<i64, StorageError> {
        Ok(self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    pub fn migrate(&self) -> Result<(), StorageError> {
        let mut current = self.schema_version()?;
        if current > ABS_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedSchemaVersion {
                found: current,
                supported: ABS_SCHEMA_VERSION,
            });
        }

        if current < 1 {
            let sql = include_str!("../migrations/0001_entity_tables.sql");
            self.conn.execute_batch(sql)?;
            self.conn
                .execute("PRAGMA user_version = 1", [])
                .map(|_| ())?;
            current = 1;
        }

        if current < 2 {
            let sql = include_str!("../migrations/0002_scrape_marks.sql");
            self.conn.execute_batch(sql)?;
            self.conn
                .execute("PRAGMA user_version = 2", [])
                .map(|_| ())?;
        }

        Ok(())
    }

    pub fn get(&self, kind: EntityKind, key: &RecordKey) -> Result<Option<Entity>, StorageError> {
        self.get_fields(kind, key)?
            .map(|fields| decode(kind, &fields))
            .transpose()
    }

    pub fn contains(&self, kind: EntityKind, key: &RecordKey) -> Result<bool, StorageError> {
        let sql = format!("SELECT 1 FROM {} WHERE id = ?1 LIMIT 1", kind.table_name());
        let found = self
            .conn
            .query_row(&sql, [key.storage_key()], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    /// Unconditional upsert; replaces every attribute of an existing record.
    pub fn put(&self, entity: &Entity) -> Result<(), StorageError> {
        write_row(&self.conn, entity)
    }

    /// Inserts, or merges the entity's present attributes over the stored record.
    ///
    /// For static kinds the write is skipped when no present attribute differs
    /// from what is stored. Returns whether a write happened.
    pub fn update_if_changed(&self, entity: &Entity) -> Result<bool, StorageError> {
        let kind = entity.kind();
        let incoming = entity.to_fields();
        let Some(mut merged) = self.get_fields(kind, entity.key())? else {
            self.put(entity)?;
            return Ok(true);
        };

        if kind.is_static() && is_unchanged(kind, &merged, &incoming) {
            return Ok(false);
        }

        for (name, value) in incoming {
            if !value.is_null() {
                merged.insert(name, value);
            }
        }
        self.put(&Entity::from_fields(kind, &merged)?)?;
        Ok(true)
    }

    /// Overwrites every entity inside one transaction.
    pub fn bulk_put(&self, entities: &[Entity]) -> Result<usize, StorageError> {
        let tx = self.conn.unchecked_transaction()?;
        for entity in entities {
            write_row(&tx, entity)?;
        }
        tx.commit()?;
        Ok(entities.len())
    }

    /// Applies [`Self::update_if_changed`] one entity at a time.
    pub fn bulk_update_if_changed(&self, entities: &[Entity]) -> Result<usize, StorageError> {
        let mut written = 0;
        for entity in entities {
            if self.update_if_changed(entity)? {
                written += 1;
            }
        }
        Ok(written)
    }

    pub fn scan_by_index(
        &self,
        kind: EntityKind,
        index: &str,
        value: &str,
    ) -> Result<Vec<Entity>, StorageError> {
        let column = index_column(kind, index)?;
        let sql = format!(
            "SELECT id, attrs_json FROM {} WHERE {column} = ?1 ORDER BY id",
            kind.table_name()
        );
        self.decode_rows(kind, &sql, [value])
    }

    pub fn keys_by_index(
        &self,
        kind: EntityKind,
        index: &str,
        value: &str,
    ) -> Result<Vec<RecordKey>, StorageError> {
        let column = index_column(kind, index)?;
        let sql = format!(
            "SELECT id FROM {} WHERE {column} = ?1 ORDER BY id",
            kind.table_name()
        );
        self.key_rows(&sql, [value])
    }

    pub fn keys_with_prefix(
        &self,
        kind: EntityKind,
        prefix: &str,
    ) -> Result<Vec<RecordKey>, StorageError> {
        let sql = format!(
            "SELECT id FROM {} WHERE substr(id, 1, length(?1)) = ?1 ORDER BY id",
            kind.table_name()
        );
        self.key_rows(&sql, [prefix])
    }

    pub fn keys(&self, kind: EntityKind) -> Result<Vec<RecordKey>, StorageError> {
        let sql = format!("SELECT id FROM {} ORDER BY id", kind.table_name());
        self.key_rows(&sql, [])
    }

    pub fn all(&self, kind: EntityKind) -> Result<Vec<Entity>, StorageError> {
        let sql = format!("SELECT id, attrs_json FROM {} ORDER BY id", kind.table_name());
        self.decode_rows(kind, &sql, [])
    }

    pub fn count(&self, kind: EntityKind) -> Result<i64, StorageError> {
        let sql = format!("SELECT COUNT(*) FROM {}", kind.table_name());
        Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
    }

    /// Removes the given keys; returns how many rows existed.
    pub fn bulk_delete(&self, kind: EntityKind, keys: &[RecordKey]) -> Result<usize, StorageError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let sql = format!("DELETE FROM {} WHERE id = ?1", kind.table_name());
        let tx = self.conn.unchecked_transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare(&sql)?;
            for key in keys {
                removed += stmt.execute([key.storage_key()])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    pub fn clear(&self, kind: EntityKind) -> Result<usize, StorageError> {
        let sql = format!("DELETE FROM {}", kind.table_name());
        Ok(self.conn.execute(&sql, [])?)
    }

    pub fn mark_scraped(&self, name: &str, at: DateTime<Utc>) -> Result<(), StorageError> {
        self.conn.execute(
            "
            INSERT INTO scrape_marks (name, scraped_at) VALUES (?1, ?2)
            ON CONFLICT(name) DO UPDATE SET scraped_at=excluded.scraped_at
            ",
            params![name, at.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn last_scraped(&self, name: &str) -> Result<Option<DateTime<Utc>>, StorageError> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT scraped_at FROM scrape_marks WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(parse_timestamp).transpose()
    }

    pub fn scrape_marks(&self) -> Result<Vec<ScrapeMark>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, scraped_at FROM scrape_marks ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut marks = Vec::new();
        for row in rows {
            let (name, scraped_at) = row?;
            marks.push(ScrapeMark {
                name,
                scraped_at: parse_timestamp(scraped_at)?,
            });
        }
        Ok(marks)
    }

    pub fn table_exists(&self, table_name: &str) -> Result<bool, StorageError> {
        let exists = self
            .conn
            .query_row(
                "
                SELECT 1
                FROM sqlite_master
                WHERE type='table' AND name = ?1
                LIMIT 1
                ",
                [table_name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(exists.is_some())
    }

    fn get_fields(
        &self,
        kind: EntityKind,
        key: &RecordKey,
    ) -> Result<Option<RawFields>, StorageError> {
        let sql = format!("SELECT attrs_json FROM {} WHERE id = ?1", kind.table_name());
        let attrs_json: Option<String> = self
            .conn
            .query_row(&sql, [key.storage_key()], |row| row.get(0))
            .optional()?;
        attrs_json.map(|json| parse_fields(&json)).transpose()
    }

    fn decode_rows<P: rusqlite::Params>(
        &self,
        kind: EntityKind,
        sql: &str,
        params: P,
    ) -> Result<Vec<Entity>, StorageError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| row.get::<_, String>(1))?;

        let mut entities = Vec::new();
        for row in rows {
            let fields = parse_fields(&row?)?;
            entities.push(decode(kind, &fields)?);
        }
        Ok(entities)
    }

    fn key_rows<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> Result<Vec<RecordKey>, StorageError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| row.get::<_, String>(0))?;

        let mut keys = Vec::new();
        for row in rows {
            if let Some(key) = RecordKey::parse(&row?) {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

fn write_row(conn: &Connection, entity: &Entity) -> Result<(), StorageError> {
    let kind = entity.kind();
    if entity.key().is_blank() {
        return Err(StorageError::Validation(format!(
            "{kind} record written without a primary key"
        )));
    }

    let fields = entity.to_fields();
    let attrs_json = serde_json::to_string(&fields)
        .map_err(|err| StorageError::Serialization(err.to_string()))?;
    let sql = format!(
        "
        INSERT INTO {} (
            id,
            name,
            system,
            world,
            relation,
            signature,
            observed_at,
            attrs_json
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(id) DO UPDATE SET
            name=excluded.name,
            system=excluded.system,
            world=excluded.world,
            relation=excluded.relation,
            signature=excluded.signature,
            observed_at=excluded.observed_at,
            attrs_json=excluded.attrs_json
        ",
        kind.table_name()
    );

    let projected = ["name", "system", "world", "relation", "signature"]
        .map(|column| projected_value(kind, &fields, column));
    conn.execute(
        &sql,
        params_from_iter([
            Some(entity.key().storage_key()),
            projected[0].clone(),
            projected[1].clone(),
            projected[2].clone(),
            projected[3].clone(),
            projected[4].clone(),
            entity.observed_at().map(|at| at.to_rfc3339()),
            Some(attrs_json),
        ]),
    )?;
    Ok(())
}

fn index_column(kind: EntityKind, index: &str) -> Result<&'static str, StorageError> {
    kind.spec()
        .indexes
        .iter()
        .find(|declared| **declared == index)
        .copied()
        .ok_or_else(|| StorageError::UnknownIndex {
            kind,
            index: index.to_string(),
        })
}

/// Indexed columns hold the canonical text of the attribute.
fn projected_value(kind: EntityKind, fields: &RawFields, attribute: &str) -> Option<String> {
    if !kind.permits(attribute) {
        return None;
    }
    match fields.get(attribute)? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(
            number
                .as_i64()
                .map(|int| int.to_string())
                .unwrap_or_else(|| number.to_string()),
        ),
        _ => None,
    }
}

fn parse_fields(json: &str) -> Result<RawFields, StorageError> {
    serde_json::from_str(json).map_err(|err| StorageError::Serialization(err.to_string()))
}

fn decode(kind: EntityKind, fields: &RawFields) -> Result<Entity, StorageError> {
    Entity::from_fields(kind, fields).map_err(StorageError::from)
}

fn parse_timestamp(value: String) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(&value)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|err| StorageError::Timestamp(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use abs_core::records::{ColonyRecord, FleetRecord, SystemRecord};
    use abs_core::relation::Relation;
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::NamedTempFile;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 23, 14, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn raw(value: Value) -> RawFields {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn system(id: i64, name: &str, at: (f64, f64, f64)) -> Entity {
        let mut record = SystemRecord::new(id);
        record.name = Some(name.to_string());
        record.x = Some(at.0);
        record.y = Some(at.1);
        record.z = Some(at.2);
        record.into()
    }

    fn my_fleet(id: i64, name: &str) -> Entity {
        Entity::from_fields(
            EntityKind::Fleet,
            &raw(json!({ "id": id, "name": name, "relation": "m", "player": "Ann" })),
        )
        .expect("fleet")
    }

    #[test]
    fn migration_creates_entity_tables() {
        let db = RecordStore::open_in_memory().expect("open db");
        for kind in EntityKind::ALL {
            assert!(
                db.table_exists(kind.table_name()).expect("table exists"),
                "{kind}"
            );
        }
        assert!(db.table_exists("scrape_marks").expect("marks table"));
        assert_eq!(db.schema_version().expect("version"), ABS_SCHEMA_VERSION);
    }

    #[test]
    fn second_migration_drops_rally_point_relation_index() {
        let db = RecordStore::open_in_memory().expect("open db");
        let index_exists = |name: &str| -> bool {
            db.conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = ?1",
                    [name],
                    |row| row.get::<_, i64>(0),
                )
                .expect("query indexes")
                > 0
        };
        assert!(!index_exists("idx_entity_rp_relation"));
        assert!(index_exists("idx_entity_fleet_relation"));
        assert!(!EntityKind::RallyPoint.has_index("relation"));
    }

    #[test]
    fn reopening_a_file_keeps_version_and_rows() {
        let file = NamedTempFile::new().expect("temp file");
        {
            let db = RecordStore::open(file.path()).expect("open db");
            db.put(&system(1, "Sol", (1.0, 2.0, 3.0))).expect("put");
        }
        let db = RecordStore::open(file.path()).expect("reopen db");
        assert_eq!(db.schema_version().expect("version"), ABS_SCHEMA_VERSION);
        assert_eq!(db.count(EntityKind::System).expect("count"), 1);
    }

    #[test]
    fn newer_schema_version_is_rejected() {
        let file = NamedTempFile::new().expect("temp file");
        {
            let conn = Connection::open(file.path()).expect("open raw");
            conn.execute("PRAGMA user_version = 99", [])
                .expect("bump version");
        }
        match RecordStore::open(file.path()) {
            Err(StorageError::UnsupportedSchemaVersion { found, supported }) => {
                assert_eq!(found, 99);
                assert_eq!(supported, ABS_SCHEMA_VERSION);
            }
            other => panic!("expected unsupported version, got {:?}", other.err()),
        }
    }

    #[test]
    fn put_then_get_returns_sanitized_record() {
        let db = RecordStore::open_in_memory().expect("open db");
        let entity = system(7, "Vega", (10.0, 20.0, 30.0));
        db.put(&entity).expect("put");

        let loaded = db
            .get(EntityKind::System, &RecordKey::Int(7))
            .expect("get")
            .expect("stored");
        assert_eq!(loaded, entity);
        assert!(db
            .get(EntityKind::System, &RecordKey::Int(8))
            .expect("get missing")
            .is_none());
        assert!(db
            .contains(EntityKind::System, &RecordKey::from("7"))
            .expect("contains"));
    }

    #[test]
    fn static_update_is_skipped_when_nothing_changed() {
        let db = RecordStore::open_in_memory().expect("open db");
        let entity = system(1, "Sol", (1.0, 2.0, 3.0));
        assert!(db.update_if_changed(&entity).expect("first write"));
        assert!(!db.update_if_changed(&entity).expect("second write"));

        let renamed = system(1, "Sol Prime", (1.0, 2.0, 3.0));
        assert!(db.update_if_changed(&renamed).expect("rename"));
        assert_eq!(db.count(EntityKind::System).expect("count"), 1);
    }

    #[test]
    fn mutable_kinds_always_write_and_merge_attributes() {
        let db = RecordStore::open_in_memory().expect("open db");
        let first = Entity::from_fields(
            EntityKind::Colony,
            &raw(json!({ "id": 3, "name": "Haven", "population": 100, "world": 9 })),
        )
        .expect("colony");
        assert!(db.update_if_changed(&first).expect("insert"));
        assert!(db.update_if_changed(&first).expect("rewrite"));

        let partial = Entity::from(ColonyRecord {
            population: Some(250),
            ..colony_shell(3)
        });
        assert!(db.update_if_changed(&partial).expect("merge"));

        let Some(Entity::Colony(stored)) =
            db.get(EntityKind::Colony, &RecordKey::Int(3)).expect("get")
        else {
            panic!("expected stored colony");
        };
        assert_eq!(stored.name.as_deref(), Some("Haven"));
        assert_eq!(stored.population, Some(250));
        assert_eq!(stored.world, Some(RecordKey::Int(9)));
    }

    fn colony_shell(id: i64) -> ColonyRecord {
        match Entity::from_fields(EntityKind::Colony, &raw(json!({ "id": id }))) {
            Ok(Entity::Colony(record)) => record,
            other => panic!("expected colony, got {other:?}"),
        }
    }

    #[test]
    fn put_replaces_every_attribute() {
        let db = RecordStore::open_in_memory().expect("open db");
        db.put(&my_fleet(1, "Alpha")).expect("put");
        let bare = Entity::from_fields(EntityKind::Fleet, &raw(json!({ "id": 1 })))
            .expect("bare fleet");
        db.put(&bare).expect("overwrite");
        let loaded = db
            .get(EntityKind::Fleet, &RecordKey::Int(1))
            .expect("get")
            .expect("stored");
        assert_eq!(loaded.name(), None);
        assert!(db
            .keys_by_index(EntityKind::Fleet, "relation", "m")
            .expect("scan")
            .is_empty());
    }

    #[test]
    fn bulk_operations_report_counts() {
        let db = RecordStore::open_in_memory().expect("open db");
        let fleets: Vec<_> = (1..=4).map(|id| my_fleet(id, "F")).collect();
        assert_eq!(db.bulk_put(&fleets).expect("bulk put"), 4);

        let systems = vec![system(1, "A", (0.0, 0.0, 0.0)), system(2, "B", (1.0, 1.0, 1.0))];
        assert_eq!(db.bulk_update_if_changed(&systems).expect("first"), 2);
        assert_eq!(db.bulk_update_if_changed(&systems).expect("second"), 0);

        let removed = db
            .bulk_delete(
                EntityKind::Fleet,
                &[RecordKey::Int(1), RecordKey::Int(2), RecordKey::Int(99)],
            )
            .expect("delete");
        assert_eq!(removed, 2);
        assert_eq!(db.count(EntityKind::Fleet).expect("count"), 2);
        assert_eq!(db.clear(EntityKind::Fleet).expect("clear"), 2);
        assert_eq!(db.count(EntityKind::System).expect("systems untouched"), 2);
    }

    #[test]
    fn scan_by_index_filters_on_projected_column() {
        let db = RecordStore::open_in_memory().expect("open db");
        db.put(&my_fleet(1, "Mine")).expect("mine");
        let enemy = Entity::from(FleetRecord {
            relation: Some(Relation::Enemy),
            ..match Entity::from_fields(EntityKind::Fleet, &raw(json!({ "id": 2 }))) {
                Ok(Entity::Fleet(record)) => record,
                other => panic!("expected fleet, got {other:?}"),
            }
        });
        db.put(&enemy).expect("enemy");

        let mine = db
            .scan_by_index(EntityKind::Fleet, "relation", "m")
            .expect("scan");
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].key(), &RecordKey::Int(1));

        let err = db
            .scan_by_index(EntityKind::Fleet, "player", "Ann")
            .expect_err("player is not indexed");
        assert!(matches!(err, StorageError::UnknownIndex { .. }));
    }

    #[test]
    fn keys_with_prefix_scopes_rally_point_databases() {
        let db = RecordStore::open_in_memory().expect("open db");
        for id in ["#1.10", "#1.11", "#0.10", "#10.1"] {
            let rp = Entity::from_fields(EntityKind::RallyPoint, &raw(json!({ "id": id })))
                .expect("rp");
            db.put(&rp).expect("put rp");
        }
        let keys = db
            .keys_with_prefix(EntityKind::RallyPoint, "#1.")
            .expect("prefix scan");
        assert_eq!(
            keys,
            vec![
                RecordKey::Text("#1.10".to_string()),
                RecordKey::Text("#1.11".to_string())
            ]
        );
    }

    #[test]
    fn blank_keys_fail_validation() {
        let db = RecordStore::open_in_memory().expect("open db");
        let entity = Entity::from(SystemRecord::new(RecordKey::Text("  ".to_string())));
        let err = db.put(&entity).expect_err("blank key");
        assert!(matches!(err, StorageError::Validation(_)));
    }

    #[test]
    fn busy_and_locked_map_to_unavailable() {
        let busy = rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(5), None);
        assert!(matches!(
            StorageError::from(busy),
            StorageError::Unavailable(_)
        ));
        let locked = rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(6), None);
        assert!(matches!(
            StorageError::from(locked),
            StorageError::Unavailable(_)
        ));
        let other = rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(1), None);
        assert!(matches!(StorageError::from(other), StorageError::Sqlite(_)));
    }

    #[test]
    fn scrape_marks_roundtrip() {
        let db = RecordStore::open_in_memory().expect("open db");
        assert_eq!(db.last_scraped("fleets").expect("empty"), None);
        db.mark_scraped("fleets", ts()).expect("mark");
        db.mark_scraped("wh.my", ts()).expect("mark wh");
        db.mark_scraped("fleets", ts() + chrono::Duration::seconds(30))
            .expect("re-mark");

        assert_eq!(
            db.last_scraped("fleets").expect("read"),
            Some(ts() + chrono::Duration::seconds(30))
        );
        let marks = db.scrape_marks().expect("marks");
        assert_eq!(
            marks.iter().map(|mark| mark.name.as_str()).collect::<Vec<_>>(),
            vec!["fleets", "wh.my"]
        );
    }
}
