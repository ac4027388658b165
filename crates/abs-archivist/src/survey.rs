//! Nearest-entity listing around a reference point.

use abs_core::geo::{self, Direction, Point};
use abs_core::records::{Entity, RecordKey};
use abs_core::relation::Relation;
use abs_core::schema::EntityKind;
use abs_storage::{RecordStore, StorageError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

pub const SURVEY_KINDS: [EntityKind; 4] = [
    EntityKind::Colony,
    EntityKind::Fleet,
    EntityKind::Wormhole,
    EntityKind::RallyPoint,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyFilter {
    pub kinds: Vec<EntityKind>,
    pub hide_relations: BTreeSet<Relation>,
    pub limit: Option<usize>,
}

impl Default for SurveyFilter {
    fn default() -> Self {
        Self {
            kinds: SURVEY_KINDS.to_vec(),
            hide_relations: BTreeSet::new(),
            limit: None,
        }
    }
}

impl SurveyFilter {
    fn admits(&self, entity: &Entity) -> bool {
        entity
            .relation()
            .map_or(true, |relation| !self.hide_relations.contains(&relation))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurveyEntry {
    pub kind: EntityKind,
    pub key: RecordKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation: Option<Relation>,
    pub position: Option<Point>,
    pub distance: Option<i64>,
    pub direction: Option<Direction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<DateTime<Utc>>,
}

/// Stored entities of the filter's kinds, nearest first.
///
/// Entities without a position sort after every positioned one.
pub fn survey(
    store: &RecordStore,
    origin: Point,
    filter: &SurveyFilter,
) -> Result<Vec<SurveyEntry>, StorageError> {
    let mut entries = Vec::new();
    for &kind in &filter.kinds {
        for entity in store.all(kind)? {
            if !filter.admits(&entity) {
                continue;
            }
            let position = entity.position();
            entries.push(SurveyEntry {
                kind,
                key: entity.key().clone(),
                name: entity.name().map(str::to_string),
                player: entity.player().map(str::to_string),
                relation: entity.relation(),
                position,
                distance: position.map(|at| geo::distance(origin, at)),
                direction: position.map(|at| geo::direction(origin, at)),
                observed_at: entity.observed_at(),
            });
        }
    }

    entries.sort_by_key(|entry| (entry.distance.is_none(), entry.distance));
    if let Some(limit) = filter.limit {
        entries.truncate(limit);
    }
    Ok(entries)
}

/// Position of a stored entity, for use as a survey origin.
pub fn reference_point(
    store: &RecordStore,
    kind: EntityKind,
    key: &RecordKey,
) -> Result<Option<Point>, StorageError> {
    Ok(store.get(kind, key)?.and_then(|entity| entity.position()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn put(db: &RecordStore, kind: EntityKind, value: Value) {
        let Value::Object(fields) = value else {
            panic!("expected object");
        };
        let entity = Entity::from_fields(kind, &fields).expect("sanitize");
        db.put(&entity).expect("put");
    }

    #[test]
    fn hidden_relations_and_limit() {
        let db = RecordStore::open_in_memory().expect("open db");
        put(&db, EntityKind::Colony, json!({ "id": 1, "x": 1, "y": 0, "z": 0, "relation": "m" }));
        put(&db, EntityKind::Colony, json!({ "id": 2, "x": 2, "y": 0, "z": 0, "relation": "e" }));
        put(&db, EntityKind::Fleet, json!({ "id": 3, "x": 3, "y": 0, "z": 0 }));

        let filter = SurveyFilter {
            hide_relations: BTreeSet::from([Relation::My]),
            limit: Some(1),
            ..SurveyFilter::default()
        };
        let entries = survey(&db, Point::origin(), &filter).expect("survey");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, RecordKey::Int(2));
        assert_eq!(entries[0].distance, Some(8000));
    }

    #[test]
    fn reference_point_reads_stored_position() {
        let db = RecordStore::open_in_memory().expect("open db");
        put(&db, EntityKind::Fleet, json!({ "id": 7, "x": 1, "y": 2, "z": 3 }));
        put(&db, EntityKind::Fleet, json!({ "id": 8 }));

        assert_eq!(
            reference_point(&db, EntityKind::Fleet, &RecordKey::Int(7)).expect("read"),
            Some(Point::new(1.0, 2.0, 3.0))
        );
        assert_eq!(
            reference_point(&db, EntityKind::Fleet, &RecordKey::Int(8)).expect("read"),
            None
        );
        assert_eq!(
            reference_point(&db, EntityKind::Fleet, &RecordKey::Int(9)).expect("read"),
            None
        );
    }
}
