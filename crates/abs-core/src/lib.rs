//! Entity model for the AtmoBurn archivist: kind registry, typed records,
//! relation codes and coordinate math.

pub mod geo;
pub mod lenient;
pub mod parse;
pub mod records;
pub mod relation;
pub mod schema;

pub use geo::{Bearing, Compass, Direction, Point};
pub use records::{
    Affiliation, ColonyRecord, Entity, FleetRecord, Located, RallyPointRecord, RawFields,
    RecordKey, RelationRecord, SanitizeError, SignatureRecord, SystemRecord, WorldRecord,
    WormholeRecord,
};
pub use relation::{normalize_relation, Relation, RelationAliases};
pub use schema::{EntityKind, KindSpec, SchemaError};
