//! Typed entity records and the sanitize boundary.
//!
//! Scraped observations arrive as loose JSON objects ([`RawFields`]).
//! [`Entity::from_fields`] projects them onto the kind's whitelist and
//! deserializes them into that kind's record struct; attributes the struct does
//! not declare never make it past this point.

use crate::geo::Point;
use crate::lenient;
use crate::relation::Relation;
use crate::schema::{EntityKind, PROVENANCE_FIELDS};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

pub type RawFields = serde_json::Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SanitizeError {
    #[error("[{kind}] 'id' is required")]
    MissingPrimaryKey { kind: EntityKind },
    #[error("[{kind}] invalid record: {reason}")]
    Invalid { kind: EntityKind, reason: String },
}

/// Primary key of a record. Integral text is normalized to `Int`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKey {
    Int(i64),
    Text(String),
}

impl RecordKey {
    /// `None` for null, empty or whitespace-only values and non-scalar JSON.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(text) => Self::parse(text),
            Value::Number(number) => Some(match number.as_i64() {
                Some(int) => Self::Int(int),
                None => match number.as_f64() {
                    Some(float) if float.fract() == 0.0 && float.abs() < i64::MAX as f64 => {
                        Self::Int(float as i64)
                    }
                    _ => Self::Text(number.to_string()),
                },
            }),
            _ => None,
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(match trimmed.parse::<i64>() {
            Ok(int) => Self::Int(int),
            Err(_) => Self::Text(trimmed.to_string()),
        })
    }

    /// Canonical text form used as the SQL primary key.
    pub fn storage_key(&self) -> String {
        match self {
            Self::Int(int) => int.to_string(),
            Self::Text(text) => text.clone(),
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Text(text) if text.trim().is_empty())
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(int) => Value::from(*int),
            Self::Text(text) => Value::from(text.as_str()),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(int) => write!(f, "{int}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl From<i64> for RecordKey {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for RecordKey {
    fn from(value: &str) -> Self {
        Self::parse(value).unwrap_or_else(|| Self::Text(String::new()))
    }
}

impl Serialize for RecordKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Int(int) => serializer.serialize_i64(*int),
            Self::Text(text) => serializer.serialize_str(text),
        }
    }
}

impl<'de> Deserialize<'de> for RecordKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        lenient::key(deserializer)
    }
}

/// Records that carry a global position, directly or through references.
pub trait Located {
    fn position(&self) -> Option<Point>;
    fn set_position(&mut self, point: Point);
    fn colony_ref(&self) -> Option<&RecordKey> {
        None
    }
    fn world_ref(&self) -> Option<&RecordKey>;
    fn system_ref(&self) -> Option<&RecordKey>;
    fn set_world_ref(&mut self, key: RecordKey);
    fn set_system_ref(&mut self, key: RecordKey);
}

/// Owner fields of colonies, fleets and signatures.
pub struct Affiliation<'a> {
    pub player: &'a mut Option<String>,
    pub relation: &'a mut Option<Relation>,
}

fn point(x: Option<f64>, y: Option<f64>, z: Option<f64>) -> Option<Point> {
    Some(Point::new(x?, y?, z?))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemRecord {
    #[serde(deserialize_with = "lenient::key")]
    pub id: RecordKey,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::float", skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, deserialize_with = "lenient::float", skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, deserialize_with = "lenient::float", skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    #[serde(default, deserialize_with = "lenient::int", skip_serializing_if = "Option::is_none")]
    pub galaxy: Option<i64>,
}

impl SystemRecord {
    pub fn new(id: impl Into<RecordKey>) -> Self {
        Self {
            id: id.into(),
            name: None,
            x: None,
            y: None,
            z: None,
            galaxy: None,
        }
    }

    pub fn position(&self) -> Option<Point> {
        point(self.x, self.y, self.z)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldRecord {
    #[serde(deserialize_with = "lenient::key")]
    pub id: RecordKey,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::optional_key",
        skip_serializing_if = "Option::is_none"
    )]
    pub system: Option<RecordKey>,
    #[serde(default, deserialize_with = "lenient::float", skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, deserialize_with = "lenient::float", skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, deserialize_with = "lenient::float", skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

impl WorldRecord {
    pub fn new(id: impl Into<RecordKey>) -> Self {
        Self {
            id: id.into(),
            name: None,
            system: None,
            x: None,
            y: None,
            z: None,
        }
    }

    pub fn position(&self) -> Option<Point> {
        point(self.x, self.y, self.z)
    }

    pub fn set_position(&mut self, at: Point) {
        self.x = Some(at.x);
        self.y = Some(at.y);
        self.z = Some(at.z);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColonyRecord {
    #[serde(deserialize_with = "lenient::key")]
    pub id: RecordKey,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::float", skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, deserialize_with = "lenient::float", skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, deserialize_with = "lenient::float", skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::optional_key",
        skip_serializing_if = "Option::is_none"
    )]
    pub world: Option<RecordKey>,
    #[serde(
        default,
        deserialize_with = "lenient::optional_key",
        skip_serializing_if = "Option::is_none"
    )]
    pub system: Option<RecordKey>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub player: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub faction: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::relation",
        skip_serializing_if = "Option::is_none"
    )]
    pub relation: Option<Relation>,
    #[serde(default, deserialize_with = "lenient::int", skip_serializing_if = "Option::is_none")]
    pub population: Option<i64>,
    #[serde(default, deserialize_with = "lenient::float", skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetRecord {
    #[serde(deserialize_with = "lenient::key")]
    pub id: RecordKey,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::float", skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, deserialize_with = "lenient::float", skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, deserialize_with = "lenient::float", skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::optional_key",
        skip_serializing_if = "Option::is_none"
    )]
    pub system: Option<RecordKey>,
    #[serde(
        default,
        deserialize_with = "lenient::optional_key",
        skip_serializing_if = "Option::is_none"
    )]
    pub world: Option<RecordKey>,
    #[serde(
        default,
        deserialize_with = "lenient::optional_key",
        skip_serializing_if = "Option::is_none"
    )]
    pub colony: Option<RecordKey>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub player: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub faction: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::relation",
        skip_serializing_if = "Option::is_none"
    )]
    pub relation: Option<Relation>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Location label as printed on the fleet screen.
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "lenient::int", skip_serializing_if = "Option::is_none")]
    pub speed: Option<i64>,
    #[serde(default, deserialize_with = "lenient::int", skip_serializing_if = "Option::is_none")]
    pub ships: Option<i64>,
    #[serde(default, deserialize_with = "lenient::float", skip_serializing_if = "Option::is_none")]
    pub tonnage: Option<f64>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub roster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RallyPointRecord {
    #[serde(deserialize_with = "lenient::key")]
    pub id: RecordKey,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::float", skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, deserialize_with = "lenient::float", skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, deserialize_with = "lenient::float", skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::relation",
        skip_serializing_if = "Option::is_none"
    )]
    pub relation: Option<Relation>,
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient::text",
        skip_serializing_if = "Option::is_none"
    )]
    pub point_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl RallyPointRecord {
    /// `#1.<id>` for the empire database, `#0.<id>` for the personal one.
    pub fn scoped_key(empire_db: bool, raw_id: &str) -> RecordKey {
        RecordKey::Text(format!("{}{}", Self::scope_prefix(empire_db), raw_id.trim()))
    }

    pub fn scope_prefix(empire_db: bool) -> String {
        format!("#{}.", u8::from(empire_db))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WormholeRecord {
    #[serde(deserialize_with = "lenient::key")]
    pub id: RecordKey,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::optional_key",
        skip_serializing_if = "Option::is_none"
    )]
    pub system: Option<RecordKey>,
    #[serde(default, deserialize_with = "lenient::float", skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, deserialize_with = "lenient::float", skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, deserialize_with = "lenient::float", skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::optional_key",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_system: Option<RecordKey>,
    #[serde(default, deserialize_with = "lenient::float", skip_serializing_if = "Option::is_none")]
    pub tx: Option<f64>,
    #[serde(default, deserialize_with = "lenient::float", skip_serializing_if = "Option::is_none")]
    pub ty: Option<f64>,
    #[serde(default, deserialize_with = "lenient::float", skip_serializing_if = "Option::is_none")]
    pub tz: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl WormholeRecord {
    /// `"Wormhole Alpha"` in system 12 becomes `Alpha.12`.
    pub fn derive_key(name: &str, system: &RecordKey) -> Option<RecordKey> {
        let trimmed = name.trim();
        let short = match trimmed.strip_prefix("Wormhole") {
            Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => rest.trim(),
            _ => trimmed,
        };
        if short.is_empty() {
            return None;
        }
        Some(RecordKey::Text(format!("{short}.{system}")))
    }

    pub fn position(&self) -> Option<Point> {
        point(self.x, self.y, self.z)
    }

    pub fn set_position(&mut self, at: Point) {
        self.x = Some(at.x);
        self.y = Some(at.y);
        self.z = Some(at.z);
    }

    pub fn target_position(&self) -> Option<Point> {
        point(self.tx, self.ty, self.tz)
    }

    pub fn set_target_position(&mut self, at: Point) {
        self.tx = Some(at.x);
        self.ty = Some(at.y);
        self.tz = Some(at.z);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureRecord {
    #[serde(deserialize_with = "lenient::key")]
    pub id: RecordKey,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::float", skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, deserialize_with = "lenient::float", skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, deserialize_with = "lenient::float", skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::optional_key",
        skip_serializing_if = "Option::is_none"
    )]
    pub system: Option<RecordKey>,
    #[serde(
        default,
        deserialize_with = "lenient::optional_key",
        skip_serializing_if = "Option::is_none"
    )]
    pub world: Option<RecordKey>,
    #[serde(
        default,
        deserialize_with = "lenient::optional_key",
        skip_serializing_if = "Option::is_none"
    )]
    pub colony: Option<RecordKey>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub player: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub faction: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::relation",
        skip_serializing_if = "Option::is_none"
    )]
    pub relation: Option<Relation>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "lenient::int", skip_serializing_if = "Option::is_none")]
    pub speed: Option<i64>,
    #[serde(default, deserialize_with = "lenient::int", skip_serializing_if = "Option::is_none")]
    pub ships: Option<i64>,
    #[serde(default, deserialize_with = "lenient::float", skip_serializing_if = "Option::is_none")]
    pub tonnage: Option<f64>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub roster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationRecord {
    #[serde(deserialize_with = "lenient::key")]
    pub id: RecordKey,
    #[serde(
        default,
        deserialize_with = "lenient::relation",
        skip_serializing_if = "Option::is_none"
    )]
    pub relation: Option<Relation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

macro_rules! impl_record {
    ($record:ty, $kind:ident) => {
        impl From<$record> for Entity {
            fn from(record: $record) -> Self {
                Entity::$kind(record)
            }
        }
    };
}

impl_record!(SystemRecord, System);
impl_record!(WorldRecord, World);
impl_record!(ColonyRecord, Colony);
impl_record!(FleetRecord, Fleet);
impl_record!(RallyPointRecord, RallyPoint);
impl_record!(WormholeRecord, Wormhole);
impl_record!(SignatureRecord, Signature);
impl_record!(RelationRecord, Relation);

macro_rules! impl_located {
    (@colony $self:ident, true) => {
        $self.colony.as_ref()
    };
    (@colony $self:ident, false) => {
        None
    };
    ($record:ty, colony: $has_colony:tt) => {
        impl Located for $record {
            fn position(&self) -> Option<Point> {
                point(self.x, self.y, self.z)
            }

            fn set_position(&mut self, at: Point) {
                self.x = Some(at.x);
                self.y = Some(at.y);
                self.z = Some(at.z);
            }

            fn colony_ref(&self) -> Option<&RecordKey> {
                impl_located!(@colony self, $has_colony)
            }

            fn world_ref(&self) -> Option<&RecordKey> {
                self.world.as_ref()
            }

            fn system_ref(&self) -> Option<&RecordKey> {
                self.system.as_ref()
            }

            fn set_world_ref(&mut self, key: RecordKey) {
                self.world = Some(key);
            }

            fn set_system_ref(&mut self, key: RecordKey) {
                self.system = Some(key);
            }
        }
    };
}

impl_located!(ColonyRecord, colony: false);
impl_located!(FleetRecord, colony: true);
impl_located!(SignatureRecord, colony: true);

/// A sanitized record of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    System(SystemRecord),
    World(WorldRecord),
    Colony(ColonyRecord),
    Fleet(FleetRecord),
    RallyPoint(RallyPointRecord),
    Wormhole(WormholeRecord),
    Signature(SignatureRecord),
    Relation(RelationRecord),
}

impl Entity {
    /// Sanitizes raw scraped fields into a record of `kind`.
    pub fn from_fields(kind: EntityKind, fields: &RawFields) -> Result<Self, SanitizeError> {
        if fields.get("id").and_then(RecordKey::from_value).is_none() {
            return Err(SanitizeError::MissingPrimaryKey { kind });
        }

        let projected: RawFields = fields
            .iter()
            .filter(|(name, _)| kind.permits(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        let value = Value::Object(projected);

        match kind {
            EntityKind::System => decode(kind, value).map(Self::System),
            EntityKind::World => decode(kind, value).map(Self::World),
            EntityKind::Colony => decode(kind, value).map(Self::Colony),
            EntityKind::Fleet => decode(kind, value).map(Self::Fleet),
            EntityKind::RallyPoint => decode(kind, value).map(Self::RallyPoint),
            EntityKind::Wormhole => decode(kind, value).map(Self::Wormhole),
            EntityKind::Signature => decode(kind, value).map(Self::Signature),
            EntityKind::Relation => decode(kind, value).map(Self::Relation),
        }
    }

    /// Attribute map with absent attributes omitted.
    pub fn to_fields(&self) -> RawFields {
        match self {
            Self::System(record) => encode(record),
            Self::World(record) => encode(record),
            Self::Colony(record) => encode(record),
            Self::Fleet(record) => encode(record),
            Self::RallyPoint(record) => encode(record),
            Self::Wormhole(record) => encode(record),
            Self::Signature(record) => encode(record),
            Self::Relation(record) => encode(record),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Self::System(_) => EntityKind::System,
            Self::World(_) => EntityKind::World,
            Self::Colony(_) => EntityKind::Colony,
            Self::Fleet(_) => EntityKind::Fleet,
            Self::RallyPoint(_) => EntityKind::RallyPoint,
            Self::Wormhole(_) => EntityKind::Wormhole,
            Self::Signature(_) => EntityKind::Signature,
            Self::Relation(_) => EntityKind::Relation,
        }
    }

    pub fn key(&self) -> &RecordKey {
        match self {
            Self::System(record) => &record.id,
            Self::World(record) => &record.id,
            Self::Colony(record) => &record.id,
            Self::Fleet(record) => &record.id,
            Self::RallyPoint(record) => &record.id,
            Self::Wormhole(record) => &record.id,
            Self::Signature(record) => &record.id,
            Self::Relation(record) => &record.id,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::System(record) => record.name.as_deref(),
            Self::World(record) => record.name.as_deref(),
            Self::Colony(record) => record.name.as_deref(),
            Self::Fleet(record) => record.name.as_deref(),
            Self::RallyPoint(record) => record.name.as_deref(),
            Self::Wormhole(record) => record.name.as_deref(),
            Self::Signature(record) => record.name.as_deref(),
            Self::Relation(_) => None,
        }
    }

    pub fn player(&self) -> Option<&str> {
        match self {
            Self::Colony(record) => record.player.as_deref(),
            Self::Fleet(record) => record.player.as_deref(),
            Self::Signature(record) => record.player.as_deref(),
            _ => None,
        }
    }

    pub fn relation(&self) -> Option<Relation> {
        match self {
            Self::Colony(record) => record.relation,
            Self::Fleet(record) => record.relation,
            Self::RallyPoint(record) => record.relation,
            Self::Signature(record) => record.relation,
            Self::Relation(record) => record.relation,
            _ => None,
        }
    }

    pub fn position(&self) -> Option<Point> {
        match self {
            Self::System(record) => record.position(),
            Self::World(record) => record.position(),
            Self::Colony(record) => Located::position(record),
            Self::Fleet(record) => Located::position(record),
            Self::RallyPoint(record) => point(record.x, record.y, record.z),
            Self::Wormhole(record) => record.position(),
            Self::Signature(record) => Located::position(record),
            Self::Relation(_) => None,
        }
    }

    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Colony(record) => record.observed_at,
            Self::Fleet(record) => record.observed_at,
            Self::RallyPoint(record) => record.observed_at,
            Self::Wormhole(record) => record.observed_at,
            Self::Signature(record) => record.observed_at,
            Self::Relation(record) => record.observed_at,
            Self::System(_) | Self::World(_) => None,
        }
    }

    /// Stamps observation time and source; a no-op for kinds without them.
    pub fn set_provenance(&mut self, at: DateTime<Utc>, source: &str) {
        let source = Some(source.to_string()).filter(|source| !source.trim().is_empty());
        let (observed_at, tag) = match self {
            Self::Colony(record) => (&mut record.observed_at, &mut record.source),
            Self::Fleet(record) => (&mut record.observed_at, &mut record.source),
            Self::RallyPoint(record) => (&mut record.observed_at, &mut record.source),
            Self::Wormhole(record) => (&mut record.observed_at, &mut record.source),
            Self::Signature(record) => (&mut record.observed_at, &mut record.source),
            Self::Relation(record) => (&mut record.observed_at, &mut record.source),
            Self::System(_) | Self::World(_) => return,
        };
        *observed_at = Some(at);
        *tag = source;
    }

    pub fn affiliation_mut(&mut self) -> Option<Affiliation<'_>> {
        let (player, relation) = match self {
            Self::Colony(record) => (&mut record.player, &mut record.relation),
            Self::Fleet(record) => (&mut record.player, &mut record.relation),
            Self::Signature(record) => (&mut record.player, &mut record.relation),
            _ => return None,
        };
        Some(Affiliation { player, relation })
    }

    pub fn as_located_mut(&mut self) -> Option<&mut dyn Located> {
        match self {
            Self::Colony(record) => Some(record),
            Self::Fleet(record) => Some(record),
            Self::Signature(record) => Some(record),
            _ => None,
        }
    }
}

fn decode<T: DeserializeOwned>(kind: EntityKind, value: Value) -> Result<T, SanitizeError> {
    serde_json::from_value(value).map_err(|err| SanitizeError::Invalid {
        kind,
        reason: err.to_string(),
    })
}

fn encode<T: Serialize>(record: &T) -> RawFields {
    // Record structs only hold scalars, so they always serialize to an object.
    match serde_json::to_value(record) {
        Ok(Value::Object(fields)) => fields,
        _ => RawFields::new(),
    }
}

/// Whether writing `incoming` over `stored` would change nothing.
///
/// Only attributes present in `incoming` count, so an attribute the new
/// observation omits never registers as a change. Provenance attributes are
/// ignored.
pub fn is_unchanged(kind: EntityKind, stored: &RawFields, incoming: &RawFields) -> bool {
    kind.fields()
        .iter()
        .filter(|field| !PROVENANCE_FIELDS.contains(field))
        .all(|field| match incoming.get(*field) {
            None | Some(Value::Null) => true,
            Some(new) => stored
                .get(*field)
                .is_some_and(|old| same_value(old, new)),
        })
}

fn same_value(old: &Value, new: &Value) -> bool {
    match (old, new) {
        (Value::Number(old), Value::Number(new)) => match (old.as_f64(), new.as_f64()) {
            (Some(a), Some(b)) => a == b || (a.is_nan() && b.is_nan()),
            _ => old == new,
        },
        _ => old == new,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> RawFields {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn full_fleet() -> RawFields {
        fields(json!({
            "id": 77,
            "name": "Scout",
            "x": 1, "y": 2, "z": 3,
            "system": 4, "world": 5, "colony": 6,
            "player": "Ann", "faction": "Blue",
            "relation": "Enemy",
            "signature": "ABC",
            "location": "Orbit",
            "speed": "1,200 km/h",
            "ships": "3",
            "tonnage": "12,000.5",
            "roster": "3x Frigate",
            "observed_at": "2026-02-23T14:00:00Z",
            "source": "fo",
        }))
    }

    #[test]
    fn sanitize_drops_unknown_attributes() {
        for kind in EntityKind::ALL {
            let mut raw = full_fleet();
            raw.insert("cargo".to_string(), json!("ore"));
            raw.insert("__proto__".to_string(), json!({}));
            let entity = Entity::from_fields(kind, &raw).expect("sanitize");
            let out = entity.to_fields();
            assert!(!out.contains_key("cargo"), "{kind}");
            assert!(!out.contains_key("__proto__"), "{kind}");
            for name in out.keys() {
                assert!(kind.permits(name), "{kind} leaked {name}");
            }
        }
    }

    #[test]
    fn sanitize_is_idempotent_for_every_kind() {
        let mut raw = full_fleet();
        raw.insert("tx".to_string(), json!("9"));
        raw.insert("target_system".to_string(), json!("8"));
        raw.insert("type".to_string(), json!("  Outpost "));
        raw.insert("population".to_string(), json!("1,000,000"));
        raw.insert("size".to_string(), json!(2.5));
        raw.insert("galaxy".to_string(), json!(1));
        for kind in EntityKind::ALL {
            let once = Entity::from_fields(kind, &raw).expect("first pass");
            let twice = Entity::from_fields(kind, &once.to_fields()).expect("second pass");
            assert_eq!(once, twice, "{kind}");
        }
    }

    #[test]
    fn full_records_serialize_exactly_their_whitelist() {
        let mut raw = full_fleet();
        for (name, value) in [
            ("tx", json!(1)),
            ("ty", json!(2)),
            ("tz", json!(3)),
            ("target_system", json!(9)),
            ("type", json!("base")),
            ("comment", json!("note")),
            ("population", json!(10)),
            ("size", json!(1.5)),
            ("galaxy", json!(2)),
        ] {
            raw.insert(name.to_string(), value);
        }
        raw.insert("relation".to_string(), json!("e"));
        for kind in EntityKind::ALL {
            let entity = Entity::from_fields(kind, &raw).expect("sanitize");
            let mut names: Vec<_> = entity.to_fields().keys().cloned().collect();
            names.sort();
            let mut expected: Vec<_> = kind.fields().iter().map(|f| f.to_string()).collect();
            expected.sort();
            assert_eq!(names, expected, "{kind}");
        }
    }

    #[test]
    fn primary_key_is_required() {
        for kind in EntityKind::ALL {
            for id in [json!(null), json!("   "), json!(""), json!(["x"])] {
                let raw = fields(json!({ "id": id, "name": "n" }));
                assert_eq!(
                    Entity::from_fields(kind, &raw),
                    Err(SanitizeError::MissingPrimaryKey { kind })
                );
            }
            let missing = fields(json!({ "name": "n" }));
            assert!(Entity::from_fields(kind, &missing).is_err());
            let ok = fields(json!({ "id": " 12 " }));
            let entity = Entity::from_fields(kind, &ok).expect("key only");
            assert_eq!(entity.key(), &RecordKey::Int(12));
        }
    }

    #[test]
    fn display_strings_are_coerced_and_bad_cells_dropped() {
        let raw = fields(json!({
            "id": "5",
            "speed": "fast",
            "ships": "1,024",
            "tonnage": "",
            "name": "  ",
            "relation": "Neutral",
        }));
        let Entity::Fleet(fleet) = Entity::from_fields(EntityKind::Fleet, &raw).expect("fleet")
        else {
            panic!("expected fleet");
        };
        assert_eq!(fleet.id, RecordKey::Int(5));
        assert_eq!(fleet.speed, None);
        assert_eq!(fleet.ships, Some(1024));
        assert_eq!(fleet.tonnage, None);
        assert_eq!(fleet.name, None);
        assert_eq!(fleet.relation, Some(Relation::Neutral));
    }

    #[test]
    fn unchanged_ignores_absent_attributes_and_provenance() {
        let stored = fields(json!({ "id": 1, "name": "Sol", "x": 1.0, "y": 2.0, "z": 3.0 }));
        let same_subset = fields(json!({ "id": 1, "name": "Sol" }));
        let renamed = fields(json!({ "id": 1, "name": "Sol Prime" }));
        let restamped = fields(json!({ "id": 1, "observed_at": "2026-01-01T00:00:00Z" }));
        assert!(is_unchanged(EntityKind::System, &stored, &same_subset));
        assert!(!is_unchanged(EntityKind::System, &stored, &renamed));
        assert!(is_unchanged(EntityKind::Wormhole, &stored, &restamped));
        let int_vs_float = fields(json!({ "id": 1, "x": 1 }));
        assert!(is_unchanged(EntityKind::System, &stored, &int_vs_float));
    }

    #[test]
    fn derived_keys() {
        assert_eq!(
            WormholeRecord::derive_key("Wormhole Alpha", &RecordKey::Int(12)),
            Some(RecordKey::Text("Alpha.12".to_string()))
        );
        assert_eq!(WormholeRecord::derive_key("Wormhole ", &RecordKey::Int(12)), None);
        assert_eq!(WormholeRecord::derive_key(" Wormhole", &RecordKey::Int(12)), None);
        assert_eq!(
            WormholeRecord::derive_key("  Wormhole   Beta ", &RecordKey::Int(12)),
            Some(RecordKey::Text("Beta.12".to_string()))
        );
        assert_eq!(
            WormholeRecord::derive_key("Wormholes End", &RecordKey::Int(3)),
            Some(RecordKey::Text("Wormholes End.3".to_string()))
        );
        assert_eq!(
            RallyPointRecord::scoped_key(true, " 42 "),
            RecordKey::Text("#1.42".to_string())
        );
        assert_eq!(RallyPointRecord::scope_prefix(false), "#0.");
    }

    #[test]
    fn provenance_only_lands_on_kinds_that_carry_it() {
        let at = chrono::DateTime::parse_from_rfc3339("2026-02-23T14:00:00Z")
            .expect("timestamp")
            .with_timezone(&Utc);
        let mut system = Entity::from(SystemRecord::new(1));
        system.set_provenance(at, "sc");
        assert!(!system.to_fields().contains_key("source"));

        let raw = fields(json!({ "id": "#0.1" }));
        let mut rp = Entity::from_fields(EntityKind::RallyPoint, &raw).expect("rp");
        rp.set_provenance(at, "rp.0");
        assert_eq!(rp.observed_at(), Some(at));
        assert_eq!(rp.to_fields().get("source"), Some(&json!("rp.0")));
    }
}
