use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Attributes stamped by the sync engine rather than taken from scraped input.
pub const PROVENANCE_FIELDS: [&str; 2] = ["observed_at", "source"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("unknown entity kind: {0}")]
    UnknownKind(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "world")]
    World,
    #[serde(rename = "colony")]
    Colony,
    #[serde(rename = "fleet")]
    Fleet,
    #[serde(rename = "rp")]
    RallyPoint,
    #[serde(rename = "wh")]
    Wormhole,
    #[serde(rename = "signature")]
    Signature,
    #[serde(rename = "relation")]
    Relation,
}

/// Registry entry for one entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindSpec {
    pub kind: EntityKind,
    pub table: &'static str,
    /// Permitted attribute names, primary key first.
    pub fields: &'static [&'static str],
    /// Unchanged re-observations are skipped instead of written.
    pub is_static: bool,
    /// Stored members may be pruned by scope reconciliation.
    pub reconcilable: bool,
    /// Secondary lookups backed by an SQL index.
    pub indexes: &'static [&'static str],
}

const SYSTEM_FIELDS: &[&str] = &["id", "name", "x", "y", "z", "galaxy"];
const WORLD_FIELDS: &[&str] = &["id", "name", "system", "x", "y", "z"];
const COLONY_FIELDS: &[&str] = &[
    "id",
    "name",
    "x",
    "y",
    "z",
    "world",
    "system",
    "player",
    "faction",
    "relation",
    "population",
    "size",
    "observed_at",
    "source",
];
const FLEET_FIELDS: &[&str] = &[
    "id",
    "name",
    "x",
    "y",
    "z",
    "system",
    "world",
    "colony",
    "player",
    "faction",
    "relation",
    "signature",
    "location",
    "speed",
    "ships",
    "tonnage",
    "roster",
    "observed_at",
    "source",
];
const RALLY_POINT_FIELDS: &[&str] = &[
    "id",
    "name",
    "x",
    "y",
    "z",
    "relation",
    "type",
    "comment",
    "observed_at",
    "source",
];
const WORMHOLE_FIELDS: &[&str] = &[
    "id",
    "name",
    "system",
    "x",
    "y",
    "z",
    "target_system",
    "tx",
    "ty",
    "tz",
    "observed_at",
    "source",
];
const SIGNATURE_FIELDS: &[&str] = &[
    "id",
    "name",
    "x",
    "y",
    "z",
    "system",
    "world",
    "colony",
    "player",
    "faction",
    "relation",
    "location",
    "speed",
    "ships",
    "tonnage",
    "roster",
    "observed_at",
    "source",
];
const RELATION_FIELDS: &[&str] = &["id", "relation", "observed_at", "source"];

static REGISTRY: [KindSpec; 8] = [
    KindSpec {
        kind: EntityKind::System,
        table: "entity_system",
        fields: SYSTEM_FIELDS,
        is_static: true,
        reconcilable: false,
        indexes: &["name"],
    },
    KindSpec {
        kind: EntityKind::World,
        table: "entity_world",
        fields: WORLD_FIELDS,
        is_static: true,
        reconcilable: false,
        indexes: &["name", "system"],
    },
    KindSpec {
        kind: EntityKind::Colony,
        table: "entity_colony",
        fields: COLONY_FIELDS,
        is_static: false,
        reconcilable: true,
        indexes: &["name", "world", "system", "relation"],
    },
    KindSpec {
        kind: EntityKind::Fleet,
        table: "entity_fleet",
        fields: FLEET_FIELDS,
        is_static: false,
        reconcilable: true,
        indexes: &["name", "system", "relation", "signature"],
    },
    KindSpec {
        kind: EntityKind::RallyPoint,
        table: "entity_rp",
        fields: RALLY_POINT_FIELDS,
        is_static: true,
        reconcilable: true,
        indexes: &["name"],
    },
    KindSpec {
        kind: EntityKind::Wormhole,
        table: "entity_wh",
        fields: WORMHOLE_FIELDS,
        is_static: true,
        reconcilable: false,
        indexes: &["name"],
    },
    KindSpec {
        kind: EntityKind::Signature,
        table: "entity_signature",
        fields: SIGNATURE_FIELDS,
        is_static: false,
        reconcilable: true,
        indexes: &["name", "system", "relation"],
    },
    KindSpec {
        kind: EntityKind::Relation,
        table: "entity_relation",
        fields: RELATION_FIELDS,
        is_static: false,
        reconcilable: true,
        indexes: &["relation"],
    },
];

impl EntityKind {
    pub const ALL: [EntityKind; 8] = [
        EntityKind::System,
        EntityKind::World,
        EntityKind::Colony,
        EntityKind::Fleet,
        EntityKind::RallyPoint,
        EntityKind::Wormhole,
        EntityKind::Signature,
        EntityKind::Relation,
    ];

    pub fn spec(self) -> &'static KindSpec {
        let index = match self {
            Self::System => 0,
            Self::World => 1,
            Self::Colony => 2,
            Self::Fleet => 3,
            Self::RallyPoint => 4,
            Self::Wormhole => 5,
            Self::Signature => 6,
            Self::Relation => 7,
        };
        &REGISTRY[index]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::World => "world",
            Self::Colony => "colony",
            Self::Fleet => "fleet",
            Self::RallyPoint => "rp",
            Self::Wormhole => "wh",
            Self::Signature => "signature",
            Self::Relation => "relation",
        }
    }

    pub fn fields(self) -> &'static [&'static str] {
        self.spec().fields
    }

    pub fn is_static(self) -> bool {
        self.spec().is_static
    }

    pub fn reconcilable(self) -> bool {
        self.spec().reconcilable
    }

    pub fn table_name(self) -> &'static str {
        self.spec().table
    }

    pub fn permits(self, attribute: &str) -> bool {
        self.fields().contains(&attribute)
    }

    pub fn has_index(self, index: &str) -> bool {
        self.spec().indexes.contains(&index)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = SchemaError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "system" => Ok(Self::System),
            "world" => Ok(Self::World),
            "colony" => Ok(Self::Colony),
            "fleet" => Ok(Self::Fleet),
            "rp" | "rallypoint" | "rally_point" | "rally-point" => Ok(Self::RallyPoint),
            "wh" | "wormhole" => Ok(Self::Wormhole),
            "signature" => Ok(Self::Signature),
            "relation" => Ok(Self::Relation),
            _ => Err(SchemaError::UnknownKind(input.trim().to_string())),
        }
    }
}

/// Looks a kind up by name.
pub fn lookup(name: &str) -> Result<&'static KindSpec, SchemaError> {
    name.parse::<EntityKind>().map(EntityKind::spec)
}
