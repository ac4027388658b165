use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Diplomatic relation of an entity's owner, stored as a one-letter code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Relation {
    My,
    Friend,
    Neutral,
    Enemy,
    Other(char),
}

impl Relation {
    pub fn from_code(code: char) -> Self {
        match code {
            'm' => Self::My,
            'f' => Self::Friend,
            'n' => Self::Neutral,
            'e' => Self::Enemy,
            other => Self::Other(other),
        }
    }

    pub fn code(self) -> char {
        match self {
            Self::My => 'm',
            Self::Friend => 'f',
            Self::Neutral => 'n',
            Self::Enemy => 'e',
            Self::Other(code) => code,
        }
    }

    pub fn as_code_string(self) -> String {
        self.code().to_string()
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl Serialize for Relation {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.as_code_string())
    }
}

impl<'de> Deserialize<'de> for Relation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        normalize_relation(&text, &RelationAliases::default())
            .ok_or_else(|| serde::de::Error::custom("empty relation"))
    }
}

/// Maps relation labels printed by the game onto relation codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationAliases {
    aliases: BTreeMap<String, Relation>,
}

impl RelationAliases {
    pub fn empty() -> Self {
        Self {
            aliases: BTreeMap::new(),
        }
    }

    pub fn with_alias(mut self, label: impl Into<String>, relation: Relation) -> Self {
        self.insert(label, relation);
        self
    }

    pub fn insert(&mut self, label: impl Into<String>, relation: Relation) {
        self.aliases.insert(label.into().trim().to_string(), relation);
    }

    pub fn get(&self, label: &str) -> Option<Relation> {
        self.aliases.get(label.trim()).copied()
    }
}

impl Default for RelationAliases {
    /// Labels from the scanner screen.
    fn default() -> Self {
        Self::empty()
            .with_alias("Friend", Relation::Friend)
            .with_alias("No contact", Relation::Neutral)
            .with_alias("Peace", Relation::Neutral)
    }
}

/// Alias lookup first, then the lowercased first letter of the trimmed text.
pub fn normalize_relation(text: &str, aliases: &RelationAliases) -> Option<Relation> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(relation) = aliases.get(trimmed) {
        return Some(relation);
    }
    trimmed
        .chars()
        .next()
        .and_then(|first| first.to_lowercase().next())
        .map(Relation::from_code)
}
